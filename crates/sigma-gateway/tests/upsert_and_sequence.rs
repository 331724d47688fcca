//! `PUT` inserts when its filter matches nothing, and the sequence feed
//! pages by `sequence_number` (spec §4.9 "Upsert", §4.8 "Sequence
//! request").

mod support;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn put_inserts_when_the_filter_matches_nothing() {
    let (app, _dir) = support::test_app().await;

    let (status, outcome) = support::send(
        &app,
        "PUT",
        "/api/widgets?status=ACTIVE",
        Some(json!({"name": "brand-new", "status": "ACTIVE"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(outcome["type"], "UPSERT");
    assert_eq!(outcome["wasInserted"], true);
    assert_eq!(outcome["matched"], 0);
    assert_eq!(outcome["modified"], 1);

    let (status, outcome) = support::send(
        &app,
        "PUT",
        "/api/widgets?status=ACTIVE",
        Some(json!({"name": "replaced", "status": "ACTIVE"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["wasInserted"], false);
    assert_eq!(outcome["matched"], 1);
}

#[tokio::test]
async fn sequence_feed_pages_through_inserted_documents() {
    let (app, _dir) = support::test_app().await;

    for i in 0..3 {
        support::send(&app, "POST", "/api/widgets", Some(json!({"name": format!("w{i}"), "status": "ACTIVE"}))).await;
    }

    let (status, page) = support::send(&app, "GET", "/api/widgets?sequence=0&bulkSize=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert!(page["hasMore"].as_bool().unwrap());
    let next = page["nextSequence"].as_i64().unwrap();

    let (status, page2) = support::send(&app, "GET", &format!("/api/widgets?sequence={next}&bulkSize=2"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page2["data"].as_array().unwrap().len(), 1);
    assert!(!page2["hasMore"].as_bool().unwrap());
}
