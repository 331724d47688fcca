//! Create a document, then read it back both unfiltered and through the
//! `status` filter field the fixture endpoint allows (spec §8 "create
//! then read returns the same document").

mod support;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn create_then_read_round_trips_the_document() {
    let (app, _dir) = support::test_app().await;

    let (status, created) = support::send(&app, "POST", "/api/widgets", Some(json!({"name": "gizmo", "status": "ACTIVE"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["type"], "CREATE");
    assert_eq!(created["affectedCount"], 1);

    let (status, listed) = support::send(&app, "GET", "/api/widgets", None).await;
    assert_eq!(status, StatusCode::OK);
    let docs = listed.as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["name"], "gizmo");
    assert_eq!(docs[0]["version"], 0);
    assert_eq!(docs[0]["isDeleted"], false);

    let (status, filtered) = support::send(&app, "GET", "/api/widgets?status=ACTIVE", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let (status, none) = support::send(&app, "GET", "/api/widgets?status=CLOSED", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(none.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn create_rejects_a_body_missing_the_schema_required_field() {
    let (app, _dir) = support::test_app().await;

    let (status, body) = support::send(&app, "POST", "/api/widgets", Some(json!({"status": "ACTIVE"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_array().unwrap().iter().any(|d| d.as_str().unwrap().contains("name")));
}

#[tokio::test]
async fn post_as_complex_filter_read_sources_its_filter_from_the_body() {
    let (app, _dir) = support::test_app().await;
    support::send(&app, "POST", "/api/widgets", Some(json!({"name": "a", "status": "ACTIVE"}))).await;
    support::send(&app, "POST", "/api/widgets", Some(json!({"name": "b", "status": "CLOSED"}))).await;

    let (status, matched) = support::send(
        &app,
        "POST",
        "/api/widgets/search",
        Some(json!({"status": {"in": ["ACTIVE"]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let docs = matched.as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["name"], "a");
}
