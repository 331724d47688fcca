//! A `PATCH` whose merged document is identical to the stored one is
//! matched but not modified, and reports `message: "no changes
//! detected"` (spec §4.9 "no-op detection").

mod support;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn patch_with_identical_values_matches_but_does_not_modify() {
    let (app, _dir) = support::test_app().await;

    let (_, created) = support::send(&app, "POST", "/api/widgets", Some(json!({"name": "gizmo", "status": "ACTIVE"}))).await;
    let id = created["insertedIds"][0].as_str().unwrap().to_string();

    let (status, outcome) = support::send(
        &app,
        "PATCH",
        &format!("/api/widgets?_id={id}"),
        Some(json!({"updates": {"status": "ACTIVE"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["matched"], 1);
    assert_eq!(outcome["modified"], 0);
    assert_eq!(outcome["message"], "no changes detected");

    let (status, outcome) = support::send(
        &app,
        "PATCH",
        &format!("/api/widgets?_id={id}"),
        Some(json!({"updates": {"status": "CLOSED"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["matched"], 1);
    assert_eq!(outcome["modified"], 1);
    assert!(outcome["message"].is_null());
}
