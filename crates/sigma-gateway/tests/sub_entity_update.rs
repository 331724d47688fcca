//! Sub-entity arrays get `myId`s assigned on create and are patched by
//! operation entries on update, never overwritten wholesale (spec §4.9
//! step 3 "Sub-entity orchestration").

mod support;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn create_assigns_my_ids_and_update_patches_by_my_id() {
    let (app, _dir) = support::test_app().await;

    let (status, created) = support::send(
        &app,
        "POST",
        "/api/widgets",
        Some(json!({"name": "kit", "status": "ACTIVE", "items": [{"qty": 1}, {"qty": 2}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["insertedIds"][0].as_str().unwrap().to_string();

    let (_, docs) = support::send(&app, "GET", &format!("/api/widgets?_id={id}"), None).await;
    let items = docs.as_array().unwrap()[0]["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 2);
    let first_my_id = items[0]["myId"].as_str().unwrap().to_string();
    assert_eq!(items[0]["isDeleted"], false);

    let (status, outcome) = support::send(
        &app,
        "PATCH",
        &format!("/api/widgets?_id={id}"),
        Some(json!({"updates": {"items": [{"myId": first_my_id, "qty": 9}]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["modified"], 1);

    let (_, docs) = support::send(&app, "GET", &format!("/api/widgets?_id={id}"), None).await;
    let items = docs.as_array().unwrap()[0]["items"].as_array().unwrap().clone();
    let patched = items.iter().find(|i| i["myId"].as_str() == Some(first_my_id.as_str())).unwrap();
    assert_eq!(patched["qty"], 9);
}

#[tokio::test]
async fn create_rejects_is_delete_flag_on_a_sub_entity_entry() {
    let (app, _dir) = support::test_app().await;

    let (status, body) = support::send(
        &app,
        "POST",
        "/api/widgets",
        Some(json!({"name": "kit", "status": "ACTIVE", "items": [{"isDelete": true}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["details"].as_array().unwrap().is_empty());
}
