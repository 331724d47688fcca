//! Unknown filter fields/operators are rejected with every offending
//! entry reported at once (spec §4.5 "Validate", §8 property 6
//! "exhaustiveness").

mod support;

use axum::http::StatusCode;

#[tokio::test]
async fn unconfigured_field_is_rejected_with_a_400() {
    let (app, _dir) = support::test_app().await;

    let (status, body) = support::send(&app, "GET", "/api/widgets?price[gt]=10", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["details"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn id_equality_is_always_allowed_even_though_it_is_not_in_the_allowlist() {
    let (app, _dir) = support::test_app().await;
    let (status, _) = support::send(&app, "GET", "/api/widgets?_id=1", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_path_is_404_known_path_wrong_method_is_405() {
    let (app, _dir) = support::test_app().await;

    let (status, _) = support::send(&app, "GET", "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // "widgets-search" only routes POST; GET on the same path is a
    // wrong-method 405, not a 404.
    let (status, _) = support::send(&app, "GET", "/api/widgets/search", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
