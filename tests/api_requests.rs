//! Additional integration tests for user registration and operational routes.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use mavsmart_api::api::create_router;
use mavsmart_api::app::{AppState, ServiceSettings};
use mavsmart_api::domain::{CallerIdentity, User};
use mavsmart_api::test_utils::{
    MockCredentialVerifier, MockItemRepository, MockObjectStorage, MockUserRepository,
};

fn create_test_state() -> Arc<AppState> {
    let verifier = MockCredentialVerifier::new();
    verifier.insert(
        "firebase-id-token",
        CallerIdentity::new("uid-jordan").with_email("jordan@mavs.uta.edu"),
    );
    Arc::new(AppState::new(
        Arc::new(MockItemRepository::new()),
        Arc::new(MockUserRepository::new()),
        Arc::new(MockObjectStorage::new()),
        Arc::new(verifier),
    ))
}

fn post_user(token: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/users")
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn jordan() -> serde_json::Value {
    json!({
        "name": "Jordan Lee",
        "email": "Jordan@mavs.uta.edu",
        "phoneNumber": "817-555-0142"
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_full_user_registration_flow() {
    let router = create_router(create_test_state());

    // 1. POST - Register the caller
    let response = router
        .clone()
        .oneshot(post_user("firebase-id-token", jordan()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let user: User = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(user.uid, "uid-jordan");
    assert_eq!(user.email, "jordan@mavs.uta.edu");

    // 2. GET - Retrieve the profile by uid
    let request = Request::builder()
        .uri("/users/uid-jordan")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 3. GET - The profile shows up in the list
    let request = Request::builder().uri("/users").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let users: Vec<User> = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(users.len(), 1);

    // 4. POST again - Duplicate registration conflicts
    let response = router
        .oneshot(post_user("firebase-id-token", jordan()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_for_another_uid_is_forbidden() {
    let router = create_router(create_test_state());
    let mut payload = jordan();
    payload["uid"] = json!("someone-else");

    let response = router
        .oneshot(post_user("firebase-id-token", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_rejects_outside_email_domain() {
    let router = create_router(create_test_state());
    let payload = json!({
        "name": "Jordan Lee",
        "email": "jordan@gmail.com",
        "phoneNumber": "817-555-0142"
    });

    let response = router
        .oneshot(post_user("firebase-id-token", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_EMAIL_DOMAIN");
}

#[tokio::test]
async fn test_register_honors_configured_domain() {
    let settings = ServiceSettings {
        email_domain: "example.edu".to_string(),
        ..ServiceSettings::default()
    };
    let state = AppState::with_settings(
        Arc::new(MockItemRepository::new()),
        Arc::new(MockUserRepository::new()),
        Arc::new(MockObjectStorage::new()),
        Arc::new(MockCredentialVerifier::new()),
        settings,
    );
    let router = create_router(Arc::new(state));
    let payload = json!({
        "name": "Sam",
        "email": "sam@example.edu",
        "phoneNumber": "5551234567"
    });

    let response = router
        .oneshot(post_user(&MockCredentialVerifier::token_for("u-sam"), payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_register_malformed_json() {
    let router = create_router(create_test_state());
    let request = Request::builder()
        .method("POST")
        .uri("/users")
        .header("Content-Type", "application/json")
        .header("Authorization", "Bearer firebase-id-token")
        .body(Body::from("{\"name\": "))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "MALFORMED_REQUEST");
}

#[tokio::test]
async fn test_register_requires_token() {
    let router = create_router(create_test_state());
    let request = Request::builder()
        .method("POST")
        .uri("/users")
        .header("Content-Type", "application/json")
        .body(Body::from(jordan().to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "authentication_error");
}

#[tokio::test]
async fn test_get_unknown_user() {
    let router = create_router(create_test_state());
    let request = Request::builder()
        .uri("/users/nobody")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_reflects_database_health() {
    let items = Arc::new(MockItemRepository::new());
    items.set_healthy(false);
    let state = AppState::new(
        items,
        Arc::new(MockUserRepository::new()),
        Arc::new(MockObjectStorage::new()),
        Arc::new(MockCredentialVerifier::new()),
    );
    let router = create_router(Arc::new(state));

    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let request = Request::builder()
        .uri("/health/live")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
