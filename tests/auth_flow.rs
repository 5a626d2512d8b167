// tests/auth_flow.rs
//
// Register / login / me over HTTP, with the user store kept in scope so the
// tests can check what was (not) persisted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _;

use complaint_analyzer::api::{self, AppState};
use complaint_analyzer::auth::{JsonUserStore, MemoryUserStore, TokenSigner, UserStore};
use complaint_analyzer::classifier::ClassifierProvider;
use complaint_analyzer::store::MemoryStore;

const SECRET: &str = "auth-flow-secret";

fn app_with(users: Arc<dyn UserStore>) -> Router {
    api::router(AppState::new(
        Arc::new(MemoryStore::new()),
        users,
        Arc::new(ClassifierProvider::new("/nonexistent/models")),
        TokenSigner::new(SECRET, Duration::hours(24)),
    ))
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 64 * 1024).await.expect("body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn me(auth: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri("/api/auth/me");
    if let Some(a) = auth {
        b = b.header("authorization", a);
    }
    b.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn register_login_me_happy_path() {
    let app = app_with(Arc::new(MemoryUserStore::default()));

    let (status, v) = call(
        &app,
        post(
            "/api/auth/register",
            json!({ "email": "Ana@Campus.edu", "password": "pw-123", "name": "Ana", "role": "staff" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(v["message"], "User registered successfully");
    assert_eq!(v["user"]["email"], "ana@campus.edu");
    assert_eq!(v["user"]["role"], "staff");
    assert!(v["user"].get("password").is_none());

    let (status, v) = call(
        &app,
        post("/api/auth/login", json!({ "email": "ana@campus.edu", "password": "pw-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = v["token"].as_str().expect("token").to_string();
    assert_eq!(v["user"]["name"], "Ana");

    let (status, user) = call(&app, me(Some(&format!("Bearer {token}")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "ana@campus.edu");
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn duplicate_registration_is_400_and_count_unchanged() {
    let users = Arc::new(MemoryUserStore::default());
    let app = app_with(users.clone());
    let body = json!({ "email": "dup@x.io", "password": "one" });

    let (status, _) = call(&app, post("/api/auth/register", body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(users.count().await.unwrap(), 1);

    let (status, v) = call(&app, post("/api/auth/register", json!({ "email": "DUP@x.io", "password": "two" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "User already exists");
    assert_eq!(users.count().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_fields_are_400() {
    let app = app_with(Arc::new(MemoryUserStore::default()));
    let (status, _) = call(&app, post("/api/auth/register", json!({ "email": "a@b.io" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, post("/api/auth/login", json!({ "password": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable_401s() {
    let app = app_with(Arc::new(MemoryUserStore::default()));
    call(&app, post("/api/auth/register", json!({ "email": "u@x.io", "password": "right" }))).await;

    let (s1, wrong) = call(&app, post("/api/auth/login", json!({ "email": "u@x.io", "password": "wrong" }))).await;
    let (s2, ghost) = call(&app, post("/api/auth/login", json!({ "email": "ghost@x.io", "password": "right" }))).await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, ghost);
    assert!(wrong.get("token").is_none());
    assert_eq!(wrong["error"], "Invalid credentials");
}

#[tokio::test]
async fn me_rejects_missing_expired_and_forged_tokens() {
    let app = app_with(Arc::new(MemoryUserStore::default()));
    call(&app, post("/api/auth/register", json!({ "email": "t@x.io", "password": "pw" }))).await;

    let (status, _) = call(&app, me(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = TokenSigner::new(SECRET, Duration::hours(1))
        .issue_at("t@x.io", Utc::now() - Duration::days(1))
        .unwrap();
    let (status, v) = call(&app, me(Some(&format!("Bearer {expired}")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(v["error"], "Token has expired");

    let forged = TokenSigner::new("someone-else", Duration::hours(1)).issue("t@x.io").unwrap();
    let (status, _) = call(&app, me(Some(&format!("Bearer {forged}")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let orphan = TokenSigner::new(SECRET, Duration::hours(1)).issue("gone@x.io").unwrap();
    let (status, _) = call(&app, me(Some(&format!("Bearer {orphan}")))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_user_store_survives_a_new_router() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app_with(Arc::new(JsonUserStore::new(tmp.path())));
    let (status, _) = call(&app, post("/api/auth/register", json!({ "email": "p@x.io", "password": "pw" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let reopened = app_with(Arc::new(JsonUserStore::new(tmp.path())));
    let (status, v) = call(&reopened, post("/api/auth/login", json!({ "email": "p@x.io", "password": "pw" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["token"].as_str().is_some());

    let raw = std::fs::read_to_string(tmp.path().join("users.json")).unwrap();
    assert!(!raw.contains("\"pw\""));
}
