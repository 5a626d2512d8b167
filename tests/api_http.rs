// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
// State is memory-backed and the models directory does not exist, so every
// submission takes the fallback routing path.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use complaint_analyzer::api::{self, AppState};
use complaint_analyzer::auth::{MemoryUserStore, TokenSigner};
use complaint_analyzer::classifier::ClassifierProvider;
use complaint_analyzer::complaint::Domain;
use complaint_analyzer::store::{JsonFileStore, MemoryStore};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryUserStore::default()),
        Arc::new(ClassifierProvider::new("/nonexistent/models")),
        TokenSigner::new("test-secret", Duration::hours(1)),
    );
    api::router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    let v = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, v)
}

fn complaint(title: &str, domain: &str) -> Json {
    json!({
        "title": title,
        "description": "The heating in block B has been off for three days",
        "contactInfo": "student@example.edu",
        "domain": domain,
    })
}

#[tokio::test]
async fn health_reports_storage_and_model_state() {
    let app = test_router();
    let (status, v) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["modelsLoaded"], false);
    assert_eq!(v["storage"], "memory");
}

#[tokio::test]
async fn missing_required_field_is_400_and_nothing_is_stored() {
    let app = test_router();
    let mut body = complaint("No heating", "education");
    body.as_object_mut().unwrap().remove("contactInfo");

    let (status, v) = send(&app, "POST", "/api/complaints", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("contactInfo"));

    let (_, list) = send(&app, "GET", "/api/complaints", None).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_json_is_400_with_error_body() {
    let app = test_router();
    let req = Request::builder()
        .method("POST")
        .uri("/api/complaints")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert!(v.get("error").is_some());
}

#[tokio::test]
async fn submit_without_models_falls_back_and_round_trips() {
    let app = test_router();
    let mut body = complaint("No heating", "Education");
    body["priority"] = json!("High");

    let (status, v) = send(&app, "POST", "/api/complaints", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(v["message"], "Complaint submitted successfully");
    let id = v["id"].as_str().expect("id").to_string();

    let stored = &v["complaint"];
    assert_eq!(stored["id"], id.as_str());
    assert_eq!(stored["status"], "pending");
    assert_eq!(stored["domain"], "education");
    assert_eq!(stored["category"], "General");
    assert_eq!(stored["priority"], "High");
    assert_eq!(stored["userType"], "Student");
    assert_eq!(stored["confidence"], 0.0);
    assert!(stored.get("aiAnalysis").is_none());
    assert!(stored["createdAt"].as_str().is_some());

    let (status, got) = send(&app, "GET", &format!("/api/complaints/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(got["success"], true);
    assert_eq!(&got["data"], stored);
}

#[tokio::test]
async fn list_is_scoped_by_domain_query() {
    let app = test_router();
    for (t, d) in [("a", "education"), ("b", "business"), ("c", "retail")] {
        let (status, _) = send(&app, "POST", "/api/complaints", Some(complaint(t, d))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, all) = send(&app, "GET", "/api/complaints", None).await;
    assert_eq!(all["success"], true);
    assert_eq!(all["data"].as_array().unwrap().len(), 3);

    let (_, biz) = send(&app, "GET", "/api/complaints?domain=business", None).await;
    let biz = biz["data"].as_array().unwrap();
    assert_eq!(biz.len(), 1);
    assert_eq!(biz[0]["title"], "b");

    // unknown domains were stored under the default partition
    let (_, other) = send(&app, "GET", "/api/complaints?domain=default", None).await;
    assert_eq!(other["data"][0]["domain"], "default");

    let (_, empty) = send(&app, "GET", "/api/complaints?domain=healthcare", None).await;
    assert_eq!(empty["data"], json!([]));
}

#[tokio::test]
async fn patch_updates_mutable_fields_only() {
    let app = test_router();
    let (_, v) = send(&app, "POST", "/api/complaints", Some(complaint("Leak", "healthcare"))).await;
    let id = v["id"].as_str().unwrap().to_string();
    let created_at = v["complaint"]["createdAt"].clone();

    let patch = json!({
        "status": "resolved",
        "department": "Facilities",
        "id": "hijacked",
        "domain": "business",
        "createdAt": "1999-01-01T00:00:00Z",
    });
    let (status, updated) = send(&app, "PATCH", &format!("/api/complaints/{id}"), Some(patch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "resolved");
    assert_eq!(updated["department"], "Facilities");
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["domain"], "healthcare");
    assert_eq!(updated["createdAt"], created_at);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/complaints/{id}"),
        Some(json!({ "title": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, v) = send(
        &app,
        "PATCH",
        "/api/complaints/does-not-exist",
        Some(json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"], "Complaint not found");
}

#[tokio::test]
async fn delete_removes_once_then_404() {
    let app = test_router();
    let (_, v) = send(&app, "POST", "/api/complaints", Some(complaint("Noise", "business"))).await;
    let uri = format!("/api/complaints/{}", v["id"].as_str().unwrap());

    let (status, body) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Complaint deleted successfully");

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analytics_counts_statuses_and_categories() {
    let app = test_router();
    let mut ids = Vec::new();
    for (cat, d) in [("Hostel", "education"), ("Hostel", "education"), ("Billing", "business")] {
        let mut body = complaint("x", d);
        body["category"] = json!(cat);
        let (_, v) = send(&app, "POST", "/api/complaints", Some(body)).await;
        ids.push(v["id"].as_str().unwrap().to_string());
    }
    send(
        &app,
        "PATCH",
        &format!("/api/complaints/{}", ids[0]),
        Some(json!({ "status": "resolved" })),
    )
    .await;

    let (status, a) = send(&app, "GET", "/api/analytics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        a,
        json!({
            "total": 3,
            "resolvedCount": 1,
            "pendingCount": 2,
            "categoryDistribution": { "Billing": 1, "Hostel": 2 },
        })
    );

    let (_, scoped) = send(&app, "GET", "/api/analytics?domain=education", None).await;
    assert_eq!(scoped["total"], 2);
    assert_eq!(scoped["resolvedCount"], 1);
}

#[tokio::test]
async fn analyze_endpoint_without_models_is_503_and_empty_text_is_400() {
    let app = test_router();
    let (status, v) = send(&app, "POST", "/api/analyze", Some(json!({ "text": "lift is broken" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(v["error"], "Classifier models are not available");

    let (status, _) = send(&app, "POST", "/api/analyze", Some(json!({ "text": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreadable_store_is_500_with_generic_body() {
    let tmp = tempfile::tempdir().unwrap();
    let app = api::router(AppState::new(
        Arc::new(JsonFileStore::open(tmp.path()).unwrap()),
        Arc::new(MemoryUserStore::default()),
        Arc::new(ClassifierProvider::new("/nonexistent/models")),
        TokenSigner::new("test-secret", Duration::hours(1)),
    ));
    let (_, v) = send(&app, "POST", "/api/complaints", Some(complaint("kept", "business"))).await;
    let id = v["id"].as_str().unwrap().to_string();
    std::fs::write(tmp.path().join(Domain::Education.file_name()), "{ broken").unwrap();

    for uri in ["/api/analytics", "/api/analytics?domain=education", "/api/complaints"] {
        let (status, v) = send(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(v, json!({ "error": "Internal server error" }), "{uri}");
    }

    // other partitions stay reachable by id
    let (status, _) = send(&app, "GET", &format!("/api/complaints/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &format!("/api/complaints/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}
