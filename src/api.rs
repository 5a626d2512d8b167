use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shuttle_axum::axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::analytics::{self, Analytics};
use crate::analyze::{Analysis, ComplaintAnalyzer};
use crate::auth::{
    AuthService, JsonUserStore, LoginRequest, MemoryUserStore, PublicUser, RegisterRequest, TokenSigner,
    UserStore,
};
use crate::classifier::ClassifierProvider;
use crate::complaint::{Complaint, ComplaintPatch, ComplaintPayload, Domain};
use crate::config::{AppConfig, StorageBackend};
use crate::error::ApiResult;
use crate::intake::IntakeService;
use crate::metrics::Metrics;
use crate::store::{JsonFileStore, MemoryStore, SharedStore};

#[derive(Clone)]
pub struct AppState {
    pub intake: IntakeService,
    pub store: SharedStore,
    pub analyzer: ComplaintAnalyzer,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        users: Arc<dyn UserStore>,
        provider: Arc<ClassifierProvider>,
        tokens: TokenSigner,
    ) -> Self {
        let analyzer = ComplaintAnalyzer::new(provider);
        Self {
            intake: IntakeService::new(analyzer.clone(), store.clone()),
            store,
            analyzer,
            auth: AuthService::new(users, tokens),
        }
    }

    /// Wire the configured backends. Classifier artifacts are not read here.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let (store, users): (SharedStore, Arc<dyn UserStore>) = match cfg.storage {
            StorageBackend::File => {
                let store = JsonFileStore::open(&cfg.data_dir)
                    .with_context(|| format!("opening complaint store in {}", cfg.data_dir.display()))?;
                (Arc::new(store), Arc::new(JsonUserStore::new(&cfg.data_dir)))
            }
            StorageBackend::Memory => (Arc::new(MemoryStore::new()), Arc::new(MemoryUserStore::default())),
        };
        let provider = Arc::new(ClassifierProvider::new(&cfg.models_dir));
        let tokens = TokenSigner::new(&cfg.secret_key, Duration::hours(cfg.token_ttl_hours));
        info!(
            storage = store.backend(),
            data_dir = %cfg.data_dir.display(),
            models_dir = %cfg.models_dir.display(),
            "application state ready"
        );
        Ok(Self::new(store, users, provider, tokens))
    }
}

/// Routes with permissive CORS and no `/metrics`.
pub fn router(state: AppState) -> Router {
    routes().layer(CorsLayer::very_permissive()).with_state(state)
}

/// Full application router as configured: CORS policy and optional `/metrics`.
pub fn create_router(state: AppState, cfg: &AppConfig) -> anyhow::Result<Router> {
    let mut app = routes().layer(cors_layer(&cfg.allowed_origins)?).with_state(state);
    if cfg.metrics_enabled {
        let metrics = Metrics::init().context("installing prometheus recorder")?;
        app = app.merge(metrics.router());
    }
    Ok(app)
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/complaints", post(create_complaint).get(list_complaints))
        .route(
            "/api/complaints/{id}",
            get(get_complaint).patch(update_complaint).delete(delete_complaint),
        )
        .route("/api/analytics", get(get_analytics))
        .route("/api/analyze", post(analyze_text))
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::very_permissive());
    }
    let origins = allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin `{o}`")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any))
}

#[derive(Deserialize)]
struct DomainQuery {
    #[serde(default)]
    domain: Option<String>,
}

impl DomainQuery {
    /// Blank means unscoped; anything else resolves like a submission's domain.
    fn scope(&self) -> Option<Domain> {
        self.domain
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| Domain::resolve(Some(d)))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthOut {
    status: &'static str,
    models_loaded: bool,
    storage: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthOut> {
    let models_loaded = state.analyzer.provider().is_loaded();
    metrics::gauge!("classifier_models_loaded").set(if models_loaded { 1.0 } else { 0.0 });
    Json(HealthOut {
        status: "healthy",
        models_loaded,
        storage: state.store.backend(),
    })
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(req) = body?;
    let user = state.auth.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user": user })),
    ))
}

#[derive(Serialize)]
struct LoginOut {
    token: String,
    user: PublicUser,
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginOut>> {
    let Json(req) = body?;
    let (token, user) = state.auth.login(req).await?;
    Ok(Json(LoginOut { token, user }))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<PublicUser>> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    Ok(Json(state.auth.me(authorization).await?))
}

#[derive(Serialize)]
struct SubmitOut {
    message: &'static str,
    id: String,
    complaint: Complaint,
}

async fn create_complaint(
    State(state): State<AppState>,
    body: Result<Json<ComplaintPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitOut>)> {
    let Json(payload) = body?;
    let complaint = state.intake.submit(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitOut {
            message: "Complaint submitted successfully",
            id: complaint.id.clone(),
            complaint,
        }),
    ))
}

#[derive(Serialize)]
struct DataOut<T> {
    success: bool,
    data: T,
}

async fn list_complaints(
    State(state): State<AppState>,
    query: Result<Query<DomainQuery>, QueryRejection>,
) -> ApiResult<Json<DataOut<Vec<Complaint>>>> {
    let Query(q) = query?;
    let data = state.store.list(q.scope()).await.inspect_err(|e| e.record("list"))?;
    Ok(Json(DataOut { success: true, data }))
}

async fn get_complaint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DataOut<Complaint>>> {
    let data = state.store.get_by_id(&id).await.inspect_err(|e| e.record("get"))?;
    Ok(Json(DataOut { success: true, data }))
}

async fn update_complaint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ComplaintPatch>, JsonRejection>,
) -> ApiResult<Json<Complaint>> {
    let Json(patch) = body?;
    patch.validate()?;
    let updated = state.store.update(&id, patch).await.inspect_err(|e| e.record("update"))?;
    info!(%id, status = %updated.status, "complaint updated");
    Ok(Json(updated))
}

async fn delete_complaint(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.store.delete(&id).await.inspect_err(|e| e.record("delete"))?;
    info!(%id, "complaint deleted");
    Ok(Json(json!({ "message": "Complaint deleted successfully" })))
}

async fn get_analytics(
    State(state): State<AppState>,
    query: Result<Query<DomainQuery>, QueryRejection>,
) -> ApiResult<Json<Analytics>> {
    let Query(q) = query?;
    let summary = analytics::compute(state.store.as_ref(), q.scope())
        .await
        .inspect_err(|e| e.record("analytics"))?;
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    text: String,
}

async fn analyze_text(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeReq>, JsonRejection>,
) -> ApiResult<Json<Analysis>> {
    let Json(req) = body?;
    Ok(Json(state.analyzer.analyze(&req.text)?))
}
