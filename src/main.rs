//! Complaint intake service: binary entrypoint.
//! Loads configuration, wires stores and classifiers, and hands the router to Shuttle.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};

use complaint_analyzer::{create_router, telemetry, AppConfig, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    if cfg.uses_default_secret() {
        warn!("COMPLAINTS_SECRET_KEY is not set; tokens are signed with the built-in development key");
    }

    let state = AppState::from_config(&cfg)?;

    // Warm the classifiers; a failure here only means submissions use fallback routing until
    // the artifacts appear.
    match state.analyzer.provider().load() {
        Ok(_) => info!(models_dir = %cfg.models_dir.display(), "classifier models loaded"),
        Err(e) => warn!(error = %e, "starting without classifier models"),
    }

    let router = create_router(state, &cfg)?;
    Ok(router.into())
}
