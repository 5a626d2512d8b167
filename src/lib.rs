// src/lib.rs
// Public library surface for the server binary, the trainer and integration tests.

pub mod analytics;
pub mod analyze;
pub mod api;
pub mod auth;
pub mod classifier;
pub mod complaint;
pub mod config;
pub mod error;
pub mod intake;
pub mod metrics;
pub mod store;
pub mod telemetry;

// `complaint_analyzer::router` as well as `complaint_analyzer::api::router`
pub use crate::api::{create_router, router, AppState};
pub use crate::config::AppConfig;
