use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// The recorder is process-global; every router built in this process shares it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (first call only) and register metric descriptions.
    pub fn init() -> Result<Self, BuildError> {
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())?
            .clone();
        describe_all();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("complaints_submitted_total", "Complaints stored, labelled by domain.");
        describe_counter!("classifications_total", "Successful four-way classifications.");
        describe_counter!(
            "classification_fallback_total",
            "Submissions stored with fallback routing, labelled by failure reason."
        );
        describe_histogram!("classification_duration_ms", "Time to run all four classifiers in milliseconds.");
        describe_counter!(
            "complaint_store_errors_total",
            "Store operations that failed, labelled by operation."
        );
        describe_counter!("auth_failures_total", "Rejected logins and tokens, labelled by kind.");
        describe_gauge!("classifier_models_loaded", "1 when classifier artifacts are loaded, else 0.");
    });
}
