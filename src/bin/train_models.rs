//! Offline trainer: `train-models <dataset.json> [models_dir]`.
//!
//! Reads a JSON array of `{complaintText, category, priority, type, department}`
//! rows and writes `<task>_model.json` for all four tasks. `models_dir` falls back
//! to the configured one (`COMPLAINTS_MODELS_DIR` / `config/app.toml`).

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use complaint_analyzer::classifier::train::{train_all, TrainingSample};
use complaint_analyzer::{telemetry, AppConfig};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(dataset) = args.next().map(PathBuf::from) else {
        bail!("usage: train-models <dataset.json> [models_dir]");
    };
    let models_dir = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => AppConfig::load()?.models_dir,
    };

    let raw = std::fs::read_to_string(&dataset).with_context(|| format!("reading {}", dataset.display()))?;
    let samples: Vec<TrainingSample> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", dataset.display()))?;

    let used = train_all(&samples, &models_dir)?;
    info!(
        dataset = %dataset.display(),
        models_dir = %models_dir.display(),
        rows = samples.len(),
        used,
        "classifier artifacts written"
    );
    Ok(())
}
