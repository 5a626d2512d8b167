// src/analyze.rs
//! Text classification service: runs the four classifiers over a complaint
//! text and derives a confidence score from the category classifier.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::classifier::{ArtifactError, ClassifierProvider};
use crate::complaint::{DEFAULT_CATEGORY, DEFAULT_PRIORITY};
use crate::telemetry::anon_hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub category: String,
    pub priority: String,
    #[serde(rename = "type")]
    pub complaint_type: String,
    pub department: String,
    /// Highest category probability as a percentage, two decimals.
    pub confidence: f64,
}

impl Analysis {
    /// Result used when automated classification cannot run.
    pub fn fallback(category: Option<&str>, priority: Option<&str>, department: Option<&str>) -> Self {
        Self {
            category: category.unwrap_or(DEFAULT_CATEGORY).to_string(),
            priority: priority.unwrap_or(DEFAULT_PRIORITY).to_string(),
            complaint_type: String::new(),
            department: department.unwrap_or_default().to_string(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("complaint text cannot be empty")]
    EmptyInput,
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl AnalysisError {
    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::EmptyInput => "empty_input",
            AnalysisError::Artifact(ArtifactError::DirNotFound(_) | ArtifactError::NotFound { .. }) => {
                "artifact_missing"
            }
            AnalysisError::Artifact(_) => "artifact_unreadable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComplaintAnalyzer {
    provider: Arc<ClassifierProvider>,
}

impl ComplaintAnalyzer {
    pub fn new(provider: Arc<ClassifierProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ClassifierProvider {
        &self.provider
    }

    /// Classify `text`. Empty or whitespace-only input is rejected before any
    /// classifier is touched. No retries: one failure is final for this call.
    pub fn analyze(&self, text: &str) -> Result<Analysis, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let models = self.provider.load()?;
        let started = Instant::now();

        let category = models.category.classify(text);
        let priority = models.priority.classify(text);
        let complaint_type = models.complaint_type.classify(text);
        let department = models.department.classify(text);
        let top = models
            .category
            .score(text)
            .into_iter()
            .map(|(_, p)| p)
            .fold(0.0f64, f64::max);
        let confidence = round2(top * 100.0);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("classification_duration_ms").record(elapsed_ms);
        counter!("classifications_total").increment(1);
        debug!(
            text_id = %anon_hash(text),
            %category,
            %priority,
            %department,
            confidence,
            elapsed_ms,
            "complaint classified"
        );

        Ok(Analysis {
            category,
            priority,
            complaint_type,
            department,
            confidence,
        })
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
