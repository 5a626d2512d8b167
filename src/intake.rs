// src/intake.rs
//! Complaint intake: validate, classify (best effort), persist.

use chrono::Utc;
use metrics::counter;
use tracing::{info, warn};

use crate::analyze::{Analysis, ComplaintAnalyzer};
use crate::complaint::{
    AiAnalysis, Complaint, ComplaintDraft, ComplaintPayload, ValidationError, DEFAULT_USER_TYPE,
};
use crate::store::{SharedStore, StoreError};
use crate::telemetry::anon_hash;

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct IntakeService {
    analyzer: ComplaintAnalyzer,
    store: SharedStore,
}

impl IntakeService {
    pub fn new(analyzer: ComplaintAnalyzer, store: SharedStore) -> Self {
        Self { analyzer, store }
    }

    /// Validate `payload`, classify it and store the result.
    ///
    /// Validation runs before any other work. Classification never blocks
    /// creation: if it fails, caller-supplied routing fields (or defaults)
    /// are used, `confidence` is 0 and no `aiAnalysis` is attached.
    pub async fn submit(&self, payload: ComplaintPayload) -> Result<Complaint, IntakeError> {
        let sub = payload.validate()?;
        let text = sub.analysis_text();

        let (analysis, ai_analysis) = match self.analyzer.analyze(&text) {
            Ok(a) => {
                let ai = AiAnalysis {
                    complaint_type: a.complaint_type.clone(),
                    confidence: a.confidence,
                    analyzed_at: Utc::now(),
                };
                (a, Some(ai))
            }
            Err(e) => {
                warn!(text_id = %anon_hash(&text), error = %e, "classification failed, using fallback");
                counter!("classification_fallback_total", "reason" => e.kind()).increment(1);
                let fb = Analysis::fallback(
                    sub.category.as_deref(),
                    sub.priority.as_deref(),
                    sub.department.as_deref(),
                );
                (fb, None)
            }
        };

        let draft = ComplaintDraft {
            title: sub.title,
            description: sub.description,
            contact_info: sub.contact_info,
            category: analysis.category,
            priority: analysis.priority,
            complaint_type: analysis.complaint_type,
            department: analysis.department,
            user_type: sub.user_type.unwrap_or_else(|| DEFAULT_USER_TYPE.to_string()),
            domain: sub.domain,
            status: None,
            confidence: analysis.confidence,
            ai_analysis,
        };

        let stored = self.store.create(draft).await.inspect_err(|e| {
            e.record("create");
            warn!(error = %e, "failed to persist complaint");
        })?;

        counter!("complaints_submitted_total", "domain" => stored.domain.as_str()).increment(1);
        info!(
            id = %stored.id,
            domain = %stored.domain,
            category = %stored.category,
            priority = %stored.priority,
            classified = stored.ai_analysis.is_some(),
            "complaint submitted"
        );
        Ok(stored)
    }
}
