// src/store/mod.rs
//! Complaint store contract and its backends.
//!
//! Every backend keeps one collection per [`Domain`] partition and serialises
//! read-modify-write cycles per partition, so concurrent creates never lose
//! each other's records.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

use crate::complaint::{Complaint, ComplaintDraft, ComplaintPatch, Domain};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("complaint {0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} does not contain a valid JSON collection: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Count a backend failure under `complaint_store_errors_total{op}`.
    /// Missing records and conflicts are caller outcomes and are not counted.
    pub fn record(&self, op: &'static str) {
        if matches!(self, StoreError::Io { .. } | StoreError::Corrupt { .. }) {
            metrics::counter!("complaint_store_errors_total", "op" => op).increment(1);
        }
    }
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Short backend name for diagnostics.
    fn backend(&self) -> &'static str;

    /// Persist a new complaint in `draft.domain`'s partition, assigning
    /// `id` and `createdAt`. On failure the previous partition state is kept.
    async fn create(&self, draft: ComplaintDraft) -> Result<Complaint, StoreError>;

    /// One partition in stored order, or every partition in [`Domain::ALL`] order.
    async fn list(&self, domain: Option<Domain>) -> Result<Vec<Complaint>, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Complaint, StoreError>;

    /// Merge `patch` into the stored record. Immutable fields cannot be expressed in a patch.
    async fn update(&self, id: &str, patch: ComplaintPatch) -> Result<Complaint, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn ComplaintStore>;

/// Assign the store-owned fields of a new record.
pub(crate) fn materialize(draft: ComplaintDraft) -> Complaint {
    draft.into_complaint(uuid::Uuid::new_v4().to_string(), Utc::now())
}
