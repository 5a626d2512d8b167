// src/analytics.rs
//! Status counts and category distribution over the complaint set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::complaint::{Complaint, Domain, STATUS_PENDING, STATUS_RESOLVED};
use crate::store::{ComplaintStore, StoreError};

pub const UNCATEGORIZED: &str = "Other";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total: usize,
    pub resolved_count: usize,
    pub pending_count: usize,
    pub category_distribution: BTreeMap<String, usize>,
}

/// Pure aggregation. Statuses other than pending/resolved only count toward `total`.
pub fn aggregate(complaints: &[Complaint]) -> Analytics {
    let mut out = Analytics {
        total: complaints.len(),
        ..Analytics::default()
    };
    for c in complaints {
        match c.status.as_str() {
            STATUS_RESOLVED => out.resolved_count += 1,
            STATUS_PENDING => out.pending_count += 1,
            _ => {}
        }
        let category = match c.category.trim() {
            "" => UNCATEGORIZED,
            other => other,
        };
        *out.category_distribution.entry(category.to_string()).or_insert(0) += 1;
    }
    out
}

/// Aggregate over one partition or the whole store. Read failures are
/// returned as-is; there is no partial result.
pub async fn compute(store: &dyn ComplaintStore, domain: Option<Domain>) -> Result<Analytics, StoreError> {
    let complaints = store.list(domain).await?;
    Ok(aggregate(&complaints))
}
