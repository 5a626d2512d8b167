// src/store/memory.rs
//! Process-local backend. Nothing survives a restart; used for tests and demos.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{materialize, ComplaintStore, StoreError};
use crate::complaint::{Complaint, ComplaintDraft, ComplaintPatch, Domain};

pub struct MemoryStore {
    partitions: HashMap<Domain, Mutex<Vec<Complaint>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            partitions: Domain::ALL
                .into_iter()
                .map(|d| (d, Mutex::new(Vec::new())))
                .collect(),
        }
    }

    fn partition(&self, d: Domain) -> &Mutex<Vec<Complaint>> {
        &self.partitions[&d]
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, draft: ComplaintDraft) -> Result<Complaint, StoreError> {
        let domain = draft.domain;
        let complaint = materialize(draft);
        self.partition(domain).lock().await.push(complaint.clone());
        Ok(complaint)
    }

    async fn list(&self, domain: Option<Domain>) -> Result<Vec<Complaint>, StoreError> {
        match domain {
            Some(d) => Ok(self.partition(d).lock().await.clone()),
            None => {
                let mut all = Vec::new();
                for d in Domain::ALL {
                    all.extend(self.partition(d).lock().await.iter().cloned());
                }
                Ok(all)
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Complaint, StoreError> {
        for d in Domain::ALL {
            if let Some(c) = self.partition(d).lock().await.iter().find(|c| c.id == id) {
                return Ok(c.clone());
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, id: &str, patch: ComplaintPatch) -> Result<Complaint, StoreError> {
        for d in Domain::ALL {
            let mut items = self.partition(d).lock().await;
            if let Some(c) = items.iter_mut().find(|c| c.id == id) {
                patch.apply(c);
                return Ok(c.clone());
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        for d in Domain::ALL {
            let mut items = self.partition(d).lock().await;
            if let Some(pos) = items.iter().position(|c| c.id == id) {
                items.remove(pos);
                return Ok(());
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }
}
