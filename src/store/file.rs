// src/store/file.rs
//! JSON-file backend: one array file per partition under a data directory.
//! Writes go to a sibling `.tmp` file and are renamed into place, so a reader
//! never observes a half-written collection and a failed write leaves the
//! previous file intact.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{materialize, ComplaintStore, StoreError};
use crate::complaint::{Complaint, ComplaintDraft, ComplaintPatch, Domain};

pub struct JsonFileStore {
    dir: PathBuf,
    locks: HashMap<Domain, Mutex<()>>,
}

impl JsonFileStore {
    /// Create the data directory and any missing partition files.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        for d in Domain::ALL {
            let path = dir.join(d.file_name());
            if !path.exists() {
                std::fs::write(&path, b"[]").map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        info!(dir = %dir.display(), "json file store ready");
        Ok(Self {
            dir,
            locks: Domain::ALL.into_iter().map(|d| (d, Mutex::new(()))).collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, d: Domain) -> PathBuf {
        self.dir.join(d.file_name())
    }

    fn lock_for(&self, d: Domain) -> &Mutex<()> {
        // Every variant is inserted in `open`.
        &self.locks[&d]
    }

    async fn read_partition(&self, d: Domain) -> Result<Vec<Complaint>, StoreError> {
        let _guard = self.lock_for(d).lock().await;
        load_partition(&self.path_for(d), d).await
    }

    /// Run `f` on one partition under its lock. `f` returns `None` when it
    /// made no change, in which case nothing is written.
    async fn mutate<T>(
        &self,
        d: Domain,
        f: impl FnOnce(&mut Vec<Complaint>) -> Option<T> + Send,
    ) -> Result<Option<T>, StoreError>
    where
        T: Send,
    {
        let _guard = self.lock_for(d).lock().await;
        let path = self.path_for(d);
        let mut items = load_partition(&path, d).await?;
        match f(&mut items) {
            Some(out) => {
                write_json_atomic(&path, &items).await?;
                Ok(Some(out))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ComplaintStore for JsonFileStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn create(&self, draft: ComplaintDraft) -> Result<Complaint, StoreError> {
        let domain = draft.domain;
        let complaint = materialize(draft);
        let stored = complaint.clone();
        self.mutate(domain, move |items| {
            items.push(complaint);
            Some(())
        })
        .await?;
        debug!(id = %stored.id, %domain, "complaint persisted");
        Ok(stored)
    }

    async fn list(&self, domain: Option<Domain>) -> Result<Vec<Complaint>, StoreError> {
        match domain {
            Some(d) => self.read_partition(d).await,
            None => {
                let mut all = Vec::new();
                for d in Domain::ALL {
                    all.extend(self.read_partition(d).await?);
                }
                Ok(all)
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Complaint, StoreError> {
        let mut unreadable = None;
        for d in Domain::ALL {
            match self.read_partition(d).await {
                Ok(items) => {
                    if let Some(c) = items.into_iter().find(|c| c.id == id) {
                        return Ok(c);
                    }
                }
                Err(e) => skip_partition(d, e, &mut unreadable),
            }
        }
        Err(unreadable.unwrap_or_else(|| StoreError::NotFound(id.to_string())))
    }

    async fn update(&self, id: &str, patch: ComplaintPatch) -> Result<Complaint, StoreError> {
        let mut patch = Some(patch);
        let mut unreadable = None;
        for d in Domain::ALL {
            let hit = self
                .mutate(d, |items| {
                    let c = items.iter_mut().find(|c| c.id == id)?;
                    patch.take()?.apply(c);
                    Some(c.clone())
                })
                .await;
            match hit {
                Ok(Some(c)) => return Ok(c),
                Ok(None) => {}
                Err(e) => skip_partition(d, e, &mut unreadable),
            }
        }
        Err(unreadable.unwrap_or_else(|| StoreError::NotFound(id.to_string())))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut unreadable = None;
        for d in Domain::ALL {
            let hit = self
                .mutate(d, |items| {
                    let pos = items.iter().position(|c| c.id == id)?;
                    items.remove(pos);
                    Some(())
                })
                .await;
            match hit {
                Ok(Some(())) => {
                    debug!(%id, domain = %d, "complaint deleted");
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => skip_partition(d, e, &mut unreadable),
            }
        }
        Err(unreadable.unwrap_or_else(|| StoreError::NotFound(id.to_string())))
    }
}

/// Id lookups keep searching past a partition that cannot be read. The first
/// such error is returned if the id is found nowhere else, since the record
/// may be in the partition that failed.
fn skip_partition(d: Domain, e: StoreError, first: &mut Option<StoreError>) {
    warn!(domain = %d, error = %e, "skipping unreadable partition");
    first.get_or_insert(e);
}

/// A record belongs to the partition file it was read from, whatever its
/// `domain` field says (or whether it has one at all).
async fn load_partition(path: &Path, d: Domain) -> Result<Vec<Complaint>, StoreError> {
    let mut items: Vec<Complaint> = read_json_array(path).await?;
    for c in &mut items {
        c.domain = d;
    }
    Ok(items)
}

/// Read a JSON array file; a missing file is an empty collection.
pub(crate) async fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace `path` with `value` pretty-printed, via temp file + rename.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
