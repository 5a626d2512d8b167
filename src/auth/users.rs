// src/auth/users.rs
//! Credential store. Emails are unique; `insert` checks and appends under one lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::store::file::{read_json_array, write_json_atomic};
use crate::store::StoreError;

pub const USERS_FILE: &str = "users.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    /// Argon2id PHC string; the plaintext is never stored.
    #[serde(rename = "password")]
    pub password_hash: String,
    pub name: String,
    pub role: String,
    #[serde(deserialize_with = "crate::complaint::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// What the API is allowed to show about a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role.clone(),
            created_at: u.created_at,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Fails with [`StoreError::Conflict`] if the email is already registered.
    async fn insert(&self, user: User) -> Result<(), StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;
}

pub struct JsonUserStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonUserStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: data_dir.into().join(USERS_FILE),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl UserStore for JsonUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let _guard = self.lock.lock().await;
        let users: Vec<User> = read_json_array(&self.path).await?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut users: Vec<User> = read_json_array(&self.path).await?;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("User already exists".into()));
        }
        users.push(user);
        write_json_atomic(&self.path, &users).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let users: Vec<User> = read_json_array(&self.path).await?;
        Ok(users.len())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("User already exists".into()));
        }
        users.push(user);
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.users.lock().await.len())
    }
}
