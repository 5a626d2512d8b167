// src/auth/mod.rs
//! Registration, login and token-based identity lookup.

pub mod token;
pub mod users;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::StoreError;

pub use token::{bearer_token, Claims, TokenSigner};
pub use users::{JsonUserStore, MemoryUserStore, PublicUser, User, UserStore};

pub const DEFAULT_ROLE: &str = "student";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingFields,
    #[error("User already exists")]
    EmailTaken,
    /// Unknown email and wrong password share this variant.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token is missing")]
    MissingToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token is invalid")]
    InvalidToken,
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenSigner,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenSigner) -> Self {
        Self { users, tokens }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<PublicUser, AuthError> {
        let (email, password) = credentials(req.email, req.password)?;
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let name = req
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            password_hash: off_executor(move || hash_password(&password)).await??,
            email,
            name,
            role: req
                .role
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            created_at: Utc::now(),
        };

        match self.users.insert(user.clone()).await {
            Ok(()) => {}
            // lost a race with a concurrent registration for the same email
            Err(StoreError::Conflict(_)) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.into()),
        }
        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(PublicUser::from(&user))
    }

    /// Returns a signed token and the user's public profile.
    pub async fn login(&self, req: LoginRequest) -> Result<(String, PublicUser), AuthError> {
        let (email, password) = credentials(req.email, req.password)?;
        let found = self.users.find_by_email(&email).await?;
        let verified = match &found {
            Some(u) => {
                let stored = u.password_hash.clone();
                off_executor(move || verify_password(&password, &stored)).await?
            }
            None => false,
        };
        let user = match found {
            Some(u) if verified => u,
            _ => {
                counter!("auth_failures_total", "kind" => "login").increment(1);
                return Err(AuthError::InvalidCredentials);
            }
        };
        let token = self.tokens.issue(&user.email)?;
        info!(user_id = %user.id, "login succeeded");
        Ok((token, PublicUser::from(&user)))
    }

    /// Resolve the user behind an `Authorization` header value.
    pub async fn me(&self, authorization: Option<&str>) -> Result<PublicUser, AuthError> {
        let claims = bearer_token(authorization)
            .and_then(|t| self.tokens.verify(t))
            .inspect_err(|e| {
                counter!("auth_failures_total", "kind" => "token").increment(1);
                warn!(error = %e, "token rejected");
            })?;
        let user = self
            .users
            .find_by_email(&claims.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(PublicUser::from(&user))
    }
}

fn credentials(email: Option<String>, password: Option<String>) -> Result<(String, String), AuthError> {
    let email = email.map(|e| e.trim().to_ascii_lowercase()).unwrap_or_default();
    let password = password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }
    Ok((email, password))
}

/// Argon2 takes tens of milliseconds per call, so it runs on the blocking pool.
async fn off_executor<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Internal(format!("password task failed: {e}")))
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
