// src/config.rs
//! Application configuration: TOML file, then environment overrides.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";
pub const DEFAULT_SECRET_KEY: &str = "your-secret-key";

pub const ENV_CONFIG_PATH: &str = "COMPLAINTS_CONFIG_PATH";
pub const ENV_DATA_DIR: &str = "COMPLAINTS_DATA_DIR";
pub const ENV_MODELS_DIR: &str = "COMPLAINTS_MODELS_DIR";
pub const ENV_STORAGE: &str = "COMPLAINTS_STORAGE";
pub const ENV_SECRET_KEY: &str = "COMPLAINTS_SECRET_KEY";
pub const ENV_TOKEN_TTL_HOURS: &str = "COMPLAINTS_TOKEN_TTL_HOURS";
pub const ENV_ALLOWED_ORIGINS: &str = "COMPLAINTS_ALLOWED_ORIGINS";
pub const ENV_METRICS: &str = "COMPLAINTS_METRICS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(anyhow!("unsupported storage backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Partition files and `users.json` live here.
    pub data_dir: PathBuf,
    /// `<task>_model.json` classifier artifacts live here.
    pub models_dir: PathBuf,
    pub storage: StorageBackend,
    pub secret_key: String,
    pub token_ttl_hours: i64,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub metrics_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            storage: StorageBackend::File,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            token_ttl_hours: 24,
            allowed_origins: Vec::new(),
            metrics_enabled: true,
        }
    }
}

impl AppConfig {
    /// `$COMPLAINTS_CONFIG_PATH` (or `config/app.toml`), then env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Parse a TOML file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s).with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_MODELS_DIR) {
            self.models_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_STORAGE) {
            self.storage = v.parse()?;
        }
        if let Some(v) = get(ENV_SECRET_KEY) {
            self.secret_key = v;
        }
        if let Some(v) = get(ENV_TOKEN_TTL_HOURS) {
            self.token_ttl_hours = v
                .parse()
                .with_context(|| format!("{ENV_TOKEN_TTL_HOURS} must be an integer, got `{v}`"))?;
        }
        if let Some(v) = get(ENV_ALLOWED_ORIGINS) {
            self.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get(ENV_METRICS) {
            self.metrics_enabled = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes");
        }
        self.validate()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    fn validate(&self) -> Result<()> {
        if self.token_ttl_hours <= 0 {
            return Err(anyhow!("token_ttl_hours must be positive, got {}", self.token_ttl_hours));
        }
        if self.secret_key.is_empty() {
            return Err(anyhow!("secret_key must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/complaints"
            storage = "memory"
            allowed_origins = ["http://localhost:3000"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/complaints"));
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert_eq!(cfg.models_dir, PathBuf::from("models"));
        assert_eq!(cfg.token_ttl_hours, 24);
        assert!(cfg.uses_default_secret());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(AppConfig::from_toml_str("token_ttl_hours = 0").is_err());
        assert!(AppConfig::from_toml_str("storage = \"mongo\"").is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_STORAGE, "Memory"),
            (ENV_SECRET_KEY, "s3cr3t"),
            (ENV_TOKEN_TTL_HOURS, "2"),
            (ENV_ALLOWED_ORIGINS, "http://a.test, ,http://b.test"),
            (ENV_METRICS, "0"),
            (ENV_MODELS_DIR, "  "),
        ]);
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert_eq!(cfg.secret_key, "s3cr3t");
        assert_eq!(cfg.token_ttl_hours, 2);
        assert_eq!(cfg.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert!(!cfg.metrics_enabled);
        assert_eq!(cfg.models_dir, PathBuf::from("models"));
    }

    #[test]
    fn malformed_ttl_override_errors() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_overrides(|k| (k == ENV_TOKEN_TTL_HOURS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TOKEN_TTL_HOURS));
    }

    #[serial_test::serial]
    #[test]
    fn load_reads_file_named_by_env() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("app.toml");
        fs::write(&p, "models_dir = \"/opt/models\"\n").unwrap();
        std::env::set_var(ENV_CONFIG_PATH, &p);
        std::env::remove_var(ENV_MODELS_DIR);
        let cfg = AppConfig::load().unwrap();
        std::env::remove_var(ENV_CONFIG_PATH);
        assert_eq!(cfg.models_dir, PathBuf::from("/opt/models"));

        let missing = AppConfig::load_from(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(missing.data_dir, PathBuf::from("data"));
    }
}
