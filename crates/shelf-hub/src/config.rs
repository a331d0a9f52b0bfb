//! # Hub Configuration
//!
//! Layered: built-in defaults, then `shelf-hub.toml`, then CLI flags, then the
//! `SHELF_*` environment variables.

use serde::Deserialize;
use shelf_store::index::{IndexOptions, DEFAULT_PLACEHOLDER_BRAND};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SECRET_KEY: &str = "shelf-development-secret-change-me";

pub const ENV_SECRET_KEY: &str = "SHELF_SECRET_KEY";
pub const ENV_CSV_PATH: &str = "SHELF_CSV_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    /// Brand values that stand for "no brand" and are left out of listings.
    #[serde(default = "default_placeholder_brands")]
    pub placeholder_brands: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            placeholder_brands: default_placeholder_brands(),
        }
    }
}

impl DataConfig {
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            placeholder_brands: self.placeholder_brands.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: i64,
    #[serde(default = "default_clients")]
    pub clients: Vec<ClientCredentials>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            issuer: default_issuer(),
            audience: default_audience(),
            access_token_ttl_minutes: default_access_ttl(),
            refresh_token_ttl_days: default_refresh_ttl(),
            clients: default_clients(),
        }
    }
}

/// A registered OAuth2 client.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

fn default_bind() -> String {
    "127.0.0.1:8000".into()
}
fn default_csv_path() -> PathBuf {
    PathBuf::from("data.csv")
}
fn default_placeholder_brands() -> Vec<String> {
    vec![DEFAULT_PLACEHOLDER_BRAND.to_string()]
}
fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.into()
}
fn default_issuer() -> String {
    "shelf-hub".into()
}
fn default_audience() -> String {
    "shelf-api".into()
}
fn default_access_ttl() -> i64 {
    30
}
fn default_refresh_ttl() -> i64 {
    7
}
fn default_clients() -> Vec<ClientCredentials> {
    vec![ClientCredentials {
        client_id: "shelf_client".into(),
        client_secret: "shelf_secret".into(),
    }]
}

impl Config {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `SHELF_SECRET_KEY` / `SHELF_CSV_PATH` from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(ENV_SECRET_KEY).filter(|s| !s.is_empty()) {
            self.auth.secret_key = secret;
        }
        if let Some(path) = lookup(ENV_CSV_PATH).filter(|s| !s.is_empty()) {
            self.data.csv_path = PathBuf::from(path);
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.auth.secret_key == DEFAULT_SECRET_KEY
    }
}
