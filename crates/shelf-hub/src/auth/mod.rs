//! # Access Control
//!
//! OAuth2 client-credentials and refresh-token grants. Access tokens are
//! stateless JWTs (see [`jwt`]); refresh tokens are opaque, single-use, and
//! stored only as SHA-256 hashes.

pub mod errors;
pub mod jwt;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shelf_core::Capability;
use tokio::sync::RwLock;

use crate::config::{AuthConfig, ClientCredentials};
use errors::{AuthError, AuthResult};
use jwt::{JwtConfig, JwtManager};

pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";
pub const REFRESH_TOKEN_GRANT: &str = "refresh_token";

const REFRESH_TOKEN_LEN: usize = 48;

/// Live refresh tokens a single client may hold. Issuing past this revokes
/// the client's oldest.
pub const MAX_REFRESH_TOKENS_PER_CLIENT: usize = 8;

/// Body of `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub grant_type: String,
    pub refresh_token: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds.
    pub expires_in: i64,
    pub refresh_token: String,
    /// Seconds.
    pub refresh_expires_in: i64,
}

/// A live refresh token, keyed by its SHA-256 hash. The raw value is never kept.
#[derive(Debug, Clone)]
struct RefreshEntry {
    client_id: String,
    expires_at: DateTime<Utc>,
}

pub struct AuthService {
    jwt: JwtManager,
    clients: Vec<ClientCredentials>,
    refresh_ttl: Duration,
    refresh_tokens: RwLock<HashMap<String, RefreshEntry>>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        let jwt = JwtManager::new(JwtConfig {
            secret: config.secret_key.clone(),
            access_token_ttl: Duration::minutes(config.access_token_ttl_minutes),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        });
        Self {
            jwt,
            clients: config.clients.clone(),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
            refresh_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Client-credentials grant.
    pub async fn issue(&self, req: &TokenRequest) -> AuthResult<TokenResponse> {
        if req.grant_type != CLIENT_CREDENTIALS_GRANT {
            return Err(AuthError::UnsupportedGrantType(CLIENT_CREDENTIALS_GRANT));
        }
        if !self.verify_client(&req.client_id, &req.client_secret) {
            tracing::warn!("Rejected credentials for client '{}'", req.client_id);
            return Err(AuthError::InvalidClient);
        }
        tracing::info!("Issued token to client '{}'", req.client_id);
        self.token_pair(&req.client_id).await
    }

    /// Refresh-token grant. The presented token is consumed whether or not
    /// the rest of the request checks out.
    pub async fn refresh(&self, req: &RefreshRequest) -> AuthResult<TokenResponse> {
        if req.grant_type != REFRESH_TOKEN_GRANT {
            return Err(AuthError::UnsupportedGrantType(REFRESH_TOKEN_GRANT));
        }

        let hash = sha256_hex(&req.refresh_token);
        let now = Utc::now();
        let entry = {
            let mut tokens = self.refresh_tokens.write().await;
            tokens.retain(|_, t| t.expires_at > now);
            tokens.remove(&hash)
        };

        match entry {
            Some(entry) if entry.client_id == req.client_id => {
                tracing::info!("Rotated refresh token for client '{}'", req.client_id);
                self.token_pair(&req.client_id).await
            }
            Some(_) => {
                tracing::warn!(
                    "Refresh token presented by '{}' was issued to another client",
                    req.client_id
                );
                Err(AuthError::InvalidGrant)
            }
            None => {
                tracing::warn!("Unknown or expired refresh token from '{}'", req.client_id);
                Err(AuthError::InvalidGrant)
            }
        }
    }

    /// Verify a bearer access token.
    pub fn verify(&self, token: &str) -> AuthResult<Capability> {
        self.jwt.capability(token)
    }

    fn verify_client(&self, client_id: &str, client_secret: &str) -> bool {
        // No early exit: every registered client is compared.
        self.clients.iter().fold(false, |found, c| {
            let id = constant_time_eq(&c.client_id, client_id);
            let secret = constant_time_eq(&c.client_secret, client_secret);
            found | (id & secret)
        })
    }

    async fn token_pair(&self, client_id: &str) -> AuthResult<TokenResponse> {
        let access_token = self.jwt.issue(client_id)?;
        let refresh_token = self.store_refresh_token(client_id).await;
        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.jwt.access_token_ttl().num_seconds(),
            refresh_token,
            refresh_expires_in: self.refresh_ttl.num_seconds(),
        })
    }

    async fn store_refresh_token(&self, client_id: &str) -> String {
        let raw: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REFRESH_TOKEN_LEN)
            .map(char::from)
            .collect();
        let now = Utc::now();
        let entry = RefreshEntry {
            client_id: client_id.to_string(),
            expires_at: now + self.refresh_ttl,
        };

        let mut tokens = self.refresh_tokens.write().await;
        tokens.retain(|_, t| t.expires_at > now);

        let mut held: Vec<(String, DateTime<Utc>)> = tokens
            .iter()
            .filter(|(_, t)| t.client_id == client_id)
            .map(|(hash, t)| (hash.clone(), t.expires_at))
            .collect();
        if held.len() >= MAX_REFRESH_TOKENS_PER_CLIENT {
            held.sort_by_key(|(_, expires_at)| *expires_at);
            let excess = held.len() + 1 - MAX_REFRESH_TOKENS_PER_CLIENT;
            for (hash, _) in held.into_iter().take(excess) {
                tokens.remove(&hash);
            }
            tracing::debug!("Revoked {} oldest refresh tokens of '{}'", excess, client_id);
        }

        tokens.insert(sha256_hex(&raw), entry);
        raw
    }

    #[cfg(test)]
    async fn live_refresh_tokens(&self) -> usize {
        self.refresh_tokens.read().await.len()
    }
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{:x}", digest)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
