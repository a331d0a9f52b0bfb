//! # Auth Errors

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    // ==================
    // Grant Errors
    // ==================
    #[error("Only '{0}' grant type is supported")]
    UnsupportedGrantType(&'static str),

    #[error("Invalid client credentials")]
    InvalidClient,

    /// Refresh token unknown, already used, expired, or issued to another client.
    #[error("Invalid or expired refresh token")]
    InvalidGrant,

    // ==================
    // Bearer Errors
    // ==================
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token signature")]
    InvalidSignature,

    // ==================
    // Internal Errors
    // ==================
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::UnsupportedGrantType(_) => 400,
            AuthError::TokenGenerationFailed => 500,
            _ => 401,
        }
    }

    /// OAuth2 `error` code for the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            AuthError::InvalidClient => "invalid_client",
            AuthError::InvalidGrant => "invalid_grant",
            AuthError::MalformedToken
            | AuthError::TokenExpired
            | AuthError::InvalidSignature => "invalid_token",
            AuthError::TokenGenerationFailed => "server_error",
        }
    }
}
