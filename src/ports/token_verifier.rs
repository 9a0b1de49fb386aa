//! TokenVerifier port - bearer credential validation.
//!
//! The gateway never issues tokens; it only validates the bearer credential
//! presented during the WebSocket handshake and extracts the claims it
//! needs for registration and tenancy scoping.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CompanyId, UserId};

/// Claims the gateway cares about from a validated token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthClaims {
    /// The authenticated user.
    pub user_id: UserId,
    /// The tenant the user belongs to.
    pub company_id: CompanyId,
}

/// Token validation failures.
///
/// All variants are terminal for the connection attempt; the gateway
/// closes with the authentication-failure code and never retries.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// Missing, malformed, or bad signature.
    #[error("invalid token")]
    Invalid,

    /// Signature is fine but the token is past its expiry.
    #[error("token expired")]
    Expired,

    /// The verifier itself could not do its job (key fetch, config).
    #[error("token verification unavailable: {0}")]
    Unavailable(String),
}

/// Port for validating bearer tokens presented at connection time.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Validates `token` and returns the claims on success.
    async fn verify(&self, token: &str) -> Result<AuthClaims, TokenError>;
}
