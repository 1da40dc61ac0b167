//! Session management
//!
//! This module implements local session handling for the Prbal client:
//! - Session account wire types
//! - JWT claim parsing and expiry inspection
//! - Session persistence with multi-account support (see [`SessionManager`])
//!
//! Tokens are opaque bearer credentials as far as the client is concerned;
//! claims are only ever parsed to decide whether a refresh is due. Nothing
//! here validates signatures.

mod manager;

pub use manager::{SessionManager, SessionManagerError, SessionStorage};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::AccountType;

/// Errors that can occur during session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// JWT parsing error
    #[error("JWT parsing error: {0}")]
    JwtParseError(String),

    /// JWT validation error
    #[error("JWT validation error: {0}")]
    JwtValidationError(#[from] jsonwebtoken::errors::Error),

    /// Token expired
    #[error("Token expired at {0}")]
    TokenExpired(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// A locally held account with authentication tokens
///
/// Contains everything needed to restore a user's session after an app
/// restart, including the account type that decides which UI surface the
/// user lands on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAccount {
    /// The API service URL (e.g., "https://api.prbal.app")
    pub service: String,

    /// The user's server-side identifier
    pub user_id: String,

    /// The user's username
    pub username: String,

    /// The user's email address (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// The account type this user currently occupies
    pub account_type: AccountType,

    /// Access bearer token (can expire)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Refresh token (can expire)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Whether the session is active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    /// Account status (e.g., "suspended", "deactivated")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl SessionAccount {
    /// Create a new session account with required fields
    pub fn new(
        service: String,
        user_id: String,
        username: String,
        account_type: AccountType,
    ) -> Self {
        Self {
            service,
            user_id,
            username,
            email: None,
            account_type,
            access_token: None,
            refresh_token: None,
            active: Some(true),
            status: None,
        }
    }

    /// Check if this account holds both tokens
    pub fn has_tokens(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }
}

/// JWT claims structure
///
/// This represents the decoded payload of a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Token type (e.g., "access", "refresh")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Additional claims
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Parse JWT claims without validation
///
/// This is useful for extracting expiration time and other claims from a
/// token without verifying the signature. Should only be used for
/// informational purposes.
pub fn parse_jwt_claims(token: &str) -> Result<JwtClaims> {
    let header = decode_header(token)?;

    // Signature checks belong to the server; we only read claims
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;

    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(&[]), // Dummy key since we're not validating
        &validation,
    )?;

    Ok(token_data.claims)
}

/// Get the expiration time from a bearer token
///
/// Returns None if the token doesn't have an expiration claim or if parsing
/// fails.
pub fn get_jwt_expiration(token: &str) -> Option<DateTime<Utc>> {
    let claims = parse_jwt_claims(token).ok()?;
    claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
}

/// Check if a bearer token is expired
///
/// A token without an expiration claim is treated as expired.
pub fn is_jwt_expired(token: &str) -> bool {
    match get_jwt_expiration(token) {
        Some(exp_time) => exp_time <= Utc::now(),
        None => true,
    }
}

/// Check if a bearer token will expire within the given duration
pub fn is_jwt_expiring_soon(token: &str, threshold: Duration) -> bool {
    match get_jwt_expiration(token) {
        Some(exp_time) => exp_time <= Utc::now() + threshold,
        None => true,
    }
}

/// Check if a session account is expired
///
/// A session is considered expired if it has no access token, or the access
/// token is expired and there is no usable refresh token.
pub fn is_session_expired(account: &SessionAccount) -> bool {
    let Some(ref access_token) = account.access_token else {
        return true;
    };

    if !is_jwt_expired(access_token) {
        return false;
    }

    match &account.refresh_token {
        Some(refresh_token) => is_jwt_expired(refresh_token),
        None => true,
    }
}
