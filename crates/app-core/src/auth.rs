//! Authentication facade
//!
//! High-level session operations for the UI layer: querying the signed-in
//! state, handing out the bearer token, recording server-confirmed account
//! type changes, and logging out.

use prbal_api::account::AccountType;
use prbal_api::http::{ApiClient, ApiRequest};
use prbal_api::session::{is_jwt_expired, SessionAccount, SessionManager, SessionManagerError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Endpoint notified on logout; local logout proceeds regardless of the result
const LOGOUT_PATH: &str = "/api/v1/auth/logout/";

/// Authentication service error types
#[derive(Debug, Error)]
pub enum AuthError {
    /// Session manager error
    #[error("Session error: {0}")]
    Session(#[from] SessionManagerError),

    /// No active session
    #[error("No active session")]
    NoSession,
}

/// Result type for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication service
///
/// Wraps the session manager behind the operations the UI actually needs.
/// The session manager is shared; all access goes through the lock.
pub struct AuthService {
    session_manager: Arc<RwLock<SessionManager>>,
    api: ApiClient,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(session_manager: Arc<RwLock<SessionManager>>, api: ApiClient) -> Self {
        Self { session_manager, api }
    }

    /// Check whether a signed-in account is present
    ///
    /// Presence-based: an account with stored tokens counts as signed in
    /// even when the access token needs a refresh. Use
    /// [`AuthService::validate_session`] for an expiry-aware check.
    pub async fn is_logged_in(&self) -> bool {
        let manager = self.session_manager.read().await;
        manager
            .current_account()
            .map(SessionAccount::has_tokens)
            .unwrap_or(false)
    }

    /// Get the current access token, if any
    pub async fn auth_token(&self) -> Option<String> {
        let manager = self.session_manager.read().await;
        manager
            .current_account()
            .and_then(|a| a.access_token.clone())
    }

    /// Get the current account
    pub async fn current_account(&self) -> Option<SessionAccount> {
        let manager = self.session_manager.read().await;
        manager.current_account().cloned()
    }

    /// Get the current account type
    pub async fn current_account_type(&self) -> Option<AccountType> {
        let manager = self.session_manager.read().await;
        manager.current_account().map(|a| a.account_type)
    }

    /// Check that the current access token has not expired
    pub async fn validate_session(&self) -> bool {
        let manager = self.session_manager.read().await;
        match manager.current_account().and_then(|a| a.access_token.as_ref()) {
            Some(token) => !is_jwt_expired(token),
            None => false,
        }
    }

    /// Record a server-confirmed account type for the current account
    pub async fn apply_account_type(&self, account_type: AccountType) -> Result<()> {
        let mut manager = self.session_manager.write().await;
        let user_id = manager
            .current_account()
            .map(|a| a.user_id.clone())
            .ok_or(AuthError::NoSession)?;

        manager.set_account_type(&user_id, account_type).await?;
        Ok(())
    }

    /// Log out the current account
    ///
    /// The server is notified best-effort; the local session is cleared
    /// whether or not that notification succeeds.
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.auth_token().await {
            let request = ApiRequest::post(LOGOUT_PATH).bearer(&token);
            if let Err(e) = self.api.post::<serde_json::Value>(request).await {
                tracing::debug!("server logout failed, clearing local session anyway: {}", e);
            }
        }

        let mut manager = self.session_manager.write().await;
        manager.clear_current().await?;
        Ok(())
    }
}
