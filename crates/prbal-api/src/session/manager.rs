//! Session manager with multi-account support
//!
//! Stores every authenticated account locally, tracks which one is current,
//! and mirrors each change to disk atomically. Only the current account's
//! tokens are ever handed out to callers.
//!
//! The account type recorded here is what the UI renders; it changes through
//! exactly one path, [`SessionManager::set_account_type`], which callers
//! invoke only after the server has confirmed a type change.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use storage::persistence::{PersistedState, PersistenceConfig, PersistenceError};
use thiserror::Error;

use crate::account::AccountType;
use crate::session::{SessionAccount, SessionError};

/// Errors that can occur during session manager operations
#[derive(Debug, Error)]
pub enum SessionManagerError {
    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Persistence error
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// No current account
    #[error("No current account selected")]
    NoCurrentAccount,
}

/// Result type for session manager operations
pub type Result<T> = std::result::Result<T, SessionManagerError>;

/// Storage structure for persisted session data
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionStorage {
    /// All authenticated accounts
    pub accounts: Vec<SessionAccount>,
    /// User id of the currently active account
    pub current_user_id: Option<String>,
}

/// Session manager for multi-account support
///
/// Keeps the authoritative in-memory copy of all locally known accounts and
/// persists every mutation before returning. A missing session file is an
/// empty session, not an error.
pub struct SessionManager {
    accounts: Vec<SessionAccount>,
    current_user_id: Option<String>,
    storage: Arc<PersistedState<SessionStorage>>,
    default_service: String,
}

impl SessionManager {
    /// Create a new session manager with the specified storage path
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_service(path, "https://api.prbal.app").await
    }

    /// Create a new session manager with a custom default service URL
    pub async fn with_service(
        path: impl Into<PathBuf>,
        default_service: impl Into<String>,
    ) -> Result<Self> {
        let config = PersistenceConfig::new(path)
            .version(1)
            .atomic_writes(true)
            .backups(true, 3);

        let storage = PersistedState::new(config);
        storage.init().await?;

        let session_storage: SessionStorage = storage.get().await?;

        Ok(Self {
            accounts: session_storage.accounts,
            current_user_id: session_storage.current_user_id,
            storage: Arc::new(storage),
            default_service: default_service.into(),
        })
    }

    /// Persist current state to storage
    async fn persist(&self) -> Result<()> {
        let storage_data = SessionStorage {
            accounts: self.accounts.clone(),
            current_user_id: self.current_user_id.clone(),
        };

        self.storage.set(storage_data).await?;
        Ok(())
    }

    /// Get the default service URL used for new accounts
    pub fn default_service(&self) -> &str {
        &self.default_service
    }

    /// Get the currently active account
    pub fn current_account(&self) -> Option<&SessionAccount> {
        self.current_user_id
            .as_ref()
            .and_then(|id| self.accounts.iter().find(|a| &a.user_id == id))
    }

    /// Get all locally known accounts
    pub fn list_accounts(&self) -> &[SessionAccount] {
        &self.accounts
    }

    /// Get an account by user id
    pub fn get_account(&self, user_id: &str) -> Option<&SessionAccount> {
        self.accounts.iter().find(|a| a.user_id == user_id)
    }

    /// Add or update an account
    ///
    /// An account with the same user id is replaced. When no account is
    /// current yet, the added account becomes current.
    pub async fn add_account(&mut self, account: SessionAccount) -> Result<()> {
        tracing::debug!(user_id = %account.user_id, "storing session account");

        match self.accounts.iter_mut().find(|a| a.user_id == account.user_id) {
            Some(existing) => *existing = account,
            None => {
                if self.current_user_id.is_none() {
                    self.current_user_id = Some(account.user_id.clone());
                }
                self.accounts.push(account);
            }
        }

        self.persist().await
    }

    /// Make an account current
    pub async fn set_current(&mut self, user_id: &str) -> Result<()> {
        if self.get_account(user_id).is_none() {
            return Err(SessionManagerError::AccountNotFound(user_id.to_string()));
        }

        self.current_user_id = Some(user_id.to_string());
        self.persist().await
    }

    /// Remove an account
    ///
    /// Removing the current account leaves the session with no current
    /// account selected.
    pub async fn remove_account(&mut self, user_id: &str) -> Result<()> {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.user_id != user_id);

        if self.accounts.len() == before {
            return Err(SessionManagerError::AccountNotFound(user_id.to_string()));
        }

        if self.current_user_id.as_deref() == Some(user_id) {
            self.current_user_id = None;
        }

        self.persist().await
    }

    /// Record a server-confirmed account type for an account
    ///
    /// This is the only write path for the locally displayed account type.
    pub async fn set_account_type(
        &mut self,
        user_id: &str,
        account_type: AccountType,
    ) -> Result<()> {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.user_id == user_id)
            .ok_or_else(|| SessionManagerError::AccountNotFound(user_id.to_string()))?;

        tracing::debug!(user_id = %user_id, account_type = %account_type, "recording account type");
        account.account_type = account_type;

        self.persist().await
    }

    /// Log out the current account
    ///
    /// Drops the tokens but keeps the account in the list for easy re-login;
    /// no account is current afterwards.
    pub async fn clear_current(&mut self) -> Result<()> {
        let Some(user_id) = self.current_user_id.take() else {
            return Err(SessionManagerError::NoCurrentAccount);
        };

        if let Some(account) = self.accounts.iter_mut().find(|a| a.user_id == user_id) {
            account.access_token = None;
            account.refresh_token = None;
            account.active = Some(false);
        }

        self.persist().await
    }

    /// Remove all accounts and sessions
    pub async fn clear_all(&mut self) -> Result<()> {
        self.accounts.clear();
        self.current_user_id = None;
        self.storage.clear().await?;
        Ok(())
    }
}
