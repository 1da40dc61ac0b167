//! Account-type change flow
//!
//! Switching between customer and provider accounts is a short, fallible,
//! server-coordinated process: fetch the transitions the server offers, let
//! the user pick one, collect an optional reason, submit, and reconcile the
//! local session once the server confirms. This module drives it as an
//! explicit state machine. The UI calls the transition methods and renders
//! whatever state and effects come back; the flow owns no widgets and
//! performs no navigation itself.
//!
//! The locally stored account type changes only after a confirmed success
//! from the server. There are no optimistic updates and no automatic
//! retries: a failed submission ends the attempt and the user restarts the
//! flow if they want to.

use async_trait::async_trait;
use prbal_api::account::{
    AccountClient, AccountType, TypeChangeOption, TypeChangeOutcome, TypeChangeRequest,
};
use prbal_api::http::ApiError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::auth::{AuthError, AuthService};

/// Delay before the UI relaunches to the entry screen after a successful
/// change. The account type decides which surface the user lands on, and a
/// live session cannot be re-routed in place.
pub const RELAUNCH_DELAY: Duration = Duration::from_secs(2);

/// Server operations the flow depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Fetch the transitions the server currently offers
    ///
    /// `Ok(None)` means the payload carried no parseable option list.
    async fn available_type_changes(
        &self,
        token: &str,
    ) -> Result<Option<Vec<TypeChangeOption>>, ApiError>;

    /// Submit a type change
    async fn submit_type_change(
        &self,
        token: &str,
        request: &TypeChangeRequest,
    ) -> Result<TypeChangeOutcome, ApiError>;
}

#[async_trait]
impl AccountApi for AccountClient {
    async fn available_type_changes(
        &self,
        token: &str,
    ) -> Result<Option<Vec<TypeChangeOption>>, ApiError> {
        AccountClient::available_type_changes(self, token).await
    }

    async fn submit_type_change(
        &self,
        token: &str,
        request: &TypeChangeRequest,
    ) -> Result<TypeChangeOutcome, ApiError> {
        AccountClient::submit_type_change(self, token, request).await
    }
}

/// Session operations the flow depends on
///
/// The flow reads the session and writes it through exactly one method,
/// [`SessionHandle::apply_account_type`], which it calls only after the
/// server confirmed the change.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Check whether a signed-in account is present
    async fn is_logged_in(&self) -> bool;

    /// Get the current access token, if any
    async fn auth_token(&self) -> Option<String>;

    /// Get the current account type, if known
    async fn current_account_type(&self) -> Option<AccountType>;

    /// Record a server-confirmed account type for the current account
    async fn apply_account_type(&self, account_type: AccountType) -> Result<(), AuthError>;
}

#[async_trait]
impl SessionHandle for AuthService {
    async fn is_logged_in(&self) -> bool {
        AuthService::is_logged_in(self).await
    }

    async fn auth_token(&self) -> Option<String> {
        AuthService::auth_token(self).await
    }

    async fn current_account_type(&self) -> Option<AccountType> {
        AuthService::current_account_type(self).await
    }

    async fn apply_account_type(&self, account_type: AccountType) -> Result<(), AuthError> {
        AuthService::apply_account_type(self, account_type).await
    }
}

/// How a notification should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    /// Informational
    Info,
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
}

/// Side effects the UI must perform after a transition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum FlowEffect {
    /// Show a notification to the user
    Notify {
        /// Presentation style
        severity: Severity,
        /// Message text
        message: String,
    },
    /// Relaunch to the app entry point after the given delay
    ScheduleRelaunch {
        /// How long to wait before relaunching
        delay: Duration,
    },
}

/// The states of the type-change flow
///
/// ```text
/// Idle -> FetchingOptions -> AwaitingSelection -> AwaitingConfirmation -> Submitting -> Idle
///                  \-> FetchFailed (terminal)               \-> SubmitFailed (terminal)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FlowState {
    /// No flow in progress
    Idle,
    /// Loading the transitions the server offers
    FetchingOptions,
    /// Waiting for the user to pick an option
    AwaitingSelection {
        /// Options to present
        options: Vec<TypeChangeOption>,
        /// True when the options were synthesized locally because the
        /// server response carried none
        degraded: bool,
    },
    /// Waiting for the user to confirm, with an optional reason
    AwaitingConfirmation {
        /// The option the user picked
        selection: TypeChangeOption,
    },
    /// Submission in flight; confirm is inert until it settles
    Submitting {
        /// The option being submitted
        selection: TypeChangeOption,
    },
    /// Option fetch failed; the user may restart the flow
    FetchFailed {
        /// What went wrong
        message: String,
    },
    /// Submission failed; the user may restart the flow
    SubmitFailed {
        /// Server-provided reason
        message: String,
    },
}

/// Result of a flow transition: the new state plus effects for the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowUpdate {
    /// State after the transition
    pub state: FlowState,
    /// Effects the UI must perform
    pub effects: Vec<FlowEffect>,
}

impl FlowUpdate {
    fn quiet(state: FlowState) -> Self {
        Self { state, effects: Vec::new() }
    }
}

fn notify(severity: Severity, message: impl Into<String>) -> FlowEffect {
    FlowEffect::Notify { severity, message: message.into() }
}

/// The account-type change coordinator
///
/// One instance drives one flow at a time. Methods take `&self`; state lives
/// behind a lock so a UI may share the flow across handlers. Every
/// transition returns a [`FlowUpdate`]; errors never propagate past this
/// boundary.
///
/// A generation counter makes dismissal deterministic: network entries
/// record the generation they started under, and a result is discarded when
/// `cancel` bumped the generation while the request was in flight.
pub struct TypeChangeFlow<A, S> {
    api: A,
    session: S,
    state: RwLock<FlowState>,
    generation: AtomicU64,
}

impl<A: AccountApi, S: SessionHandle> TypeChangeFlow<A, S> {
    /// Create a new flow over its collaborators
    pub fn new(api: A, session: S) -> Self {
        Self {
            api,
            session,
            state: RwLock::new(FlowState::Idle),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot the current state
    pub async fn state(&self) -> FlowState {
        self.state.read().await.clone()
    }

    /// Start the flow: fetch the available transitions
    ///
    /// Only valid from `Idle` or a terminal failure state; calling it while
    /// a flow is in progress reports the current state unchanged. The
    /// option list is fetched fresh on every invocation.
    pub async fn begin(&self) -> FlowUpdate {
        if !self.session.is_logged_in().await {
            return FlowUpdate {
                state: FlowState::Idle,
                effects: vec![notify(Severity::Error, "Sign in to change your account type.")],
            };
        }

        let Some(token) = self.session.auth_token().await else {
            return FlowUpdate {
                state: FlowState::Idle,
                effects: vec![notify(Severity::Error, "Sign in to change your account type.")],
            };
        };

        let generation = {
            let mut state = self.state.write().await;
            match *state {
                FlowState::Idle
                | FlowState::FetchFailed { .. }
                | FlowState::SubmitFailed { .. } => {
                    *state = FlowState::FetchingOptions;
                    self.generation.load(Ordering::SeqCst)
                }
                _ => return FlowUpdate::quiet(state.clone()),
            }
        };

        tracing::debug!("fetching available account type changes");
        let fetched = self.api.available_type_changes(&token).await;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation
            || !matches!(*state, FlowState::FetchingOptions)
        {
            // Dismissed mid-fetch; drop the late result
            return FlowUpdate::quiet(state.clone());
        }

        match fetched {
            Ok(Some(options)) if !options.is_empty() => {
                *state = FlowState::AwaitingSelection { options, degraded: false };
                FlowUpdate::quiet(state.clone())
            }
            Ok(_) => match self.session.current_account_type().await {
                Some(current) => {
                    tracing::warn!(
                        "type change options missing from response, offering local defaults"
                    );
                    *state = FlowState::AwaitingSelection {
                        options: fallback_options(current),
                        degraded: true,
                    };
                    FlowUpdate::quiet(state.clone())
                }
                None => {
                    *state = FlowState::Idle;
                    FlowUpdate {
                        state: FlowState::Idle,
                        effects: vec![notify(
                            Severity::Info,
                            "No account type changes are available right now.",
                        )],
                    }
                }
            },
            Err(e) => {
                tracing::debug!("type change option fetch failed: {}", e);
                let message = e.message().to_string();
                *state = FlowState::FetchFailed { message: message.clone() };
                FlowUpdate {
                    state: state.clone(),
                    effects: vec![notify(
                        Severity::Error,
                        format!("Could not load account type options: {}", message),
                    )],
                }
            }
        }
    }

    /// Pick one of the offered options
    ///
    /// Picking a type that was not offered is ignored.
    pub async fn select(&self, target: AccountType) -> FlowUpdate {
        let mut state = self.state.write().await;

        if let FlowState::AwaitingSelection { options, .. } = &*state {
            if let Some(selection) = options.iter().find(|o| o.target_type == target).cloned() {
                *state = FlowState::AwaitingConfirmation { selection };
            }
        }

        FlowUpdate::quiet(state.clone())
    }

    /// Confirm the selection and submit the change
    ///
    /// An empty or whitespace-only reason is treated as no reason, so the
    /// request omits the field. Confirming while a submission is already in
    /// flight does nothing.
    pub async fn confirm(&self, reason: Option<String>) -> FlowUpdate {
        let (selection, generation) = {
            let mut state = self.state.write().await;
            match &*state {
                FlowState::AwaitingConfirmation { selection } => {
                    let selection = selection.clone();
                    *state = FlowState::Submitting { selection: selection.clone() };
                    (selection, self.generation.load(Ordering::SeqCst))
                }
                _ => return FlowUpdate::quiet(state.clone()),
            }
        };

        let Some(token) = self.session.auth_token().await else {
            let mut state = self.state.write().await;
            *state = FlowState::Idle;
            return FlowUpdate {
                state: FlowState::Idle,
                effects: vec![notify(
                    Severity::Error,
                    "Your session has expired. Sign in and try again.",
                )],
            };
        };

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let request = TypeChangeRequest { to: selection.target_type, reason };

        tracing::debug!(target_type = %selection.target_type, "submitting account type change");
        let submitted = self.api.submit_type_change(&token, &request).await;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation
            || !matches!(*state, FlowState::Submitting { .. })
        {
            return FlowUpdate::quiet(state.clone());
        }

        match submitted {
            Ok(TypeChangeOutcome::Success) => {
                if let Err(e) = self.session.apply_account_type(selection.target_type).await {
                    // The server applied the change; the session will catch
                    // up on next refresh
                    tracing::error!("local session update after confirmed change failed: {}", e);
                }

                *state = FlowState::Idle;
                FlowUpdate {
                    state: FlowState::Idle,
                    effects: vec![
                        notify(
                            Severity::Success,
                            format!("Your account is now {}.", selection.display_label),
                        ),
                        FlowEffect::ScheduleRelaunch { delay: RELAUNCH_DELAY },
                    ],
                }
            }
            Ok(TypeChangeOutcome::Failure { message }) => {
                *state = FlowState::SubmitFailed { message: message.clone() };
                FlowUpdate {
                    state: state.clone(),
                    effects: vec![notify(Severity::Error, message)],
                }
            }
            Err(e) => {
                let message = e.message().to_string();
                *state = FlowState::SubmitFailed { message: message.clone() };
                FlowUpdate {
                    state: state.clone(),
                    effects: vec![notify(
                        Severity::Error,
                        format!("Could not change account type: {}", message),
                    )],
                }
            }
        }
    }

    /// Dismiss the flow
    ///
    /// Always lands in `Idle` with no side effects. Any in-flight request
    /// is allowed to complete; its result is discarded.
    pub async fn cancel(&self) -> FlowUpdate {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.write().await;
        *state = FlowState::Idle;
        FlowUpdate::quiet(FlowState::Idle)
    }
}

/// Every account type except the current one, with default labels
fn fallback_options(current: AccountType) -> Vec<TypeChangeOption> {
    AccountType::ALL
        .iter()
        .filter(|t| **t != current)
        .map(|t| TypeChangeOption::with_default_label(*t))
        .collect()
}
