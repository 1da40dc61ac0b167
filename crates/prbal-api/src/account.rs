//! Account-type model and endpoints
//!
//! The marketplace distinguishes customers, service providers, and admins;
//! an authenticated user can request a switch between them. This module
//! holds the wire types for that exchange and the endpoint wrappers.
//!
//! The options endpoint has shipped with several response layouts over time,
//! so `available_type_changes` probes every known nesting of the
//! `available_changes` array before giving up and reporting the payload as
//! unusable (the caller decides what to offer instead).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{ApiClient, ApiError, ApiRequest, ApiResponse};

/// Path of the endpoint listing the transitions the server offers
const TYPE_CHANGES_PATH: &str = "/api/v1/auth/account-type/changes/";

/// Path of the endpoint applying a transition
const TYPE_CHANGE_SUBMIT_PATH: &str = "/api/v1/auth/account-type/change/";

/// Key paths under which servers have been observed to nest the
/// `available_changes` array
const AVAILABLE_CHANGES_PATHS: &[&[&str]] = &[
    &["available_changes"],
    &["data", "available_changes"],
    &["data", "options"],
    &["options"],
];

/// The role a user occupies in the marketplace
///
/// Declared once; ordering is declaration order only. The wire form is
/// lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Consumes services
    Customer,
    /// Offers services
    Provider,
    /// Administers the marketplace
    Admin,
}

impl AccountType {
    /// Every account type, in declaration order
    pub const ALL: &'static [AccountType] =
        &[AccountType::Customer, AccountType::Provider, AccountType::Admin];

    /// Wire form of the account type
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Customer => "customer",
            AccountType::Provider => "provider",
            AccountType::Admin => "admin",
        }
    }

    /// Display label used when the server did not supply one
    pub fn default_label(&self) -> &'static str {
        match self {
            AccountType::Customer => "Customer",
            AccountType::Provider => "Service Provider",
            AccountType::Admin => "Administrator",
        }
    }

    /// Parse a wire value, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "customer" => Some(AccountType::Customer),
            "provider" => Some(AccountType::Provider),
            "admin" => Some(AccountType::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transition the user may pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChangeOption {
    /// The account type this option switches to
    #[serde(rename = "type")]
    pub target_type: AccountType,
    /// Label the UI shows for this option
    #[serde(rename = "display")]
    pub display_label: String,
}

impl TypeChangeOption {
    /// Build an option with the default label for its target type
    pub fn with_default_label(target_type: AccountType) -> Self {
        Self {
            target_type,
            display_label: target_type.default_label().to_string(),
        }
    }
}

/// Body of a type-change submission
///
/// `reason` passes through without validation and is omitted from the
/// serialized body when absent; the server treats a missing reason and no
/// reason identically, but rejects an empty string on some versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChangeRequest {
    /// The account type to switch to
    pub to: AccountType,
    /// Optional free-text reason supplied by the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of a type-change submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeChangeOutcome {
    /// The server applied the change
    Success,
    /// The server rejected the change
    Failure {
        /// Server-provided reason, surfaced to the user verbatim
        message: String,
    },
}

/// Wire form of the submission response
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TypeChangeResponse {
    success: bool,
    #[serde(default)]
    message: String,
}

/// Client for the account endpoints
#[derive(Debug, Clone)]
pub struct AccountClient {
    api: ApiClient,
}

impl AccountClient {
    /// Create a new account client over an API client
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetch the transitions the server currently offers
    ///
    /// Returns `Ok(Some(options))` when an `available_changes` array was
    /// found under any of its known key paths, `Ok(None)` when the payload
    /// carried no parseable array, and `Err` for transport or server errors.
    pub async fn available_type_changes(
        &self,
        token: &str,
    ) -> Result<Option<Vec<TypeChangeOption>>, ApiError> {
        let request = ApiRequest::get(TYPE_CHANGES_PATH).bearer(token);
        let response: ApiResponse<Value> = self.api.get(request).await?;

        Ok(probe_available_changes(&response.data))
    }

    /// Submit a type change
    ///
    /// Never retried: a failed submission is reported and the user decides
    /// whether to start over.
    pub async fn submit_type_change(
        &self,
        token: &str,
        request: &TypeChangeRequest,
    ) -> Result<TypeChangeOutcome, ApiError> {
        let api_request = ApiRequest::post(TYPE_CHANGE_SUBMIT_PATH)
            .bearer(token)
            .json_body(request)
            .map_err(|e| ApiError::new(0, "SerializationError", e.to_string()))?;

        let response: ApiResponse<TypeChangeResponse> = self.api.post(api_request).await?;

        if response.data.success {
            Ok(TypeChangeOutcome::Success)
        } else {
            Ok(TypeChangeOutcome::Failure {
                message: response.data.message,
            })
        }
    }
}

/// Locate and parse the `available_changes` array in a response payload
///
/// Entries without a recognizable target type are dropped; entries without a
/// display label get the default label for their type.
fn probe_available_changes(payload: &Value) -> Option<Vec<TypeChangeOption>> {
    for key_path in AVAILABLE_CHANGES_PATHS {
        let mut node = payload;
        let mut found = true;

        for key in *key_path {
            match node.get(key) {
                Some(next) => node = next,
                None => {
                    found = false;
                    break;
                }
            }
        }

        if !found {
            continue;
        }

        if let Some(entries) = node.as_array() {
            return Some(entries.iter().filter_map(parse_option_entry).collect());
        }
    }

    None
}

fn parse_option_entry(entry: &Value) -> Option<TypeChangeOption> {
    let target_type = entry
        .get("type")
        .or_else(|| entry.get("to"))
        .and_then(Value::as_str)
        .and_then(AccountType::parse)?;

    let display_label = entry
        .get("display")
        .or_else(|| entry.get("display_label"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| target_type.default_label().to_string());

    Some(TypeChangeOption {
        target_type,
        display_label,
    })
}
