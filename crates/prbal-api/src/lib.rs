//! Prbal API Client Library
//!
//! This crate provides the HTTP-facing half of the Prbal marketplace client:
//! request/response plumbing with retry support, the account-type endpoints,
//! and local session management with persistence.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod http;
pub mod session;

pub use account::{AccountClient, AccountType, TypeChangeOption, TypeChangeOutcome, TypeChangeRequest};
pub use http::{ApiClient, ApiClientConfig, ApiError, ApiRequest, ApiResponse};
pub use session::{SessionAccount, SessionManager};
