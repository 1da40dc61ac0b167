//! Core application logic for the Prbal client
//!
//! This crate contains the non-visual application services the UI layer
//! drives: the authentication facade and the account-type change workflow.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod type_change;

pub use auth::AuthService;
pub use type_change::{
    AccountApi, FlowEffect, FlowState, FlowUpdate, SessionHandle, Severity, TypeChangeFlow,
};
