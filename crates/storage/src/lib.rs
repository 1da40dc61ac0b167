//! Local storage for the Prbal client
//!
//! This crate provides the on-disk persistence used for session state:
//! versioned, checksummed JSON files with atomic writes and rotating backups.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod persistence;

pub use persistence::{PersistedState, PersistenceConfig, PersistenceError};
