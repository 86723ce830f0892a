//! Database and credential storage.
//!
//! This module provides the storage layer for provisioning:
//!
//! - SQLite database for accounts, folders, identities and queued operations
//! - OS keychain integration for OAuth refresh credentials
//! - Async-safe database operations via tokio::task::spawn_blocking

mod database;
mod keychain;
pub mod queries;
mod schema;

pub use database::{Database, DatabaseError, Result};
pub use keychain::{KeychainAccess, KeychainError};
