//! Configuration and settings management.
//!
//! This module provides settings types and persistence.
//! Settings are stored in the user's config directory as JSON.

mod settings;

pub use settings::{
    ConfigError, NetworkSettings, ProvisionSettings, Result, Settings, StorageSettings,
};
