//! Keychain access for OAuth client credentials.
//!
//! Wraps the keyring crate to keep refresh tokens out of the account database.
//! The database only ever holds short-lived access tokens.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::providers::RefreshCredentials;

/// Errors that can occur during keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Stored credential is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Failed to spawn blocking task: {0}")]
    TaskFailed(String),
}

/// Result type for keychain operations.
pub type Result<T> = std::result::Result<T, KeychainError>;

/// Provides access to the OS keychain.
///
/// Entries are namespaced by the service name so test runs do not touch real
/// credentials.
#[derive(Debug, Clone)]
pub struct KeychainAccess {
    service_name: String,
}

impl KeychainAccess {
    /// Default service name for heap credentials.
    pub const DEFAULT_SERVICE: &'static str = "com.panbanda.heap";

    /// Creates a new KeychainAccess with the default service name.
    pub fn new() -> Self {
        Self {
            service_name: Self::DEFAULT_SERVICE.to_string(),
        }
    }

    /// Creates a new KeychainAccess with a custom service name.
    pub fn with_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Returns the service name used for this keychain access.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Generates the keychain key holding refresh credentials for `email`.
    pub fn refresh_credentials_key(email: &str) -> String {
        format!("oauth.refresh.{}", email.to_lowercase())
    }

    /// Stores the refresh credentials for `email`, replacing existing ones.
    pub async fn store_refresh_credentials(
        &self,
        email: &str,
        credentials: &RefreshCredentials,
    ) -> Result<()> {
        self.store_json(&Self::refresh_credentials_key(email), credentials)
            .await
    }

    /// Loads the refresh credentials for `email`.
    ///
    /// Returns `None` if nothing is stored.
    pub async fn refresh_credentials(&self, email: &str) -> Result<Option<RefreshCredentials>> {
        self.retrieve_json(&Self::refresh_credentials_key(email))
            .await
    }

    async fn store_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let service = self.service_name.clone();
        let key = key.to_string();
        let value = serde_json::to_string(value)?;

        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            entry.set_password(&value)?;
            Ok(())
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))?
    }

    async fn retrieve_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let service = self.service_name.clone();
        let key = key.to_string();

        let raw = tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            match entry.get_password() {
                Ok(password) => Ok(Some(password)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(KeychainError::Keyring(e)),
            }
        })
        .await
        .map_err(|e| KeychainError::TaskFailed(e.to_string()))??;

        raw.map(|raw| serde_json::from_str(&raw).map_err(KeychainError::from))
            .transpose()
    }
}

impl Default for KeychainAccess {
    fn default() -> Self {
        Self::new()
    }
}
