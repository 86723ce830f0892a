//! Account domain types.
//!
//! Represents provisioned email accounts together with how they authenticate
//! and how their transport is secured.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, FolderId};

/// An email account persisted in the local store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for this account.
    pub id: AccountId,
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port.
    pub port: u16,
    /// How the IMAP connection is secured.
    pub encryption: EncryptionMode,
    /// How the account authenticates.
    pub auth_type: AuthType,
    /// Login user, usually the email address.
    pub user: String,
    /// Stored credential. For token accounts this is a serialized
    /// [`OAuthState`](crate::providers::OAuthState).
    pub password: String,
    /// Display name shown in account lists.
    pub display_name: String,
    /// Whether automatic sync is enabled.
    pub synchronize: bool,
    /// Whether this is the default account.
    pub primary: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account last connected successfully.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Folder a left swipe moves messages to.
    pub swipe_left: Option<FolderId>,
    /// Folder a right swipe moves messages to.
    pub swipe_right: Option<FolderId>,
}

/// How an account or identity authenticates against its server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Plain username and password.
    Password,
    /// Access token granted by the platform account manager.
    Token,
    /// Token obtained through a full OAuth authorization flow.
    OAuth,
}

impl AuthType {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Token => "token",
            Self::OAuth => "oauth",
        }
    }

    /// Returns true if the credential is a bearer token rather than a password.
    pub fn is_bearer(&self) -> bool {
        matches!(self, Self::Token | Self::OAuth)
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Self::Password),
            "token" => Ok(Self::Token),
            "oauth" => Ok(Self::OAuth),
            other => Err(format!("unknown auth type: {}", other)),
        }
    }
}

/// Transport security for a server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// TLS from the first byte (implicit TLS).
    Ssl,
    /// Plaintext connection upgraded with STARTTLS.
    StartTls,
    /// No encryption.
    None,
}

impl EncryptionMode {
    /// Derives the mode from whether the endpoint advertises STARTTLS.
    pub fn from_starttls(starttls: bool) -> Self {
        if starttls {
            Self::StartTls
        } else {
            Self::Ssl
        }
    }

    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssl => "ssl",
            Self::StartTls => "starttls",
            Self::None => "none",
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssl" => Ok(Self::Ssl),
            "starttls" => Ok(Self::StartTls),
            "none" => Ok(Self::None),
            other => Err(format!("unknown encryption mode: {}", other)),
        }
    }
}
