//! Identity domain types.
//!
//! An identity is the sending side of an account: the SMTP endpoint and the
//! name and address that appear on outgoing mail.

use serde::{Deserialize, Serialize};

use super::{AccountId, AuthType, EncryptionMode, IdentityId};

/// A sending identity owned by exactly one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Unique identifier for this identity.
    pub id: IdentityId,
    /// Owning account.
    pub account_id: AccountId,
    /// Name shown on outgoing mail.
    pub name: String,
    /// Sender address.
    pub email: String,
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// How the SMTP connection is secured.
    pub encryption: EncryptionMode,
    /// How the identity authenticates.
    pub auth_type: AuthType,
    /// Login user.
    pub user: String,
    /// Stored credential.
    pub password: String,
    /// Whether the identity is usable for sending.
    pub synchronize: bool,
    /// Whether this is the account's default identity.
    pub primary: bool,
    /// Largest message the server accepts, if it advertises one.
    pub max_message_size: Option<u64>,
}
