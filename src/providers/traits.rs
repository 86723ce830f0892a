//! Mail session trait definitions.
//!
//! Provisioning talks to mail servers only through [`MailConnector`] and the
//! [`MailSession`] it returns. Sessions are short-lived probes: open, ask one
//! question, close.

use std::fmt;

use async_trait::async_trait;

use super::OAuthState;
use crate::domain::{AuthType, Endpoint, RemoteFolder};

/// Result type alias for mail provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur while talking to a mail provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// A network step did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The server answered something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No provider or resource matched the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not available on this kind of session.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Mail protocol spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Imap,
    Smtp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imap => f.write_str("IMAP"),
            Self::Smtp => f.write_str("SMTP"),
        }
    }
}

/// Login credentials for a mail session.
#[derive(Clone)]
pub struct Credentials {
    /// Login user, usually the email address.
    pub user: String,
    /// Password, or a serialized [`OAuthState`] for bearer auth types.
    pub secret: String,
    /// How to authenticate.
    pub auth_type: AuthType,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(user: impl Into<String>, secret: impl Into<String>, auth_type: AuthType) -> Self {
        Self {
            user: user.into(),
            secret: secret.into(),
            auth_type,
        }
    }

    /// Returns the bearer access token carried by the secret.
    pub fn access_token(&self) -> String {
        OAuthState::from_secret(&self.secret).token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("auth_type", &self.auth_type)
            .finish_non_exhaustive()
    }
}

/// Opens authenticated sessions against mail endpoints.
#[async_trait]
pub trait MailConnector: Send + Sync {
    /// Connects to `endpoint` and authenticates with `credentials`.
    async fn connect(
        &self,
        protocol: Protocol,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn MailSession>>;
}

/// An authenticated connection to a mail server.
///
/// Callers must call [`close`](Self::close) on every path once they are done.
#[async_trait]
pub trait MailSession: Send {
    /// Lists every selectable folder on the server.
    async fn list_folders(&mut self) -> Result<Vec<RemoteFolder>>;

    /// Returns the largest message the server accepts, if it advertises one.
    async fn max_message_size(&mut self) -> Result<Option<u64>>;

    /// Ends the session and releases the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}
