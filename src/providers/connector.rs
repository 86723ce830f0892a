//! Network-backed [`MailConnector`].

use std::time::Duration;

use async_trait::async_trait;

use super::imap::ImapSession;
use super::smtp::SmtpSession;
use super::{Credentials, MailConnector, MailSession, Protocol, Result};
use crate::domain::Endpoint;

/// Opens real IMAP and SMTP sessions over TCP.
#[derive(Debug, Clone)]
pub struct NetworkConnector {
    timeout: Duration,
}

impl NetworkConnector {
    /// Default per-step network timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

    /// Creates a connector with the given per-step timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the per-step timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for NetworkConnector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl MailConnector for NetworkConnector {
    async fn connect(
        &self,
        protocol: Protocol,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn MailSession>> {
        let session: Box<dyn MailSession> = match protocol {
            Protocol::Imap => Box::new(ImapSession::connect(endpoint, credentials, self.timeout).await?),
            Protocol::Smtp => Box::new(SmtpSession::connect(endpoint, credentials, self.timeout).await?),
        };
        Ok(session)
    }
}
