//! Provider connection parameters.
//!
//! A [`ProviderConfig`] describes how to reach a named mail service. It is
//! immutable once resolved and looked up by domain.

use serde::{Deserialize, Serialize};

use super::EncryptionMode;

/// Connection parameters for a named mail service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Human-readable provider name, e.g. "Gmail".
    pub name: String,
    /// Mail domains served by this provider.
    pub domains: Vec<String>,
    /// Incoming (IMAP) endpoint.
    pub imap: Endpoint,
    /// Outgoing (SMTP) endpoint.
    pub smtp: Endpoint,
}

impl ProviderConfig {
    /// Returns true if this provider serves the given domain.
    pub fn serves(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
    }
}

/// A single server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Whether the endpoint expects a plaintext connection upgraded with
    /// STARTTLS. Otherwise TLS is used from the first byte.
    #[serde(default)]
    pub starttls: bool,
}

impl Endpoint {
    /// Creates an implicit-TLS endpoint.
    pub fn tls(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            starttls: false,
        }
    }

    /// Creates a STARTTLS endpoint.
    pub fn starttls(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            starttls: true,
        }
    }

    /// Returns the transport mode this endpoint uses.
    pub fn encryption(&self) -> EncryptionMode {
        EncryptionMode::from_starttls(self.starttls)
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
