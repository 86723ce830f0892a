//! Known mail provider lookup.
//!
//! The built-in table covers the large consumer providers. Entries from
//! configuration are consulted first so a user can override any of them.

use super::{ProviderError, Result};
use crate::domain::{Endpoint, ProviderConfig};

/// Which provider sources a lookup may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discovery {
    /// Configured entries first, then the built-in table.
    #[default]
    All,
    /// Only the built-in table.
    Builtin,
    /// Only configured entries.
    Configured,
}

/// Resolves a mail domain to its provider configuration.
pub trait ProviderDirectory: Send + Sync {
    /// Looks up the provider serving `domain`.
    fn resolve(&self, domain: &str, discovery: Discovery) -> Result<ProviderConfig>;
}

/// Directory backed by the built-in table and configured overrides.
#[derive(Debug, Clone)]
pub struct BuiltinDirectory {
    configured: Vec<ProviderConfig>,
    builtin: Vec<ProviderConfig>,
}

impl BuiltinDirectory {
    /// Creates a directory with only the built-in providers.
    pub fn new() -> Self {
        Self::with_configured(Vec::new())
    }

    /// Creates a directory that consults `configured` before the built-ins.
    pub fn with_configured(configured: Vec<ProviderConfig>) -> Self {
        Self {
            configured,
            builtin: builtin_providers(),
        }
    }

    /// Returns the built-in providers.
    pub fn builtin(&self) -> &[ProviderConfig] {
        &self.builtin
    }
}

impl Default for BuiltinDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderDirectory for BuiltinDirectory {
    fn resolve(&self, domain: &str, discovery: Discovery) -> Result<ProviderConfig> {
        let configured = matches!(discovery, Discovery::All | Discovery::Configured)
            .then_some(self.configured.iter())
            .into_iter()
            .flatten();
        let builtin = matches!(discovery, Discovery::All | Discovery::Builtin)
            .then_some(self.builtin.iter())
            .into_iter()
            .flatten();

        configured
            .chain(builtin)
            .find(|provider| provider.serves(domain))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("no provider for domain {}", domain)))
    }
}

fn provider(name: &str, domains: &[&str], imap: Endpoint, smtp: Endpoint) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        imap,
        smtp,
    }
}

fn builtin_providers() -> Vec<ProviderConfig> {
    vec![
        provider(
            "Gmail",
            &["gmail.com", "googlemail.com"],
            Endpoint::tls("imap.gmail.com", 993),
            Endpoint::tls("smtp.gmail.com", 465),
        ),
        provider(
            "Outlook",
            &["outlook.com", "hotmail.com", "live.com", "msn.com"],
            Endpoint::tls("outlook.office365.com", 993),
            Endpoint::starttls("smtp-mail.outlook.com", 587),
        ),
        provider(
            "Yahoo",
            &["yahoo.com", "ymail.com", "rocketmail.com"],
            Endpoint::tls("imap.mail.yahoo.com", 993),
            Endpoint::tls("smtp.mail.yahoo.com", 465),
        ),
        provider(
            "AOL",
            &["aol.com"],
            Endpoint::tls("imap.aol.com", 993),
            Endpoint::tls("smtp.aol.com", 465),
        ),
        provider(
            "iCloud",
            &["icloud.com", "me.com", "mac.com"],
            Endpoint::tls("imap.mail.me.com", 993),
            Endpoint::starttls("smtp.mail.me.com", 587),
        ),
        provider(
            "Fastmail",
            &["fastmail.com", "fastmail.fm", "messagingengine.com"],
            Endpoint::tls("imap.fastmail.com", 993),
            Endpoint::tls("smtp.fastmail.com", 465),
        ),
    ]
}
