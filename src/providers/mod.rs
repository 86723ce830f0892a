//! Mail provider access.
//!
//! This module contains the traits and implementations used to reach a mail
//! provider during provisioning:
//!
//! - [`directory`] - Known providers by domain
//! - [`token`] - Access token acquisition and OAuth state
//! - [`NetworkConnector`] - IMAP and SMTP probe sessions over TLS

mod connector;
pub mod directory;
mod imap;
mod smtp;
mod tls;
pub mod token;
mod traits;

pub use connector::NetworkConnector;
pub use directory::{BuiltinDirectory, Discovery, ProviderDirectory};
pub use imap::ImapSession;
pub use smtp::SmtpSession;
pub use token::{
    acquire_token, OAuthState, RefreshCredentials, RefreshTokenSource, TokenError, TokenSource,
    GET_TOKEN_TIMEOUT,
};
pub use traits::{Credentials, MailConnector, MailSession, Protocol, ProviderError, Result};
