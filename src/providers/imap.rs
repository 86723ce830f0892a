//! IMAP probe session.
//!
//! Connects with implicit TLS or STARTTLS, authenticates with LOGIN or
//! XOAUTH2, and lists folders with their special-use attributes.

use std::time::Duration;

use async_imap::types::NameAttribute;
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use super::tls::{self, timed};
use super::{Credentials, MailSession, ProviderError, Result};
use crate::domain::{Endpoint, RemoteFolder};

type ImapClient = async_imap::Client<Compat<TlsStream<TcpStream>>>;
type Session = async_imap::Session<Compat<TlsStream<TcpStream>>>;

/// SASL XOAUTH2 authenticator.
///
/// The credentials go out once. A later challenge carries the server's error
/// details and is answered with an empty line so the server can fail the
/// command.
struct XOAuth2 {
    user: String,
    access_token: String,
    sent: bool,
}

impl XOAuth2 {
    fn new(user: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            access_token: access_token.into(),
            sent: false,
        }
    }
}

impl async_imap::Authenticator for XOAuth2 {
    type Response = String;

    fn process(&mut self, _data: &[u8]) -> Self::Response {
        if std::mem::replace(&mut self.sent, true) {
            return String::new();
        }
        format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.user, self.access_token
        )
    }
}

/// An authenticated IMAP session.
pub struct ImapSession {
    session: Session,
    timeout: Duration,
}

impl ImapSession {
    /// Connects to `endpoint` and authenticates.
    pub async fn connect(
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        tracing::debug!(host = %endpoint.host, port = endpoint.port, "Connecting to IMAP server");

        let client = Self::open(endpoint, timeout).await?;
        let session = timed(timeout, "IMAP authentication", Self::login(client, credentials)).await?;

        tracing::debug!(host = %endpoint.host, user = %credentials.user, "IMAP session established");
        Ok(Self { session, timeout })
    }

    async fn open(endpoint: &Endpoint, timeout: Duration) -> Result<ImapClient> {
        let tcp = tls::connect_tcp(endpoint, timeout).await?;

        let tcp = if endpoint.starttls {
            let mut client = async_imap::Client::new(tcp.compat());
            timed(timeout, "IMAP STARTTLS", async {
                client
                    .run_command_and_check_ok("STARTTLS", None)
                    .await
                    .map_err(|e| ProviderError::Protocol(format!("STARTTLS failed: {}", e)))
            })
            .await?;
            client.into_inner().into_inner()
        } else {
            tcp
        };

        let tls_stream = tls::upgrade(tcp, &endpoint.host, timeout).await?;
        Ok(async_imap::Client::new(tls_stream.compat()))
    }

    async fn login(client: ImapClient, credentials: &Credentials) -> Result<Session> {
        if credentials.auth_type.is_bearer() {
            let auth = XOAuth2::new(&credentials.user, credentials.access_token());
            client
                .authenticate("XOAUTH2", auth)
                .await
                .map_err(|(e, _)| ProviderError::Authentication(format!("IMAP XOAUTH2 failed: {}", e)))
        } else {
            client
                .login(&credentials.user, &credentials.secret)
                .await
                .map_err(|(e, _)| ProviderError::Authentication(format!("IMAP login failed: {}", e)))
        }
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn list_folders(&mut self) -> Result<Vec<RemoteFolder>> {
        let session = &mut self.session;
        let names: Vec<_> = timed(self.timeout, "IMAP LIST", async {
            let stream = session
                .list(Some(""), Some("*"))
                .await
                .map_err(|e| ProviderError::Protocol(format!("LIST failed: {}", e)))?;
            stream
                .try_collect()
                .await
                .map_err(|e| ProviderError::Protocol(format!("LIST failed: {}", e)))
        })
        .await?;

        let mut folders = Vec::with_capacity(names.len());
        for name in &names {
            let attributes = name.attributes();
            if attributes
                .iter()
                .any(|attr| matches!(attr, NameAttribute::NoSelect))
            {
                tracing::debug!(folder = %name.name(), "Skipping non-selectable folder");
                continue;
            }

            let folder = RemoteFolder::new(name.name(), attributes.iter().filter_map(special_use))
                .with_delimiter(name.delimiter().map(str::to_string));
            folders.push(folder);
        }

        tracing::debug!(count = folders.len(), "Listed IMAP folders");
        Ok(folders)
    }

    async fn max_message_size(&mut self) -> Result<Option<u64>> {
        Ok(None)
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let timeout = self.timeout;
        timed(timeout, "IMAP LOGOUT", async {
            self.session
                .logout()
                .await
                .map_err(|e| ProviderError::Connection(format!("LOGOUT failed: {}", e)))
        })
        .await
    }
}

/// Maps a LIST attribute to its RFC 6154 spelling.
fn special_use<'a>(attr: &'a NameAttribute<'_>) -> Option<&'a str> {
    match attr {
        NameAttribute::All => Some("\\All"),
        NameAttribute::Archive => Some("\\Archive"),
        NameAttribute::Drafts => Some("\\Drafts"),
        NameAttribute::Flagged => Some("\\Flagged"),
        NameAttribute::Junk => Some("\\Junk"),
        NameAttribute::Sent => Some("\\Sent"),
        NameAttribute::Trash => Some("\\Trash"),
        NameAttribute::Extension(label) => Some(label.as_ref()),
        _ => None,
    }
}
