//! SMTP probe session.
//!
//! Speaks just enough ESMTP to authenticate and learn the advertised
//! message size limit (RFC 1870 `SIZE`). Nothing is ever sent.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use lettre::transport::smtp::authentication::{Credentials as SaslCredentials, Mechanism};
use lettre::transport::smtp::extension::ClientId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::tls::{self, timed};
use super::{Credentials, MailSession, ProviderError, Result};
use crate::domain::{Endpoint, RemoteFolder};

/// A parsed, possibly multi-line, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join(" "))
    }
}

/// An authenticated SMTP session.
pub struct SmtpSession {
    stream: BufStream<TlsStream<TcpStream>>,
    max_size: Option<u64>,
    timeout: Duration,
}

impl SmtpSession {
    /// Connects to `endpoint`, says EHLO and authenticates.
    pub async fn connect(
        endpoint: &Endpoint,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        tracing::debug!(host = %endpoint.host, port = endpoint.port, "Connecting to SMTP server");

        let client_id = ClientId::default().to_string();
        let tcp = tls::connect_tcp(endpoint, timeout).await?;

        let tcp = if endpoint.starttls {
            let mut plain = BufStream::new(tcp);
            greeting(&mut plain, timeout).await?;
            ehlo(&mut plain, &client_id, timeout).await?;
            let reply = command(&mut plain, "STARTTLS", timeout).await?;
            if reply.code != 220 {
                return Err(ProviderError::Protocol(format!("STARTTLS refused: {}", reply)));
            }
            plain.into_inner()
        } else {
            tcp
        };

        let mut stream = BufStream::new(tls::upgrade(tcp, &endpoint.host, timeout).await?);
        if !endpoint.starttls {
            greeting(&mut stream, timeout).await?;
        }

        let capabilities = ehlo(&mut stream, &client_id, timeout).await?;
        let max_size = capabilities.lines.iter().find_map(|line| parse_size(line));

        authenticate(&mut stream, credentials, timeout).await?;

        tracing::debug!(host = %endpoint.host, user = %credentials.user, ?max_size, "SMTP session established");
        Ok(Self {
            stream,
            max_size,
            timeout,
        })
    }
}

#[async_trait]
impl MailSession for SmtpSession {
    async fn list_folders(&mut self) -> Result<Vec<RemoteFolder>> {
        Err(ProviderError::Unsupported(
            "SMTP sessions have no folders".to_string(),
        ))
    }

    async fn max_message_size(&mut self) -> Result<Option<u64>> {
        Ok(self.max_size)
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let timeout = self.timeout;
        let reply = command(&mut self.stream, "QUIT", timeout).await?;
        if reply.code != 221 {
            tracing::debug!(%reply, "Unexpected QUIT reply");
        }
        timed(timeout, "SMTP shutdown", async {
            self.stream
                .shutdown()
                .await
                .map_err(|e| ProviderError::Connection(format!("shutdown failed: {}", e)))
        })
        .await
    }
}

async fn greeting<S>(stream: &mut BufStream<S>, timeout: Duration) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reply = timed(timeout, "SMTP greeting", read_reply(stream)).await?;
    if reply.code != 220 {
        return Err(ProviderError::Protocol(format!("unexpected greeting: {}", reply)));
    }
    Ok(reply)
}

async fn ehlo<S>(stream: &mut BufStream<S>, client_id: &str, timeout: Duration) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reply = command(stream, &format!("EHLO {}", client_id), timeout).await?;
    if !reply.is_positive() {
        return Err(ProviderError::Protocol(format!("EHLO refused: {}", reply)));
    }
    Ok(reply)
}

async fn authenticate<S>(
    stream: &mut BufStream<S>,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mechanism, name, secret) = if credentials.auth_type.is_bearer() {
        (Mechanism::Xoauth2, "XOAUTH2", credentials.access_token())
    } else {
        (Mechanism::Plain, "PLAIN", credentials.secret.clone())
    };

    let sasl = SaslCredentials::new(credentials.user.clone(), secret);
    let response = mechanism
        .response(&sasl, None)
        .map_err(|e| ProviderError::Authentication(format!("SASL {} failed: {}", name, e)))?;

    let mut reply = command(
        stream,
        &format!("AUTH {} {}", name, BASE64_STANDARD.encode(response)),
        timeout,
    )
    .await?;

    // XOAUTH2 failures arrive as a 334 challenge that must be answered empty.
    if reply.code == 334 {
        reply = command(stream, "", timeout).await?;
    }

    if reply.code != 235 {
        return Err(ProviderError::Authentication(format!(
            "SMTP AUTH {} rejected: {}",
            name, reply
        )));
    }
    Ok(())
}

async fn command<S>(stream: &mut BufStream<S>, line: &str, timeout: Duration) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let verb = line.split_whitespace().next().unwrap_or("<empty>").to_string();

    timed(timeout, &format!("SMTP {}", verb), async {
        stream
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .map_err(|e| ProviderError::Connection(format!("write failed: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| ProviderError::Connection(format!("write failed: {}", e)))?;
        read_reply(stream).await
    })
    .await
}

async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut code = None;
    let mut lines = Vec::new();

    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ProviderError::Connection(format!("read failed: {}", e)))?;
        if read == 0 {
            return Err(ProviderError::Connection(
                "server closed the connection".to_string(),
            ));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let line_code: u16 = line
            .get(..3)
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| ProviderError::Protocol(format!("malformed reply line: {:?}", line)))?;

        if *code.get_or_insert(line_code) != line_code {
            return Err(ProviderError::Protocol(format!(
                "reply code changed mid-reply: {:?}",
                line
            )));
        }

        lines.push(line.get(4..).unwrap_or_default().to_string());

        if line.as_bytes().get(3) != Some(&b'-') {
            return Ok(Reply {
                code: line_code,
                lines,
            });
        }
    }
}

/// Parses an EHLO `SIZE` keyword line. Zero means no fixed limit.
fn parse_size(line: &str) -> Option<u64> {
    let mut words = line.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("SIZE") {
        return None;
    }
    words.next()?.parse().ok().filter(|size| *size > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_multiline_reply() {
        let raw = b"250-smtp.gmail.com at your service\r\n250-SIZE 35882577\r\n250 AUTH XOAUTH2 PLAIN\r\n";
        let mut reader = BufReader::new(&raw[..]);

        let reply = read_reply(&mut reader).await.unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(
            reply.lines,
            vec![
                "smtp.gmail.com at your service".to_string(),
                "SIZE 35882577".to_string(),
                "AUTH XOAUTH2 PLAIN".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn reads_bare_code() {
        let mut reader = BufReader::new(&b"235\r\n"[..]);
        let reply = read_reply(&mut reader).await.unwrap();
        assert_eq!(reply.code, 235);
        assert!(reply.is_positive());
    }

    #[tokio::test]
    async fn closed_connection_is_an_error() {
        let mut reader = BufReader::new(&b"250-partial\r\n"[..]);
        let result = read_reply(&mut reader).await;
        assert!(matches!(result, Err(ProviderError::Connection(_))));
    }

    #[tokio::test]
    async fn garbage_is_a_protocol_error() {
        let mut reader = BufReader::new(&b"hello\r\n"[..]);
        let result = read_reply(&mut reader).await;
        assert!(matches!(result, Err(ProviderError::Protocol(_))));
    }

    #[test]
    fn size_keyword() {
        assert_eq!(parse_size("SIZE 35882577"), Some(35882577));
        assert_eq!(parse_size("size 1024"), Some(1024));
        assert_eq!(parse_size("SIZE 0"), None);
        assert_eq!(parse_size("SIZE"), None);
        assert_eq!(parse_size("8BITMIME"), None);
        assert_eq!(parse_size("smtp.gmail.com at your service"), None);
    }

    #[test]
    fn reply_display() {
        let reply = Reply {
            code: 535,
            lines: vec!["5.7.8".to_string(), "Bad credentials".to_string()],
        };
        assert_eq!(reply.to_string(), "535 5.7.8 Bad credentials");
    }
}
