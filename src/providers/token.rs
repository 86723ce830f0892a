//! Access token acquisition.
//!
//! Tokens are retrieved through a [`TokenSource`] with a fixed deadline. The
//! acquired token is wrapped in an [`OAuthState`] whose JSON form is what
//! gets stored as the account credential.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long to wait for a token before giving up.
pub const GET_TOKEN_TIMEOUT: Duration = Duration::from_secs(20);

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Errors that can occur while acquiring a token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token source did not answer in time.
    #[error("no token received within {0:?}")]
    Timeout(Duration),

    /// The token source answered without a token.
    #[error("the account manager returned no token")]
    NoToken,

    /// The account is enrolled in a program that blocks third-party access.
    #[error("access is disabled for this account, possibly because of advanced protection")]
    ServiceDisabled,

    /// The token endpoint refused the request.
    #[error("token request rejected: {0}")]
    Rejected(String),

    /// The token endpoint could not be reached.
    #[error("token request failed: {0}")]
    Network(String),
}

/// Something that can hand out access tokens for an account.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a fresh access token for `account_name`.
    async fn token(&self, account_name: &str) -> Result<String, TokenError>;
}

/// Acquires a token, failing with [`TokenError::Timeout`] after `timeout`.
pub async fn acquire_token(
    source: &dyn TokenSource,
    account_name: &str,
    timeout: Duration,
) -> Result<OAuthState, TokenError> {
    tracing::info!(account = %account_name, "Requesting token");

    let token = tokio::time::timeout(timeout, source.token(account_name))
        .await
        .map_err(|_| TokenError::Timeout(timeout))??;

    if token.trim().is_empty() {
        return Err(TokenError::NoToken);
    }

    tracing::info!(account = %account_name, "Got token");
    Ok(OAuthState::new(token))
}

/// A token together with when it was acquired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    /// Bearer access token.
    pub token: String,
    /// When the token was acquired.
    pub acquired: DateTime<Utc>,
}

impl OAuthState {
    /// Wraps a freshly acquired token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            acquired: Utc::now(),
        }
    }

    /// Serializes the state into the form stored as an account credential.
    pub fn to_secret(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Reads a stored credential.
    ///
    /// A secret that is not a serialized state is taken as a bare token.
    pub fn from_secret(secret: &str) -> Self {
        serde_json::from_str(secret).unwrap_or_else(|_| Self::new(secret))
    }
}

/// OAuth client credentials used to mint access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshCredentials {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// [`TokenSource`] that exchanges a refresh token at an OAuth token endpoint.
pub struct RefreshTokenSource {
    client: reqwest::Client,
    credentials: RefreshCredentials,
    token_url: String,
}

impl RefreshTokenSource {
    /// Creates a source using Google's token endpoint.
    pub fn new(credentials: RefreshCredentials) -> Self {
        Self::with_token_url(credentials, GOOGLE_TOKEN_URL)
    }

    /// Creates a source using a custom token endpoint.
    pub fn with_token_url(credentials: RefreshCredentials, token_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            token_url: token_url.into(),
        }
    }

    /// Returns the token endpoint in use.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn token(&self, account_name: &str) -> Result<String, TokenError> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(account = %account_name, %status, "Token refresh refused");
            return Err(classify_token_error(&body));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::Rejected(format!("unreadable token response: {}", e)))?;

        token_response.access_token.ok_or(TokenError::NoToken)
    }
}

fn classify_token_error(body: &str) -> TokenError {
    let parsed: TokenErrorResponse = serde_json::from_str(body).unwrap_or_default();

    if parsed.error.eq_ignore_ascii_case("ServiceDisabled")
        || parsed.error_description.contains("ServiceDisabled")
    {
        return TokenError::ServiceDisabled;
    }

    match (parsed.error.is_empty(), parsed.error_description.is_empty()) {
        (true, _) => TokenError::Rejected(body.trim().to_string()),
        (false, true) => TokenError::Rejected(parsed.error),
        (false, false) => {
            TokenError::Rejected(format!("{}: {}", parsed.error, parsed.error_description))
        }
    }
}
