//! OAuth client-credentials flow for the eBay APIs.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::EbayError;

const TOKEN_ENDPOINT: &str = "https://api.ebay.com/identity/v1/oauth2/token";
const OAUTH_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";

/// A token is treated as expired this long before its real expiry, so an
/// in-flight request never crosses the boundary mid-call.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// A cached application access token.
#[derive(Debug, Clone)]
pub struct Token {
    /// Bearer token for Browse API calls (also accepted by the Shopping API
    /// as an IAF token).
    pub access_token: SecretString,
    /// Instant at which eBay will stop accepting the token.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Whether the token should be refreshed rather than used at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(EXPIRY_BUFFER_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Exchanges client credentials for an application access token.
///
/// `now` is the instant the expiry countdown starts from; callers pass
/// `Utc::now()` in production and a fixed instant in tests.
#[instrument(skip(client, client_secret))]
pub async fn fetch_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &SecretString,
    now: DateTime<Utc>,
) -> Result<Token, EbayError> {
    let response = client
        .post(TOKEN_ENDPOINT)
        .basic_auth(client_id, Some(client_secret.expose_secret()))
        .form(&[
            ("grant_type", "client_credentials"),
            ("scope", OAUTH_SCOPE),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(EbayError::Auth(format!("HTTP {status}: {body}")));
    }

    let body: TokenResponse = response.json().await?;
    let expires_at = now + Duration::seconds(body.expires_in);
    debug!(%expires_at, "Obtained eBay access token");

    Ok(Token {
        access_token: SecretString::from(body.access_token),
        expires_at,
    })
}
