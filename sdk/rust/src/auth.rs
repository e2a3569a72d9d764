//! OAuth client-credentials token cache
//!
//! State machine: empty until the first `token()` call, then a cached token
//! that is replaced wholesale on every refresh. A token is treated as
//! expired five minutes before its nominal expiry so in-flight requests
//! never ride a token that dies mid-call. No cross-call locking is held
//! during the exchange; concurrent refreshes are idempotent and the last
//! writer wins.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Tokens are treated as expired this long before their nominal expiry.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

/// One cached bearer token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Valid only while `now` is more than the expiry margin before
    /// `expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client-credentials token cache.
pub struct TokenCache {
    http: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub(crate) fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            auth_url: config.auth_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, refreshing when absent or inside the
    /// expiry margin.
    pub async fn token(&self) -> Result<String> {
        if let Some(cached) = self.cached.lock().as_ref()
            && cached.is_valid_at(Utc::now())
        {
            return Ok(cached.access_token.clone());
        }
        self.refresh().await
    }

    /// Forces a client-credentials exchange and replaces the cache
    /// wholesale.
    pub async fn refresh(&self) -> Result<String> {
        tracing::debug!(url = %self.auth_url, "refreshing access token");
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(format!("{}/auth/token", self.auth_url))
            .header(reqwest::header::AUTHORIZATION, format!("Basic {credentials}"))
            .form(&[
                ("grant_type", "client_credentials".to_string()),
                ("scope", self.scopes.join(" ")),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<TokenErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("token endpoint returned status {status}"));
            return Err(Error::Authentication(detail));
        }

        let token: TokenResponse = response.json().await?;
        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        *self.cached.lock() = Some(cached);
        Ok(token.access_token)
    }

    /// Drops any cached token; the next `token()` call refreshes.
    pub fn clear(&self) {
        *self.cached.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn token_expires_exactly_at_the_margin_boundary() {
        let fetched_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let expires_in_secs = 3600;
        let token = CachedToken {
            access_token: "tok".into(),
            expires_at: fetched_at + Duration::seconds(expires_in_secs),
        };

        // Invalid at T + E*1000 - 300000 ms, valid one millisecond earlier.
        let boundary = fetched_at + Duration::milliseconds(expires_in_secs * 1000 - 300_000);
        assert!(!token.is_valid_at(boundary));
        assert!(token.is_valid_at(boundary - Duration::milliseconds(1)));
    }

    #[test]
    fn short_lived_token_is_never_valid() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let token = CachedToken {
            access_token: "tok".into(),
            expires_at: now + Duration::seconds(120),
        };
        assert!(!token.is_valid_at(now));
    }
}
