//! Remote-access client
//!
//! One `ServiceClient` per configured service. Every request re-checks the
//! cached bearer token, so long-running operations never ride an expired
//! token. Status codes map onto the error taxonomy in one place
//! (`check_status`); 429 surfaces as a rate-limit error that the streaming
//! layer may retry.

mod changes;
mod discover;
mod stream;

pub use changes::ChangeEntry;
pub use discover::{DiscoveredModel, NamespaceItem, NamespaceItemKind};

use serde::Deserialize;
use serde_json::Value;

use crate::auth::TokenCache;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::filter::encode_component;
use crate::query::Query;

use discover::RequestSpacer;

/// Listing envelope returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    #[serde(rename = "_data", default)]
    pub data: Vec<Value>,
    #[serde(rename = "_page", default)]
    pub page: Option<PageInfo>,
}

/// Continuation cursor carrier; a missing `next` ends the listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub next: Option<String>,
}

/// Client for one remote tabular data service.
pub struct ServiceClient {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: TokenCache,
    spacer: RequestSpacer,
}

impl ServiceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("gridbase-rust/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = TokenCache::new(http.clone(), &config);
        let spacer = RequestSpacer::new(config.discovery.min_request_interval);
        Ok(Self {
            http,
            config,
            tokens,
            spacer,
        })
    }

    /// Token cache for this client, for explicit `refresh()`/`clear()`.
    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// One listing round trip; returns the bare records.
    pub async fn get_all(&self, model: &str, query: &Query) -> Result<Vec<Value>> {
        Ok(self.get_all_raw(model, query).await?.data)
    }

    /// One listing round trip; returns the full envelope including the
    /// continuation cursor.
    pub async fn get_all_raw(&self, model: &str, query: &Query) -> Result<Listing> {
        self.fetch_page(model, &query.to_query_string(), None).await
    }

    /// Fetches a single record by id.
    pub async fn get_by_id(&self, model: &str, id: &str) -> Result<Value> {
        self.get_json(&format!("{}/{}/{}", self.config.base_url, model, id))
            .await
    }

    /// Appends a count directive and extracts the scalar from the
    /// `{_data: [{"count()": n}]}` envelope.
    pub async fn count(&self, model: &str, query: &Query) -> Result<u64> {
        let counted = query.clone().count();
        let listing = self
            .fetch_page(model, &counted.to_query_string(), None)
            .await?;
        listing
            .data
            .first()
            .and_then(|row| row.get("count()"))
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::UnexpectedResponse("missing count() scalar".into()))
    }

    /// Fetches the summary document for one field.
    pub async fn summary(&self, model: &str, field: &str) -> Result<Value> {
        self.get_json(&format!(
            "{}/{}/:summary/{}",
            self.config.base_url, model, field
        ))
        .await
    }

    pub(crate) async fn fetch_page(
        &self,
        model: &str,
        base_query: &str,
        cursor: Option<&str>,
    ) -> Result<Listing> {
        let query = match cursor {
            Some(cursor) => append_cursor(base_query, cursor),
            None => base_query.to_string(),
        };
        let url = format!("{}/{}{}", self.config.base_url, model, query);
        let value = self.get_json(&url).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::UnexpectedResponse(format!("malformed listing envelope: {e}")))
    }

    pub(crate) async fn get_json(&self, url: &str) -> Result<Value> {
        let token = self.tokens.token().await?;
        tracing::trace!(url, "GET");
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Appends the continuation cursor as a trailing `page(...)` clause.
fn append_cursor(base_query: &str, cursor: &str) -> String {
    let clause = format!("page({})", encode_component(cursor));
    if base_query.is_empty() {
        format!("?{clause}")
    } else {
        format!("{base_query}&{clause}")
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        429 => Err(Error::RateLimited {
            attempts: 1,
            records_delivered: 0,
        }),
        code => {
            let message = error_message(response).await;
            match code {
                400 => Err(Error::Validation(message)),
                401 | 403 => Err(Error::Authentication(message)),
                404 => Err(Error::NotFound(message)),
                _ => Err(Error::Remote {
                    status: code,
                    message,
                }),
            }
        }
    }
}

/// Pulls a human-readable message out of an `{_error: {message}}` body,
/// falling back to the status reason.
async fn error_message(response: reqwest::Response) -> String {
    let fallback = response
        .status()
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => envelope
            .error
            .and_then(|e| e.message)
            .unwrap_or(fallback),
        Err(_) => fallback,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(rename = "_error", default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_cursor_to_empty_query() {
        assert_eq!(append_cursor("", "abc"), "?page(abc)");
    }

    #[test]
    fn append_cursor_to_existing_query() {
        assert_eq!(
            append_cursor("?limit(10)", "abc"),
            "?limit(10)&page(abc)"
        );
    }

    #[test]
    fn cursor_content_is_percent_encoded() {
        assert_eq!(append_cursor("", "a&b=c"), "?page(a%26b%3Dc)");
    }

    #[test]
    fn listing_envelope_deserializes() {
        let listing: Listing = serde_json::from_value(serde_json::json!({
            "_data": [{"a": 1}],
            "_page": {"next": "cursor-2"}
        }))
        .unwrap();
        assert_eq!(listing.data.len(), 1);
        assert_eq!(listing.page.unwrap().next.as_deref(), Some("cursor-2"));
    }

    #[test]
    fn listing_envelope_tolerates_missing_page() {
        let listing: Listing =
            serde_json::from_value(serde_json::json!({"_data": []})).unwrap();
        assert!(listing.data.is_empty());
        assert!(listing.page.is_none());
    }
}
