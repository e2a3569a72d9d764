//! Namespace discovery with bounded fan-out and request spacing
//!
//! Expands a starting namespace into the flat set of terminal models beneath
//! it. Sibling listings run through `buffer_unordered` so at most
//! `concurrency` requests are in flight, and every discovery request passes
//! the shared spacer, which enforces a minimum interval between request
//! starts.

use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::time::Instant;

use crate::error::{Error, Result};

use super::ServiceClient;

/// One entry of a `:ns` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceItem {
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    pub kind: NamespaceItemKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceItemKind {
    Namespace,
    Model,
}

/// A terminal model found beneath the starting namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModel {
    pub path: String,
    pub title: Option<String>,
    /// The namespace whose listing produced this model.
    pub namespace: String,
}

/// Minimum-spacing limiter measured from the previous request's start.
///
/// Not a token bucket: each acquire schedules itself `interval` after the
/// previously scheduled start and sleeps until then. The schedule slot is
/// claimed under the lock, so concurrent acquirers can never collapse onto
/// the same start time.
pub(crate) struct RequestSpacer {
    interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: Mutex::new(None),
        }
    }

    pub(crate) async fn acquire(&self) {
        let start = {
            let mut last = self.last_start.lock();
            let now = Instant::now();
            let start = match *last {
                Some(prev) => now.max(prev + self.interval),
                None => now,
            };
            *last = Some(start);
            start
        };
        tokio::time::sleep_until(start).await;
    }
}

impl ServiceClient {
    /// Recursively expands `namespace` into the flat set of terminal models
    /// beneath it. At most `discovery.concurrency` sibling listings are in
    /// flight at once, and consecutive requests start at least
    /// `discovery.min_request_interval` apart.
    pub async fn discover_models(&self, namespace: &str) -> Result<Vec<DiscoveredModel>> {
        let concurrency = self.config.discovery.concurrency.max(1);
        let mut frontier = vec![namespace.to_string()];
        let mut models = Vec::new();

        while !frontier.is_empty() {
            let batch = std::mem::take(&mut frontier);
            let listings: Vec<Result<(String, Vec<NamespaceItem>)>> =
                futures::stream::iter(batch.into_iter().map(|ns| async move {
                    let items = self.list_namespace(&ns).await?;
                    Ok((ns, items))
                }))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for result in listings {
                let (ns, items) = result?;
                for item in items {
                    match item.kind {
                        NamespaceItemKind::Model => models.push(DiscoveredModel {
                            path: item.path,
                            title: item.title,
                            namespace: ns.clone(),
                        }),
                        NamespaceItemKind::Namespace => frontier.push(item.path),
                    }
                }
            }
        }

        tracing::debug!(namespace, models = models.len(), "namespace discovery finished");
        Ok(models)
    }

    /// One `:ns` listing, throttled by the shared request spacer.
    pub async fn list_namespace(&self, namespace: &str) -> Result<Vec<NamespaceItem>> {
        self.spacer.acquire().await;
        let url = format!("{}/{}/:ns", self.config.base_url, namespace);
        let value = self.get_json(&url).await?;
        let listing: super::Listing = serde_json::from_value(value)
            .map_err(|e| Error::UnexpectedResponse(format!("malformed namespace listing: {e}")))?;
        listing
            .data
            .into_iter()
            .map(|item| {
                serde_json::from_value(item)
                    .map_err(|e| Error::UnexpectedResponse(format!("malformed namespace item: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn spacer_enforces_minimum_interval_under_contention() {
        let interval = Duration::from_millis(20);
        let spacer = Arc::new(RequestSpacer::new(interval));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let spacer = Arc::clone(&spacer);
                tokio::spawn(async move {
                    spacer.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();

        // Small tolerance for timer wake-up jitter on the recording side;
        // the schedule slots themselves are exactly `interval` apart.
        for pair in starts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= interval - Duration::from_millis(5),
                "requests started {gap:?} apart, expected at least {interval:?}"
            );
        }
    }

    #[tokio::test]
    async fn first_acquire_does_not_wait() {
        let spacer = RequestSpacer::new(Duration::from_millis(500));
        let before = Instant::now();
        spacer.acquire().await;
        assert!(before.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn namespace_item_kind_deserializes_lowercase() {
        let item: NamespaceItem = serde_json::from_value(serde_json::json!({
            "path": "warehouse/inventory",
            "title": "Inventory",
            "kind": "namespace"
        }))
        .unwrap();
        assert_eq!(item.kind, NamespaceItemKind::Namespace);

        let item: NamespaceItem = serde_json::from_value(serde_json::json!({
            "path": "warehouse/inventory/items",
            "kind": "model"
        }))
        .unwrap();
        assert_eq!(item.kind, NamespaceItemKind::Model);
        assert!(item.title.is_none());
    }
}
