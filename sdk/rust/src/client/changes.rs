//! Change-log access
//!
//! The change log is addressed by exclusive change id; `-1` is the service's
//! negative-index convention for the newest entry. Forward paging treats a
//! short page (fewer entries than requested) as end-of-log without
//! re-verification.

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

use super::ServiceClient;

/// One change-log row.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEntry {
    pub id: i64,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ServiceClient {
    /// Newest change-log entry, if the log is non-empty.
    pub async fn get_latest_change(&self, model: &str) -> Result<Option<ChangeEntry>> {
        let entries = self.fetch_changes(model, -1, None).await?;
        Ok(entries.into_iter().next())
    }

    /// Up to `limit` changes after (exclusive) `since_id`.
    pub async fn get_changes(
        &self,
        model: &str,
        since_id: i64,
        limit: u32,
    ) -> Result<Vec<ChangeEntry>> {
        self.fetch_changes(model, since_id, Some(limit)).await
    }

    /// Pages forward from (exclusive) `since_id`, `page_size` entries at a
    /// time; a short page ends the stream.
    pub fn stream_changes<'a>(
        &'a self,
        model: &'a str,
        since_id: i64,
        page_size: u32,
    ) -> impl Stream<Item = Result<ChangeEntry>> + use<'a> {
        let page_size = page_size.max(1);
        async_stream::try_stream! {
            let mut since = since_id;
            loop {
                let entries = self.fetch_changes(model, since, Some(page_size)).await?;
                let short_page = (entries.len() as u64) < u64::from(page_size);
                if let Some(last) = entries.last() {
                    since = last.id;
                }
                for entry in entries {
                    yield entry;
                }
                if short_page {
                    break;
                }
            }
        }
    }

    async fn fetch_changes(
        &self,
        model: &str,
        since_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<ChangeEntry>> {
        let query = match limit {
            Some(n) => format!("?limit({n})"),
            None => String::new(),
        };
        let url = format!(
            "{}/{}/:changes/{}{}",
            self.config.base_url, model, since_id, query
        );
        let value = self.get_json(&url).await?;
        let listing: super::Listing = serde_json::from_value(value)
            .map_err(|e| Error::UnexpectedResponse(format!("malformed change listing: {e}")))?;
        listing
            .data
            .into_iter()
            .map(|entry| {
                serde_json::from_value(entry)
                    .map_err(|e| Error::UnexpectedResponse(format!("malformed change entry: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_entry_deserializes_with_optional_fields() {
        let entry: ChangeEntry = serde_json::from_value(serde_json::json!({
            "id": 42,
            "operation": "update",
            "record_id": "rec-1",
            "timestamp": "2024-01-15T10:30:00Z",
            "data": {"price": 10}
        }))
        .unwrap();
        assert_eq!(entry.id, 42);
        assert_eq!(entry.operation.as_deref(), Some("update"));

        let minimal: ChangeEntry = serde_json::from_value(serde_json::json!({"id": 7})).unwrap();
        assert_eq!(minimal.id, 7);
        assert!(minimal.data.is_none());
    }
}
