//! Lazy page streaming with optional rate-limit retry
//!
//! Streams are pull-based: nothing is fetched until the consumer polls, and
//! dropping the stream cancels it. Both variants re-request with the prior
//! page's continuation cursor at each page boundary and stop when the
//! response carries no cursor.

use std::time::Duration;

use futures::Stream;
use serde_json::Value;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::query::Query;

use super::ServiceClient;

impl ServiceClient {
    /// Unbounded, forward-only lazy sequence of records, restartable only
    /// from the beginning. Token validity is re-checked before every page
    /// fetch, so long traversals never fail on a token that expired after
    /// the stream began.
    pub fn stream<'a>(
        &'a self,
        model: &'a str,
        query: &Query,
    ) -> impl Stream<Item = Result<Value>> + use<'a> {
        let base_query = query.to_query_string();
        async_stream::try_stream! {
            let mut cursor: Option<String> = None;
            loop {
                let listing = self.fetch_page(model, &base_query, cursor.as_deref()).await?;
                let next = listing.page.and_then(|p| p.next);
                for record in listing.data {
                    yield record;
                }
                match next {
                    Some(c) => cursor = Some(c),
                    None => break,
                }
            }
        }
    }

    /// Like [`ServiceClient::stream`], but a 429 on a page fetch is retried
    /// with exponential backoff — the same page, not the whole stream. Once
    /// the attempt ceiling is exceeded (or when retry is disabled), the
    /// propagated rate-limit error reports how many records were already
    /// delivered, so the failure is partial rather than total. Every other
    /// error class propagates immediately, untried.
    pub fn stream_with_retry<'a>(
        &'a self,
        model: &'a str,
        query: &Query,
        retry: RetryConfig,
    ) -> impl Stream<Item = Result<Value>> + use<'a> {
        let base_query = query
            .clone()
            .limit(u64::from(retry.page_size))
            .to_query_string();
        async_stream::try_stream! {
            let mut cursor: Option<String> = None;
            let mut delivered: u64 = 0;
            loop {
                let mut attempt: u32 = 0;
                let listing = loop {
                    match self.fetch_page(model, &base_query, cursor.as_deref()).await {
                        Ok(listing) => break listing,
                        Err(Error::RateLimited { .. }) => {
                            attempt += 1;
                            if !retry.retry_on_rate_limit || attempt >= retry.max_attempts {
                                Err(Error::RateLimited {
                                    attempts: attempt,
                                    records_delivered: delivered,
                                })?;
                            }
                            let delay =
                                backoff_delay(attempt, retry.initial_backoff, retry.max_backoff);
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "rate limited, retrying page"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        Err(e) => Err(e)?,
                    }
                };
                let next = listing.page.and_then(|p| p.next);
                for record in listing.data {
                    delivered += 1;
                    yield record;
                }
                match next {
                    Some(c) => cursor = Some(c),
                    None => break,
                }
            }
        }
    }
}

/// `min(initial × 2^(attempt−1), max)`.
fn backoff_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    initial.saturating_mul(factor).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let initial = Duration::from_millis(1000);
        let max = Duration::from_millis(30_000);
        assert_eq!(backoff_delay(1, initial, max), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, initial, max), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, initial, max), Duration::from_millis(4000));
        assert_eq!(backoff_delay(6, initial, max), Duration::from_millis(30_000));
    }

    #[test]
    fn backoff_is_capped_at_max() {
        let initial = Duration::from_millis(1000);
        let max = Duration::from_millis(2500);
        assert_eq!(backoff_delay(3, initial, max), max);
        assert_eq!(backoff_delay(30, initial, max), max);
    }
}
