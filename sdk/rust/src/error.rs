//! Unified error type for the client
//!
//! One enum covers the whole taxonomy: user-input errors (filter syntax),
//! remote-service errors mapped from HTTP status codes, rate limiting with
//! partial-failure accounting, and transport failures.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed human-typed filter input. Raised immediately, never retried.
    /// The message carries a corrective example.
    #[error("invalid filter expression: {0}")]
    FilterSyntax(String),

    /// The service rejected the request as malformed (HTTP 400).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Credentials were rejected (HTTP 401/403) or the token exchange failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The addressed model or record does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("service error (status {status}): {message}")]
    Remote { status: u16, message: String },

    /// HTTP 429, surfaced once the retry ceiling is exceeded (or retry is
    /// disabled). For streams this is a partial-failure signal:
    /// `records_delivered` counts what the consumer already received, so the
    /// caller can choose to keep those records.
    #[error("rate limited after {attempts} attempt(s), {records_delivered} record(s) delivered")]
    RateLimited { attempts: u32, records_delivered: u64 },

    /// The response body did not match the documented envelope.
    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// Connection, TLS, or body-read failure.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display_carries_delivery_count() {
        let err = Error::RateLimited {
            attempts: 5,
            records_delivered: 240,
        };
        assert_eq!(
            err.to_string(),
            "rate limited after 5 attempt(s), 240 record(s) delivered"
        );
    }

    #[test]
    fn remote_display_carries_status() {
        let err = Error::Remote {
            status: 503,
            message: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "service error (status 503): overloaded");
    }
}
