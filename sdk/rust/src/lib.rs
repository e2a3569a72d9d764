//! # Gridbase client
//!
//! Rust client for the Gridbase tabular data API. Builds precedence-aware
//! filter expressions, compiles them into the service's wire query grammar,
//! and retrieves records with cursor pagination, rate-limit-aware streaming,
//! bounded-concurrency namespace discovery, and sampling-based schema
//! inference. Bearer tokens come from an OAuth client-credentials exchange
//! and are cached until shortly before expiry.
//!
//! ```no_run
//! use futures::StreamExt;
//! use gridbase::{ClientConfig, Query, ServiceClient};
//!
//! # async fn run() -> Result<(), gridbase::Error> {
//! let config = ClientConfig::new(
//!     "https://api.example.com/svc",
//!     "https://auth.example.com",
//!     "client-id",
//!     "client-secret",
//! );
//! let client = ServiceClient::new(config)?;
//!
//! let query = Query::new()
//!     .select(["sku", "price"])
//!     .filter(|f| f.field("price").gt(10).and(f.field("status").eq("active")))
//!     .sort_desc("price");
//!
//! let mut records = std::pin::pin!(client.stream("inventory/items", &query));
//! while let Some(record) = records.next().await {
//!     println!("{}", record?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod infer;
pub mod query;

pub use client::{
    ChangeEntry, DiscoveredModel, Listing, NamespaceItem, NamespaceItemKind, PageInfo,
    ServiceClient,
};
pub use config::{ClientConfig, DiscoveryConfig, RetryConfig};
pub use error::{Error, Result};
pub use filter::{FilterBuilder, FilterExpr, FilterValue, field, parse_filter};
pub use infer::{TypeTag, infer_schema};
pub use query::{Query, SortDirection};
