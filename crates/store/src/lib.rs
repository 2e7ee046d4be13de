//! Steam Store client for app metadata and cover art.
//!
//! Metadata lookups go through [`StoreClient::fetch_details`], which applies
//! the injected [`RetryPolicy`] (rate limit before every attempt, bounded
//! retries with exponential backoff). Cover art is downloaded into a
//! [`CoverCache`] directory and reused on later calls.

pub mod cache;
pub mod client;
pub mod policy;
pub mod source;
pub mod types;

pub use cache::CoverCache;
pub use client::{COVER_URL_TEMPLATES, Error as StoreError, StoreClient};
pub use policy::RetryPolicy;
pub use source::{MetadataSource, SourceFuture};
pub use types::AppDetails;
