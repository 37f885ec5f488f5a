//! The scrape-and-harvest pipeline.
//!
//! Turns listing pages of known blogs into deduplicated [`HarvestedPost`]
//! records:
//!
//! - `urls`: canonicalization and tracking-parameter removal
//! - `fetcher`: HTTP page fetching with a fixed browser identity
//! - `extractor`: readability-based Markdown extraction, with a headless
//!   browser fallback for pages that render their content client-side
//! - `pool`: bounded-concurrency fan-out shared by every fetch batch
//! - `adapter`: declarative per-site scraping bundles plus the one
//!   algorithm that drives them
//! - `references`: secondary records for external links cited in posts
//! - `orchestrator`: runs adapters and owns the store handle
//!
//! [`HarvestedPost`]: crate::types::HarvestedPost

pub mod adapter;
pub mod extractor;
pub mod fetcher;
pub mod orchestrator;
pub mod pool;
pub mod references;
pub mod urls;

pub use adapter::{AdapterError, SiteAdapter, UrlDateParser};
pub use extractor::ContentExtractor;
pub use fetcher::{FetchError, PageFetcher};
pub use orchestrator::Harvester;

use std::sync::Arc;

use crate::store::PostStore;

/// Shared components threaded through one harvest run.
#[derive(Clone)]
pub struct HarvestContext {
    pub store: Arc<PostStore>,
    pub fetcher: Arc<PageFetcher>,
    pub extractor: Arc<ContentExtractor>,
    /// Concurrent fetches per batch
    pub max_workers: usize,
}
