//! blogharvest: harvest blog posts from known sites into a deduplicating
//! document store, and assemble filtered digests from it.
//!
//! - Declarative site adapters: one CSS-selector bundle per blog, one
//!   scraping algorithm for all of them
//! - Concurrent page fetching with a bounded worker pool
//! - Readability-based Markdown extraction, with a headless-browser
//!   fallback for client-rendered pages
//! - Reference expansion: external links cited in a post become records
//!   attributed to that post
//! - sled-backed store enforcing unique `url` and `clean_url` keys
//! - Date/source/content-match digests (Markdown or LLM prompt)

pub mod config;
pub mod digest;
pub mod harvest;
pub mod sites;
pub mod store;
pub mod types;

pub use config::Config;
pub use harvest::{Harvester, SiteAdapter};
pub use store::{PostId, PostStore, StoreError};
pub use types::{HarvestedPost, ProgressReporter, RangeQuery};
