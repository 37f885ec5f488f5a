//! Harvest runs across the configured site adapters.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::{adapter, ContentExtractor, HarvestContext, PageFetcher, SiteAdapter};
use crate::config::Config;
use crate::store::{PostId, PostStore};
use crate::types::ProgressReporter;

/// Owns the store handle and shared pipeline components for harvest runs.
///
/// Construct on startup, [`close`](Self::close) on shutdown; there is no
/// ambient global state.
pub struct Harvester {
    store: Arc<PostStore>,
    ctx: HarvestContext,
    adapters: Vec<SiteAdapter>,
}

impl Harvester {
    /// Open the store and build the shared fetcher/extractor.
    pub fn new(config: &Config, adapters: Vec<SiteAdapter>) -> Result<Self> {
        let store = Arc::new(
            PostStore::open(&config.store.data_dir).context("failed to open post store")?,
        );
        let fetcher =
            Arc::new(PageFetcher::new(&config.fetch).context("failed to build HTTP client")?);
        let extractor = Arc::new(ContentExtractor::new(Arc::clone(&fetcher), &config.harvest));

        let ctx = HarvestContext {
            store: Arc::clone(&store),
            fetcher,
            extractor,
            max_workers: config.harvest.max_workers,
        };

        Ok(Self {
            store,
            ctx,
            adapters,
        })
    }

    pub fn store(&self) -> &Arc<PostStore> {
        &self.store
    }

    pub fn adapters(&self) -> &[SiteAdapter] {
        &self.adapters
    }

    /// Run the selected adapters (all of them when `selected` is empty).
    ///
    /// Per-page and per-record failures are isolated inside the pipeline;
    /// only configuration errors (bad selector, unusable store) surface
    /// here and abort the run.
    pub async fn run(
        &self,
        selected: &[String],
        erase_old: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<PostId>> {
        if erase_old {
            self.store
                .erase_all()
                .context("failed to erase stored posts")?;
        }

        let mut new_ids = Vec::new();
        for adapter in &self.adapters {
            if !selected.is_empty() && !selected.iter().any(|name| name == &adapter.name) {
                continue;
            }
            let ids = adapter::standard_scrape(&self.ctx, adapter, reporter).await?;
            info!("{}: {} new record(s)", adapter.name, ids.len());
            new_ids.extend(ids);
        }

        reporter.report("done");
        Ok(new_ids)
    }

    /// Flush the store and release it.
    pub fn close(self) -> Result<()> {
        self.store.flush().context("failed to flush post store")
    }
}
