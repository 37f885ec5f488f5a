//! Declarative site adapters and the generic scraping algorithm.
//!
//! A site is described, not coded: one `SiteAdapter` bundle names the CSS
//! selectors for post entries, archive links, anchors, and timestamps on
//! that site's pages. A single algorithm drives every bundle, so adding a
//! site means adding configuration, never code.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{extractor, pool, references, urls, HarvestContext};
use crate::store::{PostId, PostStore, StoreError};
use crate::types::{HarvestedPost, ProgressReporter};

/// Fallback parser mapping a post URL to a publication date, for sites
/// that encode the date in the URL path.
pub type UrlDateParser = fn(&str) -> Option<DateTime<Utc>>;

/// Declarative description of how to harvest one site.
#[derive(Debug, Clone)]
pub struct SiteAdapter {
    /// Scraper name, recorded as `source` on primary posts
    pub name: String,
    /// Main listing page
    pub base_url: String,
    /// CSS selector for post entries on listing pages
    pub entry_selector: String,
    /// Container scoping reference-link extraction on a post page
    pub wrapping_selector: String,
    /// Archive/pagination links on the main page to also scan
    pub archive_selector: Option<String>,
    /// Anchor sub-selector when the entry element is not itself the link
    pub link_selector: Option<String>,
    /// Sub-element carrying a machine-readable `datetime` attribute
    pub time_selector: Option<String>,
    /// URL-based fallback when no timestamp element exists
    pub date_from_url: Option<UrlDateParser>,
    /// Remote hosts excluded from reference expansion
    pub ignore_remotes: Vec<String>,
    /// Retain same-host links during reference expansion
    pub include_local_references: bool,
}

impl Default for SiteAdapter {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            entry_selector: String::new(),
            wrapping_selector: "*".to_string(),
            archive_selector: None,
            link_selector: None,
            time_selector: None,
            date_from_url: None,
            ignore_remotes: Vec::new(),
            include_local_references: false,
        }
    }
}

/// Adapter configuration errors; these abort a harvest run.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid selector '{selector}' in adapter '{adapter}': {message}")]
    Selector {
        adapter: String,
        selector: String,
        message: String,
    },
}

/// Pre-parsed selectors for one adapter.
#[derive(Debug, Clone)]
pub(crate) struct CompiledSelectors {
    pub entry: Selector,
    pub wrapping: Selector,
    pub archive: Option<Selector>,
    pub link: Option<Selector>,
    pub time: Option<Selector>,
}

pub(crate) fn compile_selectors(adapter: &SiteAdapter) -> Result<CompiledSelectors, AdapterError> {
    let parse = |selector: &str| {
        Selector::parse(selector).map_err(|e| AdapterError::Selector {
            adapter: adapter.name.clone(),
            selector: selector.to_string(),
            message: e.to_string(),
        })
    };

    Ok(CompiledSelectors {
        entry: parse(&adapter.entry_selector)?,
        wrapping: parse(&adapter.wrapping_selector)?,
        archive: adapter.archive_selector.as_deref().map(parse).transpose()?,
        link: adapter.link_selector.as_deref().map(parse).transpose()?,
        time: adapter.time_selector.as_deref().map(parse).transpose()?,
    })
}

/// Run the full scrape for one site: listing pages, then reference
/// expansion over everything newly harvested.
pub async fn standard_scrape(
    ctx: &HarvestContext,
    adapter: &SiteAdapter,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<PostId>, AdapterError> {
    let selectors = compile_selectors(adapter)?;

    reporter.report(&format!("{}: fetching post URLs", adapter.name));
    let mut new_ids = harvest_listings(ctx, adapter, &selectors).await;

    reporter.report(&format!("{}: finding reference URLs", adapter.name));
    let reference_ids = references::expand(ctx, adapter, &selectors.wrapping, &new_ids).await;

    new_ids.extend(reference_ids);
    Ok(new_ids)
}

/// Scan the main page plus any archive pages, concurrently.
async fn harvest_listings(
    ctx: &HarvestContext,
    adapter: &SiteAdapter,
    selectors: &CompiledSelectors,
) -> Vec<PostId> {
    let mut pages = vec![adapter.base_url.clone()];
    if let Some(archive) = &selectors.archive {
        if let Some(html) = ctx.fetcher.fetch(&adapter.base_url).await {
            pages.extend(archive_links(&html, &adapter.base_url, archive));
        }
    }
    info!("{}: scanning {} listing page(s)", adapter.name, pages.len());

    pool::fetch_many(
        pages,
        |page_url| {
            let ctx = ctx.clone();
            let adapter = adapter.clone();
            let selectors = selectors.clone();
            async move { Ok(harvest_one_listing(&ctx, &adapter, &selectors, &page_url).await) }
        },
        ctx.max_workers,
    )
    .await
}

/// Harvest every dated entry on a single listing page.
async fn harvest_one_listing(
    ctx: &HarvestContext,
    adapter: &SiteAdapter,
    selectors: &CompiledSelectors,
    page_url: &str,
) -> Vec<PostId> {
    let Some(html) = ctx.fetcher.fetch(page_url).await else {
        return Vec::new();
    };
    let entries = listing_entries(&html, page_url, adapter, selectors);

    let mut ids = Vec::new();
    for entry in entries {
        let formatted_content = ctx.extractor.formatted_page_content(&entry.url).await;
        let post = HarvestedPost {
            clean_url: urls::clean(&entry.url),
            url: entry.url,
            source: adapter.name.clone(),
            creation_date: entry.creation_date,
            harvest_timestamp: Utc::now(),
            formatted_content,
        };
        if let Some(id) = insert_tolerant(&ctx.store, &post) {
            ids.push(id);
        }
    }
    ids
}

/// Candidate post link found on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListingEntry {
    pub url: String,
    pub creation_date: DateTime<Utc>,
}

/// Select candidate entries and resolve their links and publication dates.
///
/// Entries with no resolvable `href`, or with neither a timestamp element
/// nor a URL-derived date, are dropped.
pub(crate) fn listing_entries(
    html: &str,
    page_url: &str,
    adapter: &SiteAdapter,
    selectors: &CompiledSelectors,
) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    for entry in document.select(&selectors.entry) {
        let link = match &selectors.link {
            Some(anchor) => match entry.select(anchor).next() {
                Some(element) => element,
                None => continue,
            },
            None => entry,
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let url = urls::normalize(page_url, href);

        let Some(creation_date) = entry_date(&entry, &url, adapter, selectors) else {
            debug!("no resolvable publication date for {url}, dropping");
            continue;
        };

        entries.push(ListingEntry { url, creation_date });
    }
    entries
}

/// Resolve an entry's publication date: timestamp element first, then the
/// adapter's URL-based fallback.
fn entry_date(
    entry: &ElementRef,
    url: &str,
    adapter: &SiteAdapter,
    selectors: &CompiledSelectors,
) -> Option<DateTime<Utc>> {
    if let Some(time) = &selectors.time {
        if let Some(element) = entry.select(time).next() {
            if let Some(date) = element
                .value()
                .attr("datetime")
                .and_then(extractor::parse_date)
            {
                return Some(date);
            }
        }
    }
    adapter.date_from_url.and_then(|parser| parser(url))
}

/// Archive page links matched on the main listing page.
fn archive_links(html: &str, base_url: &str, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| urls::normalize(base_url, href))
        .collect()
}

/// Insert a post, treating duplicate collisions as a quiet skip.
pub(crate) fn insert_tolerant(store: &PostStore, post: &HarvestedPost) -> Option<PostId> {
    match store.insert(post) {
        Ok(id) => {
            info!("inserted {}", post.url);
            Some(id)
        }
        Err(StoreError::Duplicate { .. }) => {
            info!("already harvested: {}", post.url);
            None
        }
        Err(e) => {
            warn!("failed to insert {}: {e}", post.url);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const LISTING: &str = r#"
        <html><body>
        <div class="posts">
            <div class="post">
                <a href="/2025/02/25/economics-roundup-5/">Economics Roundup 5</a>
                <time datetime="2025-02-25T09:00:00Z">Feb 25</time>
            </div>
            <div class="post">
                <a href="/misc/about/">About</a>
            </div>
        </div>
        <div class="archive"><a href="/archive/2024/">2024</a></div>
        </body></html>
    "#;

    fn adapter_with_time() -> SiteAdapter {
        SiteAdapter {
            name: "fixture".to_string(),
            base_url: "https://blog.test/".to_string(),
            entry_selector: "div.post".to_string(),
            link_selector: Some("a[href]".to_string()),
            time_selector: Some("time[datetime]".to_string()),
            ..SiteAdapter::default()
        }
    }

    #[test]
    fn test_entries_without_dates_are_dropped() {
        let adapter = adapter_with_time();
        let selectors = compile_selectors(&adapter).unwrap();
        let entries = listing_entries(LISTING, &adapter.base_url, &adapter, &selectors);

        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].url,
            "https://blog.test/2025/02/25/economics-roundup-5/"
        );
        assert_eq!(
            entries[0].creation_date,
            NaiveDate::from_ymd_opt(2025, 2, 25)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
                .and_utc()
        );
    }

    #[test]
    fn test_url_date_fallback() {
        fn path_date(url: &str) -> Option<DateTime<Utc>> {
            if url.contains("/2025/02/25/") {
                Some(
                    NaiveDate::from_ymd_opt(2025, 2, 25)?
                        .and_hms_opt(0, 0, 0)?
                        .and_utc(),
                )
            } else {
                None
            }
        }

        let adapter = SiteAdapter {
            date_from_url: Some(path_date),
            time_selector: None,
            ..adapter_with_time()
        };
        let selectors = compile_selectors(&adapter).unwrap();
        let entries = listing_entries(LISTING, &adapter.base_url, &adapter, &selectors);

        // only the dated-path entry resolves; /misc/about/ has no date source
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].url,
            "https://blog.test/2025/02/25/economics-roundup-5/"
        );
    }

    #[test]
    fn test_time_element_beats_url_fallback() {
        fn wrong_date(_url: &str) -> Option<DateTime<Utc>> {
            Some(
                NaiveDate::from_ymd_opt(2020, 1, 1)?
                    .and_hms_opt(0, 0, 0)?
                    .and_utc(),
            )
        }

        let adapter = SiteAdapter {
            date_from_url: Some(wrong_date),
            ..adapter_with_time()
        };
        let selectors = compile_selectors(&adapter).unwrap();
        let entries = listing_entries(LISTING, &adapter.base_url, &adapter, &selectors);

        // first entry uses its <time>; second falls back to the URL parser
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].creation_date.to_rfc3339(), "2025-02-25T09:00:00+00:00");
        assert_eq!(entries[1].creation_date.to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_entry_is_its_own_link() {
        let adapter = SiteAdapter {
            entry_selector: "div.post a[href]".to_string(),
            link_selector: None,
            time_selector: None,
            date_from_url: Some(|_| {
                NaiveDate::from_ymd_opt(2024, 6, 1)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
            }),
            ..adapter_with_time()
        };
        let selectors = compile_selectors(&adapter).unwrap();
        let entries = listing_entries(LISTING, &adapter.base_url, &adapter, &selectors);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_archive_links_resolve_against_base() {
        let selector = Selector::parse("div.archive a").unwrap();
        let links = archive_links(LISTING, "https://blog.test/", &selector);
        assert_eq!(links, vec!["https://blog.test/archive/2024/"]);
    }

    #[test]
    fn test_fixture_page_yields_one_stored_record() {
        let adapter = adapter_with_time();
        let selectors = compile_selectors(&adapter).unwrap();
        let entries = listing_entries(LISTING, &adapter.base_url, &adapter, &selectors);

        let dir = tempfile::TempDir::new().unwrap();
        let store = PostStore::open(dir.path()).unwrap();
        for entry in &entries {
            let post = HarvestedPost {
                url: entry.url.clone(),
                clean_url: urls::clean(&entry.url),
                source: adapter.name.clone(),
                creation_date: entry.creation_date,
                harvest_timestamp: Utc::now(),
                formatted_content: extractor::format_page_content(&entry.url, None),
            };
            insert_tolerant(&store, &post);
        }

        // the undated /misc/about/ entry never reaches the store
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_selector_is_a_config_error() {
        let adapter = SiteAdapter {
            entry_selector: "div..broken[".to_string(),
            ..adapter_with_time()
        };
        assert!(compile_selectors(&adapter).is_err());
    }
}
