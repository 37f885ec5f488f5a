//! Reference expansion: external links cited inside harvested posts.
//!
//! Each newly harvested post is re-fetched and the links inside its
//! wrapping container become secondary records, attributed to the post
//! that cited them rather than to a named adapter.

use chrono::Utc;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::warn;
use url::Url;

use super::adapter::{insert_tolerant, SiteAdapter};
use super::{pool, urls, HarvestContext};
use crate::store::PostId;
use crate::types::HarvestedPost;

/// Expand references for every given post, fanning out across posts with
/// the shared worker pool. Returns ids of newly inserted reference records.
pub async fn expand(
    ctx: &HarvestContext,
    adapter: &SiteAdapter,
    wrapping: &Selector,
    post_ids: &[PostId],
) -> Vec<PostId> {
    let posts = match ctx.store.get_many(post_ids) {
        Ok(posts) => posts,
        Err(e) => {
            warn!("failed to load posts for reference expansion: {e}");
            return Vec::new();
        }
    };

    pool::fetch_many(
        posts,
        |post| {
            let ctx = ctx.clone();
            let adapter = adapter.clone();
            let wrapping = wrapping.clone();
            async move { Ok(expand_one(&ctx, &adapter, &wrapping, &post).await) }
        },
        ctx.max_workers,
    )
    .await
}

/// Harvest the references cited by a single post.
async fn expand_one(
    ctx: &HarvestContext,
    adapter: &SiteAdapter,
    wrapping: &Selector,
    origin: &HarvestedPost,
) -> Vec<PostId> {
    let Some(html) = ctx.fetcher.fetch(&origin.url).await else {
        return Vec::new();
    };
    let links = references_from(
        &html,
        &origin.url,
        wrapping,
        adapter.include_local_references,
        true,
        &adapter.ignore_remotes,
    );

    let mut ids = Vec::new();
    for link in links {
        let formatted_content = ctx.extractor.formatted_page_content(&link).await;
        let record = HarvestedPost {
            clean_url: urls::clean(&link),
            url: link,
            source: origin.url.clone(),
            creation_date: origin.creation_date,
            harvest_timestamp: Utc::now(),
            formatted_content,
        };
        if let Some(id) = insert_tolerant(&ctx.store, &record) {
            ids.push(id);
        }
    }
    ids
}

/// Collect filtered links from the page's wrapping container.
///
/// Relative links count as local. Remote links whose host is on the ignore
/// list are skipped outright. The result is deduplicated preserving first
/// occurrence order.
pub(crate) fn references_from(
    html: &str,
    page_url: &str,
    wrapping: &Selector,
    include_local: bool,
    include_remote: bool,
    ignore_remotes: &[String],
) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(container) = document.select(wrapping).next() else {
        return Vec::new();
    };
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let base_host = Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase));

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in container.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let (link, is_local) = match Url::parse(href) {
            Ok(parsed) => match parsed.host_str().map(str::to_lowercase) {
                Some(host) => {
                    if ignore_remotes.iter().any(|ig| ig.eq_ignore_ascii_case(&host)) {
                        continue;
                    }
                    let is_local = base_host.as_deref() == Some(host.as_str());
                    (href.to_string(), is_local)
                }
                // schemes without a host (mailto:, tel:) behave like local links
                None => (urls::normalize(page_url, href), true),
            },
            Err(_) => (urls::normalize(page_url, href), true),
        };

        if (include_local && is_local) || (include_remote && !is_local) {
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }
    }
    links
}
