//! Readable-content extraction.
//!
//! The static path runs Mozilla's readability algorithm over fetched HTML
//! and converts the surviving article to Markdown, prefixed with a small
//! `---`-delimited metadata header. Pages that yield nothing readable are
//! retried once in a headless browser before the pipeline settles for a
//! placeholder document.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::StreamExt;
use scraper::{Html, Selector};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::fetcher::PageFetcher;
use crate::config::HarvestConfig;

/// Publication dates after this point are treated as parser garbage.
fn max_plausible_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2029, 12, 31).expect("static date is valid")
}

/// Meta/time selectors probed for a publication timestamp, in priority order.
const DATE_SELECTORS: &[&str] = &[
    "meta[property='article:published_time']",
    "meta[name='article:published_time']",
    "meta[property='og:published_time']",
    "meta[name='date']",
    "time[datetime]",
];

/// Extracts normalized Markdown documents from web pages.
pub struct ContentExtractor {
    fetcher: Arc<PageFetcher>,
    enable_rendering: bool,
    render_timeout: Duration,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<PageFetcher>, config: &HarvestConfig) -> Self {
        Self {
            fetcher,
            enable_rendering: config.enable_rendering,
            render_timeout: Duration::from_secs(config.render_timeout_secs),
        }
    }

    /// Fetch a page and produce its delimited Markdown document.
    ///
    /// Always returns a document: extraction failure yields the
    /// "no content" placeholder, never an error.
    pub async fn formatted_page_content(&self, url: &str) -> String {
        let content = self.extract(url).await;
        format_page_content(url, content.as_deref())
    }

    /// Extract Markdown for a URL, or `None` when neither the static nor
    /// the rendered path found readable content.
    pub async fn extract(&self, url: &str) -> Option<String> {
        let page = self.fetcher.fetch_page(url).await?;

        if let Some(content) = extract_from_html(&page.body, url) {
            return Some(content);
        }

        // The rendered fallback only makes sense for HTML documents.
        if !page.is_html() {
            warn!("non-HTML content at {url}: {}", page.content_type);
            return None;
        }
        if !self.enable_rendering {
            return None;
        }

        debug!("falling back to headless rendering for {url}");
        let rendered = self.render(url).await?;
        extract_from_html(&rendered, url)
    }

    /// Render a page in a headless browser and return its final HTML.
    async fn render(&self, url: &str) -> Option<String> {
        match tokio::time::timeout(self.render_timeout, render_page(url)).await {
            Ok(Ok(html)) => Some(html),
            Ok(Err(e)) => {
                warn!("headless rendering failed for {url}: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "headless rendering timed out for {url} after {:?}",
                    self.render_timeout
                );
                None
            }
        }
    }
}

async fn render_page(url: &str) -> anyhow::Result<String> {
    let config = BrowserConfig::builder()
        .arg("--no-sandbox")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .build()
        .map_err(|e| anyhow::anyhow!("browser config error: {e}"))?;

    let (mut browser, mut handler) = Browser::launch(config).await?;
    let events = tokio::spawn(async move { while handler.next().await.is_some() {} });

    let result = async {
        let page = browser.new_page(url).await?;
        page.wait_for_navigation().await?;
        let html = page.content().await?;
        Ok::<_, anyhow::Error>(html)
    }
    .await;

    if let Err(e) = browser.close().await {
        debug!("browser close error: {e}");
    }
    events.abort();

    result
}

/// Run readability over raw HTML and convert the result to Markdown with a
/// `---`-delimited metadata header. `None` when no readable content exists.
pub fn extract_from_html(html: &str, url: &str) -> Option<String> {
    let parsed_url = Url::parse(url).ok()?;

    let mut cursor = Cursor::new(html.as_bytes());
    let product = readability::extractor::extract(&mut cursor, &parsed_url).ok()?;
    if product.text.trim().is_empty() {
        return None;
    }

    let markdown = fast_html2md::rewrite_html(&product.content, false);
    let body = markdown.trim();
    if body.is_empty() {
        return None;
    }

    let mut document = String::from("---\n");
    let title = product.title.trim();
    if !title.is_empty() {
        document.push_str(&format!("title: {title}\n"));
    }
    if let Some(date) = publication_date(html) {
        document.push_str(&format!("date: {}\n", date.format("%Y-%m-%d %H:%M %z")));
    }
    document.push_str(&format!("url: {url}\n---\n"));
    document.push_str(body);
    Some(document)
}

/// Look for a machine-readable publication timestamp in the page head.
fn publication_date(html: &str) -> Option<DateTime<Utc>> {
    let document = Html::parse_document(html);
    for selector_str in DATE_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let value = element
                .value()
                .attr("content")
                .or_else(|| element.value().attr("datetime"));
            if let Some(date) = value.and_then(parse_date) {
                return Some(date);
            }
        }
    }
    None
}

/// Parse a machine-readable date string, rejecting far-future values that
/// are almost always misparsed page furniture.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    let parsed = DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        })?;

    if parsed.date_naive() > max_plausible_date() {
        return None;
    }
    Some(parsed)
}

/// Wrap extracted content in delimiter comments, or produce the placeholder
/// for pages where nothing readable was found.
pub fn format_page_content(url: &str, content: Option<&str>) -> String {
    let Some(content) = content else {
        return format!("No main content found for {url}.");
    };

    let (headers, body) = split_header_body(content);
    [
        format!("\n\u{c}<!-- START OF POST FROM {url} -->"),
        "\n<!-- PAGE HEADERS -->\n".to_string(),
        headers,
        "\n<!-- CONTENT -->\n".to_string(),
        body,
        "\n<!-- END OF POST -->\n".to_string(),
    ]
    .join("\n")
}

/// Split a `---`-delimited metadata block from the remaining body.
///
/// Text without two delimiters is treated as all body, empty header.
pub fn split_header_body(text: &str) -> (String, String) {
    let mut parts = text.splitn(3, "---");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(header), Some(body)) => {
            (header.trim().to_string(), body.trim().to_string())
        }
        _ => (String::new(), text.trim().to_string()),
    }
}
