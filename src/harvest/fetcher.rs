//! Page fetching over HTTP.
//!
//! Fetch failures are a normal part of harvesting: the fetcher logs them
//! and hands back `None`, never an error. There are no retries; a page
//! that fails now is treated as currently unavailable.

use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::FetchConfig;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("status {0}")]
    Status(u16),
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Response body
    pub body: String,
    /// Content-Type header, without parameters
    pub content_type: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type.contains("text/html") || self.content_type.contains("application/xhtml")
    }
}

/// HTTP page fetcher with a fixed browser identity.
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch raw HTML for a URL, or `None` on any HTTP or network failure.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        self.fetch_page(url).await.map(|page| page.body)
    }

    /// Fetch a page together with its content type.
    pub async fn fetch_page(&self, url: &str) -> Option<FetchedPage> {
        match self.try_fetch(url).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!("failed to fetch {url}: {e}");
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .unwrap_or_else(|| "text/html".to_string());

        let body = response.text().await?;

        Ok(FetchedPage { body, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_html() {
        let html = FetchedPage {
            body: String::new(),
            content_type: "text/html".to_string(),
        };
        assert!(html.is_html());

        let xhtml = FetchedPage {
            body: String::new(),
            content_type: "application/xhtml+xml".to_string(),
        };
        assert!(xhtml.is_html());

        let pdf = FetchedPage {
            body: String::new(),
            content_type: "application/pdf".to_string(),
        };
        assert!(!pdf.is_html());
    }

    #[test]
    fn test_fetcher_builds_from_defaults() {
        assert!(PageFetcher::new(&FetchConfig::default()).is_ok());
    }
}
