//! Core data types shared across the harvest pipeline.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A harvested blog post or referenced page.
///
/// Created by the harvest pipeline at discovery time and never mutated
/// afterwards. Both `url` and `clean_url` are unique across the store;
/// two records whose URLs differ only in tracking parameters collide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedPost {
    /// Absolute URL, as fetched
    pub url: String,
    /// Canonical form with tracking query parameters removed
    pub clean_url: String,
    /// Adapter name, or the originating post's URL for referenced pages
    pub source: String,
    /// Publication timestamp of the post
    pub creation_date: DateTime<Utc>,
    /// Wall-clock time of discovery
    pub harvest_timestamp: DateTime<Utc>,
    /// Rendered Markdown document with a delimited header/body structure,
    /// or the "no content" placeholder when extraction found nothing
    pub formatted_content: String,
}

/// Raised when a query's day bounds are reversed.
#[derive(Debug, Error)]
#[error("start_date {start} must not be after end_date {end}")]
pub struct InvalidRangeError {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Date/source/content filter over stored posts.
///
/// Day bounds are inclusive on both ends: a record dated anywhere within
/// `end_date` is matched.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Exact match on the record's `source`
    pub source: Option<String>,
    /// Case-insensitive regex over `formatted_content`; degrades to a
    /// literal substring test when the pattern does not compile
    pub match_string: Option<String>,
}

impl RangeQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, InvalidRangeError> {
        if start_date > end_date {
            return Err(InvalidRangeError {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            start_date,
            end_date,
            source: None,
            match_string: None,
        })
    }

    /// First instant of `start_date`.
    pub fn start_dt(&self) -> DateTime<Utc> {
        self.start_date.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last representable instant of `end_date`.
    pub fn end_dt(&self) -> DateTime<Utc> {
        let end_of_day = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
            .expect("23:59:59.999999 is a valid time");
        self.end_date.and_time(end_of_day).and_utc()
    }
}

/// Observer for human-readable harvest status lines.
///
/// Purely observational; implementations must never affect control flow.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, status: &str);
}

/// Default reporter that discards all status updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _status: &str) {}
}

/// Reporter that forwards status lines to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, status: &str) {
        tracing::info!("{status}");
    }
}
