//! Deduplicating post store backed by sled.
//!
//! Posts are stored as JSON documents keyed by a generated id, with two
//! secondary trees enforcing uniqueness of `url` and `clean_url`. An
//! insert reserves both index keys with compare-and-swap before writing
//! the document, so racing inserts of the same URL are decided by the
//! store rather than by callers — the second writer gets
//! [`StoreError::Duplicate`] and nothing else changes.

use regex::RegexBuilder;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{HarvestedPost, RangeQuery};

/// Identifier assigned to a stored post.
pub type PostId = String;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record for {url}")]
    Duplicate { url: String },
    #[error("database error: {0}")]
    Db(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Document store for harvested posts.
pub struct PostStore {
    db: sled::Db,
    posts: sled::Tree,
    url_index: sled::Tree,
    clean_url_index: sled::Tree,
}

impl PostStore {
    /// Open (or create) the store under the given data directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref().join("posts.sled"))?;
        let posts = db.open_tree("posts")?;
        let url_index = db.open_tree("url_index")?;
        let clean_url_index = db.open_tree("clean_url_index")?;
        Ok(Self {
            db,
            posts,
            url_index,
            clean_url_index,
        })
    }

    /// Insert a post, rejecting any `url` or `clean_url` that already
    /// exists.
    ///
    /// Both index keys are reserved with compare-and-swap before the
    /// document is written; losing either race yields `Duplicate`.
    pub fn insert(&self, post: &HarvestedPost) -> Result<PostId, StoreError> {
        let id = Uuid::new_v4().to_string();
        let encoded = serde_json::to_vec(post)?;

        let duplicate = || StoreError::Duplicate {
            url: post.url.clone(),
        };

        if self
            .url_index
            .compare_and_swap(post.url.as_bytes(), None as Option<&[u8]>, Some(id.as_bytes()))?
            .is_err()
        {
            return Err(duplicate());
        }

        if self
            .clean_url_index
            .compare_and_swap(
                post.clean_url.as_bytes(),
                None as Option<&[u8]>,
                Some(id.as_bytes()),
            )?
            .is_err()
        {
            // give the url reservation back before reporting the collision
            self.url_index.remove(post.url.as_bytes())?;
            return Err(duplicate());
        }

        self.posts.insert(id.as_bytes(), encoded)?;
        Ok(id)
    }

    /// Fetch one post by id.
    pub fn get(&self, id: &str) -> Result<Option<HarvestedPost>, StoreError> {
        match self.posts.get(id.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Fetch several posts by id, skipping unknown ids.
    pub fn get_many(&self, ids: &[PostId]) -> Result<Vec<HarvestedPost>, StoreError> {
        let mut posts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(post) = self.get(id)? {
                posts.push(post);
            }
        }
        Ok(posts)
    }

    /// All posts matching the query, sorted by `creation_date` ascending.
    ///
    /// Both day bounds are inclusive. `source` is an exact match. The
    /// content filter is a case-insensitive regex, degrading to a literal
    /// substring test when the pattern does not compile.
    pub fn query(&self, query: &RangeQuery) -> Result<Vec<HarvestedPost>, StoreError> {
        let start = query.start_dt();
        let end = query.end_dt();
        let matcher = query.match_string.as_deref().map(ContentMatcher::new);

        let mut results = Vec::new();
        for item in self.posts.iter() {
            let (_, value) = item?;
            let post: HarvestedPost = match serde_json::from_slice(&value) {
                Ok(post) => post,
                Err(e) => {
                    warn!("skipping undecodable record: {e}");
                    continue;
                }
            };

            if post.creation_date < start || post.creation_date > end {
                continue;
            }
            if let Some(source) = &query.source {
                if source != &post.source {
                    continue;
                }
            }
            if let Some(matcher) = &matcher {
                if !matcher.matches(&post.formatted_content) {
                    continue;
                }
            }
            results.push(post);
        }

        results.sort_by_key(|post| post.creation_date);
        Ok(results)
    }

    /// All distinct `source` values, sorted.
    ///
    /// With `roots_only`, URL-shaped sources (reference-expansion
    /// attributions) are excluded, leaving only named adapters.
    pub fn distinct_sources(&self, roots_only: bool) -> Result<Vec<String>, StoreError> {
        let mut sources = BTreeSet::new();
        for item in self.posts.iter() {
            let (_, value) = item?;
            let post: HarvestedPost = match serde_json::from_slice(&value) {
                Ok(post) => post,
                Err(e) => {
                    warn!("skipping undecodable record: {e}");
                    continue;
                }
            };
            if roots_only && post.source.to_lowercase().starts_with("http") {
                continue;
            }
            sources.insert(post.source);
        }
        Ok(sources.into_iter().collect())
    }

    /// Number of stored posts.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Bulk-clear every record. Used only as an explicit pre-harvest reset.
    pub fn erase_all(&self) -> Result<(), StoreError> {
        self.posts.clear()?;
        self.url_index.clear()?;
        self.clean_url_index.clear()?;
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

/// Case-insensitive content filter: a regex when the pattern compiles,
/// otherwise a literal substring test.
enum ContentMatcher {
    Regex(regex::Regex),
    Substring(String),
}

impl ContentMatcher {
    fn new(pattern: &str) -> Self {
        match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        {
            Ok(re) => Self::Regex(re),
            Err(_) => {
                debug!("match pattern is not a valid regex, using substring: {pattern}");
                Self::Substring(pattern.to_lowercase())
            }
        }
    }

    fn matches(&self, content: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(content),
            Self::Substring(needle) => content.to_lowercase().contains(needle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    fn store() -> (TempDir, PostStore) {
        let dir = TempDir::new().unwrap();
        let store = PostStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn post(url: &str, source: &str, date: &str) -> HarvestedPost {
        let creation_date = date.parse::<NaiveDate>().unwrap();
        HarvestedPost {
            url: url.to_string(),
            clean_url: crate::harvest::urls::clean(url),
            source: source.to_string(),
            creation_date: creation_date.and_hms_opt(12, 0, 0).unwrap().and_utc(),
            harvest_timestamp: Utc::now(),
            formatted_content: format!("Content of {url}"),
        }
    }

    fn range(start: &str, end: &str) -> RangeQuery {
        RangeQuery::new(start.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let (_dir, store) = store();
        let record = post("https://a.test/1", "alpha", "2025-03-01");
        let id = store.insert(&record).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap(), record);
    }

    #[test]
    fn test_duplicate_url_rejected_once_stored() {
        let (_dir, store) = store();
        let record = post("https://a.test/1", "alpha", "2025-03-01");

        assert!(store.insert(&record).is_ok());
        let second = store.insert(&record);
        assert!(matches!(second, Err(StoreError::Duplicate { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_clean_url_rejected() {
        let (_dir, store) = store();
        let first = post("https://a.test/1?utm_source=feed", "alpha", "2025-03-01");
        let second = post("https://a.test/1?utm_source=mail", "alpha", "2025-03-01");
        assert_eq!(first.clean_url, second.clean_url);

        assert!(store.insert(&first).is_ok());
        assert!(matches!(
            store.insert(&second),
            Err(StoreError::Duplicate { .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_query_day_bounds_are_inclusive() {
        let (_dir, store) = store();

        let mut at_end = post("https://a.test/end", "alpha", "2025-03-07");
        at_end.creation_date = Utc.with_ymd_and_hms(2025, 3, 7, 23, 59, 59).unwrap();
        let mut after_end = post("https://a.test/after", "alpha", "2025-03-08");
        after_end.creation_date = Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap();
        let mut at_start = post("https://a.test/start", "alpha", "2025-03-01");
        at_start.creation_date = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        store.insert(&at_end).unwrap();
        store.insert(&after_end).unwrap();
        store.insert(&at_start).unwrap();

        let results = store.query(&range("2025-03-01", "2025-03-07")).unwrap();
        let urls: Vec<&str> = results.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/start", "https://a.test/end"]);
    }

    #[test]
    fn test_query_source_filter_is_exact() {
        let (_dir, store) = store();
        store.insert(&post("https://a.test/1", "alpha", "2025-03-01")).unwrap();
        store.insert(&post("https://b.test/2", "beta", "2025-03-02")).unwrap();

        let mut query = range("2025-03-01", "2025-03-07");
        query.source = Some("alpha".to_string());
        let results = store.query(&query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "alpha");
    }

    #[test]
    fn test_query_content_match_regex() {
        let (_dir, store) = store();
        let mut record = post("https://a.test/1", "alpha", "2025-03-01");
        record.formatted_content = "A story about Language Models\nand more".to_string();
        store.insert(&record).unwrap();

        let mut query = range("2025-03-01", "2025-03-07");
        query.match_string = Some("language\\s+models".to_string());
        assert_eq!(store.query(&query).unwrap().len(), 1);

        query.match_string = Some("quantum".to_string());
        assert!(store.query(&query).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_regex_degrades_to_substring() {
        let (_dir, store) = store();
        let mut record = post("https://a.test/1", "alpha", "2025-03-01");
        record.formatted_content = "calling pattern(x) in the code".to_string();
        store.insert(&record).unwrap();
        let mut other = post("https://a.test/2", "alpha", "2025-03-01");
        other.formatted_content = "nothing relevant".to_string();
        store.insert(&other).unwrap();

        let mut query = range("2025-03-01", "2025-03-07");
        query.match_string = Some("pattern(".to_string());
        let results = store.query(&query).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://a.test/1");
    }

    #[test]
    fn test_distinct_sources_roots_only() {
        let (_dir, store) = store();
        store.insert(&post("https://a.test/1", "beta", "2025-03-01")).unwrap();
        store.insert(&post("https://a.test/2", "alpha", "2025-03-02")).unwrap();
        store
            .insert(&post(
                "https://cited.test/x",
                "https://a.test/1",
                "2025-03-01",
            ))
            .unwrap();

        let all = store.distinct_sources(false).unwrap();
        assert_eq!(all, vec!["alpha", "beta", "https://a.test/1"]);

        let roots = store.distinct_sources(true).unwrap();
        assert_eq!(roots, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_erase_all() {
        let (_dir, store) = store();
        let record = post("https://a.test/1", "alpha", "2025-03-01");
        store.insert(&record).unwrap();
        assert_eq!(store.len(), 1);

        store.erase_all().unwrap();
        assert!(store.is_empty());

        // the unique indexes are gone too: the same url inserts cleanly
        assert!(store.insert(&record).is_ok());
    }

    #[test]
    fn test_query_sorted_by_creation_date() {
        let (_dir, store) = store();
        store.insert(&post("https://a.test/3", "alpha", "2025-03-03")).unwrap();
        store.insert(&post("https://a.test/1", "alpha", "2025-03-01")).unwrap();
        store.insert(&post("https://a.test/2", "alpha", "2025-03-02")).unwrap();

        let results = store.query(&range("2025-03-01", "2025-03-07")).unwrap();
        let urls: Vec<&str> = results.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://a.test/1",
                "https://a.test/2",
                "https://a.test/3"
            ]
        );
    }
}
