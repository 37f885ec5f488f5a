//! Built-in site adapter bundles.
//!
//! Each supported blog is one declarative [`SiteAdapter`]; the generic
//! scraping algorithm does the rest. Sites whose listing markup carries no
//! timestamp element get a URL-path date parser instead.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;

use crate::harvest::SiteAdapter;

/// All supported sites.
pub fn builtin_adapters() -> Vec<SiteAdapter> {
    vec![simonwillison(), thezvi(), nathanbenaich(), cliffnotes()]
}

fn socials() -> Vec<String> {
    vec![
        "twitter.com".to_string(),
        "www.youtube.com".to_string(),
        "x.com".to_string(),
    ]
}

fn simonwillison() -> SiteAdapter {
    SiteAdapter {
        name: "simonwillison".to_string(),
        base_url: "https://simonwillison.net/".to_string(),
        entry_selector: "div#secondary ul li a".to_string(),
        wrapping_selector: "div.entryPage".to_string(),
        archive_selector: Some("div.archive-links a".to_string()),
        date_from_url: Some(simonwillison_date),
        ignore_remotes: socials(),
        ..SiteAdapter::default()
    }
}

fn thezvi() -> SiteAdapter {
    let mut ignore = socials();
    ignore.push("thezvi.substack.com".to_string());
    SiteAdapter {
        name: "thezvi".to_string(),
        base_url: "https://thezvi.wordpress.com/".to_string(),
        entry_selector: "h2.entry-title a".to_string(),
        wrapping_selector: "div#content".to_string(),
        archive_selector: Some("li#archives-2 a".to_string()),
        date_from_url: Some(thezvi_date),
        ignore_remotes: ignore,
        ..SiteAdapter::default()
    }
}

fn nathanbenaich() -> SiteAdapter {
    SiteAdapter {
        name: "nathanbenaich".to_string(),
        base_url: "https://nathanbenaich.substack.com/archive".to_string(),
        entry_selector: "div.portable-archive-list div".to_string(),
        wrapping_selector: "article.newsletter-post".to_string(),
        link_selector: Some(r#"a[href][data-testid="post-preview-title"]"#.to_string()),
        time_selector: Some("time[datetime]".to_string()),
        ignore_remotes: socials(),
        ..SiteAdapter::default()
    }
}

fn cliffnotes() -> SiteAdapter {
    let mut ignore = socials();
    ignore.push("courses.cliffnotes.ai".to_string());
    SiteAdapter {
        name: "cliffnotes".to_string(),
        base_url: "https://www.cliffnotes.ai/".to_string(),
        entry_selector: r#"a[href^="/p/"]"#.to_string(),
        wrapping_selector: "div.rendered-post".to_string(),
        time_selector: Some("time[datetime]".to_string()),
        ignore_remotes: ignore,
        ..SiteAdapter::default()
    }
}

/// Dates encoded as `/YYYY/Mon/D/` path segments (e.g. `/2025/Mar/8/`).
fn simonwillison_date(url: &str) -> Option<DateTime<Utc>> {
    let re = Regex::new(r"/(\d{4})/([A-Za-z]{3})/(\d{1,2})/").ok()?;
    let caps = re.captures(url)?;
    let date = NaiveDate::parse_from_str(
        &format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]),
        "%Y-%b-%d",
    )
    .ok()?;
    Some(day_start(date))
}

/// Dates encoded as `/YYYY/MM/DD/` path segments.
fn thezvi_date(url: &str) -> Option<DateTime<Utc>> {
    let re = Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").ok()?;
    let caps = re.captures(url)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    Some(day_start(date))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_adapters_compile() {
        for adapter in builtin_adapters() {
            assert!(
                crate::harvest::adapter::compile_selectors(&adapter).is_ok(),
                "selectors of '{}' must parse",
                adapter.name
            );
            assert!(!adapter.base_url.is_empty());
        }
    }

    #[test]
    fn test_simonwillison_date_from_url() {
        let date = simonwillison_date(
            "https://simonwillison.net/2025/Mar/8/some-post-title/",
        )
        .unwrap();
        assert_eq!(date.to_rfc3339(), "2025-03-08T00:00:00+00:00");

        assert!(simonwillison_date("https://simonwillison.net/about/").is_none());
    }

    #[test]
    fn test_thezvi_date_from_url() {
        let date =
            thezvi_date("https://thezvi.wordpress.com/2025/02/25/economics-roundup-5/").unwrap();
        assert_eq!(date.to_rfc3339(), "2025-02-25T00:00:00+00:00");

        assert!(thezvi_date("https://thezvi.wordpress.com/about/").is_none());
    }

    #[test]
    fn test_local_reference_retention_is_off() {
        for adapter in builtin_adapters() {
            assert!(!adapter.include_local_references);
        }
    }
}
