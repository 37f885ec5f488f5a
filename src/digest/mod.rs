//! Digest assembly over stored posts.
//!
//! Everything here reads from [`PostStore::query`] and produces strings;
//! where those strings go (a file, a pasteboard, an upload) is the
//! caller's business.

pub mod prompt;

use chrono::NaiveDate;
use tracing::{debug, warn};
use url::Url;

use crate::store::{PostStore, StoreError};
use crate::types::{HarvestedPost, RangeQuery};

/// Digests longer than this are truncated with a logged warning.
pub const MAX_DIGEST_LENGTH: usize = 3_000_000;

/// URLs of all posts matching the query.
pub fn list_documents(store: &PostStore, query: &RangeQuery) -> Result<Vec<String>, StoreError> {
    Ok(store
        .query(query)?
        .into_iter()
        .map(|post| post.url)
        .collect())
}

/// A titled Markdown document holding every matching post's content.
pub fn markdown_digest(store: &PostStore, query: &RangeQuery) -> Result<String, StoreError> {
    let posts = store.query(query)?;

    let human_start = human_date(query.start_date);
    let human_end = human_date(query.end_date);
    let filter_title = query
        .match_string
        .as_deref()
        .map(|pattern| format!(" filtered by '{pattern}'"))
        .unwrap_or_default();

    let title = format!("{human_start} - {human_end} blog scrape{filter_title}");
    let preamble = format!(
        "<!-- \nThis document is a set of blog posts focused on AI \
         innovations. It includes blog posts from {human_start} through \
         {human_end}{filter_title}.\n -->\n\n"
    );

    let body = assemble_contents(&preamble, &posts, MAX_DIGEST_LENGTH);
    Ok(format!("# {title}\n\n{body}"))
}

/// An LLM summarization prompt: mission, numbered title list, task.
pub fn prompt_digest(store: &PostStore, query: &RangeQuery) -> Result<String, StoreError> {
    let posts = store.query(query)?;
    Ok(format!(
        "{}\n\n{}\n\n{}",
        prompt::prefix(query),
        title_list(&posts),
        prompt::suffix(query)
    ))
}

/// Preamble, table of contents, then every post's formatted content,
/// stopping once the body exceeds `max_length`.
fn assemble_contents(header_text: &str, posts: &[HarvestedPost], max_length: usize) -> String {
    let mut kept_urls = Vec::new();
    let mut body = String::new();

    for (i, post) in posts.iter().enumerate() {
        kept_urls.push(post.url.clone());
        body.push_str(&post.formatted_content);
        debug!(
            "adding {}/{} (len={}): {}",
            i + 1,
            posts.len(),
            post.formatted_content.len(),
            post.url
        );

        if body.len() > max_length {
            warn!(
                "digest reached {} characters, dropping the remaining {} post(s)",
                body.len(),
                posts.len() - i - 1
            );
            break;
        }
    }

    let mut text = String::from(header_text);
    text.push_str("<!-- TABLE OF CONTENTS -->\n\n");
    text.push_str(&kept_urls.join("\n"));
    text.push_str("\n\n");
    text.push_str(&body);
    text
}

/// Numbered `"Title" - url` lines, one per post.
pub fn title_list(posts: &[HarvestedPost]) -> String {
    posts
        .iter()
        .enumerate()
        .map(|(i, post)| format!("{}. {}", i + 1, url_to_title_string(&post.url)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Derive a display title from a URL's last path segment:
/// `/2025/02/25/economics-roundup-5/` becomes `"Economics Roundup 5"`.
pub fn url_to_title_string(url: &str) -> String {
    let last_segment = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|segments| segments.rev().find(|s| !s.is_empty()).map(str::to_string))
    });

    match last_segment {
        Some(segment) => {
            let title = segment
                .split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" ");
            format!("\"{title}\" - {url}")
        }
        None => format!("\"{url}\" - {url}"),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn human_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}
