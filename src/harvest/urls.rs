//! URL normalization and tracking-parameter removal.

use url::Url;

/// Query parameters stripped by [`clean`].
pub const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
];

/// Resolve a possibly-relative link against a base URL.
///
/// Never fails: input that cannot be resolved is handed back as given, so
/// every candidate href becomes some string the pipeline can carry.
pub fn normalize(base: &str, link: &str) -> String {
    match Url::parse(base) {
        Ok(base_url) => match base_url.join(link) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => link.to_string(),
        },
        Err(_) => link.to_string(),
    }
}

/// Remove known tracking parameters from a URL.
///
/// Remaining query pairs keep their original relative order; scheme, host,
/// path, and fragment are left alone. Idempotent. Unparseable input is
/// returned unchanged.
pub fn clean(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    if parsed.query().is_some() {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in &kept {
                serializer.append_pair(key, value);
            }
            let query = serializer.finish();
            parsed.set_query(Some(&query));
        }
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(
            normalize("https://example.com/blog/", "/2025/03/01/post/"),
            "https://example.com/2025/03/01/post/"
        );
        assert_eq!(
            normalize("https://example.com/blog/", "archive.html"),
            "https://example.com/blog/archive.html"
        );
    }

    #[test]
    fn test_normalize_absolute_link_wins() {
        assert_eq!(
            normalize("https://example.com/", "https://other.test/page"),
            "https://other.test/page"
        );
    }

    #[test]
    fn test_normalize_unparseable_base() {
        assert_eq!(normalize("not a url", "/page"), "/page");
    }

    #[test]
    fn test_clean_strips_tracking_params() {
        assert_eq!(
            clean("https://x.test/a?utm_source=foo&keep=1"),
            "https://x.test/a?keep=1"
        );
        assert_eq!(
            clean("https://x.test/a?utm_source=a&utm_medium=b&utm_campaign=c&utm_term=d&utm_content=e&gclid=f&fbclid=g"),
            "https://x.test/a"
        );
    }

    #[test]
    fn test_clean_preserves_param_order() {
        assert_eq!(
            clean("https://x.test/a?z=1&utm_medium=email&a=2&m=3"),
            "https://x.test/a?z=1&a=2&m=3"
        );
    }

    #[test]
    fn test_clean_leaves_rest_untouched() {
        assert_eq!(
            clean("https://x.test/path/page?keep=1#section"),
            "https://x.test/path/page?keep=1#section"
        );
        assert_eq!(clean("https://x.test/plain"), "https://x.test/plain");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let inputs = [
            "https://x.test/a?utm_source=foo&keep=1",
            "https://x.test/a?keep=1&other=2",
            "https://x.test/a",
            "https://x.test/a?gclid=zzz",
        ];
        for input in inputs {
            let once = clean(input);
            assert_eq!(clean(&once), once, "clean not idempotent for {input}");
        }
    }
}
