//! URL scoping and crawl-priority policy.
//!
//! Stateless beyond its constant tables: decides whether a discovered link is
//! in scope for the crawl (same host or subdomain, not a blocked asset) and
//! how early it should be expanded relative to its same-depth siblings.

use url::Url;

/// File extensions that never carry crawlable documentation.
const BLOCKED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".png", ".gif", ".jpeg", ".svg", ".mp4", ".zip", ".css", ".js",
];

/// Path segments that mark infrastructure/asset URLs.
const BLOCKED_SEGMENTS: &[&str] = &[
    "/cdn-cgi/",
    "/wp-content/",
    "/wp-includes/",
    "/static/",
    "/assets/",
];

/// Keywords that mark a URL as likely documentation content.
const DOC_PATTERNS: &[&str] = &[
    "article",
    "doc",
    "help",
    "guide",
    "faq",
    "tutorial",
    "support",
    "manual",
    "reference",
    "category",
    "section",
    "topic",
    "content",
];

/// Decide whether `candidate` is in scope for a crawl that discovered it on
/// `origin`'s page.
///
/// In scope iff the candidate's host equals the origin host or is a subdomain
/// of it, and the candidate is neither a blocked asset extension nor inside a
/// blocked path segment. Empty/unparseable links are rejected upstream before
/// a `Url` ever exists.
pub fn is_in_scope(candidate: &Url, origin: &Url) -> bool {
    let path = candidate.path().to_lowercase();
    if BLOCKED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }

    let candidate_str = candidate.as_str();
    if BLOCKED_SEGMENTS.iter().any(|seg| candidate_str.contains(seg)) {
        return false;
    }

    let (Some(candidate_host), Some(origin_host)) = (candidate.host_str(), origin.host_str())
    else {
        return false;
    };

    candidate_host == origin_host || candidate_host.ends_with(&format!(".{origin_host}"))
}

/// Rank a URL for same-depth expansion order; lower rank expands earlier.
///
/// Documentation-patterned URLs rank 0 (highest priority); everything else
/// ranks by `/` count, so shallower paths come first. Used only to order the
/// frontier, never to prune.
pub fn priority_rank(url: &str) -> usize {
    let lower = url.to_lowercase();
    if DOC_PATTERNS.iter().any(|pat| lower.contains(pat)) {
        return 0;
    }

    url.matches('/').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn same_host_in_scope() {
        let origin = url("https://help.example.com/");
        assert!(is_in_scope(&url("https://help.example.com/page"), &origin));
    }

    #[test]
    fn subdomain_in_scope() {
        let origin = url("https://example.com/");
        assert!(is_in_scope(&url("https://docs.example.com/intro"), &origin));
    }

    #[test]
    fn foreign_host_out_of_scope() {
        let origin = url("https://example.com/");
        assert!(!is_in_scope(&url("https://other.net/page"), &origin));
        // Suffix match must be on a dot boundary
        assert!(!is_in_scope(&url("https://notexample.com/page"), &origin));
    }

    #[test]
    fn blocked_extensions_out_of_scope() {
        let origin = url("https://example.com/");
        assert!(!is_in_scope(&url("https://example.com/logo.PNG"), &origin));
        assert!(!is_in_scope(&url("https://example.com/file.pdf"), &origin));
        assert!(!is_in_scope(&url("https://example.com/app.js"), &origin));
    }

    #[test]
    fn blocked_segments_out_of_scope() {
        let origin = url("https://example.com/");
        assert!(!is_in_scope(
            &url("https://example.com/wp-content/uploads/x"),
            &origin
        ));
        assert!(!is_in_scope(
            &url("https://example.com/static/bundle"),
            &origin
        ));
    }

    #[test]
    fn doc_patterned_urls_rank_first() {
        assert_eq!(priority_rank("https://example.com/help/billing"), 0);
        assert_eq!(priority_rank("https://example.com/GUIDE/intro"), 0);
    }

    #[test]
    fn plain_urls_rank_by_slash_count() {
        let shallow = priority_rank("https://example.com/page");
        let deep = priority_rank("https://example.com/a/b/page");
        assert!(shallow < deep);
    }
}
