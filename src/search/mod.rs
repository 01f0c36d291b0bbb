//! Web search: resolve a keyword into ranked candidate URLs.
//!
//! A primary backend (DuckDuckGo HTML) is tried first; if it errors or
//! returns nothing, a fallback backend (Google HTML) is queried with the
//! same raw keyword. Both backends failing yields an empty list — callers
//! must treat zero results as a valid outcome, not a fault.

mod duckduckgo;
mod google;

pub use duckduckgo::DuckDuckGo;
pub use google::GoogleHtml;

use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search backend returned status {0}")]
    Status(u16),
}

/// Abstraction over one search backend.
/// Implemented by [`DuckDuckGo`] and [`GoogleHtml`]; mock implementations
/// used in orchestrator tests.
pub trait SearchProvider {
    async fn search(&self, keyword: &str, desired: usize) -> Result<Vec<String>, SearchError>;
}

/// Query the primary backend, falling back to the secondary when the
/// primary errors or comes back empty. Never an error for the caller:
/// exhausting both tiers yields an empty list.
pub async fn candidates(
    primary: &impl SearchProvider,
    fallback: &impl SearchProvider,
    keyword: &str,
    desired: usize,
) -> Vec<String> {
    match primary.search(keyword, desired).await {
        Ok(urls) if !urls.is_empty() => {
            debug!(count = urls.len(), "primary search succeeded");
            return urls;
        }
        Ok(_) => warn!("primary search returned no results, trying fallback"),
        Err(e) => warn!(error = %e, "primary search failed, trying fallback"),
    }

    match fallback.search(keyword, desired).await {
        Ok(urls) => {
            debug!(count = urls.len(), "fallback search returned");
            urls
        }
        Err(e) => {
            warn!(error = %e, "fallback search failed, no candidates");
            Vec::new()
        }
    }
}

/// Domain substrings excluded from candidates: search engines, video
/// platforms, social networks, marketplaces, and image boards are never
/// article content.
const DENYLIST: &[&str] = &[
    "google.",
    "youtube.",
    "twitter.",
    "facebook.",
    "instagram.",
    "amazon.",
    "rakuten.",
    "yahoo.",
    "pinterest.",
    "tiktok.",
    "linkedin.",
];

/// A candidate is kept only if it carries the HTTP(S) scheme and no
/// denylisted substring appears anywhere in it.
pub fn is_valid_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    if DENYLIST.iter().any(|domain| lower.contains(domain)) {
        return false;
    }
    url.starts_with("http")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSearch(Result<Vec<String>, ()>);

    impl SearchProvider for FixedSearch {
        async fn search(
            &self,
            _keyword: &str,
            _desired: usize,
        ) -> Result<Vec<String>, SearchError> {
            match &self.0 {
                Ok(urls) => Ok(urls.clone()),
                Err(()) => Err(SearchError::Status(503)),
            }
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn primary_results_win() {
        let primary = FixedSearch(Ok(urls(&["https://a.com", "https://b.com"])));
        let fallback = FixedSearch(Ok(urls(&["https://c.com"])));

        let got = candidates(&primary, &fallback, "citrus", 5).await;
        assert_eq!(got, urls(&["https://a.com", "https://b.com"]));
    }

    #[tokio::test]
    async fn empty_primary_falls_back() {
        let primary = FixedSearch(Ok(vec![]));
        let fallback = FixedSearch(Ok(urls(&["https://c.com"])));

        let got = candidates(&primary, &fallback, "citrus", 5).await;
        assert_eq!(got, urls(&["https://c.com"]));
    }

    #[tokio::test]
    async fn failing_primary_falls_back() {
        let primary = FixedSearch(Err(()));
        let fallback = FixedSearch(Ok(urls(&["https://c.com"])));

        let got = candidates(&primary, &fallback, "citrus", 5).await;
        assert_eq!(got, urls(&["https://c.com"]));
    }

    #[tokio::test]
    async fn both_tiers_failing_yields_empty_not_error() {
        let primary = FixedSearch(Err(()));
        let fallback = FixedSearch(Err(()));

        let got = candidates(&primary, &fallback, "citrus", 5).await;
        assert!(got.is_empty());
    }

    #[test]
    fn denylisted_domains_rejected() {
        for url in [
            "https://www.google.com/search?q=x",
            "https://www.youtube.com/watch?v=abc",
            "https://twitter.com/someone",
            "https://www.amazon.co.jp/dp/B000",
            "https://shop.rakuten.co.jp/item",
            "https://www.pinterest.com/pin/1",
        ] {
            assert!(!is_valid_url(url), "should reject {url}");
        }
    }

    #[test]
    fn denylist_matches_anywhere_in_url() {
        assert!(!is_valid_url("https://example.com/?ref=youtube.com"));
    }

    #[test]
    fn clean_http_urls_accepted() {
        assert!(is_valid_url("https://gardening-blog.example.com/citrus"));
        assert!(is_valid_url("http://example.org/article"));
    }

    #[test]
    fn non_http_rejected() {
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("//example.com/protocol-relative"));
    }
}
