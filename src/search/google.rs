//! Fallback search backend: Google HTML result pages.
//!
//! Result links are wrapped as `/url?q=<target>&...`; the target is taken
//! verbatim up to the first `&`.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use super::{SearchError, SearchProvider, is_valid_url};

const BASE_URL: &str = "https://www.google.co.jp";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct GoogleHtml {
    http: Client,
    base_url: String,
}

impl GoogleHtml {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

impl SearchProvider for GoogleHtml {
    async fn search(&self, keyword: &str, desired: usize) -> Result<Vec<String>, SearchError> {
        let encoded = utf8_percent_encode(keyword, NON_ALPHANUMERIC);
        let url = format!("{}/search?q={encoded}&num={desired}", self.base_url);

        let response = self
            .http
            .get(&url)
            .header("User-Agent", crate::random_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "ja,en-US;q=0.7,en;q=0.3")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let results = parse_results(&body, desired);
        debug!(keyword, count = results.len(), "google search");
        Ok(results)
    }
}

fn parse_results(html: &str, desired: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").expect("static selector");

    let mut results = Vec::new();
    for link in doc.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(rest) = href.strip_prefix("/url?q=") else {
            continue;
        };
        let Some(target) = rest.split('&').next() else {
            continue;
        };
        if is_valid_url(target) {
            results.push(target.to_string());
        }
        if results.len() >= desired {
            break;
        }
    }
    results
}
