//! Primary search backend: the DuckDuckGo HTML endpoint.
//!
//! Result anchors carry a redirect URL whose `uddg=` query parameter
//! holds the percent-encoded target; plain `http` hrefs appear on some
//! result variants and are taken as-is.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use super::{SearchError, SearchProvider, is_valid_url};

const BASE_URL: &str = "https://html.duckduckgo.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct DuckDuckGo {
    http: Client,
    base_url: String,
}

impl DuckDuckGo {
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

impl SearchProvider for DuckDuckGo {
    async fn search(&self, keyword: &str, desired: usize) -> Result<Vec<String>, SearchError> {
        let encoded = utf8_percent_encode(keyword, NON_ALPHANUMERIC);
        let url = format!("{}/html/?q={encoded}", self.base_url);

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
        debug!(keyword, count = results.len(), "duckduckgo search");
        Ok(results)
    }
}

fn parse_results(html: &str, desired: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    let link_selector = Selector::parse("a.result__a").expect("static selector");

    let mut results = Vec::new();
    for link in doc.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        if let Some(target) = decode_redirect(href) {
            if is_valid_url(&target) {
                results.push(target);
            }
        } else if href.starts_with("http") && is_valid_url(href) {
            results.push(href.to_string());
        }

        if results.len() >= desired {
            break;
        }
    }
    results
}

/// Pull the target URL out of a DuckDuckGo redirect href (`uddg=` param).
fn decode_redirect(href: &str) -> Option<String> {
    let start = href.find("uddg=")? + "uddg=".len();
    let encoded = href[start..].split('&').next()?;
    let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULTS_HTML: &str = r#"
<html><body>
<div class="result">
  <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fcitrus-care&rut=abc">Citrus care guide</a>
</div>
<div class="result">
  <a class="result__a" href="https://gardening.example.org/winter">Winter protection</a>
</div>
<div class="result">
  <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3D1">Video result</a>
</div>
</body></html>"#;

    #[test]
    fn parses_redirect_and_plain_hrefs() {
        let results = parse_results(RESULTS_HTML, 10);
        assert_eq!(
            results,
            vec![
                "https://example.com/citrus-care".to_string(),
                "https://gardening.example.org/winter".to_string(),
            ]
        );
    }

    #[test]
    fn denylisted_targets_dropped() {
        let results = parse_results(RESULTS_HTML, 10);
        assert!(!results.iter().any(|u| u.contains("youtube")));
    }

    #[test]
    fn respects_desired_count() {
        let results = parse_results(RESULTS_HTML, 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn decode_redirect_extracts_uddg_param() {
        assert_eq!(
            decode_redirect("/l/?uddg=https%3A%2F%2Fa.com%2Fp&rut=x"),
            Some("https://a.com/p".to_string())
        );
        assert_eq!(decode_redirect("/l/?other=1"), None);
    }

    #[tokio::test]
    async fn search_hits_html_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_HTML))
            .mount(&server)
            .await;

        let client = DuckDuckGo::with_base_url(Client::new(), &server.uri());
        let results = client.search("citrus care", 5).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn non_200_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = DuckDuckGo::with_base_url(Client::new(), &server.uri());
        let err = client.search("citrus", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Status(429)));
    }
}
