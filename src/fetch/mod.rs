//! Page fetching: bounded GET with a randomized user-agent, charset
//! detection, and structural extraction of the response HTML.

mod extractor;

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::Limits;
use crate::text::truncate_chars;

/// Per-page timeout. A hanging remote end must never stall a research run.
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RESPONSE_BYTES: usize = 10_000_000;
/// How far into the body to look for a `<meta charset>` declaration.
const CHARSET_SNIFF_BYTES: usize = 2_048;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("response too large (>{} bytes)", MAX_RESPONSE_BYTES)]
    TooLarge,
}

/// One fetched web page, structurally extracted.
#[derive(Debug, Clone)]
pub struct PageExtract {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    /// Level-prefixed headings in document order, at most 20.
    pub headings: Vec<String>,
    /// Plain body text, capped at the per-page ceiling.
    pub content: String,
}

/// Fetch a page and extract title, meta description, headings, and body
/// text. Errors here are expected and swallowed by the orchestrator; a
/// single bad page must never abort a multi-page research run.
pub async fn fetch_extract(
    client: &Client,
    url: &str,
    limits: &Limits,
) -> Result<PageExtract, FetchError> {
    validate_url(url)?;
    let (final_url, html) = download(client, url).await?;

    let page = extractor::extract_page(&html, limits);
    debug!(url = %final_url, chars = page.body.chars().count(), "page extracted");

    Ok(PageExtract {
        url: final_url,
        title: page.title,
        meta_description: page.meta_description,
        headings: page.headings,
        content: page.body,
    })
}

/// Fetch a page for a persisted snapshot: title plus whole-page text,
/// capped at the snapshot ceiling with a visible marker.
pub async fn fetch_snapshot(
    client: &Client,
    url: &str,
    limits: &Limits,
) -> Result<(String, String), FetchError> {
    validate_url(url)?;
    let (final_url, html) = download(client, url).await?;

    let (title, text) = extractor::extract_full_text(&html);
    let title = if title.is_empty() {
        final_url.clone()
    } else {
        title
    };
    Ok((title, truncate_chars(&text, limits.snapshot_chars)))
}

async fn download(client: &Client, url: &str) -> Result<(String, String), FetchError> {
    let response = client
        .get(url)
        .header("User-Agent", crate::random_user_agent())
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "ja,en-US;q=0.7,en;q=0.3")
        .timeout(PAGE_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let final_url = response.url().to_string();
    let header_charset = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_from_content_type);

    if let Some(len) = response.content_length() {
        if len as usize > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge);
        }
    }

    let mut body = Vec::new();
    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge);
        }
    }

    Ok((final_url, decode_body(&body, header_charset.as_deref())))
}

fn validate_url(raw: &str) -> Result<(), FetchError> {
    let parsed = url::Url::parse(raw)?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(FetchError::InvalidScheme),
    }
}

/// Decode response bytes: header charset, then sniffed meta charset,
/// then UTF-8 with replacement.
fn decode_body(bytes: &[u8], header_charset: Option<&str>) -> String {
    let label = header_charset
        .map(str::to_string)
        .or_else(|| sniff_meta_charset(bytes));

    if let Some(label) = label {
        if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (text, _, _) = encoding.decode(bytes);
            return text.into_owned();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let value = lower[start..]
        .trim_start_matches(['"', '\''])
        .split([';', '"', '\'', ' '])
        .next()?
        .trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(CHARSET_SNIFF_BYTES)];
    let text = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = text.find("charset=")? + "charset=".len();
    let value: String = text[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
