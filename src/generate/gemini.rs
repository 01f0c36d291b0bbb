//! Gemini generateContent client with retry on transient failures.

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GenError, TextGenerator};
use crate::text::clip_chars;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    code: Option<u16>,
    message: Option<String>,
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Clone)]
pub struct GeminiGenerator {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn from_env(http: Client) -> Result<Self, GenError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| GenError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(GenError::ApiKeyNotSet);
        }
        let model = env::var("GEMINI_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            model,
            base_url: API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
        }
    }

    async fn generate_once(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, GenError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let request = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part { text: system }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature },
        };

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key.0)
            .header("User-Agent", crate::APP_USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini API rate limited");
            return Err(GenError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<GenerateResponse>(&text)
                && let Some(err) = &body.error
            {
                let classified = classify_api_error(err);
                warn!(error = %classified, "Gemini API error");
                return Err(classified);
            }
            // Char-based cut: API error messages are not ASCII-only.
            let snippet = clip_chars(&text, 200);
            warn!(status = %status, "Gemini API error (no structured body)");
            return Err(GenError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        let body: GenerateResponse = response.json().await?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(err);
            warn!(error = %classified, "Gemini API error in 200 response");
            return Err(classified);
        }

        let text = extract_text(&body);
        debug!(model = %self.model, chars = text.chars().count(), "generation complete");
        if text.trim().is_empty() {
            return Err(GenError::Empty);
        }
        Ok(text)
    }
}

impl TextGenerator for GeminiGenerator {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, GenError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.generate_once(system, prompt, temperature).await {
                Ok(text) => return Ok(text),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let delay_ms = jittered_backoff(attempt);
                        debug!(
                            attempt = attempt + 1,
                            delay_ms, "retrying after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(GenError::RateLimited))
    }
}

fn extract_text(body: &GenerateResponse) -> String {
    body.candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn is_retriable(e: &GenError) -> bool {
    matches!(
        e,
        GenError::RateLimited
            | GenError::Api {
                code: 500..=599,
                ..
            }
    )
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(attempt: u32) -> u64 {
    let base = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn classify_api_error(err: &ApiError) -> GenError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match err.code {
        Some(429) => GenError::RateLimited,
        Some(403) => GenError::QuotaExhausted(message),
        Some(code) => GenError::Api { code, message },
        None => GenError::Api {
            code: 0,
            message: format!("Unknown error (no status code): {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(code: Option<u16>, message: &str) -> GenError {
        classify_api_error(&ApiError {
            code,
            message: Some(message.to_string()),
        })
    }

    #[test]
    fn throttling_and_quota_codes_get_their_own_variants() {
        assert!(matches!(classify(Some(429), "slow down"), GenError::RateLimited));

        match classify(Some(403), "billing quota hit") {
            GenError::QuotaExhausted(message) => assert_eq!(message, "billing quota hit"),
            other => panic!("expected QuotaExhausted, got: {other:?}"),
        }
    }

    #[test]
    fn other_codes_pass_through_with_their_message() {
        for code in [400, 500, 503] {
            match classify(Some(code), "upstream detail") {
                GenError::Api {
                    code: got,
                    message,
                } => {
                    assert_eq!(got, code);
                    assert_eq!(message, "upstream detail");
                }
                other => panic!("expected Api({code}), got: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_code_is_reported_not_dropped() {
        match classify_api_error(&ApiError {
            code: None,
            message: None,
        }) {
            GenError::Api { code: 0, message } => {
                assert!(message.contains("no status code"));
            }
            other => panic!("expected Api(0), got: {other:?}"),
        }
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn generate_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "parts": [{"text": "# Article\n\nBody."}],
                        "role": "model"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiGenerator::with_base_url(Client::new(), &server.uri());
        let text = client.generate("system", "prompt", 0.7).await.unwrap();
        assert_eq!(text, "# Article\n\nBody.");
    }

    #[tokio::test]
    async fn request_carries_system_instruction_and_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .mount(&server)
            .await;

        let client = GeminiGenerator::with_base_url(Client::new(), &server.uri());
        client.generate("be thorough", "write", 0.5).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "be thorough"
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
    }

    #[tokio::test]
    async fn rate_limit_is_typed_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GeminiGenerator::with_base_url(Client::new(), &server.uri());
        let result = client.generate("s", "p", 0.7).await;
        assert!(matches!(result, Err(GenError::RateLimited)));
    }

    #[tokio::test]
    async fn error_body_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "Quota exceeded"}
            })))
            .mount(&server)
            .await;

        let client = GeminiGenerator::with_base_url(Client::new(), &server.uri());
        let result = client.generate("s", "p", 0.7).await;
        assert!(matches!(result, Err(GenError::QuotaExhausted(_))));
    }

    #[tokio::test]
    async fn long_multibyte_error_body_is_snipped_not_panicked() {
        let server = MockServer::start().await;
        // 300 bytes of 3-byte characters: byte 200 is mid-character.
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(ResponseTemplate::new(404).set_body_string("エ".repeat(100)))
            .mount(&server)
            .await;

        let client = GeminiGenerator::with_base_url(Client::new(), &server.uri());
        match client.generate("s", "p", 0.7).await {
            Err(GenError::Api { code: 404, message }) => {
                assert!(message.contains('エ'));
            }
            other => panic!("expected Api(404), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_candidates_are_a_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r":generateContent$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let client = GeminiGenerator::with_base_url(Client::new(), &server.uri());
        let result = client.generate("s", "p", 0.7).await;
        assert!(matches!(result, Err(GenError::Empty)));
    }
}
