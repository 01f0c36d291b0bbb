//! Text generation seam: the aggregated corpus goes in, article text
//! comes out. One production implementation (Gemini); tests use mocks.

pub mod gemini;

pub use gemini::GeminiGenerator;

#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey")]
    ApiKeyNotSet,

    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("model returned no text")]
    Empty,
}

/// Abstraction over the generation model. Implemented by
/// `GeminiGenerator` for production; mock implementations used in tests.
pub trait TextGenerator {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, GenError>;
}
