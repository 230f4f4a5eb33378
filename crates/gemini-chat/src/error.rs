/// Failures of a `generateContent` round trip.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("API key is missing")]
    MissingApiKey,
    /// The request never produced an HTTP response, or its body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("Gemini API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("response was blocked: {0}")]
    Blocked(String),
    #[error("response contained no text")]
    EmptyResponse,
}
