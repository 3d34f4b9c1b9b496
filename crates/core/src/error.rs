//! Lesson Pipeline Errors
//!
//! A single error type shared by every stage of the lesson pipeline and the
//! auxiliary vendor clients. The variants mirror how the HTTP surface treats a
//! failure: configuration problems and upstream failures degrade to mock
//! content, throttling is reported to the caller, and render failures are
//! absorbed by the response assembler.

/// The error type for all lesson pipeline operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LessonError {
    /// A vendor credential is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The vendor signalled rate limiting on a single attempt.
    #[error("Rate limit hit: {0}")]
    Throttled(String),

    /// The daily ceiling was reached or every retry was throttled.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The avatar vendor reported that rendering failed.
    #[error("Video render failed: {0}")]
    RenderFailed(String),

    /// Any other network, timeout or protocol failure.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl LessonError {
    /// Whether this error is a throttling condition that must be surfaced to the
    /// caller instead of being masked by mock content.
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::QuotaExceeded(_))
    }

    /// Maps a `reqwest` failure, treating HTTP 429 as throttling.
    pub fn from_http(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 429 => Self::Throttled(err.to_string()),
            _ => Self::Upstream(err.to_string()),
        }
    }
}

/// A convenience type alias for `Result<T, LessonError>`.
pub type LessonResult<T> = Result<T, LessonError>;

/// Returns true when a vendor error message carries a quota or rate-limit signal.
pub fn is_throttling_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429")
        || lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("resource_exhausted")
        || lower.contains("resource has been exhausted")
        || lower.contains("too many requests")
}
