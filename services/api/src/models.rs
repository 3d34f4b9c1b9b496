//! API Models
//!
//! Request and response bodies for the HTTP surface, annotated for the
//! generated OpenAPI document. The lesson payload itself lives in
//! `tutor_core::assembler`.

use serde::{Deserialize, Serialize};
use tutor_core::imagery::BackgroundDescriptor;
use tutor_core::media::{MediaItem, MediaKind};
use utoipa::{IntoParams, ToSchema};

/// Body of `POST /ask`. Every field is optional at the wire level so a missing
/// question can be answered with a 400 instead of a deserialization error.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskPayload {
    #[schema(example = "How does gravity work?")]
    pub question: Option<String>,
    /// `transparent`, `green` or `auto` (default).
    #[schema(example = "auto")]
    pub background_preference: Option<String>,
    #[schema(example = "beginner")]
    pub user_level: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Returned with HTTP 429 when the text vendor is throttling.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThrottledResponse {
    pub error: String,
    /// Seconds to wait before retrying.
    #[schema(example = 60)]
    pub retry_after: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub has_gemini: bool,
    pub has_open_ai: bool,
    pub has_heygen: bool,
    pub has_hugging_face: bool,
    pub has_pexels: bool,
    #[schema(example = "gemini")]
    pub text_provider: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    #[schema(example = "2025-01-15T10:30:00+00:00")]
    pub timestamp: String,
    pub env: CredentialStatus,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VideoStatusQuery {
    /// Render job id returned by `/ask`.
    pub id: Option<String>,
}

/// Body of `POST /generate-background`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BackgroundPayload {
    #[schema(example = "Photosynthesis")]
    pub concept: Option<String>,
    #[schema(example = "Biology")]
    pub subject: Option<String>,
    pub style: Option<String>,
}

/// Body returned by `POST /generate-background`, generated or fallback.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum BackgroundResponse {
    Generated {
        success: bool,
        /// `data:image/png;base64,...`
        url: String,
        cached: bool,
        concept: String,
        prompt: String,
    },
    Fallback {
        success: bool,
        fallback: bool,
        #[schema(example = "#2c3e50")]
        color: String,
        error: String,
        concept: String,
    },
}

impl From<BackgroundDescriptor> for BackgroundResponse {
    fn from(descriptor: BackgroundDescriptor) -> Self {
        match descriptor {
            BackgroundDescriptor::Generated {
                url,
                cached,
                concept,
                prompt,
            } => BackgroundResponse::Generated {
                success: true,
                url,
                cached,
                concept,
                prompt,
            },
            BackgroundDescriptor::Fallback {
                color,
                error,
                concept,
            } => BackgroundResponse::Fallback {
                success: false,
                fallback: true,
                color,
                error,
                concept,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MediaQuery {
    /// Search terms.
    pub query: Option<String>,
    /// `photos` (default) or `videos`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Results per page, default 5.
    pub per_page: Option<u32>,
}

impl MediaQuery {
    /// Anything other than `videos` searches photos.
    pub fn media_kind(&self) -> MediaKind {
        match self.kind.as_deref() {
            Some("videos") => MediaKind::Videos,
            _ => MediaKind::Photos,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MediaResponse {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub query: String,
    pub content: Vec<MediaItem>,
    pub total: usize,
}
