//! Lesson Pipeline
//!
//! Runs one question end to end: prompt, rate-limited generation,
//! normalization, video synthesis and assembly. The outcome is explicit about
//! which branch was taken so the HTTP layer only has to map it to a status.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::assembler::{LessonPayload, RETRY_AFTER, assemble, mock_payload};
use crate::error::{LessonError, LessonResult};
use crate::lesson::LessonRequest;
use crate::normalizer::normalize;
use crate::prompt::build_prompt;
use crate::rate_limit::RateLimitedClient;
use crate::video::VideoOrchestrator;

/// Why the pipeline served mock content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// A text or video vendor credential is missing or invalid.
    NoCredentials,
    /// A stage failed with something other than throttling.
    UpstreamFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    Live(LessonPayload),
    Degraded {
        reason: DegradedReason,
        payload: LessonPayload,
    },
    /// The text vendor is throttling us; the caller should retry later.
    Throttled {
        message: String,
        retry_after: Duration,
    },
}

pub struct LessonPipeline {
    text: Arc<RateLimitedClient>,
    video: Option<VideoOrchestrator>,
}

impl LessonPipeline {
    /// `video` is `None` when the avatar vendor is not configured.
    pub fn new(text: Arc<RateLimitedClient>, video: Option<VideoOrchestrator>) -> Self {
        Self { text, video }
    }

    pub fn has_credentials(&self) -> bool {
        self.text.is_configured() && self.video.is_some()
    }

    pub async fn ask(&self, request: &LessonRequest) -> AskOutcome {
        if !self.has_credentials() {
            info!("Vendor credentials missing, serving mock lesson");
            return AskOutcome::Degraded {
                reason: DegradedReason::NoCredentials,
                payload: mock_payload(&request.question),
            };
        }

        match self.run(request).await {
            Ok(payload) => AskOutcome::Live(payload),
            Err(e) if e.is_throttling() => {
                warn!(error = %e, "Lesson generation throttled");
                AskOutcome::Throttled {
                    message: e.to_string(),
                    retry_after: RETRY_AFTER,
                }
            }
            Err(e) => {
                warn!(error = %e, "Lesson generation failed, serving mock lesson");
                AskOutcome::Degraded {
                    reason: DegradedReason::UpstreamFailure(e.to_string()),
                    payload: mock_payload(&request.question),
                }
            }
        }
    }

    async fn run(&self, request: &LessonRequest) -> LessonResult<LessonPayload> {
        let video = self.video.as_ref().ok_or_else(|| {
            LessonError::Configuration("Avatar vendor is not configured".into())
        })?;

        let prompt = build_prompt(&request.question, request.user_level.as_deref());
        let raw = self.text.generate(&prompt).await?;

        let normalized = normalize(&raw, &request.question);
        let content = normalized.content();
        info!(
            path = normalized.path(),
            concept = %content.concept,
            subject = content.subject.as_str(),
            "Lesson content normalized"
        );
        let content = normalized.into_content();

        let job = video
            .synthesize(
                &content.answer,
                request.background_preference,
                content.subject,
            )
            .await?;

        Ok(assemble(content, Some(job)))
    }
}
