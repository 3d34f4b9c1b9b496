//! Video Job Orchestrator
//!
//! Submits the lesson narration to the avatar vendor and waits for a playable
//! URL. The lifecycle is `Submitted -> Done` when the URL comes back with the
//! submission, otherwise `Submitted -> Polling -> {Done | Failed | Exhausted}`.
//! Polling happens inline; the caller waits for the whole loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, warn};

use crate::avatar::{AvatarService, Background, SynthesisRequest};
use crate::error::{LessonError, LessonResult};
use crate::lesson::{BackgroundPreference, Subject, VideoJob};

/// Solid color used for chroma-keyable backgrounds.
pub const GREEN_SCREEN: &str = "#00FF00";

/// Tunables for the status polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            base_delay: Duration::from_millis(1000),
            factor: 1.5,
            max_delay: Duration::from_millis(8000),
        }
    }
}

impl PollPolicy {
    /// Delay before the given poll (0-based): `min(base * factor^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// Where a single poll left the job.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollState {
    Pending,
    Done(Option<String>),
    Failed(String),
}

impl PollState {
    fn from_status(body: &Value) -> Self {
        let data = &body["data"];
        let status = data["status"].as_str().unwrap_or_default();
        let video_url = data["video_url"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        match status {
            "completed" | "succeeded" => Self::Done(video_url),
            _ if video_url.is_some() => Self::Done(video_url),
            "failed" | "error" => Self::Failed(status.to_string()),
            _ => Self::Pending,
        }
    }
}

/// Why a polling round ended without a URL.
#[derive(Debug)]
enum PollError {
    /// Still rendering when the attempts ran out.
    Pending,
    Vendor(LessonError),
}

/// Maps a background preference to the vendor background.
pub fn resolve_background(preference: BackgroundPreference, subject: Subject) -> Background {
    match preference {
        BackgroundPreference::Green => Background::Color(GREEN_SCREEN.to_string()),
        BackgroundPreference::Transparent => Background::Transparent,
        BackgroundPreference::Auto => subject
            .color()
            .map(|c| Background::Color(c.to_string()))
            .unwrap_or(Background::Transparent),
    }
}

/// Drives one synthesis job from submission to a terminal state.
pub struct VideoOrchestrator {
    service: Arc<dyn AvatarService>,
    policy: PollPolicy,
}

impl VideoOrchestrator {
    pub fn new(service: Arc<dyn AvatarService>, policy: PollPolicy) -> Self {
        Self { service, policy }
    }

    /// Renders `narration` and resolves a video URL if the vendor produces one
    /// in time.
    ///
    /// A vendor-reported failure is a [`LessonError::RenderFailed`]. Running
    /// out of attempts is not an error: the job id is handed back so the
    /// caller can keep polling.
    pub async fn synthesize(
        &self,
        narration: &str,
        preference: BackgroundPreference,
        subject: Subject,
    ) -> LessonResult<VideoJob> {
        let request = SynthesisRequest {
            narration: narration.to_string(),
            background: resolve_background(preference, subject),
        };
        let receipt = self.service.submit(&request).await?;

        if let Some(video_url) = receipt.video_url {
            info!("Video URL returned with submission");
            return Ok(VideoJob {
                video_url: Some(video_url),
                job_id: None,
            });
        }

        let Some(job_id) = receipt.job_id else {
            warn!("Avatar vendor returned neither a video URL nor a job id");
            return Ok(VideoJob::default());
        };

        if self.policy.max_attempts > 0 {
            sleep(self.policy.delay_for(0)).await;
        }
        let strategy = (1..self.policy.max_attempts).map(|attempt| self.policy.delay_for(attempt));
        let attempt = &AtomicU32::new(0);
        let service = &self.service;
        let id = job_id.as_str();

        let outcome = Retry::spawn(strategy, move || async move {
            let attempt = attempt.fetch_add(1, Ordering::Relaxed);
            // Only reachable when no polls are configured.
            if attempt >= self.policy.max_attempts {
                return Err(RetryError::Permanent(PollError::Pending));
            }

            let status = match service.poll_status(id).await {
                Ok(status) => status,
                Err(e) => return Err(RetryError::Permanent(PollError::Vendor(e))),
            };

            match PollState::from_status(&status) {
                PollState::Done(video_url) => {
                    info!(job_id = %id, attempt, "Video render completed");
                    Ok(video_url)
                }
                PollState::Failed(status) => {
                    warn!(job_id = %id, attempt, status = %status, "Video render failed");
                    Err(RetryError::Permanent(PollError::Vendor(
                        LessonError::RenderFailed("HeyGen failed to render video".into()),
                    )))
                }
                PollState::Pending => {
                    debug!(job_id = %id, attempt, "Video still rendering");
                    Err(RetryError::Transient {
                        err: PollError::Pending,
                        retry_after: None,
                    })
                }
            }
        })
        .await;

        match outcome {
            Ok(video_url) => Ok(VideoJob {
                video_url,
                job_id: None,
            }),
            Err(PollError::Vendor(e)) => Err(e),
            Err(PollError::Pending) => {
                info!(job_id = %job_id, "Video polling exhausted, returning job id");
                Ok(VideoJob {
                    video_url: None,
                    job_id: Some(job_id),
                })
            }
        }
    }
}
