//! Avatar Vendor Client
//!
//! The port used by the video orchestrator and the status proxy, plus the
//! HeyGen implementation of it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{LessonError, LessonResult};

const HEYGEN_API_BASE: &str = "https://api.heygen.com";
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(15);

/// Background behind the avatar, in the vendor's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Background {
    Transparent,
    Color(String),
}

/// What to render: the narration script and the background behind the avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub narration: String,
    pub background: Background,
}

/// The vendor's answer to a submission. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub video_url: Option<String>,
    pub job_id: Option<String>,
}

impl SubmissionReceipt {
    /// Reads `data.video_url` and `data.video_id` (else `data.task_id`).
    pub fn from_response(body: &Value) -> Self {
        let data = &body["data"];
        Self {
            video_url: non_empty(&data["video_url"]),
            job_id: non_empty(&data["video_id"]).or_else(|| non_empty(&data["task_id"])),
        }
    }
}

/// Talking-avatar rendering service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvatarService: Send + Sync {
    /// Submits one synthesis request.
    async fn submit(&self, request: &SynthesisRequest) -> LessonResult<SubmissionReceipt>;

    /// Fetches the raw status document for a job.
    async fn poll_status(&self, job_id: &str) -> LessonResult<Value>;
}

/// HeyGen implementation of [`AvatarService`].
pub struct HeyGenClient {
    http: reqwest::Client,
    api_key: String,
    avatar_id: String,
    voice_id: String,
}

impl HeyGenClient {
    pub fn new(api_key: String, avatar_id: String, voice_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            avatar_id,
            voice_id,
        }
    }

    fn request_body(&self, request: &SynthesisRequest) -> Value {
        json!({
            "video_inputs": [{
                "character": {
                    "type": "avatar",
                    "avatar_id": self.avatar_id,
                    "avatar_style": "normal",
                },
                "voice": {
                    "type": "text",
                    "input_text": request.narration,
                    "voice_id": self.voice_id,
                },
                "background": request.background,
            }],
            "dimension": { "width": 1280, "height": 720 },
        })
    }
}

#[async_trait]
impl AvatarService for HeyGenClient {
    async fn submit(&self, request: &SynthesisRequest) -> LessonResult<SubmissionReceipt> {
        let body: Value = self
            .http
            .post(format!("{HEYGEN_API_BASE}/v2/video/generate"))
            .header("X-Api-Key", &self.api_key)
            .json(&self.request_body(request))
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(LessonError::from_http)?
            .json()
            .await
            .map_err(LessonError::from_http)?;

        let receipt = SubmissionReceipt::from_response(&body);
        debug!(?receipt, "Video synthesis submitted");
        Ok(receipt)
    }

    async fn poll_status(&self, job_id: &str) -> LessonResult<Value> {
        self.http
            .get(format!("{HEYGEN_API_BASE}/v1/video.status"))
            .query(&[("id", job_id)])
            .header("X-Api-Key", &self.api_key)
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(LessonError::from_http)?
            .json()
            .await
            .map_err(LessonError::from_http)
    }
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_wire_shape() {
        assert_eq!(
            serde_json::to_value(Background::Transparent).unwrap(),
            json!({ "type": "transparent" })
        );
        assert_eq!(
            serde_json::to_value(Background::Color("#00FF00".into())).unwrap(),
            json!({ "type": "color", "value": "#00FF00" })
        );
    }

    #[test]
    fn test_receipt_prefers_video_id_over_task_id() {
        let receipt = SubmissionReceipt::from_response(&json!({
            "data": { "video_id": "v1", "task_id": "t1" }
        }));
        assert_eq!(receipt.job_id.as_deref(), Some("v1"));
        assert_eq!(receipt.video_url, None);

        let receipt = SubmissionReceipt::from_response(&json!({ "data": { "task_id": "t1" } }));
        assert_eq!(receipt.job_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_receipt_with_immediate_url() {
        let receipt = SubmissionReceipt::from_response(&json!({
            "data": { "video_url": "https://cdn/v.mp4", "video_id": "v1" }
        }));
        assert_eq!(receipt.video_url.as_deref(), Some("https://cdn/v.mp4"));
    }

    #[test]
    fn test_receipt_from_unexpected_body() {
        let receipt = SubmissionReceipt::from_response(&json!({ "error": "nope" }));
        assert_eq!(receipt, SubmissionReceipt::default());
    }

    #[test]
    fn test_request_body_shape() {
        let client = HeyGenClient::new("key".into(), "avatar-1".into(), "en-US".into());
        let body = client.request_body(&SynthesisRequest {
            narration: "Hello there".into(),
            background: Background::Color("#1a1a2e".into()),
        });
        let input = &body["video_inputs"][0];
        assert_eq!(input["character"]["avatar_id"], "avatar-1");
        assert_eq!(input["character"]["avatar_style"], "normal");
        assert_eq!(input["voice"]["input_text"], "Hello there");
        assert_eq!(input["voice"]["voice_id"], "en-US");
        assert_eq!(input["background"]["value"], "#1a1a2e");
        assert_eq!(body["dimension"]["width"], 1280);
        assert_eq!(body["dimension"]["height"], 720);
    }
}
