//! Response Assembler
//!
//! Produces the final `/ask` payload, either from live content or from the
//! deterministic mock used in degraded mode.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::lesson::{Difficulty, LessonContent, Subject, VideoJob};

/// Retry hint sent with every throttled response.
pub const RETRY_AFTER: Duration = Duration::from_secs(60);

/// The JSON body of a successful `/ask` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonPayload {
    #[serde(flatten)]
    pub content: LessonContent,
    /// Playable avatar video, when rendering finished in time.
    pub video_url: Option<String>,
    /// Render job to poll through `/video-status` when no URL was resolved.
    pub job_id: Option<String>,
}

/// Merges normalized content with the video outcome.
pub fn assemble(content: LessonContent, job: Option<VideoJob>) -> LessonPayload {
    let job = job.unwrap_or_default();
    LessonPayload {
        content: content.clamped(),
        video_url: job.video_url,
        job_id: job.job_id,
    }
}

/// The placeholder lesson served when live generation is unavailable.
///
/// Deterministic in `question`; the concept is its first two words.
pub fn mock_payload(question: &str) -> LessonPayload {
    let concept = question
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");
    let concept = if concept.is_empty() {
        "General".to_string()
    } else {
        concept
    };

    let content = LessonContent {
        answer: format!(
            "Here is a comprehensive explanation of {concept}. This is a mock response because API limits have been reached or API keys are not configured properly."
        ),
        slides: vec![
            format!("Overview of {concept}"),
            "Key steps or components".to_string(),
            "Real-world examples and applications".to_string(),
            "Common challenges and solutions".to_string(),
            "Quick recap and summary".to_string(),
        ],
        concept,
        difficulty: Difficulty::Beginner,
        subject: Subject::General,
        interactive_elements: vec!["animation".to_string(), "visualization".to_string()],
        prerequisites: Vec::new(),
        next_topics: Vec::new(),
        real_world_examples: Vec::new(),
    };

    assemble(content, None)
}
