pub mod assembler;
pub mod avatar;
pub mod error;
pub mod imagery;
pub mod lesson;
pub mod llm_client;
pub mod media;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;
pub mod rate_limit;
pub mod video;

pub use error::{LessonError, LessonResult};
pub use lesson::{BackgroundPreference, Difficulty, LessonContent, LessonRequest, Subject};
pub use pipeline::{AskOutcome, DegradedReason, LessonPipeline};
