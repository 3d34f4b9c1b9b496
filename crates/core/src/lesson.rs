use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum length of a lesson answer, in characters.
pub const MAX_ANSWER_CHARS: usize = 2000;
/// Maximum length of a lesson concept title, in characters.
pub const MAX_CONCEPT_CHARS: usize = 64;
/// Maximum number of slides kept from the text model.
pub const MAX_SLIDES: usize = 6;
/// Maximum number of interactive element tags kept from the text model.
pub const MAX_INTERACTIVE_ELEMENTS: usize = 10;
/// Maximum number of entries kept for each optional study list.
pub const MAX_STUDY_LIST: usize = 5;

/// How the avatar video background should be chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundPreference {
    Transparent,
    Green,
    #[default]
    Auto,
}

impl BackgroundPreference {
    /// Parses a caller-supplied preference. Unknown values mean no background.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "green" => Self::Green,
            "auto" => Self::Auto,
            _ => Self::Transparent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// The subject area a lesson belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Subject {
    Biology,
    Physics,
    Chemistry,
    Mathematics,
    #[serde(rename = "Computer Science")]
    ComputerScience,
    #[default]
    General,
}

impl Subject {
    /// Parses an exact subject name as produced by the text model.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Biology" => Some(Self::Biology),
            "Physics" => Some(Self::Physics),
            "Chemistry" => Some(Self::Chemistry),
            "Mathematics" => Some(Self::Mathematics),
            "Computer Science" => Some(Self::ComputerScience),
            "General" => Some(Self::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Biology => "Biology",
            Self::Physics => "Physics",
            Self::Chemistry => "Chemistry",
            Self::Mathematics => "Mathematics",
            Self::ComputerScience => "Computer Science",
            Self::General => "General",
        }
    }

    /// The solid color associated with a subject, if it has one.
    pub fn color(&self) -> Option<&'static str> {
        match self {
            Self::Biology => Some("#2d5016"),
            Self::Physics => Some("#1a1a2e"),
            Self::Chemistry => Some("#4a1a4a"),
            Self::Mathematics => Some("#2c3e50"),
            Self::ComputerScience => Some("#1a1a1a"),
            Self::General => None,
        }
    }
}

/// A single incoming question. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRequest {
    pub question: String,
    pub background_preference: BackgroundPreference,
    /// Optional hint about the learner's level, forwarded to the prompt.
    pub user_level: Option<String>,
}

impl LessonRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            background_preference: BackgroundPreference::default(),
            user_level: None,
        }
    }
}

/// The normalized pedagogical payload.
///
/// Every field is populated before a `LessonContent` leaves the normalizer or
/// the assembler, even when the upstream model produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    #[schema(example = "Gravity is the force that pulls objects toward each other...")]
    pub answer: String,
    #[schema(example = "Gravity and Forces")]
    pub concept: String,
    pub difficulty: Difficulty,
    pub subject: Subject,
    pub slides: Vec<String>,
    pub interactive_elements: Vec<String>,
    pub prerequisites: Vec<String>,
    pub next_topics: Vec<String>,
    pub real_world_examples: Vec<String>,
}

impl LessonContent {
    /// Re-applies the length limits. Idempotent.
    pub fn clamped(mut self) -> Self {
        self.answer = truncate_chars(&self.answer, MAX_ANSWER_CHARS);
        self.concept = truncate_chars(&self.concept, MAX_CONCEPT_CHARS);
        self.slides.truncate(MAX_SLIDES);
        self.interactive_elements.truncate(MAX_INTERACTIVE_ELEMENTS);
        self.prerequisites.truncate(MAX_STUDY_LIST);
        self.next_topics.truncate(MAX_STUDY_LIST);
        self.real_world_examples.truncate(MAX_STUDY_LIST);
        self
    }
}

/// The outcome of a video synthesis request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoJob {
    pub video_url: Option<String>,
    pub job_id: Option<String>,
}

/// Truncates a string to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
