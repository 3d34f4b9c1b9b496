//! Content Normalizer
//!
//! Converts raw text-model output into a [`LessonContent`]. Structured JSON is
//! preferred; when it does not parse, a pattern-based extraction is used
//! instead. Every field falls back independently, so normalization never
//! fails and is a pure function of its inputs.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::lesson::{
    Difficulty, LessonContent, MAX_ANSWER_CHARS, MAX_CONCEPT_CHARS, MAX_INTERACTIVE_ELEMENTS,
    MAX_SLIDES, MAX_STUDY_LIST, Subject, truncate_chars,
};

const MISSING_ANSWER: &str = "Let me think about that topic.";
const FALLBACK_CONCEPT: &str = "Learning Topic";

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:json)?\n?").expect("Valid fence regex"));
static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)answer["\s]*:[\s]*["']([^"']+)["']"#).expect("Valid answer regex")
});
static CONCEPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)concept["\s]*:[\s]*["']([^"']+)["']"#).expect("Valid concept regex")
});
static SLIDES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)slides["\s]*:[\s]*\[([^\]]+)\]"#).expect("Valid slides regex")
});

/// Keyword to display-title vocabulary. Multi-word keywords come before the
/// single words they end with.
const CONCEPT_VOCABULARY: &[(&str, &str)] = &[
    // Biology
    ("photosynthesis", "Photosynthesis"),
    ("cellular respiration", "Cellular Respiration"),
    ("respiration", "Respiration"),
    ("dna", "DNA Structure"),
    ("genetics", "Genetics"),
    ("evolution", "Evolution"),
    ("mitosis", "Cell Division (Mitosis)"),
    ("meiosis", "Cell Division (Meiosis)"),
    ("ecology", "Ecology"),
    ("cells", "Cell Biology"),
    // Physics
    ("gravity", "Gravity and Forces"),
    ("magnetism", "Magnetism"),
    ("electricity", "Electricity"),
    ("current", "Electric Current"),
    ("waves", "Wave Motion"),
    ("sound", "Sound Waves"),
    ("light", "Light and Optics"),
    ("optics", "Optics"),
    ("thermodynamics", "Thermodynamics"),
    ("energy", "Energy and Work"),
    ("motion", "Motion and Forces"),
    // Chemistry
    ("atoms", "Atomic Structure"),
    ("molecules", "Molecular Structure"),
    ("bonding", "Chemical Bonding"),
    ("reactions", "Chemical Reactions"),
    ("acids", "Acids and Bases"),
    ("bases", "Acids and Bases"),
    ("periodic", "Periodic Table"),
    ("elements", "Chemical Elements"),
    // Mathematics
    ("algebra", "Algebra"),
    ("geometry", "Geometry"),
    ("coordinate", "Coordinate Geometry"),
    ("calculus", "Calculus"),
    ("trigonometry", "Trigonometry"),
    ("statistics", "Statistics"),
    ("probability", "Probability"),
    ("functions", "Mathematical Functions"),
    ("equations", "Solving Equations"),
    // Computer Science
    ("algorithms", "Algorithms"),
    ("data structures", "Data Structures"),
    ("programming", "Programming Concepts"),
    ("binary", "Binary Systems"),
    ("search", "Search Algorithms"),
    ("sorting", "Sorting Algorithms"),
    ("recursion", "Recursion"),
    ("loops", "Programming Loops"),
];

const SUBJECT_KEYWORDS: &[(Subject, &[&str])] = &[
    (
        Subject::Biology,
        &[
            "photosynthesis",
            "dna",
            "cell",
            "mitosis",
            "meiosis",
            "evolution",
            "genetics",
            "respiration",
            "ecology",
        ],
    ),
    (
        Subject::Physics,
        &["gravity", "force", "energy", "wave", "light", "electricity", "magnetism", "motion"],
    ),
    (
        Subject::Chemistry,
        &["atom", "molecule", "reaction", "acid", "base", "element", "bond", "periodic"],
    ),
    (
        Subject::Mathematics,
        &["algebra", "geometry", "calculus", "trigonometry", "equation", "function", "coordinate"],
    ),
    (
        Subject::ComputerScience,
        &["algorithm", "programming", "data", "binary", "search", "sort", "recursion", "loop"],
    ),
];

/// The result of normalization, tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedContent {
    /// The model returned a parseable JSON object.
    Structured(LessonContent),
    /// JSON parsing failed and fields were recovered by pattern matching.
    Heuristic(LessonContent),
    /// The model returned nothing usable at all.
    Default(LessonContent),
}

impl NormalizedContent {
    pub fn content(&self) -> &LessonContent {
        match self {
            Self::Structured(c) | Self::Heuristic(c) | Self::Default(c) => c,
        }
    }

    pub fn into_content(self) -> LessonContent {
        match self {
            Self::Structured(c) | Self::Heuristic(c) | Self::Default(c) => c,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::Heuristic(_) => "heuristic",
            Self::Default(_) => "default",
        }
    }
}

/// Normalizes raw model output for the given question.
pub fn normalize(raw: &str, question: &str) -> NormalizedContent {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        debug!("Model output was blank, using default lesson content");
        return NormalizedContent::Default(default_content(question));
    }

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(fields)) => NormalizedContent::Structured(from_fields(&fields, question)),
        _ => {
            debug!("Model output was not a JSON object, falling back to extraction");
            NormalizedContent::Heuristic(from_text(raw, question))
        }
    }
}

/// Removes Markdown code fences (optionally tagged `json`) and trims.
pub fn strip_code_fences(raw: &str) -> String {
    FENCE_RE.replace_all(raw, "").trim().to_string()
}

fn from_fields(fields: &Map<String, Value>, question: &str) -> LessonContent {
    let answer = non_empty_str(fields.get("answer"))
        .map(str::to_string)
        .unwrap_or_else(|| MISSING_ANSWER.to_string());
    let concept = non_empty_str(fields.get("concept"))
        .map(str::to_string)
        .unwrap_or_else(|| extract_concept(question));
    let concept = truncate_chars(&concept, MAX_CONCEPT_CHARS);

    let difficulty = fields
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(Difficulty::parse)
        .unwrap_or_default();
    let subject = fields
        .get("subject")
        .and_then(Value::as_str)
        .and_then(Subject::parse)
        .unwrap_or_default();

    let mut slides = string_list(fields.get("slides"), MAX_SLIDES);
    if slides.is_empty() {
        slides = default_slides(&concept);
    }

    LessonContent {
        answer: truncate_chars(&answer, MAX_ANSWER_CHARS),
        concept,
        difficulty,
        subject,
        slides,
        interactive_elements: string_list(
            fields.get("interactiveElements"),
            MAX_INTERACTIVE_ELEMENTS,
        ),
        prerequisites: string_list(fields.get("prerequisites"), MAX_STUDY_LIST),
        next_topics: string_list(fields.get("nextTopics"), MAX_STUDY_LIST),
        real_world_examples: string_list(fields.get("realWorldExamples"), MAX_STUDY_LIST),
    }
}

fn from_text(raw: &str, question: &str) -> LessonContent {
    let answer = capture(&ANSWER_RE, raw).unwrap_or_else(|| {
        raw.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(3)
            .collect::<Vec<_>>()
            .join(" ")
    });
    let concept = capture(&CONCEPT_RE, raw).unwrap_or_else(|| extract_concept(question));
    let concept = truncate_chars(&concept, MAX_CONCEPT_CHARS);

    let mut slides: Vec<String> = SLIDES_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|s| s.replace(['"', '\''], "").trim().to_string())
                .filter(|s| !s.is_empty())
                .take(MAX_SLIDES)
                .collect()
        })
        .unwrap_or_default();
    if slides.is_empty() {
        slides = default_slides(&concept);
    }

    LessonContent {
        answer: truncate_chars(&answer, MAX_ANSWER_CHARS),
        difficulty: difficulty_from_question(question),
        subject: subject_from_concept(&concept),
        concept,
        slides,
        interactive_elements: Vec::new(),
        prerequisites: Vec::new(),
        next_topics: Vec::new(),
        real_world_examples: Vec::new(),
    }
}

fn default_content(question: &str) -> LessonContent {
    let concept = truncate_chars(&extract_concept(question), MAX_CONCEPT_CHARS);
    LessonContent {
        answer: MISSING_ANSWER.to_string(),
        difficulty: difficulty_from_question(question),
        subject: subject_from_concept(&concept),
        slides: default_slides(&concept),
        concept,
        interactive_elements: Vec::new(),
        prerequisites: Vec::new(),
        next_topics: Vec::new(),
        real_world_examples: Vec::new(),
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Collects the non-empty string entries of a JSON array; anything else is dropped.
fn string_list(value: Option<&Value>, max: usize) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(max)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Derives a concept title from the question's wording.
pub fn extract_concept(question: &str) -> String {
    let lower = question.to_lowercase();
    if let Some((_, title)) = CONCEPT_VOCABULARY
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
    {
        return title.to_string();
    }

    question
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|w| w.chars().count() > 3)
        .map(capitalize)
        .unwrap_or_else(|| FALLBACK_CONCEPT.to_string())
}

pub fn difficulty_from_question(question: &str) -> Difficulty {
    let lower = question.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has_any(&["basic", "simple", "explain", "what is"]) {
        Difficulty::Beginner
    } else if has_any(&["advanced", "complex", "derive", "prove"]) {
        Difficulty::Advanced
    } else if has_any(&["how does", "analyze", "compare"]) {
        Difficulty::Intermediate
    } else {
        Difficulty::Beginner
    }
}

pub fn subject_from_concept(concept: &str) -> Subject {
    let lower = concept.to_lowercase();
    SUBJECT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(subject, _)| *subject)
        .unwrap_or_default()
}

/// The five-slide outline used when the model supplies no slides.
pub fn default_slides(concept: &str) -> Vec<String> {
    vec![
        format!("Introduction to {concept}"),
        "Key components and principles".to_string(),
        "Real-world applications".to_string(),
        "Common examples".to_string(),
        "Why it matters".to_string(),
    ]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
