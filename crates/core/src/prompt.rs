//! Prompt Builder
//!
//! Turns a learner's question into the instruction sent to the text model. The
//! instruction pins the JSON shape that [`crate::normalizer`] expects back.

const ROLE: &str = "You are an expert educational AI tutor specializing in creating \
clear, engaging explanations for students of all levels. Your job is to turn a \
student's question into a short, well-structured lesson.";

const ANALYSIS_STEPS: &str = "ANALYSIS STEPS:
1. Identify the core concept behind the question.
2. Decide which subject area it belongs to.
3. Judge the appropriate difficulty level.
4. Plan a step-by-step explanation that builds understanding.
5. Pick concrete, real-world examples.";

const JSON_CONTRACT: &str = r#"RESPONSE FORMAT:
Respond with ONLY a valid JSON object, no markdown and no commentary, in exactly this shape:
{
  "answer": "A clear explanation in 150-300 words, written to be spoken aloud",
  "concept": "A short title for the main concept (max 5 words)",
  "slides": ["3 to 6 short slide titles that outline the explanation"],
  "difficulty": "beginner | intermediate | advanced",
  "subject": "Biology | Physics | Chemistry | Mathematics | Computer Science | General",
  "interactiveElements": ["animation", "diagram", "visualization", "quiz"],
  "prerequisites": ["Concepts the student should know first (optional)"],
  "nextTopics": ["Related topics to explore next (optional)"],
  "realWorldExamples": ["Everyday examples of the concept (optional)"]
}"#;

const GUIDELINES: &str = "EXPLANATION GUIDELINES:
- Start from what the student already knows and build up.
- Use analogies and everyday language; define any technical term you use.
- Keep sentences short, the answer is narrated by a video avatar.
- Avoid markdown, bullet characters and emojis inside the answer.";

const WORKED_EXAMPLE: &str = r#"EXAMPLE:
QUESTION: How does photosynthesis work?
{
  "answer": "Photosynthesis is how plants make their own food using sunlight. Inside the leaves, tiny structures called chloroplasts capture light energy. The plant takes in carbon dioxide from the air and water from its roots, then uses the captured energy to turn them into glucose, a sugar it uses for fuel. Oxygen is released as a by-product, which is the oxygen we breathe.",
  "concept": "Photosynthesis",
  "slides": ["What is photosynthesis?", "Chloroplasts capture light", "Inputs: CO2 and water", "Output: glucose and oxygen", "Why it matters for life on Earth"],
  "difficulty": "beginner",
  "subject": "Biology",
  "interactiveElements": ["animation", "diagram"],
  "prerequisites": ["Plant cells"],
  "nextTopics": ["Cellular Respiration", "Carbon Cycle"],
  "realWorldExamples": ["Leaves turning toward a window", "Algae in ponds"]
}"#;

/// Builds the generation instruction for a question.
///
/// Pure string construction: the same inputs always produce the same output.
/// The question is embedded verbatim as the final line.
pub fn build_prompt(question: &str, user_level: Option<&str>) -> String {
    let mut sections = vec![ROLE, ANALYSIS_STEPS, JSON_CONTRACT, GUIDELINES, WORKED_EXAMPLE]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    if let Some(level) = user_level.map(str::trim).filter(|l| !l.is_empty()) {
        sections.push(format!("USER LEVEL: Adjust explanation for {level} level"));
    }

    sections.push(format!("QUESTION: {question}"));
    sections.join("\n\n")
}
