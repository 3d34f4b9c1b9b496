//! Background Imagery
//!
//! Generates subject-themed slide backgrounds with a diffusion model. Results
//! are cached in memory for a day. Any failure degrades to a solid subject
//! color instead of an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{LessonError, LessonResult};
use crate::lesson::{Subject, truncate_chars};

const HF_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-xl-base-1.0";
const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);
const CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24);
const DEFAULT_FALLBACK_COLOR: &str = "#2c3e50";
/// Upper bound on cached images; each one is a full base64 PNG.
const MAX_CACHED_IMAGES: usize = 64;

/// Text-to-image model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the encoded image bytes for a prompt.
    async fn generate_image(&self, prompt: &str) -> LessonResult<Vec<u8>>;
}

/// Stable Diffusion XL through the Hugging Face inference API.
pub struct HuggingFaceClient {
    http: reqwest::Client,
    token: String,
}

impl HuggingFaceClient {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceClient {
    async fn generate_image(&self, prompt: &str) -> LessonResult<Vec<u8>> {
        let body = json!({
            "inputs": prompt,
            "parameters": {
                "guidance_scale": 7.5,
                "width": 1280,
                "height": 720,
                "num_inference_steps": 20,
            }
        });

        let bytes = self
            .http
            .post(HF_MODEL_URL)
            .bearer_auth(&self.token)
            .json(&body)
            .timeout(GENERATE_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(LessonError::from_http)?
            .bytes()
            .await
            .map_err(LessonError::from_http)?;

        Ok(bytes.to_vec())
    }
}

/// A request for a concept background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundRequest {
    pub concept: String,
    /// Free-form subject name; unknown names use the general template.
    pub subject: Option<String>,
    pub style: Option<String>,
}

/// The outcome of a background request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundDescriptor {
    Generated {
        url: String,
        cached: bool,
        concept: String,
        /// The first 100 characters of the prompt, followed by `...`.
        prompt: String,
    },
    Fallback {
        color: String,
        error: String,
        concept: String,
    },
}

#[derive(Debug, Clone)]
struct CachedImage {
    url: String,
    expires_at: Instant,
}

/// Builds the diffusion prompt for a concept within a subject.
pub fn educational_prompt(concept: &str, subject: Subject) -> String {
    match subject {
        Subject::Biology => format!(
            "detailed scientific diagram of {concept}, labeled parts, clean educational illustration, high contrast, biology textbook style"
        ),
        Subject::Physics => format!(
            "physics diagram showing {concept}, mathematical formulas, vectors, clean scientific illustration, educational poster style"
        ),
        Subject::Chemistry => format!(
            "chemistry diagram of {concept}, molecular structures, chemical equations, laboratory style, educational illustration"
        ),
        Subject::Mathematics => format!(
            "mathematical visualization of {concept}, geometric shapes, coordinate grids, clean diagram, educational math textbook style"
        ),
        Subject::ComputerScience => format!(
            "technical diagram illustrating {concept}, flowcharts, data structures, clean modern design, programming concept visualization"
        ),
        Subject::General => format!(
            "educational illustration of {concept}, clean diagram, informative design, suitable for learning"
        ),
    }
}

/// Generates and caches concept backgrounds.
pub struct BackgroundStudio {
    generator: Option<Arc<dyn ImageGenerator>>,
    cache: Mutex<HashMap<String, CachedImage>>,
    ttl: Duration,
    capacity: usize,
}

impl BackgroundStudio {
    /// `generator` is `None` when no diffusion token is configured.
    pub fn new(generator: Option<Arc<dyn ImageGenerator>>) -> Self {
        Self {
            generator,
            cache: Mutex::new(HashMap::new()),
            ttl: CACHE_TTL,
            capacity: MAX_CACHED_IMAGES,
        }
    }

    pub async fn generate(&self, request: &BackgroundRequest) -> BackgroundDescriptor {
        let subject = request
            .subject
            .as_deref()
            .and_then(Subject::parse)
            .unwrap_or_default();
        let prompt = educational_prompt(&request.concept, subject);
        let key = cache_key(&prompt, request);

        if let Some(url) = self.cached(&key) {
            info!(concept = %request.concept, "Using cached background");
            return self.generated(url, true, request, &prompt);
        }

        let fallback = |error: &str| BackgroundDescriptor::Fallback {
            color: subject.color().unwrap_or(DEFAULT_FALLBACK_COLOR).to_string(),
            error: error.to_string(),
            concept: request.concept.clone(),
        };

        let Some(generator) = &self.generator else {
            debug!("No diffusion token configured, using color background");
            return fallback("HuggingFace API token not configured");
        };

        match generator.generate_image(&prompt).await {
            Ok(bytes) => {
                let url = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
                self.store(key, url.clone());
                info!(concept = %request.concept, bytes = bytes.len(), "Background generated");
                self.generated(url, false, request, &prompt)
            }
            Err(e) => {
                warn!(concept = %request.concept, error = %e, "Background generation failed");
                if e.to_string().contains("token") {
                    fallback("HuggingFace API token required")
                } else {
                    fallback("Image generation temporarily unavailable")
                }
            }
        }
    }

    fn cached(&self, key: &str) -> Option<String> {
        let mut cache = self.lock();
        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.url.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts an image, first dropping expired entries and, at capacity,
    /// the entry closest to expiry.
    fn store(&self, key: String, url: String) {
        let now = Instant::now();
        let mut cache = self.lock();
        cache.retain(|_, entry| entry.expires_at > now);

        if cache.len() >= self.capacity && !cache.contains_key(&key) {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!("Background cache full, evicting oldest entry");
                cache.remove(&oldest);
            }
        }

        cache.insert(
            key,
            CachedImage {
                url,
                expires_at: now + self.ttl,
            },
        );
    }

    fn generated(
        &self,
        url: String,
        cached: bool,
        request: &BackgroundRequest,
        prompt: &str,
    ) -> BackgroundDescriptor {
        BackgroundDescriptor::Generated {
            url,
            cached,
            concept: request.concept.clone(),
            prompt: format!("{}...", truncate_chars(prompt, 100)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedImage>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cache_key(prompt: &str, request: &BackgroundRequest) -> String {
    let material = json!({
        "prompt": prompt,
        "subject": request.subject,
        "style": request.style,
    });
    let mut hasher = Sha256::new();
    hasher.update(material.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(concept: &str, subject: Option<&str>) -> BackgroundRequest {
        BackgroundRequest {
            concept: concept.to_string(),
            subject: subject.map(str::to_string),
            style: None,
        }
    }

    #[test]
    fn test_prompt_templates() {
        let prompt = educational_prompt("Mitosis", Subject::Biology);
        assert!(prompt.starts_with("detailed scientific diagram of Mitosis"));
        let prompt = educational_prompt("Volcanoes", Subject::General);
        assert!(prompt.starts_with("educational illustration of Volcanoes"));
    }

    #[test]
    fn test_cache_key_depends_on_style() {
        let mut a = request("Gravity", Some("Physics"));
        let key_a = cache_key("p", &a);
        assert_eq!(key_a.len(), 64);
        assert_eq!(key_a, cache_key("p", &a));
        a.style = Some("watercolor".into());
        assert_ne!(key_a, cache_key("p", &a));
    }

    #[tokio::test]
    async fn test_no_token_falls_back_to_subject_color() {
        let studio = BackgroundStudio::new(None);
        let result = studio.generate(&request("DNA", Some("Biology"))).await;
        assert_eq!(
            result,
            BackgroundDescriptor::Fallback {
                color: "#2d5016".into(),
                error: "HuggingFace API token not configured".into(),
                concept: "DNA".into(),
            }
        );

        let result = studio.generate(&request("Volcanoes", Some("Geology"))).await;
        assert!(matches!(
            result,
            BackgroundDescriptor::Fallback { ref color, .. } if color == "#2c3e50"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_image_is_cached_until_ttl() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .times(2)
            .returning(|_| Ok(vec![1, 2, 3]));
        let studio = BackgroundStudio::new(Some(Arc::new(mock)));
        let req = request("Gravity", Some("Physics"));

        let first = studio.generate(&req).await;
        let BackgroundDescriptor::Generated { url, cached, prompt, .. } = first else {
            panic!("expected a generated background");
        };
        assert_eq!(url, "data:image/png;base64,AQID");
        assert!(!cached);
        assert!(prompt.ends_with("..."));
        assert_eq!(prompt.chars().count(), 103);

        let second = studio.generate(&req).await;
        assert!(matches!(second, BackgroundDescriptor::Generated { cached: true, .. }));

        tokio::time::advance(CACHE_TTL + Duration::from_secs(1)).await;
        let third = studio.generate(&req).await;
        assert!(matches!(third, BackgroundDescriptor::Generated { cached: false, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_evicted_on_insert() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image().returning(|_| Ok(vec![7]));
        let studio = BackgroundStudio::new(Some(Arc::new(mock)));

        studio.generate(&request("Gravity", Some("Physics"))).await;
        studio.generate(&request("Mitosis", Some("Biology"))).await;
        assert_eq!(studio.lock().len(), 2);

        tokio::time::advance(CACHE_TTL + Duration::from_secs(1)).await;
        let fresh = request("Algebra", Some("Mathematics"));
        studio.generate(&fresh).await;

        let cache = studio.lock();
        assert_eq!(cache.len(), 1);
        let prompt = educational_prompt("Algebra", Subject::Mathematics);
        assert!(cache.contains_key(&cache_key(&prompt, &fresh)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_oldest_entry() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image().returning(|_| Ok(vec![7]));
        let mut studio = BackgroundStudio::new(Some(Arc::new(mock)));
        studio.capacity = 2;

        let first = request("Gravity", Some("Physics"));
        studio.generate(&first).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        studio.generate(&request("Mitosis", Some("Biology"))).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        studio.generate(&request("Algebra", Some("Mathematics"))).await;

        let cache = studio.lock();
        assert_eq!(cache.len(), 2);
        let prompt = educational_prompt("Gravity", Subject::Physics);
        assert!(!cache.contains_key(&cache_key(&prompt, &first)));
    }

    #[tokio::test]
    async fn test_vendor_failure_messages() {
        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .times(1)
            .returning(|_| Err(LessonError::Upstream("invalid token".into())));
        let studio = BackgroundStudio::new(Some(Arc::new(mock)));
        let result = studio.generate(&request("Algebra", Some("Mathematics"))).await;
        assert!(matches!(
            result,
            BackgroundDescriptor::Fallback { ref error, ref color, .. }
                if error == "HuggingFace API token required" && color == "#2c3e50"
        ));

        let mut mock = MockImageGenerator::new();
        mock.expect_generate_image()
            .returning(|_| Err(LessonError::Upstream("timed out".into())));
        let studio = BackgroundStudio::new(Some(Arc::new(mock)));
        let result = studio.generate(&request("Algebra", None)).await;
        assert!(matches!(
            result,
            BackgroundDescriptor::Fallback { ref error, .. }
                if error == "Image generation temporarily unavailable"
        ));
    }
}
