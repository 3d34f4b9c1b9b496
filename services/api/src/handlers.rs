//! Axum Handlers for the REST API
//!
//! `/ask` never fails for availability reasons: it answers with live content,
//! mock content, or a 429 when the text vendor is throttling. The auxiliary
//! proxy endpoints have no mock substitute and report vendor failures as 500s.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use tutor_core::{
    AskOutcome, BackgroundPreference, LessonError, LessonRequest,
    assembler::LessonPayload,
    imagery::BackgroundRequest,
};

use crate::{
    models::{
        AskPayload, BackgroundPayload, BackgroundResponse, CredentialStatus, ErrorResponse,
        HealthResponse, MediaQuery, MediaResponse, ThrottledResponse, VideoStatusQuery,
    },
    state::AppState,
};

const THROTTLED_MESSAGE: &str =
    "AI service is temporarily rate limited. Please try again in a few minutes.";
const DEFAULT_PER_PAGE: u32 = 5;

pub enum ApiError {
    BadRequest(String),
    /// A vendor call failed; reported with a fixed message plus details.
    Upstream {
        error: String,
        details: String,
    },
    /// The vendor credential for this endpoint is missing.
    NotConfigured(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Upstream { error, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_details(error, details)),
            )
                .into_response(),
            ApiError::NotConfigured(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(message)),
            )
                .into_response(),
        }
    }
}

/// A body that is absent or not JSON is treated as an empty object, so the
/// caller gets the endpoint's own missing-field 400.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Unreadable request body");
            T::default()
        }
    }
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

/// Answer a question with a narrated lesson.
#[utoipa::path(
    post,
    path = "/ask",
    request_body = AskPayload,
    responses(
        (status = 200, description = "Live or mock lesson", body = LessonPayload),
        (status = 400, description = "Missing question or unreadable body", body = ErrorResponse),
        (status = 429, description = "Text model is rate limited", body = ThrottledResponse)
    )
)]
pub async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = body_or_default(payload);
    let question = required(payload.question, "Missing question")?;

    let request = LessonRequest {
        question,
        background_preference: payload
            .background_preference
            .as_deref()
            .map(BackgroundPreference::parse)
            .unwrap_or_default(),
        user_level: payload.user_level,
    };

    let response = match state.pipeline.ask(&request).await {
        AskOutcome::Live(lesson) => (StatusCode::OK, Json(lesson)).into_response(),
        AskOutcome::Degraded { reason, payload } => {
            info!(?reason, "Returning mock lesson");
            (StatusCode::OK, Json(payload)).into_response()
        }
        AskOutcome::Throttled {
            message,
            retry_after,
        } => {
            warn!(%message, "Reporting rate limit to caller");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ThrottledResponse {
                    error: THROTTLED_MESSAGE.to_string(),
                    retry_after: retry_after.as_secs(),
                }),
            )
                .into_response()
        }
    };
    Ok(response)
}

/// Proxy the avatar vendor's status for a render job.
#[utoipa::path(
    get,
    path = "/video-status",
    params(VideoStatusQuery),
    responses(
        (status = 200, description = "Vendor status document, passed through verbatim"),
        (status = 400, description = "Missing id", body = ErrorResponse),
        (status = 500, description = "Vendor request failed", body = ErrorResponse)
    )
)]
pub async fn video_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoStatusQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = required(query.id, "Missing id")?;

    let Some(avatar) = &state.avatar else {
        return Ok(Json(json!({
            "data": { "status": "completed", "video_url": null },
            "message": "HeyGen API not configured",
        })));
    };

    info!(job_id = %id, "Checking video status");
    avatar.poll_status(&id).await.map(Json).map_err(|e| {
        error!(job_id = %id, error = %e, "Video status request failed");
        ApiError::Upstream {
            error: "Failed to fetch status".to_string(),
            details: e.to_string(),
        }
    })
}

/// Report which vendor credentials are configured.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.config;
    Json(HealthResponse {
        ok: true,
        timestamp: chrono::Utc::now().to_rfc3339(),
        env: CredentialStatus {
            has_gemini: config.gemini_api_key.is_some(),
            has_open_ai: config.openai_api_key.is_some(),
            has_heygen: config.heygen_credentials().is_some(),
            has_hugging_face: config.hf_api_token.is_some(),
            has_pexels: config.pexels_api_key.is_some(),
            text_provider: config.provider.as_str().to_string(),
        },
    })
}

/// Generate a themed slide background for a concept.
#[utoipa::path(
    post,
    path = "/generate-background",
    request_body = BackgroundPayload,
    responses(
        (status = 200, description = "Generated image or color fallback", body = BackgroundResponse),
        (status = 400, description = "Missing concept or unreadable body", body = ErrorResponse)
    )
)]
pub async fn generate_background(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BackgroundPayload>, JsonRejection>,
) -> Result<Json<BackgroundResponse>, ApiError> {
    let payload = body_or_default(payload);
    let concept = required(payload.concept, "Concept is required")?;

    let descriptor = state
        .backgrounds
        .generate(&BackgroundRequest {
            concept,
            subject: payload.subject,
            style: payload.style,
        })
        .await;

    Ok(Json(descriptor.into()))
}

/// Search stock photos or videos.
#[utoipa::path(
    get,
    path = "/pexels",
    params(MediaQuery),
    responses(
        (status = 200, description = "Matching media", body = MediaResponse),
        (status = 400, description = "Missing query", body = ErrorResponse),
        (status = 500, description = "Key missing or vendor failure", body = ErrorResponse)
    )
)]
pub async fn pexels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MediaQuery>,
) -> Result<Json<MediaResponse>, ApiError> {
    let kind = params.media_kind();
    let query = required(params.query, "Missing query parameter")?;

    let media = state
        .media
        .as_ref()
        .ok_or_else(|| ApiError::NotConfigured("Pexels API key not configured".to_string()))?;

    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE);
    let content = media.search(&query, kind, per_page).await.map_err(|e| {
        error!(%query, error = %e, "Stock media search failed");
        let details = match e {
            LessonError::Throttled(_) | LessonError::QuotaExceeded(_) => "Rate limit exceeded",
            _ => "Unknown error",
        };
        ApiError::Upstream {
            error: "Failed to fetch content from Pexels".to_string(),
            details: details.to_string(),
        }
    })?;

    Ok(Json(MediaResponse {
        success: true,
        kind,
        query,
        total: content.len(),
        content,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Provider};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::extract::FromRequest;
    use axum::http::Request;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing::Level;
    use tutor_core::{
        LessonPipeline, LessonResult,
        avatar::{AvatarService, SubmissionReceipt, SynthesisRequest},
        imagery::BackgroundStudio,
        llm_client::TextGenerator,
        media::{MediaItem, MediaKind, MediaSearch, PhotoItem},
        rate_limit::{RateLimitPolicy, RateLimitedClient},
        video::{PollPolicy, VideoOrchestrator},
    };

    struct StubText {
        script: Mutex<VecDeque<LessonResult<String>>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextGenerator for StubText {
        async fn generate(&self, _prompt: &str) -> LessonResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LessonError::Upstream("script exhausted".into())))
        }
    }

    struct StubAvatar {
        receipt: SubmissionReceipt,
        status: LessonResult<Value>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AvatarService for StubAvatar {
        async fn submit(&self, _request: &SynthesisRequest) -> LessonResult<SubmissionReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.receipt.clone())
        }

        async fn poll_status(&self, _job_id: &str) -> LessonResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.status.clone()
        }
    }

    struct StubMedia(LessonResult<Vec<MediaItem>>);

    #[async_trait]
    impl MediaSearch for StubMedia {
        async fn search(
            &self,
            _query: &str,
            _kind: MediaKind,
            _per_page: u32,
        ) -> LessonResult<Vec<MediaItem>> {
            self.0.clone()
        }
    }

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:3000".parse().unwrap(),
            log_level: Level::INFO,
            provider: Provider::Gemini,
            gemini_api_key: None,
            openai_api_key: None,
            text_model: "gemini-1.5-flash".to_string(),
            heygen_api_key: None,
            heygen_avatar_id: None,
            heygen_voice_id: "en-US".to_string(),
            hf_api_token: None,
            pexels_api_key: None,
            min_request_interval: Duration::from_millis(4000),
            max_daily_requests: 1400,
        }
    }

    /// State with no vendor configured at all.
    fn unconfigured_state() -> AppState {
        AppState {
            pipeline: Arc::new(LessonPipeline::new(
                Arc::new(RateLimitedClient::unconfigured(RateLimitPolicy::default())),
                None,
            )),
            avatar: None,
            backgrounds: Arc::new(BackgroundStudio::new(None)),
            media: None,
            config: Arc::new(test_config()),
        }
    }

    /// State with a scripted text model and avatar vendor, plus the call
    /// counters of both stubs.
    fn counted_live_state(
        script: Vec<LessonResult<String>>,
        avatar: StubAvatar,
    ) -> (AppState, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let text_calls = Arc::new(AtomicUsize::new(0));
        let avatar_calls = avatar.calls.clone();
        let text = RateLimitedClient::new(
            Arc::new(StubText {
                script: Mutex::new(script.into()),
                calls: text_calls.clone(),
            }),
            RateLimitPolicy::default(),
        );
        let avatar: Arc<dyn AvatarService> = Arc::new(avatar);
        let state = AppState {
            pipeline: Arc::new(LessonPipeline::new(
                Arc::new(text),
                Some(VideoOrchestrator::new(avatar.clone(), PollPolicy::default())),
            )),
            avatar: Some(avatar),
            ..unconfigured_state()
        };
        (state, text_calls, avatar_calls)
    }

    fn live_state(script: Vec<LessonResult<String>>, avatar: StubAvatar) -> AppState {
        counted_live_state(script, avatar).0
    }

    fn ready_avatar() -> StubAvatar {
        StubAvatar {
            receipt: SubmissionReceipt {
                video_url: Some("https://cdn/v.mp4".into()),
                job_id: None,
            },
            status: Ok(json!({ "data": { "status": "completed" } })),
            calls: Arc::default(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn ask_body(question: Option<&str>) -> Result<Json<AskPayload>, JsonRejection> {
        Ok(Json(ask_payload(question)))
    }

    fn ask_payload(question: Option<&str>) -> AskPayload {
        AskPayload {
            question: question.map(str::to_string),
            ..AskPayload::default()
        }
    }

    async fn extract_ask_body(request: Request<Body>) -> Result<Json<AskPayload>, JsonRejection> {
        Json::<AskPayload>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_ask_missing_question_makes_no_vendor_calls() {
        let lesson = r#"{"answer": "Gravity pulls.", "concept": "Gravity"}"#;
        let (state, text_calls, avatar_calls) =
            counted_live_state(vec![Ok(lesson.into())], ready_avatar());
        let state = Arc::new(state);

        for body in [ask_body(None), ask_body(Some("   "))] {
            let response = ask(State(state.clone()), body).await.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, json!({ "error": "Missing question" }));
        }

        assert_eq!(text_calls.load(Ordering::SeqCst), 0);
        assert_eq!(avatar_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_unreadable_body_is_json_400() {
        let (state, text_calls, avatar_calls) = counted_live_state(vec![], ready_avatar());
        let state = Arc::new(state);

        let no_body = Request::builder()
            .method("POST")
            .uri("/ask")
            .body(Body::empty())
            .unwrap();
        let not_json = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from("question=gravity"))
            .unwrap();

        for request in [no_body, not_json] {
            let body = extract_ask_body(request).await;
            assert!(body.is_err());

            let response = ask(State(state.clone()), body).await.into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, json!({ "error": "Missing question" }));
        }

        assert_eq!(text_calls.load(Ordering::SeqCst), 0);
        assert_eq!(avatar_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_without_credentials_returns_mock() {
        let state = Arc::new(unconfigured_state());
        let response = ask(State(state), ask_body(Some("Explain gravity")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["answer"].as_str().unwrap().contains("gravity"));
        assert!(body["videoUrl"].is_null());
        assert!(body["jobId"].is_null());
        assert_eq!(body["slides"].as_array().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_live_lesson() {
        let lesson = r#"{"answer": "Cells copy DNA before dividing.", "concept": "DNA Replication", "subject": "Biology", "difficulty": "intermediate", "slides": ["Unzipping", "Copying"]}"#;
        let state = Arc::new(live_state(vec![Ok(lesson.into())], ready_avatar()));

        let response = ask(State(state), ask_body(Some("How does DNA copy?")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["concept"], "DNA Replication");
        assert_eq!(body["subject"], "Biology");
        assert_eq!(body["difficulty"], "intermediate");
        assert_eq!(body["videoUrl"], "https://cdn/v.mp4");
        assert!(body["jobId"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_throttled_returns_429() {
        let throttled = || Err(LessonError::Throttled("429".into()));
        let state = Arc::new(live_state(
            vec![throttled(), throttled(), throttled()],
            ready_avatar(),
        ));

        let response = ask(State(state), ask_body(Some("Explain gravity")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            json!({ "error": THROTTLED_MESSAGE, "retryAfter": 60 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_render_failure_returns_mock() {
        let avatar = StubAvatar {
            receipt: SubmissionReceipt {
                video_url: None,
                job_id: Some("job-1".into()),
            },
            status: Ok(json!({ "data": { "status": "failed" } })),
            calls: Arc::default(),
        };
        let state = Arc::new(live_state(
            vec![Ok(r#"{"answer": "x"}"#.into())],
            avatar,
        ));

        let response = ask(State(state), ask_body(Some("Explain gravity")))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["concept"], "Explain gravity");
        assert!(body["videoUrl"].is_null());
        assert!(body["jobId"].is_null());
    }

    #[tokio::test]
    async fn test_video_status_missing_id() {
        let state = Arc::new(unconfigured_state());
        let response = video_status(State(state), Query(VideoStatusQuery { id: None }))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_video_status_not_configured() {
        let state = Arc::new(unconfigured_state());
        let response = video_status(
            State(state),
            Query(VideoStatusQuery {
                id: Some("job-1".into()),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "completed");
        assert!(body["data"]["video_url"].is_null());
        assert_eq!(body["message"], "HeyGen API not configured");
    }

    #[tokio::test]
    async fn test_video_status_passthrough_and_failure() {
        let state = Arc::new(live_state(vec![], ready_avatar()));
        let response = video_status(
            State(state),
            Query(VideoStatusQuery {
                id: Some("job-1".into()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "data": { "status": "completed" } })
        );

        let failing = StubAvatar {
            status: Err(LessonError::Upstream("timeout".into())),
            ..ready_avatar()
        };
        let state = Arc::new(live_state(vec![], failing));
        let response = video_status(
            State(state),
            Query(VideoStatusQuery {
                id: Some("job-1".into()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to fetch status");
        assert_eq!(body["details"], "Upstream error: timeout");
    }

    #[tokio::test]
    async fn test_health_reports_credentials() {
        let mut config = test_config();
        config.gemini_api_key = Some("gemini-key-123456".into());
        config.heygen_api_key = Some("heygen-key-123456".into());
        let state = Arc::new(AppState {
            config: Arc::new(config),
            ..unconfigured_state()
        });

        let response = health(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["env"]["hasGemini"], true);
        assert_eq!(body["env"]["hasHeygen"], false);
        assert_eq!(body["env"]["hasPexels"], false);
        assert_eq!(body["env"]["textProvider"], "gemini");
        assert!(body["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_generate_background() {
        let state = Arc::new(unconfigured_state());
        let response = generate_background(State(state.clone()), Ok(Json(BackgroundPayload::default())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let payload = BackgroundPayload {
            concept: Some("Gravity".into()),
            subject: Some("Physics".into()),
            style: None,
        };
        let response = generate_background(State(state), Ok(Json(payload)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["fallback"], true);
        assert_eq!(body["color"], "#1a1a2e");
        assert_eq!(body["concept"], "Gravity");
    }

    fn media_query(query: Option<&str>) -> MediaQuery {
        MediaQuery {
            query: query.map(str::to_string),
            ..MediaQuery::default()
        }
    }

    #[tokio::test]
    async fn test_pexels_validation_and_configuration() {
        let state = Arc::new(unconfigured_state());
        let response = pexels(State(state.clone()), Query(media_query(None)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = pexels(State(state), Query(media_query(Some("cells"))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Pexels API key not configured" })
        );
    }

    #[tokio::test]
    async fn test_pexels_success() {
        let item = MediaItem::Photo(PhotoItem {
            id: 1,
            url: Some("l.jpg".into()),
            original: None,
            medium: None,
            small: None,
            alt: Some("cells".into()),
            width: Some(100),
            height: Some(50),
        });
        let state = Arc::new(AppState {
            media: Some(Arc::new(StubMedia(Ok(vec![item])))),
            ..unconfigured_state()
        });

        let response = pexels(State(state), Query(media_query(Some("cells"))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["type"], "photos");
        assert_eq!(body["query"], "cells");
        assert_eq!(body["total"], 1);
        assert_eq!(body["content"][0]["url"], "l.jpg");
    }

    #[tokio::test]
    async fn test_pexels_rate_limited() {
        let state = Arc::new(AppState {
            media: Some(Arc::new(StubMedia(Err(LessonError::Throttled(
                "429".into(),
            ))))),
            ..unconfigured_state()
        });

        let response = pexels(State(state), Query(media_query(Some("cells"))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Failed to fetch content from Pexels", "details": "Rate limit exceeded" })
        );
    }
}
