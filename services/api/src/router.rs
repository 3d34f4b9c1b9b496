//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AskPayload, BackgroundPayload, BackgroundResponse, CredentialStatus, ErrorResponse,
        HealthResponse, MediaResponse, ThrottledResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tutor_core::{
    Difficulty, LessonContent, Subject,
    assembler::LessonPayload,
    media::{MediaItem, MediaKind, PhotoItem, VideoItem},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::ask,
        handlers::video_status,
        handlers::health,
        handlers::generate_background,
        handlers::pexels,
    ),
    components(
        schemas(AskPayload, LessonPayload, LessonContent, Difficulty, Subject, ErrorResponse, ThrottledResponse, HealthResponse, CredentialStatus, BackgroundPayload, BackgroundResponse, MediaResponse, MediaKind, MediaItem, PhotoItem, VideoItem)
    ),
    tags(
        (name = "Tutor API", description = "Narrated lessons with avatar video and slide media")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/ask", post(handlers::ask))
        .route("/video-status", get(handlers::video_status))
        .route("/health", get(handlers::health))
        .route("/generate-background", post(handlers::generate_background))
        .route("/pexels", get(handlers::pexels))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
