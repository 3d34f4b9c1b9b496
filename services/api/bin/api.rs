//! Main Entrypoint for the Tutor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the vendor clients whose credentials are present.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tutor_api::{
    config::{Config, Provider},
    router::create_router,
    state::AppState,
};
use tutor_core::{
    LessonPipeline,
    avatar::{AvatarService, HeyGenClient},
    imagery::{BackgroundStudio, HuggingFaceClient, ImageGenerator},
    llm_client::OpenAICompatibleClient,
    media::{MediaSearch, PexelsClient},
    rate_limit::{RateLimitPolicy, RateLimitedClient},
    video::{PollPolicy, VideoOrchestrator},
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Builds the rate-limited text client, unconfigured when the selected
/// provider has no valid key.
fn text_client(config: &Config) -> anyhow::Result<RateLimitedClient> {
    let policy = RateLimitPolicy {
        min_interval: config.min_request_interval,
        max_daily: config.max_daily_requests,
        ..RateLimitPolicy::default()
    };

    let Some(api_key) = config.text_api_key() else {
        warn!(
            provider = config.provider.as_str(),
            "Text model key missing or invalid, /ask will serve mock lessons"
        );
        return Ok(RateLimitedClient::unconfigured(policy));
    };

    let client = match config.provider {
        Provider::Gemini => OpenAICompatibleClient::gemini(api_key, config.text_model.clone()),
        Provider::OpenAI => OpenAICompatibleClient::openai(api_key, config.text_model.clone()),
    }
    .context("Failed to build text model client")?;

    Ok(RateLimitedClient::new(Arc::new(client), policy))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Vendor Clients ---
    let text = Arc::new(text_client(&config)?);
    let has_text_model = text.is_configured();

    let avatar: Option<Arc<dyn AvatarService>> =
        config
            .heygen_credentials()
            .map(|(api_key, avatar_id)| -> Arc<dyn AvatarService> {
                Arc::new(HeyGenClient::new(
                    api_key.to_string(),
                    avatar_id.to_string(),
                    config.heygen_voice_id.clone(),
                ))
            });
    if avatar.is_none() {
        warn!("HeyGen credentials missing or invalid, /ask will serve mock lessons");
    }

    let video = avatar
        .clone()
        .map(|service| VideoOrchestrator::new(service, PollPolicy::default()));
    let pipeline = Arc::new(LessonPipeline::new(text, video));

    let image_generator = config
        .hf_api_token
        .clone()
        .map(|token| -> Arc<dyn ImageGenerator> { Arc::new(HuggingFaceClient::new(token)) });
    let backgrounds = Arc::new(BackgroundStudio::new(image_generator));

    let media = config
        .pexels_api_key
        .clone()
        .map(|key| -> Arc<dyn MediaSearch> { Arc::new(PexelsClient::new(key)) });

    info!(
        text_model = has_text_model,
        heygen = avatar.is_some(),
        hugging_face = config.hf_api_token.is_some(),
        pexels = media.is_some(),
        "Vendor credentials resolved"
    );

    let app_state = Arc::new(AppState {
        pipeline,
        avatar,
        backgrounds,
        media,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = config.provider.as_str(),
        model = %config.text_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
