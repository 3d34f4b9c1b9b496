//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the lesson pipeline
//! and the auxiliary vendor clients shared by every handler.

use crate::config::Config;
use std::sync::Arc;
use tutor_core::{
    LessonPipeline, avatar::AvatarService, imagery::BackgroundStudio, media::MediaSearch,
};

/// The shared application state, created once at startup and passed to all handlers.
///
/// Optional clients are `None` when their credentials are missing or invalid.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LessonPipeline>,
    pub avatar: Option<Arc<dyn AvatarService>>,
    pub backgrounds: Arc<BackgroundStudio>,
    pub media: Option<Arc<dyn MediaSearch>>,
    pub config: Arc<Config>,
}
