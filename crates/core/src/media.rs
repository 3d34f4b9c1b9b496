//! Stock media search, reduced to the fields the frontend renders.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{LessonError, LessonResult};

const PEXELS_PHOTO_SEARCH: &str = "https://api.pexels.com/v1/search";
const PEXELS_VIDEO_SEARCH: &str = "https://api.pexels.com/videos/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Photos,
    Videos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PhotoItem {
    pub id: u64,
    /// The large rendition.
    pub url: Option<String>,
    pub original: Option<String>,
    pub medium: Option<String>,
    pub small: Option<String>,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VideoItem {
    pub id: u64,
    /// Link to the first encoded file.
    pub url: Option<String>,
    /// Poster frame.
    pub image: Option<String>,
    pub duration: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum MediaItem {
    Photo(PhotoItem),
    Video(VideoItem),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        kind: MediaKind,
        per_page: u32,
    ) -> LessonResult<Vec<MediaItem>>;
}

#[derive(Debug, Default, Deserialize)]
struct PhotoPage {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    id: u64,
    #[serde(default)]
    src: PhotoSources,
    alt: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PhotoSources {
    original: Option<String>,
    large: Option<String>,
    medium: Option<String>,
    small: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoPage {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    id: u64,
    image: Option<String>,
    duration: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    link: Option<String>,
}

impl From<PexelsPhoto> for MediaItem {
    fn from(photo: PexelsPhoto) -> Self {
        MediaItem::Photo(PhotoItem {
            id: photo.id,
            url: photo.src.large,
            original: photo.src.original,
            medium: photo.src.medium,
            small: photo.src.small,
            alt: photo.alt,
            width: photo.width,
            height: photo.height,
        })
    }
}

impl From<PexelsVideo> for MediaItem {
    fn from(video: PexelsVideo) -> Self {
        MediaItem::Video(VideoItem {
            id: video.id,
            url: video.video_files.into_iter().next().and_then(|f| f.link),
            image: video.image,
            duration: video.duration,
            width: video.width,
            height: video.height,
        })
    }
}

/// Pexels implementation of [`MediaSearch`].
pub struct PexelsClient {
    http: reqwest::Client,
    api_key: String,
}

impl PexelsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
        per_page: u32,
    ) -> LessonResult<T> {
        let per_page = per_page.to_string();
        self.http
            .get(endpoint)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", per_page.as_str()),
                ("orientation", "landscape"),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(LessonError::from_http)?
            .json()
            .await
            .map_err(LessonError::from_http)
    }
}

#[async_trait]
impl MediaSearch for PexelsClient {
    async fn search(
        &self,
        query: &str,
        kind: MediaKind,
        per_page: u32,
    ) -> LessonResult<Vec<MediaItem>> {
        let items = match kind {
            MediaKind::Photos => self
                .fetch::<PhotoPage>(PEXELS_PHOTO_SEARCH, query, per_page)
                .await?
                .photos
                .into_iter()
                .map(MediaItem::from)
                .collect(),
            MediaKind::Videos => self
                .fetch::<VideoPage>(PEXELS_VIDEO_SEARCH, query, per_page)
                .await?
                .videos
                .into_iter()
                .map(MediaItem::from)
                .collect(),
        };
        Ok(items)
    }
}
