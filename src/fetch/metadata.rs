use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::ClientCache;
use crate::error::{CaptionError, Result};
use crate::transcript::format_clock;
use crate::video_id::VideoId;

/// Thumbnail size preference, best first
const THUMBNAIL_PREFERENCE: &[&str] = &["maxres", "standard", "high", "medium", "default"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Body of `GET /video/{videoId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Seconds, sent as a string
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub view_count: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub thumbnails: HashMap<String, Thumbnail>,
}

/// Counts arrive either as numbers or as numeric strings
fn deserialize_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Count>::deserialize(deserializer)? {
        Some(Count::Number(n)) => Some(n),
        Some(Count::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

impl VideoMetadata {
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
    }

    pub fn formatted_duration(&self) -> Option<String> {
        self.duration_seconds().map(format_clock)
    }

    /// Largest named thumbnail, falling back to the widest one
    pub fn best_thumbnail(&self) -> Option<&Thumbnail> {
        THUMBNAIL_PREFERENCE
            .iter()
            .find_map(|quality| self.thumbnails.get(*quality))
            .or_else(|| self.thumbnails.values().max_by_key(|t| t.width))
    }
}

/// What the metadata area should show
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataPanel {
    Loaded(Box<VideoMetadata>),
    /// The endpoint is not configured; show setup guidance
    SetupRequired(String),
    Hidden,
}

impl MetadataPanel {
    pub fn metadata(&self) -> Option<&VideoMetadata> {
        match self {
            MetadataPanel::Loaded(metadata) => Some(metadata),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for `GET /video/{videoId}`
#[derive(Debug, Clone)]
pub struct MetadataClient {
    clients: ClientCache,
}

impl MetadataClient {
    pub fn new(clients: ClientCache) -> Self {
        Self { clients }
    }

    /// Single attempt; network and parse failures are returned as `Fetch`
    pub async fn fetch(&self, video_id: &VideoId) -> Result<MetadataPanel> {
        let url = self.clients.endpoint("video", video_id);
        debug!("Fetching metadata from {}", url);

        let response = self.clients.client()?.get(&url).send().await?;
        let status = response.status();

        if status.is_success() {
            let metadata: VideoMetadata = response
                .json()
                .await
                .map_err(|e| CaptionError::Fetch(format!("invalid metadata response: {}", e)))?;
            info!("🎬 Metadata loaded for {}: {}", video_id, metadata.title);
            return Ok(MetadataPanel::Loaded(Box::new(metadata)));
        }

        let body = response.text().await.unwrap_or_default();
        Ok(panel_for_failure(status, &body))
    }

    /// Like `fetch`, but any failure just hides the panel
    pub async fn panel(&self, video_id: &VideoId) -> MetadataPanel {
        match self.fetch(video_id).await {
            Ok(panel) => panel,
            Err(e) => {
                warn!("Metadata unavailable for {}: {}", video_id, e);
                MetadataPanel::Hidden
            }
        }
    }
}

fn panel_for_failure(status: StatusCode, body: &str) -> MetadataPanel {
    if status == StatusCode::NOT_FOUND {
        debug!("No metadata for this video");
        return MetadataPanel::Hidden;
    }

    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_default();

    let missing_key = detail.to_lowercase().contains("api key")
        || matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN);

    if missing_key {
        MetadataPanel::SetupRequired(if detail.is_empty() {
            "Configure an API key for the metadata endpoint to see video details".to_string()
        } else {
            detail
        })
    } else {
        warn!("Metadata endpoint returned {}: {}", status, detail);
        MetadataPanel::Hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "title": "Sample",
        "channelTitle": "Channel",
        "publishedAt": "2024-03-01T12:00:00Z",
        "duration": "3725",
        "viewCount": "12345",
        "likeCount": 67,
        "tags": ["japanese", "listening"],
        "thumbnails": {
            "default": {"url": "https://i.example/d.jpg", "width": 120, "height": 90},
            "high": {"url": "https://i.example/h.jpg", "width": 480, "height": 360}
        }
    }"#;

    #[test]
    fn test_parses_metadata_shape() {
        let metadata: VideoMetadata = serde_json::from_str(BODY).unwrap();
        assert_eq!(metadata.channel_title.as_deref(), Some("Channel"));
        assert_eq!(metadata.view_count, Some(12345));
        assert_eq!(metadata.like_count, Some(67));
        assert_eq!(metadata.duration_seconds(), Some(3725.0));
        assert_eq!(metadata.formatted_duration().as_deref(), Some("1:02:05"));
        assert_eq!(metadata.best_thumbnail().map(|t| t.width), Some(480));
        assert!(metadata.published_at.is_some());
    }

    #[test]
    fn test_failure_panels() {
        assert_eq!(panel_for_failure(StatusCode::NOT_FOUND, ""), MetadataPanel::Hidden);
        assert!(matches!(
            panel_for_failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error": "YouTube API key not configured"}"#
            ),
            MetadataPanel::SetupRequired(_)
        ));
        assert_eq!(
            panel_for_failure(StatusCode::BAD_GATEWAY, "upstream"),
            MetadataPanel::Hidden
        );
    }
}
