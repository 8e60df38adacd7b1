use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::TranscriptSource;
use crate::config::{EndpointConfig, TranscriptConfig};
use crate::error::{CaptionError, Result};
use crate::transcript::{Transcript, TranscriptResponse};
use crate::video_id::VideoId;

/// Lazily built HTTP client shared by the endpoint clients
///
/// The client is created on first use and reused afterwards; clones of the
/// cache share the same client. Its lifetime is the lifetime of the cache
/// value handed to the collaborators, not the process.
#[derive(Debug, Clone)]
pub struct ClientCache {
    config: EndpointConfig,
    client: Arc<OnceLock<reqwest::Client>>,
}

impl ClientCache {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            client: Arc::new(OnceLock::new()),
        }
    }

    /// Return the shared client, building it on first call
    pub fn client(&self) -> Result<reqwest::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .connect_timeout(Duration::from_secs(self.config.connect_timeout_seconds))
            .user_agent(self.config.user_agent.clone())
            .build()?;
        debug!("Built HTTP client for {}", self.config.base_url);

        Ok(self.client.get_or_init(|| client).clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.client.get().is_some()
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// `{base}/{resource}/{id}` with the id percent-encoded
    pub fn endpoint(&self, resource: &str, video_id: &VideoId) -> String {
        format!(
            "{}/{}/{}",
            self.base_url(),
            resource,
            urlencoding::encode(video_id.as_str())
        )
    }
}

/// Client for `GET /transcript/{videoId}`
#[derive(Debug, Clone)]
pub struct HttpTranscriptClient {
    clients: ClientCache,
    skip_annotations: bool,
}

impl HttpTranscriptClient {
    pub fn new(clients: ClientCache, config: &TranscriptConfig) -> Self {
        Self {
            clients,
            skip_annotations: config.skip_annotations,
        }
    }

    pub async fn fetch_transcript(&self, video_id: &VideoId) -> Result<Transcript> {
        let url = self.clients.endpoint("transcript", video_id);
        debug!("Fetching transcript from {}", url);

        let response = self.clients.client()?.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(non_success_transcript(video_id, status, &body));
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| CaptionError::Fetch(format!("invalid transcript response: {}", e)))?;

        let transcript = body.into_transcript(video_id.as_str(), self.skip_annotations)?;
        if transcript.available {
            info!("📝 Loaded {} segments for {}", transcript.len(), video_id);
        } else {
            info!("📭 No captions for {}: {}", video_id, transcript.display_message().unwrap_or_default());
        }
        Ok(transcript)
    }
}

/// Non-2xx responses mean "no captions"; use the server's message when it sent one
fn non_success_transcript(video_id: &VideoId, status: StatusCode, body: &str) -> Transcript {
    let message = serde_json::from_str::<TranscriptResponse>(body)
        .ok()
        .and_then(|r| r.message.or(r.error))
        .unwrap_or_else(|| match status {
            StatusCode::NOT_FOUND => "No captions were found for this video".to_string(),
            _ => format!("The caption service responded with {}", status),
        });

    warn!("Transcript request for {} returned {}: {}", video_id, status, message);
    Transcript::unavailable(video_id.as_str(), message)
}

#[async_trait]
impl TranscriptSource for HttpTranscriptClient {
    async fn load(&self, video_id: &VideoId) -> Result<Transcript> {
        self.fetch_transcript(video_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_endpoint_building() {
        let mut config = Config::default().endpoints;
        config.base_url = "https://captions.example.com/api/".to_string();
        let clients = ClientCache::new(config);
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(
            clients.endpoint("transcript", &id),
            "https://captions.example.com/api/transcript/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_client_is_built_once_and_shared() {
        let clients = ClientCache::new(Config::default().endpoints);
        assert!(!clients.is_initialized());
        clients.client().unwrap();
        let shared = clients.clone();
        assert!(shared.is_initialized());
    }

    #[test]
    fn test_non_success_uses_server_message() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let transcript = non_success_transcript(
            &id,
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "Internal server error", "message": "boom", "available": false}"#,
        );
        assert_eq!(transcript.display_message(), Some("boom"));

        let fallback = non_success_transcript(&id, StatusCode::NOT_FOUND, "<html>");
        assert_eq!(fallback.display_message(), Some("No captions were found for this video"));
    }
}
