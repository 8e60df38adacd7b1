//! Transcript and metadata acquisition
//!
//! The endpoints are consumed purely as a data contract. `TranscriptSource`
//! is the seam: the HTTP client, the disk cache wrapper and test doubles all
//! implement it, and the store only ever talks to the trait.

pub mod cache;
pub mod client;
pub mod metadata;
pub mod store;

pub use cache::{CachedTranscriptSource, TranscriptCacheManager};
pub use client::{ClientCache, HttpTranscriptClient};
pub use metadata::{MetadataClient, MetadataPanel, Thumbnail, VideoMetadata};
pub use store::{FetchTicket, StoreSnapshot, TranscriptStatus, TranscriptStore};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::transcript::{SrtParser, Transcript};
use crate::video_id::VideoId;

/// Anything that can produce a transcript for a video
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Single attempt; no retries
    async fn load(&self, video_id: &VideoId) -> Result<Transcript>;

    /// Explicit reload; sources that cache bypass the cache here
    async fn reload(&self, video_id: &VideoId) -> Result<Transcript> {
        self.load(video_id).await
    }
}

#[async_trait]
impl<T: TranscriptSource + ?Sized> TranscriptSource for Arc<T> {
    async fn load(&self, video_id: &VideoId) -> Result<Transcript> {
        (**self).load(video_id).await
    }

    async fn reload(&self, video_id: &VideoId) -> Result<Transcript> {
        (**self).reload(video_id).await
    }
}

/// Serves a local SubRip file for whichever video is requested
#[derive(Debug, Clone)]
pub struct SrtFileSource {
    path: PathBuf,
    skip_annotations: bool,
}

impl SrtFileSource {
    pub fn new(path: impl Into<PathBuf>, skip_annotations: bool) -> Self {
        Self {
            path: path.into(),
            skip_annotations,
        }
    }
}

#[async_trait]
impl TranscriptSource for SrtFileSource {
    async fn load(&self, video_id: &VideoId) -> Result<Transcript> {
        SrtParser::read_transcript(video_id.as_str(), &self.path, self.skip_annotations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_srt_file_source() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "1\n00:00:00,000 --> 00:00:05,000\nこんにちは\n\n2\n00:00:05,000 --> 00:00:10,000\n[音楽]\n",
        )
        .unwrap();

        let source = SrtFileSource::new(file.path(), true);
        let transcript = source.load(&VideoId::parse("dQw4w9WgXcQ").unwrap()).await.unwrap();
        assert!(transcript.available);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.segments[0].text, "こんにちは");

        let arc: Arc<dyn TranscriptSource> = Arc::new(source);
        assert_eq!(arc.reload(&VideoId::parse("dQw4w9WgXcQ").unwrap()).await.unwrap().len(), 1);
    }
}
