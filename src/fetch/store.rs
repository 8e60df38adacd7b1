//! Transcript store keyed by the current video
//!
//! Every video switch bumps a generation counter and hands out a ticket. A
//! fetch result is applied only if its ticket still matches the current
//! generation, so when requests for A and then B overlap, B's transcript is
//! what remains no matter which response arrives first.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::TranscriptSource;
use crate::error::{CaptionError, Result};
use crate::transcript::Transcript;
use crate::video_id::VideoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    /// No video selected
    Idle,
    Loading,
    Ready,
    /// Loaded, but there is nothing to show; the transcript carries the reason
    Unavailable,
}

/// Point-in-time view of the store
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub generation: u64,
    pub video_id: Option<VideoId>,
    pub status: TranscriptStatus,
    pub transcript: Arc<Transcript>,
}

impl StoreSnapshot {
    fn idle() -> Self {
        Self {
            generation: 0,
            video_id: None,
            status: TranscriptStatus::Idle,
            transcript: Arc::new(Transcript::empty("")),
        }
    }
}

/// Proof that a fetch was started for a particular generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    video_id: VideoId,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    state: Arc<watch::Sender<StoreSnapshot>>,
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(watch::Sender::new(StoreSnapshot::idle())),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().clone()
    }

    pub fn transcript(&self) -> Arc<Transcript> {
        Arc::clone(&self.state.borrow().transcript)
    }

    pub fn status(&self) -> TranscriptStatus {
        self.state.borrow().status
    }

    pub fn video_id(&self) -> Option<VideoId> {
        self.state.borrow().video_id.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.state.subscribe()
    }

    /// Discard the current transcript and start tracking `video_id`
    pub fn switch_video(&self, video_id: VideoId) -> FetchTicket {
        let mut generation = 0;
        self.state.send_modify(|snap| {
            snap.generation += 1;
            snap.video_id = Some(video_id.clone());
            snap.status = TranscriptStatus::Loading;
            snap.transcript = Arc::new(Transcript::empty(video_id.as_str()));
            generation = snap.generation;
        });
        debug!("Transcript store switched to {} (generation {})", video_id, generation);
        FetchTicket {
            generation,
            video_id,
        }
    }

    /// Drop everything and go idle; in-flight fetches become stale
    pub fn clear(&self) {
        self.state.send_modify(|snap| {
            let generation = snap.generation + 1;
            *snap = StoreSnapshot::idle();
            snap.generation = generation;
        });
    }

    /// Apply a fetch result; returns false when the ticket is stale
    pub fn complete(&self, ticket: &FetchTicket, result: Result<Transcript>) -> bool {
        let (status, transcript) = settle(&ticket.video_id, result);

        let applied = self.state.send_if_modified(|snap| {
            if snap.generation != ticket.generation {
                return false;
            }
            snap.status = status;
            snap.transcript = Arc::new(transcript);
            true
        });

        if !applied {
            debug!(
                "Discarding stale transcript for {} (generation {})",
                ticket.video_id, ticket.generation
            );
        }
        applied
    }

    /// Switch to `video_id` and fetch it in place
    pub async fn load(&self, source: &dyn TranscriptSource, video_id: VideoId) -> bool {
        let ticket = self.switch_video(video_id);
        let result = source.load(&ticket.video_id).await;
        self.complete(&ticket, result)
    }

    /// Switch to `video_id` and fetch it on a background task
    pub fn spawn_load(&self, source: Arc<dyn TranscriptSource>, video_id: VideoId) -> JoinHandle<bool> {
        let ticket = self.switch_video(video_id);
        let store = self.clone();
        tokio::spawn(async move {
            let result = source.load(&ticket.video_id).await;
            store.complete(&ticket, result)
        })
    }

    /// Re-fetch the current video, bypassing any cache in `source`
    pub fn reload(&self, source: Arc<dyn TranscriptSource>) -> Option<JoinHandle<bool>> {
        let video_id = self.video_id()?;
        let ticket = self.switch_video(video_id);
        let store = self.clone();
        Some(tokio::spawn(async move {
            let result = source.reload(&ticket.video_id).await;
            store.complete(&ticket, result)
        }))
    }
}

/// Turn any fetch outcome into something renderable
fn settle(video_id: &VideoId, result: Result<Transcript>) -> (TranscriptStatus, Transcript) {
    match result {
        Ok(transcript) if transcript.available => (TranscriptStatus::Ready, transcript),
        Ok(transcript) => (TranscriptStatus::Unavailable, transcript),
        Err(CaptionError::LanguageUnavailable {
            message,
            available_languages,
        }) => {
            info!("🈚 {} for {} (available: {})", message, video_id, available_languages.join(", "));
            let mut transcript = Transcript::unavailable(video_id.as_str(), message);
            transcript.available_languages = available_languages;
            (TranscriptStatus::Unavailable, transcript)
        }
        Err(e) => {
            warn!("Transcript fetch for {} failed: {}", video_id, e);
            (
                TranscriptStatus::Unavailable,
                Transcript::unavailable(video_id.as_str(), e.user_message()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Segment;

    fn id(raw: &str) -> VideoId {
        VideoId::parse(raw).unwrap()
    }

    fn transcript_for(video: &str) -> Transcript {
        Transcript::from_segments(video, vec![Segment::new(0.0, 5.0, video)])
    }

    #[test]
    fn test_last_switch_wins_regardless_of_completion_order() {
        let store = TranscriptStore::new();
        let a = store.switch_video(id("aaaaaaaaaaa"));
        let b = store.switch_video(id("bbbbbbbbbbb"));

        assert!(store.complete(&b, Ok(transcript_for("bbbbbbbbbbb"))));
        assert!(!store.complete(&a, Ok(transcript_for("aaaaaaaaaaa"))));

        let snap = store.snapshot();
        assert_eq!(snap.status, TranscriptStatus::Ready);
        assert_eq!(snap.transcript.video_id, "bbbbbbbbbbb");
    }

    #[test]
    fn test_switch_resets_to_empty_loading() {
        let store = TranscriptStore::new();
        let ticket = store.switch_video(id("aaaaaaaaaaa"));
        store.complete(&ticket, Ok(transcript_for("aaaaaaaaaaa")));

        store.switch_video(id("bbbbbbbbbbb"));
        let snap = store.snapshot();
        assert_eq!(snap.status, TranscriptStatus::Loading);
        assert!(snap.transcript.is_empty());
        assert_eq!(snap.video_id, Some(id("bbbbbbbbbbb")));
    }

    #[test]
    fn test_errors_become_unavailable_with_reason() {
        let store = TranscriptStore::new();
        let ticket = store.switch_video(id("aaaaaaaaaaa"));
        store.complete(
            &ticket,
            Err(CaptionError::LanguageUnavailable {
                message: "No Japanese transcripts".to_string(),
                available_languages: vec!["English (en)".to_string()],
            }),
        );

        let snap = store.snapshot();
        assert_eq!(snap.status, TranscriptStatus::Unavailable);
        assert_eq!(snap.transcript.display_message(), Some("No Japanese transcripts"));
        assert_eq!(snap.transcript.available_languages, vec!["English (en)".to_string()]);

        let ticket = store.switch_video(id("bbbbbbbbbbb"));
        store.complete(&ticket, Err(CaptionError::Fetch("connection refused".to_string())));
        assert_eq!(
            store.transcript().display_message(),
            Some("Could not load captions: connection refused")
        );
    }

    #[test]
    fn test_clear_invalidates_in_flight_fetch() {
        let store = TranscriptStore::new();
        let ticket = store.switch_video(id("aaaaaaaaaaa"));
        store.clear();
        assert!(!store.complete(&ticket, Ok(transcript_for("aaaaaaaaaaa"))));
        assert_eq!(store.status(), TranscriptStatus::Idle);
    }
}
