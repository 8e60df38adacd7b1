//! Transcript data model and time-indexed lookup
//!
//! A transcript is an ordered, immutable-once-loaded sequence of segments
//! for a single video. Everything downstream (highlighting, follow-scroll,
//! upcoming preview) is derived from it through the resolver.

pub mod resolver;
pub mod srt;
pub mod tracker;
pub mod wire;

pub use resolver::{resolve, resolve_index, upcoming};
pub use srt::{SrtEntry, SrtParser, SrtWriter};
pub use tracker::{ActiveChange, ActiveSegmentTracker};
pub use wire::TranscriptResponse;

use serde::{Deserialize, Serialize};

/// Message shown when an endpoint reports no captions without saying why
pub const DEFAULT_UNAVAILABLE_MESSAGE: &str = "Captions are not available for this video";

/// A timestamped span of transcript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
    /// End time in seconds (start + duration)
    pub end: f64,
    /// Caption text, never empty
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        let start = start.max(0.0);
        let duration = duration.max(0.0);
        Self {
            start,
            duration,
            end: start + duration,
            text: text.into(),
        }
    }

    /// Inclusive on both bounds
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    /// Key used to bind a segment to its rendered element
    pub fn key(&self) -> SegmentKey {
        SegmentKey::from_start(self.start)
    }
}

/// Segment identity within a transcript, derived from its start time
///
/// Start times are assumed unique per transcript. Millisecond resolution keeps
/// the key hashable without comparing floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey(u64);

impl SegmentKey {
    pub fn from_start(start: f64) -> Self {
        Self((start.max(0.0) * 1000.0).round() as u64)
    }

    pub fn millis(&self) -> u64 {
        self.0
    }
}

/// Language information reported alongside a transcript
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: Option<String>,
    pub code: Option<String>,
    pub is_generated: bool,
    pub is_japanese: bool,
}

/// Transcript for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub available: bool,
    pub title: Option<String>,
    pub language: LanguageInfo,
    pub segments: Vec<Segment>,
    pub total_duration: f64,
    /// Explanation shown when `available` is false
    pub message: Option<String>,
    pub available_languages: Vec<String>,
}

impl Transcript {
    /// Placeholder created when a new video id is selected
    pub fn empty(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            available: false,
            title: None,
            language: LanguageInfo::default(),
            segments: Vec::new(),
            total_duration: 0.0,
            message: None,
            available_languages: Vec::new(),
        }
    }

    /// Non-fatal "no captions" state with a human-readable reason
    pub fn unavailable(video_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut transcript = Self::empty(video_id);
        transcript.message = Some(reason.into());
        transcript
    }

    /// Build an available transcript from already-normalized segments
    pub fn from_segments(video_id: impl Into<String>, segments: Vec<Segment>) -> Self {
        let mut transcript = Self::empty(video_id);
        transcript.total_duration = segments.last().map(|s| s.end).unwrap_or(0.0);
        transcript.segments = segments;
        transcript.available = true;
        transcript
    }

    pub fn resolve(&self, time: f64) -> Option<&Segment> {
        resolver::resolve(&self.segments, time)
    }

    pub fn upcoming(&self, time: f64, limit: usize) -> Vec<&Segment> {
        resolver::upcoming(&self.segments, time, limit)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Message to render when there is nothing to show
    pub fn display_message(&self) -> Option<&str> {
        if self.available {
            return None;
        }
        Some(self.message.as_deref().unwrap_or(DEFAULT_UNAVAILABLE_MESSAGE))
    }
}

/// Clean up fetched segments before they are stored
///
/// Trims text, drops empty entries and, optionally, bracketed sound
/// annotations such as `[音楽]`. `end` is recomputed from start and duration
/// and the result is stably sorted by start.
pub fn normalize_segments(raw: Vec<Segment>, skip_annotations: bool) -> Vec<Segment> {
    let mut segments: Vec<Segment> = raw
        .into_iter()
        .filter(|s| s.start.is_finite() && s.duration.is_finite())
        .filter_map(|s| {
            let text = s.text.trim();
            if text.is_empty() {
                return None;
            }
            if skip_annotations && is_annotation(text) {
                return None;
            }
            Some(Segment::new(s.start, s.duration, text))
        })
        .collect();

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}

fn is_annotation(text: &str) -> bool {
    text.starts_with('[') && text.ends_with(']')
}

/// Format seconds for the transport display (`m:ss` or `h:mm:ss`)
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
