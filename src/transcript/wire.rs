//! JSON shape served by the transcript endpoint

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{normalize_segments, LanguageInfo, Segment, Transcript, DEFAULT_UNAVAILABLE_MESSAGE};
use crate::error::{CaptionError, Result};

/// Body of `GET /transcript/{videoId}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_japanese: Option<bool>,
    #[serde(default)]
    pub is_generated: Option<bool>,
    #[serde(default)]
    pub available_languages: Option<Vec<String>>,
    #[serde(default)]
    pub segments: Option<Vec<WireSegment>>,
    #[serde(default)]
    pub total_segments: Option<usize>,
    #[serde(default)]
    pub total_duration: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Segment as it appears on the wire; `end` is advisory and recomputed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSegment {
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
}

fn language_missing_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^no \S+ (transcripts|captions|subtitles)\b").expect("valid regex")
    })
}

impl TranscriptResponse {
    /// Convert the response for `requested_id` into a transcript
    ///
    /// `available: false` becomes an unavailable transcript carrying the
    /// server's message, except when the message says the required language
    /// is missing, which is reported as `LanguageUnavailable`.
    pub fn into_transcript(self, requested_id: &str, skip_annotations: bool) -> Result<Transcript> {
        if !self.available {
            let message = self
                .message
                .clone()
                .or_else(|| self.error.clone())
                .unwrap_or_else(|| DEFAULT_UNAVAILABLE_MESSAGE.to_string());

            if language_missing_pattern().is_match(&message) {
                return Err(CaptionError::LanguageUnavailable {
                    message,
                    available_languages: self.available_languages.unwrap_or_default(),
                });
            }

            let mut transcript = Transcript::unavailable(requested_id, message);
            transcript.title = self.title;
            transcript.available_languages = self.available_languages.unwrap_or_default();
            return Ok(transcript);
        }

        if let Some(id) = self.video_id.as_deref() {
            if id != requested_id {
                return Err(CaptionError::Fetch(format!(
                    "response was for video {} but {} was requested",
                    id, requested_id
                )));
            }
        }

        let raw: Vec<Segment> = self
            .segments
            .unwrap_or_default()
            .into_iter()
            .map(|s| Segment::new(s.start, s.duration, s.text))
            .collect();
        let segments = normalize_segments(raw, skip_annotations);

        let mut transcript = Transcript::from_segments(requested_id, segments);
        transcript.title = self.title;
        transcript.language = LanguageInfo {
            name: self.language,
            code: self.language_code,
            is_generated: self.is_generated.unwrap_or(false),
            is_japanese: self.is_japanese.unwrap_or(false),
        };
        transcript.available_languages = self.available_languages.unwrap_or_default();
        if let Some(total) = self.total_duration.filter(|t| t.is_finite()) {
            transcript.total_duration = transcript.total_duration.max(total);
        }
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_response() {
        let body = r#"{
            "available": true,
            "videoId": "dQw4w9WgXcQ",
            "title": "Video dQw4w9WgXcQ",
            "language": "Japanese",
            "languageCode": "ja",
            "isJapanese": true,
            "isGenerated": false,
            "segments": [
                {"start": 0, "duration": 5, "end": 5, "text": "a"},
                {"start": 5, "duration": 5, "end": 10, "text": "b"},
                {"start": 12, "duration": 3, "end": 15, "text": "c"}
            ],
            "totalSegments": 3,
            "totalDuration": 15
        }"#;

        let response: TranscriptResponse = serde_json::from_str(body).unwrap();
        let transcript = response.into_transcript("dQw4w9WgXcQ", true).unwrap();
        assert!(transcript.available);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.language.code.as_deref(), Some("ja"));
        assert!(transcript.language.is_japanese);
        assert_eq!(transcript.total_duration, 15.0);
    }

    #[test]
    fn test_unavailable_message_is_preserved() {
        let body = r#"{"available": false, "message": "Transcripts are disabled for this video"}"#;
        let response: TranscriptResponse = serde_json::from_str(body).unwrap();
        let transcript = response.into_transcript("vid", true).unwrap();
        assert!(!transcript.available);
        assert!(transcript.is_empty());
        assert_eq!(transcript.display_message(), Some("Transcripts are disabled for this video"));
    }

    #[test]
    fn test_missing_language_maps_to_language_unavailable() {
        let body = r#"{
            "available": false,
            "videoId": "vid",
            "message": "No Japanese transcripts available for this video",
            "availableLanguages": ["English (en)", "Spanish (es)"]
        }"#;
        let response: TranscriptResponse = serde_json::from_str(body).unwrap();
        match response.into_transcript("vid", true) {
            Err(CaptionError::LanguageUnavailable { message, available_languages }) => {
                assert_eq!(message, "No Japanese transcripts available for this video");
                assert_eq!(available_languages.len(), 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_video_id_is_rejected() {
        let body = r#"{"available": true, "videoId": "other", "segments": []}"#;
        let response: TranscriptResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(response.into_transcript("vid", true), Err(CaptionError::Fetch(_))));
    }
}
