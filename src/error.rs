use crate::player::errors::PlayerErrorKind;

/// Result type for caption-sync operations
pub type Result<T> = std::result::Result<T, CaptionError>;

/// Error types surfaced by the caption engine
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    /// Network or parse failure fetching transcript or metadata
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The required caption language does not exist for the video
    #[error("{message}")]
    LanguageUnavailable {
        message: String,
        available_languages: Vec<String>,
    },

    /// The embedded player reported a playback failure
    #[error("Player error {code}: {}", .kind.message())]
    Player { code: i32, kind: PlayerErrorKind },

    /// Cross-frame message from an origin outside the allow-list
    #[error("Untrusted origin: {0}")]
    UntrustedOrigin(String),

    #[error("Invalid video id: {0}")]
    InvalidVideoId(String),

    #[error("Invalid remote message: {0}")]
    InvalidMessage(String),

    #[error("SRT parse error: {0}")]
    Srt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CaptionError {
    fn from(err: reqwest::Error) -> Self {
        CaptionError::Fetch(err.to_string())
    }
}

impl CaptionError {
    /// Human-readable reason suitable for an inline message
    pub fn user_message(&self) -> String {
        match self {
            CaptionError::Fetch(reason) => format!("Could not load captions: {}", reason),
            CaptionError::LanguageUnavailable { message, .. } => message.clone(),
            CaptionError::Player { kind, .. } => kind.message().to_string(),
            other => other.to_string(),
        }
    }

    /// Whether a new triggering input could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CaptionError::Fetch(_)
                | CaptionError::LanguageUnavailable { .. }
                | CaptionError::Player { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_unavailable_message_is_passed_through() {
        let err = CaptionError::LanguageUnavailable {
            message: "No Japanese transcripts available for this video".to_string(),
            available_languages: vec!["English (en)".to_string()],
        };
        assert_eq!(err.user_message(), "No Japanese transcripts available for this video");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_player_error_uses_table_message() {
        let err = CaptionError::Player {
            code: 150,
            kind: PlayerErrorKind::EmbeddingDisallowed,
        };
        assert!(err.to_string().contains("150"));
        assert_eq!(err.user_message(), PlayerErrorKind::EmbeddingDisallowed.message());
    }
}
