use serde::{Deserialize, Serialize};

use crate::video_id::VideoId;

/// Coarse classification of widget error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerErrorKind {
    InvalidParameter,
    Html5,
    NotFound,
    /// The content owner does not allow playback in embedded players
    EmbeddingDisallowed,
    Unknown,
}

/// Error code mapping. 101 and 150 are the same restriction reported under
/// two codes, so both rows point at `EmbeddingDisallowed`.
pub const PLAYER_ERROR_TABLE: &[(i32, PlayerErrorKind)] = &[
    (2, PlayerErrorKind::InvalidParameter),
    (5, PlayerErrorKind::Html5),
    (100, PlayerErrorKind::NotFound),
    (101, PlayerErrorKind::EmbeddingDisallowed),
    (150, PlayerErrorKind::EmbeddingDisallowed),
];

impl PlayerErrorKind {
    pub fn from_code(code: i32) -> Self {
        PLAYER_ERROR_TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, kind)| *kind)
            .unwrap_or(PlayerErrorKind::Unknown)
    }

    pub fn message(&self) -> &'static str {
        match self {
            PlayerErrorKind::InvalidParameter => "The video id is invalid.",
            PlayerErrorKind::Html5 => "The video cannot be played in this player.",
            PlayerErrorKind::NotFound => "The video was not found or has been made private.",
            PlayerErrorKind::EmbeddingDisallowed => {
                "The owner of this video does not allow it to be played here."
            }
            PlayerErrorKind::Unknown => "The video could not be played.",
        }
    }

    /// Whether the remediation is to open the video on the original site
    pub fn offers_watch_link(&self) -> bool {
        matches!(self, PlayerErrorKind::EmbeddingDisallowed)
    }
}

/// Error details stored in `PlayerState`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerErrorInfo {
    pub code: i32,
    pub kind: PlayerErrorKind,
    pub message: String,
    /// External link offered as remediation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_url: Option<String>,
}

impl PlayerErrorInfo {
    pub fn from_code(code: i32, video_id: Option<&VideoId>) -> Self {
        let kind = PlayerErrorKind::from_code(code);
        Self {
            code,
            kind,
            message: kind.message().to_string(),
            watch_url: if kind.offers_watch_link() {
                video_id.map(VideoId::watch_url)
            } else {
                None
            },
        }
    }

    /// Error raised when the factory itself fails to build an instance
    pub fn construction(message: impl Into<String>) -> Self {
        Self {
            code: -1,
            kind: PlayerErrorKind::Unknown,
            message: message.into(),
            watch_url: None,
        }
    }
}
