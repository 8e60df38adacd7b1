use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use url::Url;

use crate::error::CaptionError;

/// Validated 11-character video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"))
}

impl VideoId {
    /// Accept a bare id or a watch, short, embed or `youtu.be` URL
    pub fn parse(input: &str) -> Result<Self, CaptionError> {
        let input = input.trim();
        if id_pattern().is_match(input) {
            return Ok(Self(input.to_string()));
        }

        let url = Url::parse(input).map_err(|_| CaptionError::InvalidVideoId(input.to_string()))?;
        let candidate = match url.host_str() {
            Some("youtu.be") => url.path_segments().and_then(|mut s| s.next()).map(str::to_string),
            Some(host) if host.ends_with("youtube.com") || host.ends_with("youtube-nocookie.com") => {
                let segments = url.path_segments().map(|s| s.collect::<Vec<_>>()).unwrap_or_default();
                match segments.first().copied() {
                    Some("watch") => url
                        .query_pairs()
                        .find(|(k, _)| k == "v")
                        .map(|(_, v)| v.into_owned()),
                    Some("embed") | Some("shorts") | Some("live") | Some("v") => {
                        segments.get(1).map(|s| s.to_string())
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        match candidate {
            Some(id) if id_pattern().is_match(&id) => Ok(Self(id)),
            _ => Err(CaptionError::InvalidVideoId(input.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Link to watch on the original platform
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VideoId {
    type Err = CaptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VideoId {
    type Error = CaptionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id() {
        assert_eq!(VideoId::parse("dQw4w9WgXcQ").unwrap().as_str(), "dQw4w9WgXcQ");
        assert_eq!(VideoId::parse("  dQw4w9WgXcQ \n").unwrap().as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_url_forms() {
        for input in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?rel=0",
        ] {
            assert_eq!(VideoId::parse(input).unwrap().as_str(), "dQw4w9WgXcQ", "{}", input);
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(VideoId::parse("short").is_err());
        assert!(VideoId::parse("https://example.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(VideoId::parse("https://www.youtube.com/watch?v=bad").is_err());
        assert!("../etc/passwd".parse::<VideoId>().is_err());
    }

    #[test]
    fn test_watch_url() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }
}
