//! Cross-frame remote control
//!
//! An embedding page may drive the player with `{type, value}` messages and
//! listens for `PLAYER_READY`, `STATE_CHANGE` and `TIME_UPDATE` in return.
//! Inbound messages are accepted only from origins on an explicit allow-list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{CaptionError, Result};
use crate::player::{PlayerFacade, PlayerNotice, PlayerState, DEFAULT_CONTAINER};
use crate::video_id::VideoId;

/// Outbound buffer per subscriber before slow listeners start lagging
const OUTBOUND_CAPACITY: usize = 256;

/// Exact-match set of `scheme://host[:port]` origins
#[derive(Debug, Clone, Default)]
pub struct OriginAllowList {
    origins: HashSet<String>,
}

impl OriginAllowList {
    pub fn new(origins: &[String]) -> Result<Self> {
        let origins = origins
            .iter()
            .map(|o| Self::parse_origin(o))
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self { origins })
    }

    /// An allow-list that rejects everything
    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::deny_all());
        }
        Self::new(&config.allowed_origins)
    }

    /// Normalize an origin string; paths, queries and wildcards are rejected
    pub fn parse_origin(raw: &str) -> Result<String> {
        let url = Url::parse(raw.trim())
            .map_err(|e| CaptionError::Config(format!("invalid origin '{}': {}", raw, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(CaptionError::Config(format!(
                "origin '{}' must use http or https",
                raw
            )));
        }
        if url.host_str().is_none() {
            return Err(CaptionError::Config(format!("origin '{}' has no host", raw)));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(CaptionError::Config(format!(
                "origin '{}' must not contain a path or query",
                raw
            )));
        }

        Ok(url.origin().ascii_serialization())
    }

    pub fn allows(&self, origin: &str) -> bool {
        Self::parse_origin(origin)
            .map(|o| self.origins.contains(&o))
            .unwrap_or(false)
    }

    /// Normalized origins, in no particular order
    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.origins.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Command accepted from a trusted remote sender
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    LoadVideo(VideoId),
    Play,
    Pause,
    Seek(f64),
    SetVolume(u8),
    Mute,
    Unmute,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Value,
}

impl RemoteCommand {
    /// Parse the `{type, value}` wire form
    pub fn parse(raw: &str) -> Result<Self> {
        let message: RawMessage = serde_json::from_str(raw)
            .map_err(|e| CaptionError::InvalidMessage(format!("malformed message: {}", e)))?;

        let number = |value: &Value| {
            value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| CaptionError::InvalidMessage(format!("{} needs a numeric value", message.kind)))
        };

        match message.kind.as_str() {
            "LOAD_VIDEO" => {
                let id = message.value.as_str().ok_or_else(|| {
                    CaptionError::InvalidMessage("LOAD_VIDEO needs a video id".to_string())
                })?;
                Ok(RemoteCommand::LoadVideo(VideoId::parse(id)?))
            }
            "PLAY" => Ok(RemoteCommand::Play),
            "PAUSE" => Ok(RemoteCommand::Pause),
            "SEEK" => Ok(RemoteCommand::Seek(number(&message.value)?.max(0.0))),
            "SET_VOLUME" => {
                let volume = number(&message.value)?.round().clamp(0.0, 100.0);
                Ok(RemoteCommand::SetVolume(volume as u8))
            }
            "MUTE" => Ok(RemoteCommand::Mute),
            "UNMUTE" => Ok(RemoteCommand::Unmute),
            other => Err(CaptionError::InvalidMessage(format!("unknown message type {}", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::LoadVideo(_) => "LOAD_VIDEO",
            RemoteCommand::Play => "PLAY",
            RemoteCommand::Pause => "PAUSE",
            RemoteCommand::Seek(_) => "SEEK",
            RemoteCommand::SetVolume(_) => "SET_VOLUME",
            RemoteCommand::Mute => "MUTE",
            RemoteCommand::Unmute => "UNMUTE",
        }
    }
}

/// Message sent back to the embedding page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    PlayerReady {
        #[serde(rename = "videoId")]
        video_id: String,
        duration: f64,
    },
    StateChange {
        state: PlayerState,
    },
    TimeUpdate {
        #[serde(rename = "currentTime")]
        current_time: f64,
        duration: f64,
    },
}

impl From<&PlayerNotice> for OutboundMessage {
    fn from(notice: &PlayerNotice) -> Self {
        match notice {
            PlayerNotice::Ready { video_id, duration } => OutboundMessage::PlayerReady {
                video_id: video_id.to_string(),
                duration: *duration,
            },
            PlayerNotice::StateChange { state } => OutboundMessage::StateChange {
                state: state.clone(),
            },
            PlayerNotice::TimeUpdate {
                current_time,
                duration,
            } => OutboundMessage::TimeUpdate {
                current_time: *current_time,
                duration: *duration,
            },
        }
    }
}

/// Whatever the remote commands end up driving
pub trait RemoteTarget: Send + Sync {
    fn has_player(&self) -> bool;
    fn load_video(&self, video_id: VideoId);
    fn play(&self);
    fn pause(&self);
    fn seek(&self, seconds: f64);
    fn set_volume(&self, volume: u8);
    fn mute(&self);
    fn unmute(&self);
}

impl RemoteTarget for PlayerFacade {
    fn has_player(&self) -> bool {
        PlayerFacade::has_player(self)
    }

    fn load_video(&self, video_id: VideoId) {
        PlayerFacade::load_video(self, DEFAULT_CONTAINER, video_id);
    }

    fn play(&self) {
        PlayerFacade::play(self);
    }

    fn pause(&self) {
        PlayerFacade::pause(self);
    }

    fn seek(&self, seconds: f64) {
        self.seek_to(seconds);
    }

    fn set_volume(&self, volume: u8) {
        PlayerFacade::set_volume(self, volume);
    }

    fn mute(&self) {
        PlayerFacade::mute(self);
    }

    fn unmute(&self) {
        PlayerFacade::unmute(self);
    }
}

/// Validates and applies inbound messages, relays player notices outbound
#[derive(Clone)]
pub struct RemoteController {
    allow_list: Arc<OriginAllowList>,
    target: Arc<dyn RemoteTarget>,
    outbound: broadcast::Sender<OutboundMessage>,
}

impl RemoteController {
    pub fn new(allow_list: OriginAllowList, target: Arc<dyn RemoteTarget>) -> Self {
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Self {
            allow_list: Arc::new(allow_list),
            target,
            outbound,
        }
    }

    pub fn allow_list(&self) -> &OriginAllowList {
        &self.allow_list
    }

    /// Forward the facade's notices to every outbound subscriber
    pub fn relay_from(&self, facade: &PlayerFacade) {
        let outbound = self.outbound.clone();
        facade.set_on_notice(move |notice| {
            // No subscribers is fine
            let _ = outbound.send(OutboundMessage::from(notice));
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.outbound.subscribe()
    }

    /// Publish a message directly, e.g. a state snapshot for a new listener
    pub fn publish(&self, message: OutboundMessage) {
        let _ = self.outbound.send(message);
    }

    /// Handle one inbound message from `origin`
    ///
    /// Rejections are logged and returned to the caller, which must not echo
    /// them back to the sender.
    pub fn handle(&self, origin: &str, raw: &str) -> Result<RemoteCommand> {
        if !self.allow_list.allows(origin) {
            warn!("🚫 Dropping remote message from untrusted origin {}", origin);
            return Err(CaptionError::UntrustedOrigin(origin.to_string()));
        }

        let command = RemoteCommand::parse(raw).map_err(|e| {
            warn!("Ignoring remote message from {}: {}", origin, e);
            e
        })?;

        if !matches!(command, RemoteCommand::LoadVideo(_)) && !self.target.has_player() {
            debug!("Rejecting {} from {}: no player", command.name(), origin);
            return Err(CaptionError::InvalidMessage(format!(
                "{} rejected: no player loaded",
                command.name()
            )));
        }

        info!("📡 Remote {} from {}", command.name(), origin);
        self.apply(&command);
        Ok(command)
    }

    fn apply(&self, command: &RemoteCommand) {
        match command {
            RemoteCommand::LoadVideo(id) => self.target.load_video(id.clone()),
            RemoteCommand::Play => self.target.play(),
            RemoteCommand::Pause => self.target.pause(),
            RemoteCommand::Seek(seconds) => self.target.seek(*seconds),
            RemoteCommand::SetVolume(volume) => self.target.set_volume(*volume),
            RemoteCommand::Mute => self.target.mute(),
            RemoteCommand::Unmute => self.target.unmute(),
        }
    }
}
