//! Embedded player abstraction and control facade
//!
//! The third-party widget is modelled by two traits: a `PlayerFactory` that
//! builds an instance into a container, and the `PlayerBackend` instance
//! itself with the widget's imperative API. Asynchronous signals travel back
//! through an `EventSink` handed over at construction time.

pub mod errors;
pub mod facade;
pub mod simulated;
pub mod state;

pub use errors::{PlayerErrorInfo, PlayerErrorKind, PLAYER_ERROR_TABLE};
pub use facade::{PlayerFacade, PlayerNotice, TimerRegistry};
pub use simulated::{SimulatedPlayerFactory, SimulationLog};
pub use state::{PlayerPhase, PlayerState};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::PlayerConfig;
use crate::error::Result;
use crate::video_id::VideoId;

/// Container id the player is mounted into when the caller does not pick one
pub const DEFAULT_CONTAINER: &str = "youtube-player";

/// Raw state codes reported through `onStateChange`
pub mod raw_state {
    pub const UNSTARTED: i32 = -1;
    pub const ENDED: i32 = 0;
    pub const PLAYING: i32 = 1;
    pub const PAUSED: i32 = 2;
    pub const BUFFERING: i32 = 3;
    pub const CUED: i32 = 5;
}

/// Asynchronous signal emitted by an embedded player instance
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    StateChange(i32),
    PlaybackQualityChange(String),
    PlaybackRateChange(f64),
    Error(i32),
}

/// Sending half of a player instance's event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event; returns false once the facade stopped listening
    pub fn emit(&self, event: PlayerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Widget parameters passed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerVars {
    pub autoplay: u8,
    pub controls: u8,
    pub rel: u8,
    pub modestbranding: u8,
    pub playsinline: u8,
    pub enablejsapi: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// Everything a factory needs to build one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOptions {
    pub video_id: VideoId,
    pub width: u32,
    pub height: u32,
    pub player_vars: PlayerVars,
}

impl PlayerOptions {
    pub fn from_config(video_id: VideoId, config: &PlayerConfig) -> Self {
        Self {
            video_id,
            width: config.width,
            height: config.height,
            player_vars: PlayerVars {
                autoplay: u8::from(config.autoplay),
                controls: u8::from(!config.hide_native_controls),
                rel: 0,
                modestbranding: 1,
                playsinline: 1,
                enablejsapi: 1,
                origin: None,
            },
        }
    }
}

/// Imperative surface of one embedded player instance
pub trait PlayerBackend: Send {
    fn play_video(&mut self);
    fn pause_video(&mut self);
    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool);
    fn set_volume(&mut self, volume: u8);
    fn mute(&mut self);
    fn un_mute(&mut self);
    fn set_playback_rate(&mut self, rate: f64);
    fn set_playback_quality(&mut self, quality: &str);
    fn get_current_time(&self) -> f64;
    fn get_duration(&self) -> f64;

    /// Fraction of the video buffered so far (0.0 - 1.0)
    fn get_video_loaded_fraction(&self) -> f64 {
        0.0
    }

    /// Release the instance; no events may be emitted afterwards
    fn destroy(&mut self);
}

/// Builds player instances into a named container
pub trait PlayerFactory: Send + Sync {
    fn construct(
        &self,
        container: &str,
        options: &PlayerOptions,
        events: EventSink,
    ) -> Result<Box<dyn PlayerBackend>>;
}
