//! Caption Sync - caption synchronization engine
//!
//! Keeps a scrolling transcript in lock-step with an embedded video player:
//! resolves the active caption from the playback clock, follows it in the
//! list, turns caption clicks into seeks and normalizes the player's
//! imperative API into a state snapshot plus guarded actions.

pub mod bridge;
pub mod config;
pub mod error;
pub mod fetch;
pub mod player;
pub mod remote;
pub mod scroll;
pub mod session;
pub mod transcript;
pub mod video_id;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::bridge::{HandlerCell, NavigationBridge};
pub use crate::config::Config;
pub use crate::error::{CaptionError, Result};
pub use crate::fetch::{
    ClientCache, HttpTranscriptClient, MetadataClient, MetadataPanel, TranscriptCacheManager,
    TranscriptSource, TranscriptStore,
};
pub use crate::player::{PlayerFacade, PlayerPhase, PlayerState, SimulatedPlayerFactory};
pub use crate::remote::{OriginAllowList, RemoteCommand, RemoteController};
pub use crate::scroll::{ScrollController, Viewport};
pub use crate::session::{PlaybackSession, SessionView};
pub use crate::transcript::{Segment, Transcript};
pub use crate::video_id::VideoId;
