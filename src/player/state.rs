use serde::{Deserialize, Serialize};

use super::errors::PlayerErrorInfo;
use super::raw_state;

/// Lifecycle phase of the current player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerPhase {
    Uninitialized,
    Ready,
    Playing,
    Paused,
    Buffering,
    Ended,
    /// Terminal until a new video is loaded
    Error,
}

impl PlayerPhase {
    /// Map a raw `onStateChange` code; `None` means "no phase change"
    pub fn from_raw(code: i32) -> Option<Self> {
        match code {
            raw_state::PLAYING => Some(PlayerPhase::Playing),
            raw_state::PAUSED => Some(PlayerPhase::Paused),
            raw_state::BUFFERING => Some(PlayerPhase::Buffering),
            raw_state::ENDED => Some(PlayerPhase::Ended),
            raw_state::CUED => Some(PlayerPhase::Ready),
            _ => None,
        }
    }

    /// Phases reachable only after the instance signalled readiness
    pub fn is_ready(&self) -> bool {
        !matches!(self, PlayerPhase::Uninitialized | PlayerPhase::Error)
    }
}

/// Snapshot of the player as seen by the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub phase: PlayerPhase,
    pub playing: bool,
    pub muted: bool,
    /// 0-100
    pub volume: u8,
    pub current_time: f64,
    pub duration: f64,
    pub playback_rate: f64,
    pub quality: Option<String>,
    /// Fraction of the video buffered (0.0 - 1.0)
    pub buffered: f64,
    pub error: Option<PlayerErrorInfo>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            phase: PlayerPhase::Uninitialized,
            playing: false,
            muted: false,
            volume: 100,
            current_time: 0.0,
            duration: 0.0,
            playback_rate: 1.0,
            quality: None,
            buffered: 0.0,
            error: None,
        }
    }
}

impl PlayerState {
    /// Fresh state for a new instance, keeping the user's audio preferences
    pub fn reset_for_new_video(&self) -> Self {
        Self {
            muted: self.muted,
            volume: self.volume,
            ..Self::default()
        }
    }

    /// Record a clock reading, keeping `current_time <= duration` once the
    /// duration is known
    pub fn record_time(&mut self, current_time: f64, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.duration = duration;
        }
        let time = if current_time.is_finite() { current_time.max(0.0) } else { 0.0 };
        self.current_time = if self.duration > 0.0 { time.min(self.duration) } else { time };
    }

    /// Playback progress (0.0 - 1.0)
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_state_mapping() {
        assert_eq!(PlayerPhase::from_raw(1), Some(PlayerPhase::Playing));
        assert_eq!(PlayerPhase::from_raw(2), Some(PlayerPhase::Paused));
        assert_eq!(PlayerPhase::from_raw(3), Some(PlayerPhase::Buffering));
        assert_eq!(PlayerPhase::from_raw(0), Some(PlayerPhase::Ended));
        assert_eq!(PlayerPhase::from_raw(5), Some(PlayerPhase::Ready));
        assert_eq!(PlayerPhase::from_raw(-1), None);
    }

    #[test]
    fn test_record_time_clamps_to_duration() {
        let mut state = PlayerState::default();
        state.record_time(12.0, 10.0);
        assert_eq!(state.current_time, 10.0);
        state.record_time(-3.0, 0.0);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.duration, 10.0);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn test_reset_keeps_audio_preferences() {
        let mut state = PlayerState::default();
        state.volume = 40;
        state.muted = true;
        state.current_time = 33.0;
        let fresh = state.reset_for_new_video();
        assert_eq!(fresh.volume, 40);
        assert!(fresh.muted);
        assert_eq!(fresh.current_time, 0.0);
        assert_eq!(fresh.phase, PlayerPhase::Uninitialized);
    }
}
