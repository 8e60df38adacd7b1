//! Deterministic in-process player
//!
//! Behaves like the embedded widget closely enough to drive the whole engine
//! without a browser: it signals readiness after a delay, reports state
//! changes when told to play or pause, advances its clock with Tokio time and
//! reports `Ended` when the clock runs out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{raw_state, EventSink, PlayerBackend, PlayerEvent, PlayerFactory, PlayerOptions};
use crate::error::{CaptionError, Result};

/// Shared record of what simulated instances were asked to do
#[derive(Debug, Clone, Default)]
pub struct SimulationLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug, Default)]
struct LogInner {
    constructed: usize,
    destroyed: usize,
    calls: Vec<String>,
}

impl SimulationLog {
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }

    pub fn constructed(&self) -> usize {
        self.lock().constructed
    }

    pub fn destroyed(&self) -> usize {
        self.lock().destroyed
    }

    /// Instances constructed and not yet destroyed
    pub fn live_instances(&self) -> usize {
        let inner = self.lock();
        inner.constructed - inner.destroyed
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }
}

/// Factory for [`SimulatedPlayer`] instances
#[derive(Debug, Clone)]
pub struct SimulatedPlayerFactory {
    duration: f64,
    ready_delay: Duration,
    error_code: Option<i32>,
    refuse_construction: bool,
    log: SimulationLog,
}

impl SimulatedPlayerFactory {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            ready_delay: Duration::from_millis(200),
            error_code: None,
            refuse_construction: false,
            log: SimulationLog::default(),
        }
    }

    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Emit this error code instead of becoming ready
    pub fn failing_with(mut self, code: i32) -> Self {
        self.error_code = Some(code);
        self
    }

    /// Make `construct` itself fail
    pub fn refusing_construction(mut self) -> Self {
        self.refuse_construction = true;
        self
    }

    pub fn log(&self) -> SimulationLog {
        self.log.clone()
    }
}

impl PlayerFactory for SimulatedPlayerFactory {
    fn construct(
        &self,
        container: &str,
        options: &PlayerOptions,
        events: EventSink,
    ) -> Result<Box<dyn PlayerBackend>> {
        if self.refuse_construction {
            return Err(CaptionError::Config(format!("container {} not found", container)));
        }

        self.log.lock().constructed += 1;
        self.log.record(format!("construct:{}", options.video_id));
        debug!("Simulated player constructed in #{} for {}", container, options.video_id);

        let clock = Arc::new(Mutex::new(Clock {
            position: 0.0,
            anchor: None,
            rate: 1.0,
            duration: self.duration,
            epoch: 0,
        }));

        let ready_events = events.clone();
        let ready_delay = self.ready_delay;
        let error_code = self.error_code;
        let ready_task = tokio::spawn(async move {
            tokio::time::sleep(ready_delay).await;
            match error_code {
                Some(code) => ready_events.emit(PlayerEvent::Error(code)),
                None => ready_events.emit(PlayerEvent::Ready),
            };
        });

        Ok(Box::new(SimulatedPlayer {
            clock,
            events,
            tasks: vec![ready_task],
            log: self.log.clone(),
            destroyed: false,
        }))
    }
}

#[derive(Debug)]
struct Clock {
    position: f64,
    /// Set while playing: the instant `position` was last captured
    anchor: Option<Instant>,
    rate: f64,
    duration: f64,
    /// Bumped on every play/pause/seek/rate change to invalidate end timers
    epoch: u64,
}

impl Clock {
    fn now(&self) -> f64 {
        let elapsed = self
            .anchor
            .map(|anchor| anchor.elapsed().as_secs_f64() * self.rate)
            .unwrap_or(0.0);
        (self.position + elapsed).min(self.duration)
    }

    fn freeze(&mut self) {
        self.position = self.now();
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }

    fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }
}

/// In-process stand-in for the embedded widget
pub struct SimulatedPlayer {
    clock: Arc<Mutex<Clock>>,
    events: EventSink,
    tasks: Vec<JoinHandle<()>>,
    log: SimulationLog,
    destroyed: bool,
}

impl SimulatedPlayer {
    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule the `Ended` signal for the current play epoch
    fn schedule_end(&mut self) {
        let (remaining, epoch) = {
            let clock = self.clock();
            if !clock.is_playing() {
                return;
            }
            ((clock.duration - clock.now()).max(0.0) / clock.rate, clock.epoch)
        };
        if !remaining.is_finite() {
            return;
        }

        let clock = Arc::clone(&self.clock);
        let events = self.events.clone();
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            let ended = {
                let mut clock = clock.lock().unwrap_or_else(PoisonError::into_inner);
                if clock.epoch == epoch && clock.is_playing() {
                    clock.position = clock.duration;
                    clock.anchor = None;
                    true
                } else {
                    false
                }
            };
            if ended {
                events.emit(PlayerEvent::StateChange(raw_state::ENDED));
            }
        }));
    }
}

impl PlayerBackend for SimulatedPlayer {
    fn play_video(&mut self) {
        if self.destroyed {
            return;
        }
        self.log.record("play".to_string());
        {
            let mut clock = self.clock();
            if clock.is_playing() {
                return;
            }
            if clock.now() >= clock.duration {
                clock.position = 0.0;
            }
            clock.anchor = Some(Instant::now());
            clock.epoch += 1;
        }
        self.events.emit(PlayerEvent::StateChange(raw_state::BUFFERING));
        self.events.emit(PlayerEvent::StateChange(raw_state::PLAYING));
        self.schedule_end();
    }

    fn pause_video(&mut self) {
        if self.destroyed {
            return;
        }
        self.log.record("pause".to_string());
        {
            let mut clock = self.clock();
            if !clock.is_playing() {
                return;
            }
            clock.position = clock.now();
            clock.anchor = None;
            clock.epoch += 1;
        }
        self.events.emit(PlayerEvent::StateChange(raw_state::PAUSED));
    }

    fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) {
        if self.destroyed {
            return;
        }
        self.log.record(format!("seek:{:.3}", seconds));
        let playing = {
            let mut clock = self.clock();
            clock.freeze();
            clock.position = seconds.clamp(0.0, clock.duration);
            clock.epoch += 1;
            clock.is_playing()
        };
        if playing {
            self.schedule_end();
        }
    }

    fn set_volume(&mut self, volume: u8) {
        self.log.record(format!("volume:{}", volume));
    }

    fn mute(&mut self) {
        self.log.record("mute".to_string());
    }

    fn un_mute(&mut self) {
        self.log.record("unmute".to_string());
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if self.destroyed {
            return;
        }
        self.log.record(format!("rate:{}", rate));
        let playing = {
            let mut clock = self.clock();
            clock.freeze();
            clock.rate = rate;
            clock.epoch += 1;
            clock.is_playing()
        };
        self.events.emit(PlayerEvent::PlaybackRateChange(rate));
        if playing {
            self.schedule_end();
        }
    }

    fn set_playback_quality(&mut self, quality: &str) {
        if self.destroyed {
            return;
        }
        self.log.record(format!("quality:{}", quality));
        self.events
            .emit(PlayerEvent::PlaybackQualityChange(quality.to_string()));
    }

    fn get_current_time(&self) -> f64 {
        self.clock().now()
    }

    fn get_duration(&self) -> f64 {
        self.clock().duration
    }

    fn get_video_loaded_fraction(&self) -> f64 {
        let clock = self.clock();
        if clock.duration > 0.0 {
            ((clock.now() + 30.0) / clock.duration).min(1.0)
        } else {
            0.0
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.log.lock().destroyed += 1;
        self.log.record("destroy".to_string());
    }
}

impl Drop for SimulatedPlayer {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
