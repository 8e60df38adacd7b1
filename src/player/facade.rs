//! Player control facade
//!
//! Owns the single live player instance and turns its imperative API and
//! asynchronous events into a `PlayerState` snapshot plus guarded actions.
//!
//! Rules the facade enforces:
//! - one instance per video id; a new id destroys the old instance (and
//!   clears the handle) before building the next one
//! - play/pause/buffering/ended come only from the widget's state events
//! - `current_time` is polled on a timer that exists only while playing
//! - actions without a live handle are dropped silently
//! - events are tagged with the instance generation; anything from an
//!   older instance is ignored

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::errors::PlayerErrorInfo;
use super::state::{PlayerPhase, PlayerState};
use super::{EventSink, PlayerBackend, PlayerEvent, PlayerFactory, PlayerOptions};
use crate::bridge::HandlerCell;
use crate::config::PlayerConfig;
use crate::video_id::VideoId;

/// Callback invoked once per ready transition with a fresh seek capability
pub type ReadyHandler = dyn Fn(SeekHandle) + Send + Sync;

/// Callback receiving facade notifications (ready, state, time)
pub type NoticeHandler = dyn Fn(&PlayerNotice) + Send + Sync;

/// Notification emitted after the facade state changed
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotice {
    Ready { video_id: VideoId, duration: f64 },
    StateChange { state: PlayerState },
    TimeUpdate { current_time: f64, duration: f64 },
}

/// Counts live `current_time` poll timers
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    active: Arc<AtomicUsize>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn register(&self, handle: JoinHandle<()>) -> PollTimer {
        self.active.fetch_add(1, Ordering::SeqCst);
        PollTimer {
            handle,
            registry: self.clone(),
        }
    }
}

/// Running poll task; dropping it stops the timer
struct PollTimer {
    handle: JoinHandle<()>,
    registry: TimerRegistry,
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.handle.abort();
        self.registry.active.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    handle: Option<Box<dyn PlayerBackend>>,
    video_id: Option<VideoId>,
    generation: u64,
    state: PlayerState,
    poll: Option<PollTimer>,
    pump: Option<JoinHandle<()>>,
}

impl Inner {
    fn teardown(&mut self) {
        self.poll = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(mut handle) = self.handle.take() {
            handle.destroy();
            debug!("🗑️ Destroyed player instance (generation {})", self.generation);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown();
    }
}

struct Shared {
    factory: Arc<dyn PlayerFactory>,
    config: PlayerConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<PlayerState>,
    timers: TimerRegistry,
    on_ready: HandlerCell<ReadyHandler>,
    on_notice: HandlerCell<NoticeHandler>,
}

/// Stable state + actions contract over the embedded player
#[derive(Clone)]
pub struct PlayerFacade {
    shared: Arc<Shared>,
}

impl PlayerFacade {
    pub fn new(factory: Arc<dyn PlayerFactory>, config: PlayerConfig) -> Self {
        Self::with_timer_registry(factory, config, TimerRegistry::new())
    }

    pub fn with_timer_registry(
        factory: Arc<dyn PlayerFactory>,
        config: PlayerConfig,
        timers: TimerRegistry,
    ) -> Self {
        let initial = PlayerState {
            volume: config.initial_volume.min(100),
            ..PlayerState::default()
        };
        let (state_tx, _) = watch::channel(initial.clone());

        Self {
            shared: Arc::new(Shared {
                factory,
                config,
                inner: Mutex::new(Inner {
                    handle: None,
                    video_id: None,
                    generation: 0,
                    state: initial,
                    poll: None,
                    pump: None,
                }),
                state_tx,
                timers,
                on_ready: HandlerCell::new(),
                on_notice: HandlerCell::new(),
            }),
        }
    }

    /// Destroy any current instance and build a new one for `video_id`
    ///
    /// Must be called from within a Tokio runtime; the instance's event pump
    /// runs as a task.
    pub fn load_video(&self, container: &str, video_id: VideoId) {
        self.shared.load_video(container, video_id);
    }

    /// Destroy the current instance, if any
    pub fn destroy(&self) {
        self.shared.destroy();
    }

    pub fn play(&self) {
        self.shared.with_handle("play", None, |handle, _| {
            handle.play_video();
            None
        });
    }

    pub fn pause(&self) {
        self.shared.with_handle("pause", None, |handle, _| {
            handle.pause_video();
            None
        });
    }

    /// Change position without touching play/pause state
    pub fn seek_to(&self, seconds: f64) {
        self.shared.seek(None, seconds);
    }

    pub fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        self.shared.with_handle("set_volume", None, |handle, state| {
            handle.set_volume(volume);
            state.volume = volume;
            Some(PlayerNotice::StateChange { state: state.clone() })
        });
    }

    pub fn mute(&self) {
        self.shared.with_handle("mute", None, |handle, state| {
            handle.mute();
            state.muted = true;
            Some(PlayerNotice::StateChange { state: state.clone() })
        });
    }

    pub fn unmute(&self) {
        self.shared.with_handle("unmute", None, |handle, state| {
            handle.un_mute();
            state.muted = false;
            Some(PlayerNotice::StateChange { state: state.clone() })
        });
    }

    pub fn set_playback_rate(&self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            debug!("Ignoring invalid playback rate {}", rate);
            return;
        }
        self.shared.with_handle("set_playback_rate", None, |handle, state| {
            handle.set_playback_rate(rate);
            state.playback_rate = rate;
            Some(PlayerNotice::StateChange { state: state.clone() })
        });
    }

    pub fn set_quality(&self, quality: &str) {
        self.shared.with_handle("set_quality", None, |handle, _| {
            handle.set_playback_quality(quality);
            None
        });
    }

    /// Current state snapshot
    pub fn state(&self) -> PlayerState {
        self.shared.lock().state.clone()
    }

    pub fn phase(&self) -> PlayerPhase {
        self.shared.lock().state.phase
    }

    pub fn video_id(&self) -> Option<VideoId> {
        self.shared.lock().video_id.clone()
    }

    /// Whether a player instance currently exists
    pub fn has_player(&self) -> bool {
        self.shared.lock().handle.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.lock().poll.is_some()
    }

    /// Receive every published state snapshot
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.shared.state_tx.subscribe()
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.shared.timers
    }

    /// Seek capability for the live instance, once it is ready
    pub fn seek_handle(&self) -> Option<SeekHandle> {
        let inner = self.shared.lock();
        if inner.handle.is_some() && inner.state.phase.is_ready() {
            Some(SeekHandle {
                shared: Arc::downgrade(&self.shared),
                generation: inner.generation,
            })
        } else {
            None
        }
    }

    /// Register the ready callback; replaces any previous one
    pub fn set_on_ready<F>(&self, handler: F)
    where
        F: Fn(SeekHandle) + Send + Sync + 'static,
    {
        self.shared.on_ready.set(Arc::new(handler));
    }

    /// Register the notification callback; replaces any previous one
    pub fn set_on_notice<F>(&self, handler: F)
    where
        F: Fn(&PlayerNotice) + Send + Sync + 'static,
    {
        self.shared.on_notice.set(Arc::new(handler));
    }

    pub fn clear_handlers(&self) {
        self.shared.on_ready.clear();
        self.shared.on_notice.clear();
    }
}

impl fmt::Debug for PlayerFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("PlayerFacade")
            .field("video_id", &inner.video_id)
            .field("generation", &inner.generation)
            .field("phase", &inner.state.phase)
            .field("has_player", &inner.handle.is_some())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }

    fn emit(&self, notices: &[PlayerNotice]) {
        if notices.is_empty() {
            return;
        }
        if let Some(handler) = self.on_notice.get() {
            for notice in notices {
                handler(notice);
            }
        }
    }

    fn load_video(self: &Arc<Self>, container: &str, video_id: VideoId) {
        let notice = {
            let mut inner = self.lock();
            inner.teardown();
            inner.generation += 1;
            let generation = inner.generation;

            inner.state = inner.state.reset_for_new_video();
            inner.video_id = Some(video_id.clone());

            let (sink, events) = EventSink::channel();
            let options = PlayerOptions::from_config(video_id.clone(), &self.config);
            match self.factory.construct(container, &options, sink) {
                Ok(handle) => {
                    inner.handle = Some(handle);
                    inner.pump = Some(spawn_event_pump(Arc::downgrade(self), generation, events));
                    info!("🎬 Player created for {} (generation {})", video_id, generation);
                }
                Err(e) => {
                    warn!("Failed to create player for {}: {}", video_id, e);
                    inner.state.phase = PlayerPhase::Error;
                    inner.state.error = Some(PlayerErrorInfo::construction(e.to_string()));
                }
            }

            self.publish(&inner);
            PlayerNotice::StateChange {
                state: inner.state.clone(),
            }
        };
        self.emit(&[notice]);
    }

    fn destroy(&self) {
        let notice = {
            let mut inner = self.lock();
            if inner.handle.is_none() && inner.video_id.is_none() {
                return;
            }
            inner.teardown();
            inner.generation += 1;
            inner.video_id = None;
            inner.state = inner.state.reset_for_new_video();
            self.publish(&inner);
            PlayerNotice::StateChange {
                state: inner.state.clone(),
            }
        };
        self.emit(&[notice]);
    }

    /// Run `action` against the live handle; dropped when there is none or
    /// when `expected_generation` no longer matches
    fn with_handle<F>(&self, name: &str, expected_generation: Option<u64>, action: F) -> bool
    where
        F: FnOnce(&mut dyn PlayerBackend, &mut PlayerState) -> Option<PlayerNotice>,
    {
        let notice = {
            let mut guard = self.lock();
            if expected_generation.is_some_and(|g| g != guard.generation) {
                debug!("{} dropped: player instance was replaced", name);
                return false;
            }

            let inner = &mut *guard;
            let Some(handle) = inner.handle.as_deref_mut() else {
                debug!("{} dropped: no player instance", name);
                return false;
            };

            let notice = action(handle, &mut inner.state);
            if notice.is_some() {
                self.publish(inner);
            }
            notice
        };

        if let Some(notice) = notice {
            self.emit(&[notice]);
        }
        true
    }

    fn seek(&self, expected_generation: Option<u64>, seconds: f64) -> bool {
        if !seconds.is_finite() {
            debug!("Ignoring seek to non-finite time");
            return false;
        }
        let target = seconds.max(0.0);
        self.with_handle("seek_to", expected_generation, |handle, state| {
            handle.seek_to(target, true);
            state.record_time(target, handle.get_duration());
            Some(PlayerNotice::TimeUpdate {
                current_time: state.current_time,
                duration: state.duration,
            })
        })
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: PlayerEvent) {
        let mut notices = Vec::new();
        let mut became_ready = None;

        {
            let mut guard = self.lock();
            if guard.generation != generation || guard.handle.is_none() {
                debug!("Dropping {:?} from a stale player instance", event);
                return;
            }

            let inner = &mut *guard;
            let state = &mut inner.state;

            match event {
                PlayerEvent::Ready => {
                    if state.phase != PlayerPhase::Uninitialized {
                        debug!("Duplicate ready signal ignored");
                        return;
                    }
                    if let Some(handle) = inner.handle.as_deref_mut() {
                        handle.set_volume(state.volume);
                        if state.muted {
                            handle.mute();
                        }
                        state.record_time(handle.get_current_time(), handle.get_duration());
                    }
                    state.phase = PlayerPhase::Ready;

                    if let Some(video_id) = inner.video_id.clone() {
                        info!("✅ Player ready for {} ({:.1}s)", video_id, state.duration);
                        notices.push(PlayerNotice::Ready {
                            video_id,
                            duration: state.duration,
                        });
                    }
                    became_ready = Some(SeekHandle {
                        shared: Arc::downgrade(self),
                        generation,
                    });
                }
                PlayerEvent::StateChange(code) => {
                    if !state.phase.is_ready() {
                        debug!("State change {} ignored in phase {:?}", code, state.phase);
                        return;
                    }
                    let Some(phase) = PlayerPhase::from_raw(code) else {
                        return;
                    };
                    if phase == state.phase {
                        return;
                    }

                    state.phase = phase;
                    state.playing = phase == PlayerPhase::Playing;
                    if let Some(handle) = inner.handle.as_deref() {
                        state.record_time(handle.get_current_time(), handle.get_duration());
                        state.buffered = handle.get_video_loaded_fraction().clamp(0.0, 1.0);
                    }
                    if phase == PlayerPhase::Ended {
                        state.current_time = state.duration;
                    }
                    debug!("▶️ Player phase -> {:?}", phase);
                    notices.push(PlayerNotice::StateChange { state: state.clone() });

                    if phase == PlayerPhase::Playing {
                        self.start_poll(inner);
                    } else {
                        inner.poll = None;
                    }
                }
                PlayerEvent::PlaybackQualityChange(quality) => {
                    state.quality = Some(quality);
                    notices.push(PlayerNotice::StateChange { state: state.clone() });
                }
                PlayerEvent::PlaybackRateChange(rate) => {
                    if rate.is_finite() && rate > 0.0 {
                        state.playback_rate = rate;
                        notices.push(PlayerNotice::StateChange { state: state.clone() });
                    }
                }
                PlayerEvent::Error(code) => {
                    let info = PlayerErrorInfo::from_code(code, inner.video_id.as_ref());
                    warn!("❌ Player error {} ({:?}): {}", code, info.kind, info.message);
                    state.phase = PlayerPhase::Error;
                    state.playing = false;
                    state.error = Some(info);
                    notices.push(PlayerNotice::StateChange { state: state.clone() });
                    inner.poll = None;
                }
            }

            self.publish(inner);
        }

        self.emit(&notices);

        if let Some(handle) = became_ready {
            if let Some(on_ready) = self.on_ready.get() {
                on_ready(handle);
            }
            if self.config.autoplay {
                self.with_handle("autoplay", Some(generation), |handle, _| {
                    handle.play_video();
                    None
                });
            }
        }
    }

    fn start_poll(self: &Arc<Self>, inner: &mut Inner) {
        if inner.poll.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        let generation = inner.generation;
        let period = Duration::from_millis(self.config.poll_interval_ms.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !shared.poll_once(generation) {
                    break;
                }
            }
        });

        inner.poll = Some(self.timers.register(task));
        debug!("⏱️ Started time polling every {:?}", period);
    }

    fn poll_once(&self, generation: u64) -> bool {
        let notice = {
            let mut guard = self.lock();
            if guard.generation != generation || !guard.state.playing {
                return false;
            }
            let inner = &mut *guard;
            let Some(handle) = inner.handle.as_deref() else {
                return false;
            };
            inner.state.record_time(handle.get_current_time(), handle.get_duration());
            inner.state.buffered = handle.get_video_loaded_fraction().clamp(0.0, 1.0);
            self.publish(inner);
            PlayerNotice::TimeUpdate {
                current_time: inner.state.current_time,
                duration: inner.state.duration,
            }
        };
        self.emit(&[notice]);
        true
    }
}

fn spawn_event_pump(
    shared: Weak<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<PlayerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(shared) = shared.upgrade() else {
                break;
            };
            shared.handle_event(generation, event);
        }
    })
}

/// Seek capability bound to one player instance
///
/// Holds only a weak reference; once the instance is replaced or the facade
/// is dropped, `seek` becomes a no-op.
#[derive(Clone)]
pub struct SeekHandle {
    shared: Weak<Shared>,
    generation: u64,
}

impl SeekHandle {
    pub fn seek(&self, seconds: f64) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.seek(Some(self.generation), seconds),
            None => false,
        }
    }

    /// Whether the instance this handle was issued for is still current
    pub fn is_live(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.lock().generation == self.generation)
    }
}

impl fmt::Debug for SeekHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekHandle")
            .field("generation", &self.generation)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::player::{PlayerErrorKind, SimulatedPlayerFactory};
    use std::sync::atomic::AtomicUsize;

    fn facade(factory: SimulatedPlayerFactory) -> PlayerFacade {
        PlayerFacade::new(Arc::new(factory), Config::default().player)
    }

    fn id(raw: &str) -> VideoId {
        VideoId::parse(raw).unwrap()
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_fires_once_per_instance() {
        let facade = facade(SimulatedPlayerFactory::new(60.0));
        let readies = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&readies);
        facade.set_on_ready(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        facade.load_video("player", id("aaaaaaaaaaa"));
        assert_eq!(facade.phase(), PlayerPhase::Uninitialized);
        assert!(facade.seek_handle().is_none());

        settle(250).await;
        assert_eq!(facade.phase(), PlayerPhase::Ready);
        assert_eq!(facade.state().duration, 60.0);
        assert_eq!(readies.load(Ordering::SeqCst), 1);

        facade.load_video("player", id("bbbbbbbbbbb"));
        settle(250).await;
        assert_eq!(readies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_only_while_playing() {
        let facade = facade(SimulatedPlayerFactory::new(60.0));
        facade.load_video("player", id("aaaaaaaaaaa"));
        settle(250).await;

        facade.play();
        settle(10).await;
        assert_eq!(facade.phase(), PlayerPhase::Playing);
        assert!(facade.state().playing);
        assert_eq!(facade.timers().active(), 1);

        settle(2000).await;
        let time = facade.state().current_time;
        assert!(time >= 1.0 && time <= 2.1, "unexpected time {}", time);

        facade.pause();
        settle(10).await;
        assert_eq!(facade.phase(), PlayerPhase::Paused);
        assert_eq!(facade.timers().active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_change_tears_down_previous_instance() {
        let factory = SimulatedPlayerFactory::new(60.0);
        let log = factory.log();
        let facade = facade(factory);

        facade.load_video("player", id("aaaaaaaaaaa"));
        settle(250).await;
        facade.play();
        settle(10).await;
        let stale = facade.seek_handle().unwrap();
        assert_eq!(facade.timers().active(), 1);

        facade.load_video("player", id("bbbbbbbbbbb"));
        assert_eq!(facade.timers().active(), 0);
        assert_eq!(log.live_instances(), 1);
        assert!(!stale.is_live());
        assert!(!stale.seek(10.0));
        assert_eq!(facade.video_id(), Some(id("bbbbbbbbbbb")));
        assert!(!facade.state().playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedding_disallowed_error() {
        let facade = facade(SimulatedPlayerFactory::new(60.0).failing_with(150));
        facade.load_video("player", id("aaaaaaaaaaa"));
        settle(250).await;

        let state = facade.state();
        assert_eq!(state.phase, PlayerPhase::Error);
        let error = state.error.unwrap();
        assert_eq!(error.kind, PlayerErrorKind::EmbeddingDisallowed);
        assert_eq!(
            error.watch_url.as_deref(),
            Some("https://www.youtube.com/watch?v=aaaaaaaaaaa")
        );
        assert_eq!(facade.timers().active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_without_handle_are_dropped() {
        let facade = facade(SimulatedPlayerFactory::new(60.0).refusing_construction());
        facade.play();
        facade.seek_to(10.0);
        facade.set_volume(20);
        assert!(!facade.has_player());
        assert_eq!(facade.state().volume, 100);

        facade.load_video("missing", id("aaaaaaaaaaa"));
        assert!(!facade.has_player());
        assert_eq!(facade.phase(), PlayerPhase::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_updates_time_without_changing_play_state() {
        let facade = facade(SimulatedPlayerFactory::new(60.0));
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notices);
        facade.set_on_notice(move |notice| sink.lock().unwrap().push(notice.clone()));

        facade.load_video("player", id("aaaaaaaaaaa"));
        settle(250).await;
        facade.seek_to(42.0);

        assert_eq!(facade.state().current_time, 42.0);
        assert_eq!(facade.phase(), PlayerPhase::Ready);
        let last = notices.lock().unwrap().last().cloned();
        assert_eq!(
            last,
            Some(PlayerNotice::TimeUpdate {
                current_time: 42.0,
                duration: 60.0
            })
        );
    }
}
