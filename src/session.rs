//! One synchronized playback view
//!
//! Ties the transcript store, player facade, navigation bridge, active
//! segment tracker and scroll controller together. `tick` is the clock edge:
//! it reads the latest player time, resolves the active segment and decides
//! whether the list should scroll.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bridge::NavigationBridge;
use crate::config::Config;
use crate::fetch::{StoreSnapshot, TranscriptSource, TranscriptStatus, TranscriptStore};
use crate::player::{PlayerFacade, PlayerFactory, PlayerState, DEFAULT_CONTAINER};
use crate::remote::RemoteTarget;
use crate::scroll::{ScrollBinding, ScrollCommand, ScrollController, Viewport};
use crate::transcript::{resolve_index, ActiveChange, ActiveSegmentTracker, Segment, Transcript};
use crate::video_id::VideoId;

/// Row height used for the built-in layout until a renderer supplies one
pub const DEFAULT_ROW_HEIGHT: f64 = 48.0;

/// Everything a renderer needs after one tick
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub video_id: Option<String>,
    pub status: TranscriptStatus,
    pub player: PlayerState,
    pub active_index: Option<usize>,
    pub active: Option<Segment>,
    pub upcoming: Vec<Segment>,
    /// Set only on the tick where the active segment changed and needs scrolling
    pub scroll: Option<ScrollCommand>,
    /// Explanation to show instead of the list when there are no captions
    pub message: Option<String>,
    pub available_languages: Vec<String>,
    pub follow: bool,
}

struct ViewState {
    tracker: ActiveSegmentTracker,
    scroll: ScrollController,
    binding: ScrollBinding,
    viewport: Viewport,
    /// Transcript the tracker and binding were built for
    transcript: Option<Arc<Transcript>>,
}

impl ViewState {
    /// Rebuild derived state when the store holds a different transcript
    fn sync(&mut self, transcript: &Arc<Transcript>) {
        let current = self
            .transcript
            .as_ref()
            .is_some_and(|seen| Arc::ptr_eq(seen, transcript));
        if current {
            return;
        }
        self.tracker.reset();
        self.scroll.reset();
        self.binding = ScrollBinding::uniform(&transcript.segments, DEFAULT_ROW_HEIGHT);
        self.transcript = Some(Arc::clone(transcript));
    }
}

pub struct PlaybackSession {
    config: Arc<Config>,
    container: String,
    source: Arc<dyn TranscriptSource>,
    store: TranscriptStore,
    facade: PlayerFacade,
    bridge: NavigationBridge,
    view: Mutex<ViewState>,
}

impl PlaybackSession {
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn TranscriptSource>,
        factory: Arc<dyn PlayerFactory>,
    ) -> Self {
        let facade = PlayerFacade::new(factory, config.player.clone());
        Self::with_facade(config, source, facade)
    }

    /// Build around an existing facade, e.g. one sharing a timer registry
    pub fn with_facade(
        config: Arc<Config>,
        source: Arc<dyn TranscriptSource>,
        facade: PlayerFacade,
    ) -> Self {
        let bridge = NavigationBridge::new();
        bridge.attach(&facade);

        let view = ViewState {
            tracker: ActiveSegmentTracker::new(),
            scroll: ScrollController::new(&config.scroll),
            binding: ScrollBinding::new(),
            viewport: Viewport::new(0.0, 600.0),
            transcript: None,
        };

        Self {
            config,
            container: DEFAULT_CONTAINER.to_string(),
            source,
            store: TranscriptStore::new(),
            facade,
            bridge,
            view: Mutex::new(view),
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn facade(&self) -> &PlayerFacade {
        &self.facade
    }

    pub fn bridge(&self) -> &NavigationBridge {
        &self.bridge
    }

    pub fn video_id(&self) -> Option<VideoId> {
        self.store.video_id()
    }

    /// Point the session at a new video
    ///
    /// Rebuilds the player and starts the transcript fetch. Returns `None`
    /// when `video_id` is already loaded.
    pub fn switch_video(&self, video_id: VideoId) -> Option<JoinHandle<bool>> {
        if self.store.video_id().as_ref() == Some(&video_id)
            && self.facade.video_id().as_ref() == Some(&video_id)
        {
            debug!("{} is already loaded", video_id);
            return None;
        }

        info!("🔄 Switching session to {}", video_id);
        self.bridge.clear();
        self.facade.load_video(&self.container, video_id.clone());
        let fetch = self.store.spawn_load(Arc::clone(&self.source), video_id);

        let mut view = self.state();
        view.tracker.reset();
        view.scroll.reset();
        Some(fetch)
    }

    /// Fetch the current video's transcript again, skipping any cache
    pub fn reload_transcript(&self) -> Option<JoinHandle<bool>> {
        self.store.reload(Arc::clone(&self.source))
    }

    /// Resolve the current player time into a renderable view
    ///
    /// This is the clock edge: it advances the tracker and hands out a scroll
    /// command at most once per active change.
    pub fn tick(&self) -> SessionView {
        let player = self.facade.state();
        let snapshot = self.store.snapshot();
        let transcript = &snapshot.transcript;
        let time = player.current_time;

        let mut view = self.state();
        view.sync(transcript);

        if let ActiveChange::Entered(index) = view.tracker.update(transcript, time) {
            debug!("Active segment -> #{} at {:.2}s", index, time);
        }
        let active_index = view.tracker.active_index();
        let active = active_index.and_then(|i| transcript.segments.get(i));

        let ViewState {
            scroll,
            binding,
            viewport,
            ..
        } = &mut *view;
        let scroll_command = scroll.update(active, binding, *viewport);
        let follow = view.scroll.follow();
        drop(view);

        self.render(&snapshot, player, active_index, scroll_command, follow)
    }

    /// The same view as `tick` without advancing it; never carries a scroll command
    pub fn current_view(&self) -> SessionView {
        let player = self.facade.state();
        let snapshot = self.store.snapshot();
        let active_index = resolve_index(&snapshot.transcript.segments, player.current_time);
        let follow = self.state().scroll.follow();
        self.render(&snapshot, player, active_index, None, follow)
    }

    fn render(
        &self,
        snapshot: &StoreSnapshot,
        player: PlayerState,
        active_index: Option<usize>,
        scroll: Option<ScrollCommand>,
        follow: bool,
    ) -> SessionView {
        let transcript = &snapshot.transcript;
        let settled = !matches!(snapshot.status, TranscriptStatus::Loading | TranscriptStatus::Idle);

        SessionView {
            video_id: snapshot.video_id.as_ref().map(|id| id.to_string()),
            status: snapshot.status,
            active_index,
            active: active_index.and_then(|i| transcript.segments.get(i)).cloned(),
            upcoming: transcript
                .upcoming(player.current_time, self.config.transcript.upcoming_limit)
                .into_iter()
                .cloned()
                .collect(),
            scroll,
            message: transcript
                .display_message()
                .filter(|_| settled)
                .map(str::to_string),
            available_languages: transcript.available_languages.clone(),
            follow,
            player,
        }
    }

    /// Seek to the start of the segment at `index` in the current transcript
    pub fn click_segment(&self, index: usize) -> bool {
        let transcript = self.store.transcript();
        match transcript.segments.get(index) {
            Some(segment) => self.bridge.click(segment),
            None => false,
        }
    }

    pub fn seek(&self, seconds: f64) -> bool {
        self.bridge.seek(seconds)
    }

    pub fn set_follow(&self, follow: bool) {
        self.state().scroll.set_follow(follow);
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.state().viewport = viewport;
    }

    /// Replace the rendered layout; takes effect on the next active change
    pub fn set_binding(&self, binding: ScrollBinding) {
        self.state().binding = binding;
    }

    /// Tear down the player and forget the transcript
    pub fn close(&self) {
        self.bridge.clear();
        self.facade.destroy();
        self.store.clear();
    }
}

impl RemoteTarget for PlaybackSession {
    fn has_player(&self) -> bool {
        self.facade.has_player()
    }

    fn load_video(&self, video_id: VideoId) {
        // The fetch runs detached; the store applies it when it lands
        let _ = self.switch_video(video_id);
    }

    fn play(&self) {
        self.facade.play();
    }

    fn pause(&self) {
        self.facade.pause();
    }

    fn seek(&self, seconds: f64) {
        self.facade.seek_to(seconds);
    }

    fn set_volume(&self, volume: u8) {
        self.facade.set_volume(volume);
    }

    fn mute(&self) {
        self.facade.mute();
    }

    fn unmute(&self) {
        self.facade.unmute();
    }
}
