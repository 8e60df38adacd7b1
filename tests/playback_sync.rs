use async_trait::async_trait;
use caption_sync::config::{Config, ConfigBuilder};
use caption_sync::fetch::{TranscriptSource, TranscriptStatus};
use caption_sync::player::{PlayerPhase, SimulatedPlayerFactory, TimerRegistry};
use caption_sync::remote::{OriginAllowList, RemoteController};
use caption_sync::session::PlaybackSession;
use caption_sync::transcript::{Segment, Transcript};
use caption_sync::video_id::VideoId;
use caption_sync::{CaptionError, PlayerFacade, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const VIDEO_A: &str = "aaaaaaaaaaa";
const VIDEO_B: &str = "bbbbbbbbbbb";
const ORIGIN: &str = "https://lessons.example.com";

/// Serves the scenario transcript after a per-video delay
struct DelayedSource {
    delays: HashMap<String, Duration>,
}

impl DelayedSource {
    fn new(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays
                .iter()
                .map(|(id, ms)| (id.to_string(), Duration::from_millis(*ms)))
                .collect(),
        }
    }
}

#[async_trait]
impl TranscriptSource for DelayedSource {
    async fn load(&self, video_id: &VideoId) -> Result<Transcript> {
        if let Some(delay) = self.delays.get(video_id.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        Ok(Transcript::from_segments(
            video_id.as_str(),
            vec![
                Segment::new(0.0, 5.0, "a"),
                Segment::new(5.0, 5.0, "b"),
                Segment::new(12.0, 3.0, "c"),
            ],
        ))
    }
}

fn id(raw: &str) -> VideoId {
    VideoId::parse(raw).unwrap()
}

fn config() -> Arc<Config> {
    Arc::new(
        ConfigBuilder::new()
            .with_allowed_origins(vec![ORIGIN.to_string()])
            .build(),
    )
}

fn session_with(source: DelayedSource, timers: TimerRegistry) -> (Arc<PlaybackSession>, SimulatedPlayerFactory) {
    let config = config();
    let factory = SimulatedPlayerFactory::new(15.0);
    let facade = PlayerFacade::with_timer_registry(
        Arc::new(factory.clone()),
        config.player.clone(),
        timers,
    );
    let session = PlaybackSession::with_facade(config, Arc::new(source), facade);
    (Arc::new(session), factory)
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_for_previous_video_is_discarded() {
    let (session, _) = session_with(
        DelayedSource::new(&[(VIDEO_A, 2_000), (VIDEO_B, 100)]),
        TimerRegistry::new(),
    );

    let slow = session.switch_video(id(VIDEO_A)).unwrap();
    advance(50).await;
    let fast = session.switch_video(id(VIDEO_B)).unwrap();

    assert!(fast.await.unwrap());
    assert!(!slow.await.unwrap());

    let view = session.tick();
    assert_eq!(view.video_id.as_deref(), Some(VIDEO_B));
    assert_eq!(view.status, TranscriptStatus::Ready);
    assert_eq!(session.store().transcript().video_id, VIDEO_B);
}

#[tokio::test(start_paused = true)]
async fn test_seek_then_tick_highlights_target_segment() {
    let (session, _) = session_with(DelayedSource::new(&[]), TimerRegistry::new());
    session.switch_video(id(VIDEO_A)).unwrap().await.unwrap();
    advance(250).await;

    for (time, expected) in [(7.0, Some("b")), (11.0, None), (13.0, Some("c"))] {
        assert!(session.seek(time));
        let view = session.tick();
        assert_eq!(view.player.current_time, time);
        assert_eq!(view.active.map(|s| s.text).as_deref(), expected);
    }

    // Seeking never starts playback
    assert_eq!(session.facade().phase(), PlayerPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_highlight_follows_playback_clock() {
    let (session, _) = session_with(DelayedSource::new(&[]), TimerRegistry::new());
    session.switch_video(id(VIDEO_A)).unwrap().await.unwrap();
    advance(250).await;

    session.facade().play();
    advance(6_100).await;

    let view = session.tick();
    assert!(view.player.playing);
    assert_eq!(view.active.map(|s| s.text).as_deref(), Some("b"));
    assert_eq!(view.upcoming.iter().map(|s| s.text.as_str()).collect::<Vec<_>>(), vec!["c"]);

    // Runs out at 15s and stops polling
    advance(10_000).await;
    assert_eq!(session.facade().phase(), PlayerPhase::Ended);
    assert_eq!(session.facade().timers().active(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_video_switch_returns_timer_count_to_baseline() {
    let timers = TimerRegistry::new();
    let baseline = timers.active();
    let (session, factory) = session_with(DelayedSource::new(&[]), timers.clone());

    for video in [VIDEO_A, VIDEO_B, VIDEO_A] {
        session.switch_video(id(video)).unwrap().await.unwrap();
        advance(250).await;
        session.facade().play();
        advance(1_500).await;
        assert_eq!(timers.active(), baseline + 1);
    }

    session.switch_video(id(VIDEO_B)).unwrap();
    assert_eq!(timers.active(), baseline);
    assert_eq!(factory.log().live_instances(), 1);

    session.close();
    assert_eq!(timers.active(), baseline);
    assert_eq!(factory.log().live_instances(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_untrusted_origin_changes_nothing() {
    let (session, factory) = session_with(DelayedSource::new(&[]), TimerRegistry::new());
    let remote = RemoteController::new(
        OriginAllowList::from_config(&config().remote).unwrap(),
        session.clone(),
    );
    session.switch_video(id(VIDEO_A)).unwrap().await.unwrap();
    advance(250).await;

    let before = session.facade().state();
    let calls_before = factory.log().calls().len();

    for message in [
        r#"{"type":"PLAY"}"#,
        r#"{"type":"SEEK","value":12}"#,
        r#"{"type":"LOAD_VIDEO","value":"bbbbbbbbbbb"}"#,
    ] {
        let result = remote.handle("https://attacker.example.net", message);
        assert!(matches!(result, Err(CaptionError::UntrustedOrigin(_))));
    }
    advance(250).await;

    assert_eq!(session.facade().state(), before);
    assert_eq!(factory.log().calls().len(), calls_before);
    assert_eq!(session.video_id(), Some(id(VIDEO_A)));
}

#[tokio::test(start_paused = true)]
async fn test_trusted_remote_drives_session() {
    let (session, _) = session_with(DelayedSource::new(&[]), TimerRegistry::new());
    let remote = RemoteController::new(
        OriginAllowList::from_config(&config().remote).unwrap(),
        session.clone(),
    );
    remote.relay_from(session.facade());
    let mut outbound = remote.subscribe();

    // No player yet: only LOAD_VIDEO is accepted
    assert!(remote.handle(ORIGIN, r#"{"type":"PLAY"}"#).is_err());
    remote
        .handle(ORIGIN, r#"{"type":"LOAD_VIDEO","value":"https://youtu.be/aaaaaaaaaaa"}"#)
        .unwrap();
    advance(250).await;

    remote.handle(ORIGIN, r#"{"type":"SEEK","value":13}"#).unwrap();
    remote.handle(ORIGIN, r#"{"type":"SET_VOLUME","value":40}"#).unwrap();
    assert_eq!(session.tick().active.map(|s| s.text).as_deref(), Some("c"));
    assert_eq!(session.facade().state().volume, 40);

    let mut kinds = Vec::new();
    while let Ok(message) = outbound.try_recv() {
        kinds.push(serde_json::to_value(&message).unwrap()["type"].as_str().unwrap().to_string());
    }
    assert!(kinds.contains(&"PLAYER_READY".to_string()));
    assert!(kinds.contains(&"TIME_UPDATE".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_embedding_disallowed_offers_watch_link() {
    let config = config();
    let factory = SimulatedPlayerFactory::new(15.0).failing_with(101);
    let session = PlaybackSession::new(config, Arc::new(DelayedSource::new(&[])), Arc::new(factory));
    session.switch_video(id(VIDEO_A)).unwrap().await.unwrap();
    advance(250).await;

    let view = session.tick();
    assert_eq!(view.player.phase, PlayerPhase::Error);
    let error = view.player.error.unwrap();
    assert_eq!(error.watch_url, Some(id(VIDEO_A).watch_url()));

    // Clicks are no-ops once the player failed
    assert!(!session.click_segment(0));
    assert_eq!(session.facade().timers().active(), 0);
}
