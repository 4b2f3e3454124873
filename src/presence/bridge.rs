//! Polls the player and mirrors what it plays to a presence sink

use std::future::Future;
use std::time::Duration;

use super::template::{playlist_type_label, render};
use super::traits::{PresenceSink, PresenceTimestamps, RichPresence};
use super::truncate::truncate;
use crate::player::{capture, Capture, PlaybackSnapshot, PlayerError, PlayerSource, PlayerState};
use crate::reporting::{DiagnosticContext, ErrorReporter};
use crate::settings::SettingsSource;

/// Delay between the end of one tick and the start of the next
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No track is known; the sink shows nothing
    Idle,
    /// A track snapshot is held and has been pushed
    Active,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The player had no track and presence was cleared
    Cleared,
    /// Nothing changed since the previous tick
    Unchanged,
    Updated(RichPresence),
    /// The push failed and was reported
    Failed,
}

/// Render the presence for `snapshot` at Unix time `now`
pub fn build_presence(
    snapshot: &PlaybackSnapshot,
    duration_seconds: i64,
    settings: &dyn SettingsSource,
    now: i64,
) -> RichPresence {
    let playlist_type = playlist_type_label(snapshot.playlist_kind);
    let playing = snapshot.player_state == PlayerState::Playing;

    let templates = if playing {
        settings.playing_templates()
    } else {
        settings.paused_templates()
    };

    let timestamps = (playing && settings.display_playback_duration()).then(|| {
        PresenceTimestamps {
            start: now - snapshot.position_seconds,
            end: now + (duration_seconds - snapshot.position_seconds),
        }
    });

    RichPresence {
        top_line: truncate(&render(&templates.top, snapshot, playlist_type)),
        bottom_line: truncate(&render(&templates.bottom, snapshot, playlist_type)),
        timestamps,
    }
}

/// Owns the previous snapshot and the collaborators of the poll loop
pub struct PresenceBridge {
    player: Box<dyn PlayerSource>,
    sink: Box<dyn PresenceSink>,
    settings: Box<dyn SettingsSource>,
    reporter: Box<dyn ErrorReporter>,
    previous: PlaybackSnapshot,
    state: BridgeState,
    poll_interval: Duration,
}

impl PresenceBridge {
    pub fn new(
        player: Box<dyn PlayerSource>,
        sink: Box<dyn PresenceSink>,
        settings: Box<dyn SettingsSource>,
        reporter: Box<dyn ErrorReporter>,
    ) -> Self {
        Self {
            player,
            sink,
            settings,
            reporter,
            previous: PlaybackSnapshot::default(),
            state: BridgeState::Idle,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn previous_snapshot(&self) -> &PlaybackSnapshot {
        &self.previous
    }

    /// Poll the player once and push, clear or skip.
    ///
    /// Only player errors are returned. Push failures are reported and swallowed.
    pub async fn on_tick(&mut self) -> Result<TickOutcome, PlayerError> {
        let (snapshot, duration_seconds) = match capture(self.player.as_ref()).await? {
            Capture::NoTrack => {
                if let Err(e) = self.sink.clear_presence().await {
                    tracing::warn!("Failed to clear {} presence: {}", self.sink.name(), e);
                }
                self.state = BridgeState::Idle;
                return Ok(TickOutcome::Cleared);
            }
            Capture::Track {
                snapshot,
                duration_seconds,
            } => (snapshot, duration_seconds),
        };

        if self.state == BridgeState::Active && !self.previous.has_changed(&snapshot) {
            return Ok(TickOutcome::Unchanged);
        }

        self.previous = snapshot;
        self.state = BridgeState::Active;

        let now = chrono::Utc::now().timestamp();
        let presence = build_presence(
            &self.previous,
            duration_seconds,
            self.settings.as_ref(),
            now,
        );

        tracing::debug!("Updating presence: {:?}", presence);

        match self.sink.update_presence(&presence).await {
            Ok(()) => {
                tracing::info!(
                    "Presence updated: {} / {}",
                    presence.top_line,
                    presence.bottom_line
                );
                Ok(TickOutcome::Updated(presence))
            }
            Err(error) => {
                self.reporter
                    .capture(&error, DiagnosticContext::new(&self.previous, &presence));
                Ok(TickOutcome::Failed)
            }
        }
    }

    /// Tick until `shutdown` resolves, then close the sink.
    ///
    /// The next tick is scheduled only after the previous one finished, so ticks
    /// never overlap.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            "Presence bridge started: {} -> {}, polling every {:?}",
            self.player.name(),
            self.sink.name(),
            self.poll_interval
        );

        loop {
            match self.on_tick().await {
                Ok(outcome) => tracing::debug!("Tick finished: {:?}", outcome),
                Err(e) => tracing::warn!("Failed to read {} state: {}", self.player.name(), e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => break,
            }
        }

        self.shutdown().await;
    }

    /// Tear down the sink. Consumes the bridge so no tick can follow.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down presence bridge");
        self.sink.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{CurrentPlaylist, PlaylistKind, SpecialKind, Track};
    use crate::presence::PresenceError;
    use crate::settings::AppSettings;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Reading {
        track: Track,
        state: PlayerState,
        position: i64,
        playlist: Option<CurrentPlaylist>,
    }

    #[derive(Clone, Default)]
    struct FakePlayer {
        reading: Arc<Mutex<Option<Reading>>>,
        unreachable: Arc<AtomicBool>,
    }

    impl FakePlayer {
        fn set(&self, reading: Option<Reading>) {
            *self.reading.lock().unwrap() = reading;
        }

        fn update(&self, f: impl FnOnce(&mut Reading)) {
            f(self.reading.lock().unwrap().as_mut().unwrap());
        }

        fn current(&self) -> Result<Option<Reading>, PlayerError> {
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(PlayerError::NoPlayer);
            }
            Ok(self.reading.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl PlayerSource for FakePlayer {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn current_track(&self) -> Result<Option<Track>, PlayerError> {
            Ok(self.current()?.map(|r| r.track))
        }

        async fn player_state(&self) -> Result<PlayerState, PlayerError> {
            Ok(self.current()?.map(|r| r.state).unwrap_or_default())
        }

        async fn player_position(&self) -> Result<i64, PlayerError> {
            Ok(self.current()?.map(|r| r.position).unwrap_or_default())
        }

        async fn current_playlist(&self) -> Result<Option<CurrentPlaylist>, PlayerError> {
            Ok(self.current()?.and_then(|r| r.playlist))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum SinkCall {
        Update(RichPresence),
        Clear,
        Shutdown,
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        calls: Arc<Mutex<Vec<SinkCall>>>,
        failing: Arc<AtomicBool>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }

        fn take_calls(&self) -> Vec<SinkCall> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    #[async_trait]
    impl PresenceSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn update_presence(&self, presence: &RichPresence) -> Result<(), PresenceError> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Update(presence.clone()));
            if self.failing.load(Ordering::SeqCst) {
                return Err(PresenceError::Rejected("test".to_string()));
            }
            Ok(())
        }

        async fn clear_presence(&self) -> Result<(), PresenceError> {
            self.calls.lock().unwrap().push(SinkCall::Clear);
            Ok(())
        }

        async fn shutdown(&self) {
            self.calls.lock().unwrap().push(SinkCall::Shutdown);
        }
    }

    #[derive(Clone, Default)]
    struct RecordingReporter {
        reports: Arc<Mutex<Vec<(String, DiagnosticContext)>>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn capture(&self, error: &PresenceError, context: DiagnosticContext) {
            self.reports
                .lock()
                .unwrap()
                .push((error.to_string(), context));
        }
    }

    fn track_reading() -> Reading {
        Reading {
            track: Track {
                artist: "Boards of Canada".to_string(),
                title: "Roygbiv".to_string(),
                duration_seconds: 210,
            },
            state: PlayerState::Playing,
            position: 30,
            playlist: Some(CurrentPlaylist {
                name: "Music Has the Right to Children".to_string(),
                kind: PlaylistKind::Library,
            }),
        }
    }

    fn settings() -> AppSettings {
        AppSettings {
            playing_top_line: "%track".to_string(),
            playing_bottom_line: "%artist".to_string(),
            paused_top_line: "Paused: %track".to_string(),
            paused_bottom_line: "%playlist_name (%playlist_type)".to_string(),
            display_playback_duration: true,
            ..Default::default()
        }
    }

    struct Harness {
        player: FakePlayer,
        sink: RecordingSink,
        reporter: RecordingReporter,
        bridge: PresenceBridge,
    }

    fn harness_with(settings: AppSettings) -> Harness {
        let player = FakePlayer::default();
        let sink = RecordingSink::default();
        let reporter = RecordingReporter::default();
        let bridge = PresenceBridge::new(
            Box::new(player.clone()),
            Box::new(sink.clone()),
            Box::new(settings),
            Box::new(reporter.clone()),
        );
        Harness {
            player,
            sink,
            reporter,
            bridge,
        }
    }

    fn harness() -> Harness {
        harness_with(settings())
    }

    #[tokio::test]
    async fn test_playing_track_pushes_rendered_presence() {
        let mut h = harness();
        h.player.set(Some(track_reading()));

        let before = chrono::Utc::now().timestamp();
        let outcome = h.bridge.on_tick().await.unwrap();
        let after = chrono::Utc::now().timestamp();

        let TickOutcome::Updated(presence) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(presence.top_line, "Roygbiv");
        assert_eq!(presence.bottom_line, "Boards of Canada");

        let start = presence.start_timestamp().unwrap();
        let end = presence.end_timestamp().unwrap();
        assert!((before - 30..=after - 30).contains(&start));
        assert!((before + 180..=after + 180).contains(&end));
        assert_eq!(end - start, 210);

        assert_eq!(h.sink.calls(), vec![SinkCall::Update(presence)]);
        assert_eq!(h.bridge.state(), BridgeState::Active);
    }

    #[test]
    fn test_build_presence_timestamps() {
        let snapshot = PlaybackSnapshot {
            artist: "A".to_string(),
            title: "T".to_string(),
            player_state: PlayerState::Playing,
            position_seconds: 30,
            ..Default::default()
        };

        let presence = build_presence(&snapshot, 210, &settings(), 1_000_000);
        assert_eq!(
            presence.timestamps,
            Some(PresenceTimestamps {
                start: 999_970,
                end: 1_000_180,
            })
        );
    }

    #[test]
    fn test_build_presence_without_duration_display() {
        let snapshot = PlaybackSnapshot {
            player_state: PlayerState::Playing,
            ..Default::default()
        };
        let settings = AppSettings {
            display_playback_duration: false,
            ..settings()
        };

        let presence = build_presence(&snapshot, 210, &settings, 1_000_000);
        assert_eq!(presence.timestamps, None);
    }

    #[test]
    fn test_build_presence_uses_paused_templates_unless_playing() {
        for state in [
            PlayerState::Paused,
            PlayerState::Stopped,
            PlayerState::FastForward,
            PlayerState::Rewind,
        ] {
            let snapshot = PlaybackSnapshot {
                title: "Roygbiv".to_string(),
                playlist_name: "Mix".to_string(),
                playlist_kind: PlaylistKind::User {
                    special_kind: SpecialKind::None,
                },
                player_state: state,
                ..Default::default()
            };

            let presence = build_presence(&snapshot, 210, &settings(), 1_000_000);
            assert_eq!(presence.top_line, "Paused: Roygbiv", "{:?}", state);
            assert_eq!(presence.bottom_line, "Mix (Playlist)", "{:?}", state);
            assert_eq!(presence.timestamps, None, "{:?}", state);
        }
    }

    #[test]
    fn test_build_presence_truncates_lines() {
        let snapshot = PlaybackSnapshot {
            title: "Long ".repeat(40),
            player_state: PlayerState::Playing,
            ..Default::default()
        };

        let presence = build_presence(&snapshot, 0, &settings(), 0);
        assert!(presence.top_line.ends_with("..."));
        assert!(crate::presence::byte_count(&presence.top_line) <= 127);
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_is_not_pushed_again() {
        let mut h = harness();
        h.player.set(Some(track_reading()));

        h.bridge.on_tick().await.unwrap();
        h.sink.take_calls();

        assert_eq!(h.bridge.on_tick().await.unwrap(), TickOutcome::Unchanged);
        assert!(h.sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_position_drift_counts_as_change() {
        let mut h = harness();
        h.player.set(Some(track_reading()));
        h.bridge.on_tick().await.unwrap();

        h.player.update(|r| r.position += 1);
        assert!(matches!(
            h.bridge.on_tick().await.unwrap(),
            TickOutcome::Updated(_)
        ));
        assert_eq!(h.bridge.previous_snapshot().position_seconds, 31);
    }

    #[tokio::test]
    async fn test_no_track_after_presence_clears_once() {
        let mut h = harness();
        h.player.set(Some(track_reading()));
        h.bridge.on_tick().await.unwrap();
        h.sink.take_calls();

        h.player.set(None);
        assert_eq!(h.bridge.on_tick().await.unwrap(), TickOutcome::Cleared);
        assert_eq!(h.sink.calls(), vec![SinkCall::Clear]);
        assert_eq!(h.bridge.state(), BridgeState::Idle);
    }

    #[tokio::test]
    async fn test_repeated_no_track_only_clears() {
        let mut h = harness();

        for _ in 0..3 {
            assert_eq!(h.bridge.on_tick().await.unwrap(), TickOutcome::Cleared);
        }
        assert_eq!(h.sink.calls(), vec![SinkCall::Clear; 3]);
    }

    #[tokio::test]
    async fn test_same_track_after_idle_is_pushed_again() {
        let mut h = harness();
        h.player.set(Some(track_reading()));
        h.bridge.on_tick().await.unwrap();

        h.player.set(None);
        h.bridge.on_tick().await.unwrap();

        h.player.set(Some(track_reading()));
        h.sink.take_calls();

        assert!(matches!(
            h.bridge.on_tick().await.unwrap(),
            TickOutcome::Updated(_)
        ));
        assert_eq!(h.sink.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_push_failure_is_reported_with_context() {
        let mut h = harness();
        h.sink.failing.store(true, Ordering::SeqCst);
        h.player.set(Some(track_reading()));

        assert_eq!(h.bridge.on_tick().await.unwrap(), TickOutcome::Failed);

        let reports = h.reporter.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 1);

        let (message, context) = &reports[0];
        assert_eq!(message, "Presence update rejected: test");
        assert_eq!(context.current_artist, "Boards of Canada");
        assert_eq!(context.current_title, "Roygbiv");
        assert_eq!(context.current_state, "Playing");
        assert_eq!(context.current_playlist, "Music Has the Right to Children");
        assert_eq!(context.current_playlist_type, "Library");
        assert_eq!(context.current_position, 30);
        assert_eq!(context.details, "Roygbiv");
        assert_eq!(context.state, "Boards of Canada");

        // The next change goes out once the sink recovers
        h.sink.failing.store(false, Ordering::SeqCst);
        h.player.update(|r| r.position = 45);
        assert!(matches!(
            h.bridge.on_tick().await.unwrap(),
            TickOutcome::Updated(_)
        ));
    }

    #[tokio::test]
    async fn test_player_errors_propagate_from_tick() {
        let mut h = harness();
        h.player.unreachable.store(true, Ordering::SeqCst);

        assert!(matches!(
            h.bridge.on_tick().await,
            Err(PlayerError::NoPlayer)
        ));
        assert!(h.sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_ticks_until_shutdown_then_closes_sink() {
        let h = harness();
        h.player.set(Some(track_reading()));
        h.player.unreachable.store(true, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let bridge = h.bridge.with_poll_interval(Duration::from_millis(5));
        let task = tokio::spawn(bridge.run(async {
            shutdown_rx.await.ok();
        }));

        // Player errors must not stop the loop
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.player.unreachable.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();

        let calls = h.sink.calls();
        assert!(matches!(calls.first(), Some(SinkCall::Update(_))));
        assert_eq!(calls.last(), Some(&SinkCall::Shutdown));
        assert_eq!(
            calls.iter().filter(|c| **c == SinkCall::Shutdown).count(),
            1
        );
    }
}
