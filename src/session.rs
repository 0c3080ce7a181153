use std::time::Instant;

use tracing::{info, warn};

use crate::audio::Player;
use crate::bindings::KeyLayout;
use crate::config::AppConfig;
use crate::correlate::correlate;
use crate::timing::{PlaybackClock, VisibleWindow, WindowOptions, compute_visible};
use crate::track::{Note, Track, clamp_bpm};
use crate::transform::{self, TransformStats};

/// Everything one previewed track needs, passed explicitly to each tick and
/// render call instead of living in globals. Created when a track is
/// selected, replaced wholesale on the next selection.
pub struct Session {
    pub original: Track,
    pub processed: Track,
    pub transform_stats: TransformStats,
    pub layout: KeyLayout,
    pub clock: PlaybackClock,
    /// Tempo target shown and edited in the UI.
    pub target_bpm: f64,
    behind_sec: f64,
    ahead_sec: f64,
    player: Player,
    last_tick: Option<Instant>,
    /// Window over the processed track: notes, grid and binding events.
    pub roll: VisibleWindow,
    /// Grid-less, binding-less window over the original track.
    pub silhouette: VisibleWindow,
}

impl Session {
    pub fn new(original: Track, config: &AppConfig) -> Self {
        let (processed, transform_stats) =
            transform::process(&original, &config.transform, &config.layout);
        let player = Player::new();
        player.set_notes(processed.notes.clone());

        let mut session = Self {
            target_bpm: original.tempo.source_bpm(),
            original,
            processed,
            transform_stats,
            layout: config.layout.clone(),
            clock: PlaybackClock::new(),
            behind_sec: config.behind_sec,
            ahead_sec: config.ahead_sec,
            player,
            last_tick: None,
            roll: VisibleWindow::default(),
            silhouette: VisibleWindow::default(),
        };
        session.recompute_windows();
        session
    }

    pub fn source_bpm(&self) -> f64 {
        self.original.tempo.source_bpm()
    }

    pub fn duration_us(&self) -> i64 {
        self.processed
            .stats
            .duration_us
            .max(self.original.stats.duration_us)
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    /// One cooperative tick: advance the clock (the player's report wins
    /// while it is running), fire the one-shot player start, then rebuild
    /// both visible windows.
    pub fn tick(&mut self, now: Instant) {
        let elapsed_ms = self
            .last_tick
            .map(|last| now.duration_since(last).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        let report = self
            .player
            .is_playing()
            .then(|| self.player.reported_position_us());
        let start_player = self.clock.advance(elapsed_ms, report);

        if start_player {
            self.start_player();
        }

        self.recompute_windows();
    }

    /// The start signal arrives on the tick where the count-in crosses zero,
    /// so audio begins at most one tick after the visual downbeat.
    fn start_player(&mut self) {
        let from_us = self.clock.position_us();
        let started = self
            .player
            .warmup_device()
            .and_then(|_| self.player.start(from_us));
        match started {
            Ok(()) => info!(from_us, "player started"),
            Err(err) => {
                warn!(%err, "player unavailable, continuing visual-only");
                self.clock.on_player_unavailable();
            }
        }
    }

    pub fn play(&mut self) {
        if self.clock.is_playing() {
            return;
        }
        // Acquire the device during the count-in; failure is not fatal.
        if let Err(err) = self.player.warmup_device() {
            warn!(%err, "audio warmup failed, preview will be silent");
        }
        self.clock
            .set_tempo_bpm(self.target_bpm, self.source_bpm());
        self.player.set_tempo_scale(self.clock.tempo_scale());
        self.clock.begin_playback(&self.processed.tempo);
        info!(bpm = self.target_bpm, "playback started");
    }

    pub fn stop(&mut self) {
        self.player.stop();
        self.clock.stop();
        self.recompute_windows();
    }

    pub fn set_tempo_bpm(&mut self, bpm: f64) {
        self.target_bpm = clamp_bpm(bpm);
        self.clock.set_tempo_bpm(self.target_bpm, self.source_bpm());
        self.player.set_tempo_scale(self.clock.tempo_scale());
    }

    /// Absolute scrub by fraction of the track; ignored while playing.
    pub fn seek_fraction(&mut self, fraction: f64) -> bool {
        let moved = self.clock.seek_fraction(fraction, self.duration_us());
        if moved {
            self.recompute_windows();
        }
        moved
    }

    /// Original-track counterpart of a processed note, for the hover hint.
    pub fn hover_origin(&self, processed_idx: usize) -> Option<&Note> {
        let processed = self.processed.notes.get(processed_idx)?;
        correlate(processed, &self.original.notes)
    }

    fn recompute_windows(&mut self) {
        let position = self.clock.position_us();
        let roll = compute_visible(
            &self.processed,
            position,
            &WindowOptions {
                behind_sec: self.behind_sec,
                ahead_sec: self.ahead_sec,
                grid: true,
                bindings: Some(&self.layout),
            },
        );
        let silhouette = compute_visible(
            &self.original,
            position,
            &WindowOptions::silhouette(self.behind_sec, self.ahead_sec),
        );
        self.roll = roll;
        self.silhouette = silhouette;
    }
}
