use crate::track::{TempoMap, clamp_bpm};

/// Beats of count-in before the logical start of the track.
const COUNT_IN_BEATS: f64 = 2.0;

/// Playback position clock with two advance strategies: wall-clock
/// extrapolation scaled by tempo, or an authoritative report from the audio
/// player. The strategy switches only at player start/stop, never mid-tick.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    position_us: i64,
    tempo_scale: f64,
    playing: bool,
    player_driven: bool,
    start_signaled: bool,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            position_us: 0,
            tempo_scale: 1.0,
            playing: false,
            player_driven: false,
            start_signaled: false,
        }
    }

    pub fn position_us(&self) -> i64 {
        self.position_us
    }

    pub fn tempo_scale(&self) -> f64 {
        self.tempo_scale
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_player_driven(&self) -> bool {
        self.player_driven
    }

    /// Enters playback with a fresh count-in: the position is wound back by
    /// two beats so the first beat of the track lands at position 0.
    pub fn begin_playback(&mut self, tempo: &TempoMap) {
        self.position_us = -tempo.beats_to_us(COUNT_IN_BEATS);
        self.playing = true;
        self.player_driven = false;
        self.start_signaled = false;
    }

    /// Advances the clock by one tick. Returns true exactly once per
    /// playback, on the tick where the position crosses from the count-in
    /// into the track proper; the caller must start the player then.
    ///
    /// While the clock is player-driven, only the player's report moves the
    /// position; wall-clock error cannot accumulate during active playback.
    pub fn advance(&mut self, elapsed_ms: f64, player_report_us: Option<i64>) -> bool {
        if !self.playing {
            return false;
        }

        if self.player_driven {
            if let Some(report) = player_report_us {
                self.position_us = report;
            }
            return false;
        }

        self.position_us += (elapsed_ms * self.tempo_scale * 1000.0) as i64;

        if self.position_us >= 0 && !self.start_signaled {
            self.start_signaled = true;
            self.player_driven = true;
            return true;
        }
        false
    }

    /// Called when the player could not be started; the clock falls back to
    /// wall-clock extrapolation so playback continues visually.
    pub fn on_player_unavailable(&mut self) {
        self.player_driven = false;
    }

    /// Tempo is expressed as a target BPM against the track's source BPM.
    /// The target is clamped to the resolvable range; changing it never
    /// jumps the position.
    pub fn set_tempo_bpm(&mut self, bpm_target: f64, source_bpm: f64) {
        self.tempo_scale = clamp_bpm(bpm_target) / source_bpm;
    }

    /// Halts advancement. The position is retained so the display holds
    /// still; the next `begin_playback` computes a fresh count-in.
    pub fn stop(&mut self) {
        self.playing = false;
        self.player_driven = false;
    }

    /// Absolute scrub. Rejected while playing; otherwise the fraction is
    /// clamped so the position always lands inside `[0, duration_us]`.
    pub fn seek_fraction(&mut self, fraction: f64, duration_us: i64) -> bool {
        if self.playing {
            return false;
        }
        let target = (fraction * duration_us as f64) as i64;
        self.position_us = target.clamp(0, duration_us);
        true
    }
}
