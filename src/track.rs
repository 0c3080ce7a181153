use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// BPM range the tempo map can resolve. Targets outside are clamped,
/// never rejected.
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 400.0;

pub fn clamp_bpm(bpm: f64) -> f64 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    pub fn beats_per_bar(&self) -> u32 {
        self.numerator.max(1) as u32
    }
}

/// One stretch of constant tempo. Segments are ordered by `start_us` and the
/// first one always starts at 0.
#[derive(Debug, Clone, Copy)]
pub struct TempoSegment {
    pub start_us: i64,
    pub us_per_beat: f64,
}

#[derive(Debug, Clone)]
pub struct TempoMap {
    pub time_signature: TimeSignature,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    pub fn from_segments(time_signature: TimeSignature, mut segments: Vec<TempoSegment>) -> Self {
        if segments.is_empty() {
            segments.push(TempoSegment {
                start_us: 0,
                us_per_beat: 60_000_000.0 / 120.0,
            });
        }
        segments.sort_by_key(|s| s.start_us);
        segments[0].start_us = 0;
        Self {
            time_signature,
            segments,
        }
    }

    pub fn with_bpm(bpm: f64, time_signature: TimeSignature) -> Self {
        let bpm = clamp_bpm(bpm);
        Self::from_segments(
            time_signature,
            vec![TempoSegment {
                start_us: 0,
                us_per_beat: 60_000_000.0 / bpm,
            }],
        )
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    /// BPM of the first segment, shown in the UI and used as the baseline for
    /// the tempo-scale ratio.
    pub fn source_bpm(&self) -> f64 {
        60_000_000.0 / self.segments[0].us_per_beat
    }

    pub fn us_per_beat_at(&self, us: i64) -> f64 {
        let mut current = self.segments[0].us_per_beat;
        for seg in &self.segments {
            if seg.start_us > us {
                break;
            }
            current = seg.us_per_beat;
        }
        current
    }

    /// Converts a beat count from the start of the track into microseconds,
    /// walking tempo segments in order.
    pub fn beats_to_us(&self, beats: f64) -> i64 {
        let mut remaining = beats;
        let mut us = 0.0f64;
        for (i, seg) in self.segments.iter().enumerate() {
            let span_us = match self.segments.get(i + 1) {
                Some(next) => (next.start_us - seg.start_us) as f64,
                None => return (us + remaining * seg.us_per_beat) as i64,
            };
            let span_beats = span_us / seg.us_per_beat;
            if remaining <= span_beats {
                return (us + remaining * seg.us_per_beat) as i64;
            }
            remaining -= span_beats;
            us += span_us;
        }
        us as i64
    }
}

/// How the transform pipeline altered a note, kept for the hover hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteOrigin {
    /// Whole octaves the pitch was shifted to land in the playable range.
    pub octave_shift: i8,
    /// Microseconds added to reach the minimum duration.
    pub extended_us: i64,
    /// True for notes with no counterpart in the original track.
    pub inserted: bool,
}

impl NoteOrigin {
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.octave_shift != 0 {
            parts.push(format!("shifted {:+} octave(s)", self.octave_shift));
        }
        if self.extended_us > 0 {
            parts.push(format!("extended by {} ms", self.extended_us / 1000));
        }
        if self.inserted {
            parts.push("inserted".to_string());
        }
        if parts.is_empty() {
            parts.push("unchanged".to_string());
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub start_us: i64,
    pub end_us: i64,
    pub origin: NoteOrigin,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, start_us: i64, end_us: i64) -> Self {
        Self {
            pitch,
            velocity,
            start_us,
            end_us,
            origin: NoteOrigin::default(),
        }
    }

    pub fn octave(&self) -> i32 {
        (self.pitch / 12) as i32
    }

    pub fn duration_us(&self) -> i64 {
        self.end_us - self.start_us
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackStats {
    pub note_count: usize,
    pub min_pitch: u8,
    pub max_pitch: u8,
    pub duration_us: i64,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub notes: Vec<Note>,
    pub tempo: Arc<TempoMap>,
    pub stats: TrackStats,
}

impl Track {
    pub fn new(name: String, mut notes: Vec<Note>, tempo: Arc<TempoMap>) -> Self {
        notes.sort_by_key(|n| (n.start_us, n.pitch));
        let stats = compute_stats(&notes);
        Self {
            name,
            notes,
            tempo,
            stats,
        }
    }
}

fn compute_stats(notes: &[Note]) -> TrackStats {
    let mut stats = TrackStats {
        note_count: notes.len(),
        min_pitch: u8::MAX,
        max_pitch: 0,
        duration_us: 0,
    };
    for note in notes {
        stats.min_pitch = stats.min_pitch.min(note.pitch);
        stats.max_pitch = stats.max_pitch.max(note.pitch);
        stats.duration_us = stats.duration_us.max(note.end_us);
    }
    if notes.is_empty() {
        stats.min_pitch = 0;
    }
    stats
}
