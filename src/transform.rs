use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bindings::KeyLayout;
use crate::track::{Note, Track};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Notes shorter than this are stretched to it.
    pub min_duration_us: i64,
    /// Notes below this pitch are discarded outright.
    pub highpass_cutoff_pitch: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            min_duration_us: 80_000,
            highpass_cutoff_pitch: 36,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub kept: usize,
    pub shifted: usize,
    pub extended: usize,
    pub dropped_low: usize,
    pub dropped_unmappable: usize,
}

/// Runs the selected track through the preview pipeline: high-pass filter,
/// octave validation against the binding layout, minimum-duration stretch.
/// The processed track shares the original's tempo map and carries per-note
/// provenance for the hover hint.
pub fn process(track: &Track, config: &TransformConfig, layout: &KeyLayout) -> (Track, TransformStats) {
    let low = layout.min_pitch() as i32;
    let high = layout.max_pitch() as i32;
    let mut stats = TransformStats::default();
    let mut notes = Vec::with_capacity(track.notes.len());

    for original in &track.notes {
        if original.pitch < config.highpass_cutoff_pitch {
            stats.dropped_low += 1;
            continue;
        }

        let mut note = *original;
        let shift = octave_shift_into(note.pitch as i32, low, high);
        match shift {
            Some(octaves) => {
                if octaves != 0 {
                    note.pitch = (note.pitch as i32 + octaves as i32 * 12) as u8;
                    note.origin.octave_shift = octaves;
                    stats.shifted += 1;
                }
            }
            None => {
                stats.dropped_unmappable += 1;
                continue;
            }
        }

        if note.duration_us() < config.min_duration_us {
            note.origin.extended_us = config.min_duration_us - note.duration_us();
            note.end_us = note.start_us + config.min_duration_us;
            stats.extended += 1;
        }

        stats.kept += 1;
        notes.push(note);
    }

    info!(
        track = %track.name,
        kept = stats.kept,
        shifted = stats.shifted,
        dropped = stats.dropped_low + stats.dropped_unmappable,
        "transform pass complete"
    );

    let processed = Track::new(track.name.clone(), notes, track.tempo.clone());
    (processed, stats)
}

/// Whole-octave shift landing `pitch` inside `[low, high]`, or None when no
/// such shift exists (range narrower than an octave).
fn octave_shift_into(pitch: i32, low: i32, high: i32) -> Option<i8> {
    if pitch >= low && pitch <= high {
        return Some(0);
    }
    let mut shifted = pitch;
    let mut octaves: i8 = 0;
    while shifted < low {
        shifted += 12;
        octaves += 1;
    }
    while shifted > high {
        shifted -= 12;
        octaves -= 1;
    }
    if shifted >= low && shifted <= high {
        Some(octaves)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{TempoMap, TimeSignature};
    use std::sync::Arc;

    fn track(notes: Vec<Note>) -> Track {
        let tempo = Arc::new(TempoMap::with_bpm(120.0, TimeSignature::default()));
        Track::new("test".into(), notes, tempo)
    }

    #[test]
    fn low_notes_are_high_pass_filtered() {
        let input = track(vec![Note::new(20, 100, 0, 200_000), Note::new(60, 100, 0, 200_000)]);
        let (out, stats) = process(&input, &TransformConfig::default(), &KeyLayout::default());
        assert_eq!(out.notes.len(), 1);
        assert_eq!(out.notes[0].pitch, 60);
        assert_eq!(stats.dropped_low, 1);
    }

    #[test]
    fn out_of_range_pitches_shift_by_whole_octaves() {
        // Default layout spans 48..=83.
        let input = track(vec![Note::new(90, 100, 0, 200_000), Note::new(96, 100, 0, 200_000)]);
        let (out, stats) = process(&input, &TransformConfig::default(), &KeyLayout::default());
        // Notes re-sort by (start, pitch) after the shift.
        assert_eq!(out.notes[0].pitch, 72);
        assert_eq!(out.notes[0].origin.octave_shift, -2);
        assert_eq!(out.notes[1].pitch, 78);
        assert_eq!(out.notes[1].origin.octave_shift, -1);
        assert_eq!(stats.shifted, 2);
    }

    #[test]
    fn short_notes_are_stretched_to_minimum() {
        let input = track(vec![Note::new(60, 100, 0, 10_000)]);
        let config = TransformConfig {
            min_duration_us: 80_000,
            ..Default::default()
        };
        let (out, stats) = process(&input, &config, &KeyLayout::default());
        assert_eq!(out.notes[0].end_us, 80_000);
        assert_eq!(out.notes[0].origin.extended_us, 70_000);
        assert_eq!(stats.extended, 1);
    }

    #[test]
    fn unaltered_notes_keep_default_provenance() {
        let input = track(vec![Note::new(60, 100, 0, 500_000)]);
        let (out, _) = process(&input, &TransformConfig::default(), &KeyLayout::default());
        assert!(out.notes[0].origin.is_unchanged());
    }

    #[test]
    fn processed_track_shares_the_tempo_map() {
        let input = track(vec![Note::new(60, 100, 0, 500_000)]);
        let (out, _) = process(&input, &TransformConfig::default(), &KeyLayout::default());
        assert!(Arc::ptr_eq(&input.tempo, &out.tempo));
    }
}
