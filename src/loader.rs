use std::path::Path;
use std::sync::Arc;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;
use tracing::info;

use crate::track::{Note, TempoMap, TempoSegment, TimeSignature, Track};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed MIDI file: {0}")]
    Parse(#[from] midly::Error),
    #[error("file contains no playable notes")]
    NoNotes,
}

/// A parsed performance file: one track per SMF track that carries notes,
/// all sharing a single tempo map.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub tracks: Vec<Track>,
    pub tempo: Arc<TempoMap>,
}

pub fn load(path: &Path) -> Result<LoadedFile, LoaderError> {
    let bytes = std::fs::read(path)?;
    let loaded = parse_bytes(&bytes)?;
    info!(
        path = %path.display(),
        tracks = loaded.tracks.len(),
        bpm = loaded.tempo.source_bpm(),
        "loaded MIDI file"
    );
    Ok(loaded)
}

pub fn parse_bytes(bytes: &[u8]) -> Result<LoadedFile, LoaderError> {
    let smf = Smf::parse(bytes)?;
    build(&smf)
}

/// Piecewise-constant tick clock derived from the file's tempo meta events.
struct TickClock {
    /// (start_tick, start_us, us_per_tick), ordered by tick.
    segments: Vec<(u64, f64, f64)>,
}

impl TickClock {
    fn us_at(&self, tick: u64) -> i64 {
        let mut current = &self.segments[0];
        for seg in &self.segments {
            if seg.0 > tick {
                break;
            }
            current = seg;
        }
        (current.1 + (tick - current.0) as f64 * current.2) as i64
    }
}

fn build(smf: &Smf) -> Result<LoadedFile, LoaderError> {
    let (clock, tempo) = build_clocks(smf);
    let tempo = Arc::new(tempo);

    let mut tracks = Vec::new();
    for (index, events) in smf.tracks.iter().enumerate() {
        let mut name: Option<String> = None;
        let mut notes: Vec<Note> = Vec::new();
        // Pitch -> stack of sounding (start_tick, velocity); MIDI allows
        // overlapping note-ons of the same pitch.
        let mut sounding: Vec<Vec<(u64, u8)>> = vec![Vec::new(); 128];
        let mut tick: u64 = 0;

        for event in events {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        sounding[key.as_int() as usize].push((tick, vel.as_int()));
                    }
                    // Velocity-zero note-on is a running-status note-off.
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some((start_tick, vel)) = sounding[key.as_int() as usize].pop() {
                            notes.push(Note::new(
                                key.as_int(),
                                vel,
                                clock.us_at(start_tick),
                                clock.us_at(tick),
                            ));
                        }
                    }
                    _ => {}
                },
                TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                    let text = String::from_utf8_lossy(raw).trim().to_string();
                    if !text.is_empty() {
                        name = Some(text);
                    }
                }
                _ => {}
            }
        }

        // Close anything left sounding at end of track.
        for (pitch, stack) in sounding.iter_mut().enumerate() {
            for (start_tick, vel) in stack.drain(..) {
                notes.push(Note::new(
                    pitch as u8,
                    vel,
                    clock.us_at(start_tick),
                    clock.us_at(tick),
                ));
            }
        }

        if notes.is_empty() {
            continue;
        }
        let name = name.unwrap_or_else(|| format!("Track {}", index + 1));
        tracks.push(Track::new(name, notes, tempo.clone()));
    }

    if tracks.is_empty() {
        return Err(LoaderError::NoNotes);
    }
    Ok(LoadedFile { tracks, tempo })
}

/// Builds the tick→µs clock and the beat-domain tempo map from the file
/// header and the tempo/time-signature meta events of all tracks.
fn build_clocks(smf: &Smf) -> (TickClock, TempoMap) {
    let mut time_signature = TimeSignature::default();
    // (abs_tick, us_per_quarter)
    let mut tempo_events: Vec<(u64, f64)> = Vec::new();

    for events in &smf.tracks {
        let mut tick: u64 = 0;
        for event in events {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    tempo_events.push((tick, f64::from(us_per_quarter.as_int())));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow2, _, _)) => {
                    time_signature = TimeSignature {
                        numerator: num,
                        denominator: 1u8 << denom_pow2.min(6),
                    };
                }
                _ => {}
            }
        }
    }
    tempo_events.sort_by_key(|&(tick, _)| tick);

    match smf.header.timing {
        Timing::Metrical(ticks_per_quarter) => {
            let tpq = f64::from(ticks_per_quarter.as_int());
            let mut segments = vec![(0u64, 0.0f64, 500_000.0 / tpq)];
            for (tick, us_per_quarter) in tempo_events {
                let last = *segments.last().unwrap();
                let start_us = last.1 + (tick - last.0) as f64 * last.2;
                if tick == last.0 {
                    segments.pop();
                }
                segments.push((tick, start_us, us_per_quarter / tpq));
            }
            let tempo_segments = segments
                .iter()
                .map(|&(_, start_us, us_per_tick)| TempoSegment {
                    start_us: start_us as i64,
                    us_per_beat: us_per_tick * tpq,
                })
                .collect();
            (
                TickClock { segments },
                TempoMap::from_segments(time_signature, tempo_segments),
            )
        }
        Timing::Timecode(fps, subframe) => {
            // SMPTE timing carries no musical tempo; the grid falls back to
            // a nominal 120 BPM.
            let us_per_tick = 1_000_000.0 / (f64::from(fps.as_f32()) * f64::from(subframe));
            (
                TickClock {
                    segments: vec![(0, 0.0, us_per_tick)],
                },
                TempoMap::with_bpm(120.0, time_signature),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u4, u7, u15, u24, u28};
    use midly::{Format, Header, TrackEvent};

    fn midi(delta: u32, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message,
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        midi(
            delta,
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        )
    }

    fn off(delta: u32, key: u8) -> TrackEvent<'static> {
        midi(
            delta,
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        )
    }

    fn smf_with(tracks: Vec<Vec<TrackEvent<'static>>>) -> Smf<'static> {
        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(480)),
        ));
        smf.tracks = tracks;
        smf
    }

    #[test]
    fn notes_are_paired_and_converted_to_us() {
        // 120 BPM default: 480 ticks = one quarter = 500 ms.
        let smf = smf_with(vec![vec![on(0, 60, 100), off(480, 60)]]);
        let loaded = build(&smf).unwrap();
        assert_eq!(loaded.tracks.len(), 1);
        let note = loaded.tracks[0].notes[0];
        assert_eq!(note.pitch, 60);
        assert_eq!(note.start_us, 0);
        assert_eq!(note.end_us, 500_000);
    }

    #[test]
    fn velocity_zero_note_on_acts_as_note_off() {
        let smf = smf_with(vec![vec![on(0, 62, 90), on(240, 62, 0)]]);
        let loaded = build(&smf).unwrap();
        let note = loaded.tracks[0].notes[0];
        assert_eq!(note.end_us, 250_000);
    }

    #[test]
    fn tempo_change_shifts_later_notes() {
        let smf = smf_with(vec![vec![
            meta(0, MetaMessage::Tempo(u24::new(500_000))),
            on(0, 60, 100),
            off(480, 60),
            // Halve the tempo after one beat, next beat takes a full second.
            meta(0, MetaMessage::Tempo(u24::new(1_000_000))),
            on(0, 64, 100),
            off(480, 64),
        ]]);
        let loaded = build(&smf).unwrap();
        let notes = &loaded.tracks[0].notes;
        assert_eq!(notes[0].end_us, 500_000);
        assert_eq!(notes[1].start_us, 500_000);
        assert_eq!(notes[1].end_us, 1_500_000);
        assert_eq!(loaded.tempo.segments().len(), 2);
        assert_eq!(loaded.tempo.us_per_beat_at(600_000), 1_000_000.0);
    }

    #[test]
    fn track_names_and_defaults() {
        let smf = smf_with(vec![
            vec![
                meta(0, MetaMessage::TrackName(b"Lead")),
                on(0, 60, 100),
                off(480, 60),
            ],
            vec![on(0, 40, 100), off(480, 40)],
        ]);
        let loaded = build(&smf).unwrap();
        assert_eq!(loaded.tracks[0].name, "Lead");
        assert_eq!(loaded.tracks[1].name, "Track 2");
    }

    #[test]
    fn unterminated_notes_close_at_track_end() {
        let smf = smf_with(vec![vec![on(0, 60, 100), on(480, 64, 100), off(480, 64)]]);
        let loaded = build(&smf).unwrap();
        let notes = &loaded.tracks[0].notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].end_us, 1_000_000);
    }

    #[test]
    fn files_without_notes_are_rejected() {
        let smf = smf_with(vec![vec![meta(0, MetaMessage::Tempo(u24::new(500_000)))]]);
        assert!(matches!(build(&smf), Err(LoaderError::NoNotes)));
    }
}
