use crate::bindings::{BindingEvent, KeyLayout};
use crate::track::Track;

/// Controls for one visible-window computation. The silhouette view of the
/// original track turns grid and bindings off and only carries notes.
#[derive(Debug, Clone, Copy)]
pub struct WindowOptions<'a> {
    pub behind_sec: f64,
    pub ahead_sec: f64,
    pub grid: bool,
    pub bindings: Option<&'a KeyLayout>,
}

impl<'a> WindowOptions<'a> {
    pub fn silhouette(behind_sec: f64, ahead_sec: f64) -> Self {
        Self {
            behind_sec,
            ahead_sec,
            grid: false,
            bindings: None,
        }
    }
}

/// Snapshot of everything intersecting the visible time range. Recomputed
/// from scratch every tick; holds indices into the source track's note list.
#[derive(Debug, Clone, Default)]
pub struct VisibleWindow {
    pub start_us: i64,
    pub span_us: i64,
    /// Offset of the playback position inside the window, for the now marker.
    pub now_offset_us: i64,
    pub notes: Vec<usize>,
    pub bar_lines: Vec<i64>,
    pub beat_lines: Vec<i64>,
    pub bindings: Vec<BindingEvent>,
}

impl VisibleWindow {
    pub fn end_us(&self) -> i64 {
        self.start_us + self.span_us
    }
}

pub fn compute_visible(track: &Track, position_us: i64, opts: &WindowOptions) -> VisibleWindow {
    let start_us = position_us - (opts.behind_sec * 1e6) as i64;
    let span_us = ((opts.behind_sec + opts.ahead_sec) * 1e6) as i64;
    let end_us = start_us + span_us;

    let mut window = VisibleWindow {
        start_us,
        span_us,
        now_offset_us: position_us - start_us,
        ..Default::default()
    };

    for (idx, note) in track.notes.iter().enumerate() {
        if note.start_us <= end_us && note.end_us >= start_us {
            window.notes.push(idx);
        }
    }

    if opts.grid {
        collect_grid_lines(track, start_us, end_us, &mut window);
    }

    if let Some(layout) = opts.bindings {
        collect_binding_events(track, layout, position_us, end_us, &mut window);
    }

    window
}

/// Walks the musical grid segment by segment, emitting one instant per beat
/// and one per bar, for the part of the grid inside `[start_us, end_us]`.
fn collect_grid_lines(track: &Track, start_us: i64, end_us: i64, window: &mut VisibleWindow) {
    let tempo = &track.tempo;
    let beats_per_bar = tempo.time_signature.beats_per_bar() as u64;
    let segments = tempo.segments();

    let mut beat: u64 = 0;
    let mut us = 0.0f64;
    let mut seg_idx = 0;

    while (us as i64) <= end_us {
        while seg_idx + 1 < segments.len() && segments[seg_idx + 1].start_us as f64 <= us {
            seg_idx += 1;
        }
        let instant = us as i64;
        if instant >= start_us {
            if beat % beats_per_bar == 0 {
                window.bar_lines.push(instant);
            } else {
                window.beat_lines.push(instant);
            }
        }
        us += segments[seg_idx].us_per_beat;
        beat += 1;
    }
}

/// Upcoming key presses inside the window, ordered by start time. Press
/// index 0 is the next lane event at or after the playback position.
fn collect_binding_events(
    track: &Track,
    layout: &KeyLayout,
    position_us: i64,
    end_us: i64,
    window: &mut VisibleWindow,
) {
    let mut upcoming: Vec<(i64, usize, usize)> = Vec::new();
    for (idx, note) in track.notes.iter().enumerate() {
        if note.start_us < position_us || note.start_us > end_us {
            continue;
        }
        if let Some(lane) = layout.lane_for_pitch(note.pitch) {
            upcoming.push((note.start_us, idx, lane));
        }
    }
    upcoming.sort_by_key(|&(start, idx, _)| (start, idx));

    window.bindings = upcoming
        .into_iter()
        .enumerate()
        .map(|(press, (_, note_idx, lane))| BindingEvent {
            note_idx,
            lane,
            press_idx: press as u32,
        })
        .collect();
}
