use egui::{Color32, Rect, pos2};

use crate::timing::VisibleWindow;
use crate::track::Note;

/// Pitch extent the roll maps onto the vertical axis.
#[derive(Debug, Clone, Copy)]
pub struct PitchRange {
    pub min: u8,
    pub max: u8,
}

impl PitchRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    fn span(&self) -> f32 {
        (self.max - self.min).max(1) as f32
    }
}

/// Projects a track-time instant onto the horizontal axis, clamped to the
/// surface so off-window times pin to the edges.
pub fn time_to_x(t_us: i64, window: &VisibleWindow, surface_width: f32) -> f32 {
    let alpha = (t_us - window.start_us) as f32 / window.span_us.max(1) as f32;
    alpha.clamp(0.0, 1.0) * surface_width
}

/// Vertical position of a pitch; higher pitch lands higher on screen.
pub fn pitch_to_y(pitch: u8, range: &PitchRange, surface_height: f32) -> f32 {
    let alpha = ((pitch as f32 - range.min as f32) / range.span()).clamp(0.0, 1.0);
    (1.0 - alpha) * surface_height
}

/// Pixel rectangle for one note. Start and end are projected independently;
/// a zero-width rectangle is a valid result for an instantaneous event.
pub fn map_note_to_rect(
    note: &Note,
    window: &VisibleWindow,
    range: &PitchRange,
    surface_width: f32,
    surface_height: f32,
) -> Rect {
    let x0 = time_to_x(note.start_us, window, surface_width);
    let x1 = time_to_x(note.end_us, window, surface_width);
    let row_height = surface_height / (range.span() + 1.0);
    let y_base = pitch_to_y(note.pitch, range, surface_height);
    Rect::from_min_max(
        pos2(x0, (y_base - row_height).max(0.0)),
        pos2(x1, y_base.min(surface_height)),
    )
}

/// How far a note sits from the binding layout's home octave. Drives color
/// only; purely a function of pitch distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

pub fn severity(octave: i32, reference_octave: i32) -> Severity {
    match (octave - reference_octave).abs() {
        0 | 1 => Severity::Normal,
        2 => Severity::Warning,
        _ => Severity::Critical,
    }
}

pub fn severity_color(severity: Severity) -> Color32 {
    match severity {
        Severity::Normal => Color32::from_rgb(110, 190, 255),
        Severity::Warning => Color32::from_rgb(235, 190, 80),
        Severity::Critical => Color32::from_rgb(235, 90, 90),
    }
}

/// Urgency bucket for a binding event in the preview strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneUrgency {
    /// The next press: its lane color also feeds the now marker.
    Active,
    Upcoming,
    /// Too far in the future to emphasize.
    Background,
}

pub fn lane_urgency(press_idx: u32, max_bindings_shown: u32) -> LaneUrgency {
    if press_idx == 0 {
        LaneUrgency::Active
    } else if press_idx >= max_bindings_shown {
        LaneUrgency::Background
    } else {
        LaneUrgency::Upcoming
    }
}

const LANE_PALETTE: [Color32; 7] = [
    Color32::from_rgb(235, 110, 110),
    Color32::from_rgb(235, 170, 90),
    Color32::from_rgb(225, 215, 95),
    Color32::from_rgb(120, 210, 120),
    Color32::from_rgb(100, 200, 220),
    Color32::from_rgb(120, 140, 235),
    Color32::from_rgb(190, 120, 220),
];

pub fn lane_color(lane: usize) -> Color32 {
    LANE_PALETTE[lane % LANE_PALETTE.len()]
}

pub fn binding_color(lane: usize, urgency: LaneUrgency) -> Color32 {
    match urgency {
        LaneUrgency::Active => lane_color(lane),
        LaneUrgency::Upcoming => lane_color(lane).gamma_multiply(0.7),
        LaneUrgency::Background => Color32::from_rgb(90, 90, 100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start_us: i64, span_us: i64) -> VisibleWindow {
        VisibleWindow {
            start_us,
            span_us,
            ..Default::default()
        }
    }

    #[test]
    fn rect_bounds_stay_on_the_surface() {
        let window = window(1_000_000, 2_000_000);
        let range = PitchRange::new(48, 84);
        // Notes poking out both sides of the window.
        let notes = [
            Note::new(60, 100, -5_000_000, 1_500_000),
            Note::new(60, 100, 2_500_000, 99_000_000),
            Note::new(60, 100, 0, 9_000_000),
        ];
        for note in &notes {
            let rect = map_note_to_rect(note, &window, &range, 800.0, 600.0);
            assert!(0.0 <= rect.left());
            assert!(rect.left() <= rect.right());
            assert!(rect.right() <= 800.0);
        }
    }

    #[test]
    fn instantaneous_events_map_to_zero_width() {
        let window = window(0, 1_000_000);
        let range = PitchRange::new(48, 84);
        let note = Note::new(60, 100, 500_000, 500_000);
        let rect = map_note_to_rect(&note, &window, &range, 800.0, 600.0);
        assert_eq!(rect.width(), 0.0);
        assert_eq!(rect.left(), 400.0);
    }

    #[test]
    fn higher_pitch_is_higher_on_screen() {
        let range = PitchRange::new(48, 84);
        let low = pitch_to_y(50, &range, 600.0);
        let high = pitch_to_y(80, &range, 600.0);
        assert!(high < low);
        assert_eq!(pitch_to_y(84, &range, 600.0), 0.0);
        assert_eq!(pitch_to_y(48, &range, 600.0), 600.0);
    }

    #[test]
    fn out_of_range_pitch_clamps() {
        let range = PitchRange::new(48, 84);
        assert_eq!(pitch_to_y(120, &range, 600.0), 0.0);
        assert_eq!(pitch_to_y(10, &range, 600.0), 600.0);
    }

    #[test]
    fn severity_classification() {
        assert_eq!(severity(5, 4), Severity::Normal);
        assert_eq!(severity(4, 4), Severity::Normal);
        assert_eq!(severity(6, 4), Severity::Warning);
        assert_eq!(severity(2, 4), Severity::Warning);
        assert_eq!(severity(7, 4), Severity::Critical);
        assert_eq!(severity(0, 4), Severity::Critical);
    }

    #[test]
    fn urgency_buckets() {
        assert_eq!(lane_urgency(0, 8), LaneUrgency::Active);
        assert_eq!(lane_urgency(3, 8), LaneUrgency::Upcoming);
        assert_eq!(lane_urgency(8, 8), LaneUrgency::Background);
        assert_eq!(lane_urgency(20, 8), LaneUrgency::Background);
    }

    #[test]
    fn degenerate_pitch_range_does_not_divide_by_zero() {
        let range = PitchRange::new(60, 60);
        let y = pitch_to_y(60, &range, 600.0);
        assert!(y.is_finite());
    }
}
