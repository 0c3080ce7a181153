use eframe::egui;

use super::layout::{
    self, LaneUrgency, PitchRange, lane_color, map_note_to_rect, severity, severity_color,
    time_to_x,
};
use crate::session::Session;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub fn note_name(pitch: u8) -> String {
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], pitch / 12)
}

/// Scrolling note roll over the processed track, with the original track as
/// a silhouette behind it and the key-binding preview strip underneath.
pub struct NoteRoll<'a> {
    session: &'a Session,
    max_bindings_shown: u32,
}

impl<'a> NoteRoll<'a> {
    pub fn new(session: &'a Session, max_bindings_shown: u32) -> Self {
        Self {
            session,
            max_bindings_shown,
        }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::hover());
        let rect = response.rect;

        let strip_height = 90.0f32.min(rect.height() * 0.3);
        let roll_rect = egui::Rect::from_min_size(
            rect.min,
            egui::Vec2::new(rect.width(), rect.height() - strip_height),
        );
        let strip_rect = egui::Rect::from_min_size(
            egui::Pos2::new(rect.left(), roll_rect.bottom()),
            egui::Vec2::new(rect.width(), strip_height),
        );

        painter.rect_filled(roll_rect, 0.0, egui::Color32::from_rgb(26, 26, 32));
        painter.rect_filled(strip_rect, 0.0, egui::Color32::from_rgb(18, 18, 24));

        let range = self.pitch_range();
        self.draw_grid(&painter, roll_rect);
        self.draw_silhouette(&painter, roll_rect, &range);
        let hovered = self.draw_notes(&response, &painter, roll_rect, &range);
        self.draw_binding_strip(&painter, strip_rect);
        self.draw_now_marker(&painter, rect);

        if let Some((idx, pointer)) = hovered {
            self.draw_hover_hint(&painter, pointer, idx);
        }
    }

    /// Union of both tracks' pitch extents, padded so edge notes are not
    /// glued to the surface border.
    fn pitch_range(&self) -> PitchRange {
        let original = &self.session.original.stats;
        let processed = &self.session.processed.stats;
        let min = original.min_pitch.min(processed.min_pitch);
        let max = original.max_pitch.max(processed.max_pitch);
        PitchRange::new(min.saturating_sub(2), max.saturating_add(2).min(127))
    }

    fn draw_grid(&self, painter: &egui::Painter, rect: egui::Rect) {
        let window = &self.session.roll;
        for (instants, color, width) in [
            (
                &window.beat_lines,
                egui::Color32::from_rgb(55, 55, 62),
                1.0,
            ),
            (
                &window.bar_lines,
                egui::Color32::from_rgb(95, 95, 105),
                2.0,
            ),
        ] {
            for &instant in instants.iter() {
                let x = rect.left() + time_to_x(instant, window, rect.width());
                painter.line_segment(
                    [
                        egui::Pos2::new(x, rect.top()),
                        egui::Pos2::new(x, rect.bottom()),
                    ],
                    egui::Stroke::new(width, color),
                );
            }
        }
    }

    fn draw_silhouette(&self, painter: &egui::Painter, rect: egui::Rect, range: &PitchRange) {
        let window = &self.session.silhouette;
        for &idx in &window.notes {
            let note = &self.session.original.notes[idx];
            let local = map_note_to_rect(note, window, range, rect.width(), rect.height());
            painter.rect_filled(
                local.translate(rect.min.to_vec2()),
                1.0,
                egui::Color32::from_rgba_unmultiplied(160, 160, 170, 40),
            );
        }
    }

    fn draw_notes(
        &self,
        response: &egui::Response,
        painter: &egui::Painter,
        rect: egui::Rect,
        range: &PitchRange,
    ) -> Option<(usize, egui::Pos2)> {
        let window = &self.session.roll;
        let reference_octave = self.session.layout.reference_octave();
        let pointer = response.hover_pos();
        let mut hovered = None;

        for &idx in &window.notes {
            let note = &self.session.processed.notes[idx];
            let local = map_note_to_rect(note, window, range, rect.width(), rect.height());
            let screen = local.translate(rect.min.to_vec2());
            let color = severity_color(severity(note.octave(), reference_octave));

            painter.rect_filled(screen, 2.0, color);
            if !note.origin.is_unchanged() {
                // Altered notes get an outline so the hover hint is discoverable.
                painter.rect_stroke(
                    screen,
                    2.0,
                    egui::Stroke::new(1.0, egui::Color32::WHITE),
                    egui::StrokeKind::Inside,
                );
            }

            if let Some(pos) = pointer {
                if screen.expand(2.0).contains(pos) {
                    hovered = Some((idx, pos));
                }
            }
        }
        hovered
    }

    fn draw_binding_strip(&self, painter: &egui::Painter, rect: egui::Rect) {
        let window = &self.session.roll;
        let lane_count = self.session.layout.lane_count().max(1);
        let radius = (rect.height() / lane_count as f32).clamp(3.0, 8.0);

        for event in &window.bindings {
            let note = &self.session.processed.notes[event.note_idx];
            let x = rect.left() + time_to_x(note.start_us, window, rect.width());
            // Lane 0 at the bottom of the strip.
            let lane_alpha = (event.lane as f32 + 0.5) / lane_count as f32;
            let y = rect.bottom() - lane_alpha * rect.height();
            let urgency = layout::lane_urgency(event.press_idx, self.max_bindings_shown);
            let color = layout::binding_color(event.lane, urgency);

            painter.circle_filled(egui::Pos2::new(x, y), radius, color);
            if urgency != LaneUrgency::Background {
                if let Some(binding) = self.session.layout.lanes.get(event.lane) {
                    painter.text(
                        egui::Pos2::new(x, y),
                        egui::Align2::CENTER_CENTER,
                        &binding.label,
                        egui::FontId::monospace(radius * 1.6),
                        egui::Color32::BLACK,
                    );
                }
            }
        }
    }

    fn draw_now_marker(&self, painter: &egui::Painter, rect: egui::Rect) {
        let window = &self.session.roll;
        let x = rect.left()
            + time_to_x(window.start_us + window.now_offset_us, window, rect.width());
        let color = window
            .bindings
            .iter()
            .find(|b| b.press_idx == 0)
            .map(|b| lane_color(b.lane))
            .unwrap_or(egui::Color32::from_rgb(255, 90, 90));
        painter.line_segment(
            [
                egui::Pos2::new(x, rect.top()),
                egui::Pos2::new(x, rect.bottom()),
            ],
            egui::Stroke::new(2.0, color),
        );
    }

    fn draw_hover_hint(&self, painter: &egui::Painter, pointer: egui::Pos2, idx: usize) {
        let note = &self.session.processed.notes[idx];
        let hint = match self.session.hover_origin(idx) {
            Some(origin) => format!(
                "{} ({}), from {} at {:.2}s",
                note_name(note.pitch),
                note.origin.describe(),
                note_name(origin.pitch),
                origin.start_us as f64 / 1e6,
            ),
            None => format!("{} ({})", note_name(note.pitch), note.origin.describe()),
        };
        painter.text(
            pointer + egui::Vec2::new(14.0, -14.0),
            egui::Align2::LEFT_BOTTOM,
            hint,
            egui::FontId::proportional(12.0),
            egui::Color32::WHITE,
        );
    }
}
