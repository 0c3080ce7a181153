use serde::{Deserialize, Serialize};

/// One input lane: the MIDI pitch it plays and the key cap shown in the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBinding {
    pub pitch: u8,
    pub label: String,
}

/// Fixed, ordered set of binding lanes. Lane index is the position in
/// `lanes`, lowest pitch first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyLayout {
    pub lanes: Vec<KeyBinding>,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::three_octave_21_key()
    }
}

impl KeyLayout {
    /// Diatonic C-major layout over three octaves rooted at C3 (MIDI 48),
    /// seven naturals per keyboard row.
    pub fn three_octave_21_key() -> Self {
        const DEGREES: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
        const ROWS: [&str; 3] = ["ZXCVBNM", "ASDFGHJ", "QWERTYU"];
        let mut lanes = Vec::with_capacity(21);
        for (octave, row) in ROWS.iter().enumerate() {
            for (degree, key) in row.chars().enumerate() {
                lanes.push(KeyBinding {
                    pitch: 48 + octave as u8 * 12 + DEGREES[degree],
                    label: key.to_string(),
                });
            }
        }
        Self { lanes }
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_for_pitch(&self, pitch: u8) -> Option<usize> {
        self.lanes.iter().position(|l| l.pitch == pitch)
    }

    pub fn min_pitch(&self) -> u8 {
        self.lanes.iter().map(|l| l.pitch).min().unwrap_or(0)
    }

    pub fn max_pitch(&self) -> u8 {
        self.lanes.iter().map(|l| l.pitch).max().unwrap_or(127)
    }

    /// Octave of the layout's middle lane, the baseline for severity
    /// classification.
    pub fn reference_octave(&self) -> i32 {
        if self.lanes.is_empty() {
            return 5;
        }
        (self.lanes[self.lanes.len() / 2].pitch / 12) as i32
    }
}

/// A processed note projected onto a binding lane. `press_idx` 0 is the next
/// lane event to be played; larger values are further in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingEvent {
    pub note_idx: usize,
    pub lane: usize,
    pub press_idx: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_21_ordered_lanes() {
        let layout = KeyLayout::default();
        assert_eq!(layout.lane_count(), 21);
        assert_eq!(layout.min_pitch(), 48);
        assert_eq!(layout.max_pitch(), 48 + 24 + 11);
        for pair in layout.lanes.windows(2) {
            assert!(pair[0].pitch < pair[1].pitch);
        }
    }

    #[test]
    fn lane_lookup_is_exact_membership() {
        let layout = KeyLayout::default();
        assert_eq!(layout.lane_for_pitch(48), Some(0));
        assert_eq!(layout.lane_for_pitch(60), Some(7));
        // C#3 is not a diatonic lane.
        assert_eq!(layout.lane_for_pitch(49), None);
    }

    #[test]
    fn reference_octave_is_middle_lane() {
        let layout = KeyLayout::default();
        assert_eq!(layout.reference_octave(), 5);
    }
}
