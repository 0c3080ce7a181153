mod player;
mod synth;

pub use player::{Player, PlayerError};
pub use synth::{AdsrConfig, Voice};

pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concert_pitch() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-3);
        assert!((midi_to_freq(81) - 880.0).abs() < 1e-3);
    }
}
