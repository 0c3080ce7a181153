use super::midi_to_freq;

#[derive(Debug, Clone, Copy)]
pub struct AdsrConfig {
    /// Seconds
    pub attack: f32,
    /// Seconds
    pub decay: f32,
    /// 0.0 -> 1.0
    pub sustain: f32,
    /// Seconds
    pub release: f32,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 0.06,
            sustain: 0.75,
            release: 0.09,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EnvelopeStage {
    Attack { time: f32 },
    Decay { time: f32 },
    Sustain,
    Release { time: f32 },
}

/// One sounding preview note: a single sine oscillator through an ADSR
/// envelope, advanced once per render buffer.
#[derive(Debug, Clone)]
pub struct Voice {
    pub pitch: u8,
    /// Track-time instant at which the voice should enter release.
    pub end_us: i64,
    velocity: u8,
    phase: f32,
    stage: EnvelopeStage,
    level: f32,
}

impl Voice {
    pub fn new(pitch: u8, velocity: u8, end_us: i64) -> Self {
        Self {
            pitch,
            end_us,
            velocity,
            phase: 0.0,
            stage: EnvelopeStage::Attack { time: 0.0 },
            level: 0.0,
        }
    }

    pub fn release(&mut self) {
        if !matches!(self.stage, EnvelopeStage::Release { .. }) {
            self.stage = EnvelopeStage::Release { time: 0.0 };
        }
    }

    pub fn is_finished(&self, adsr: &AdsrConfig) -> bool {
        matches!(self.stage, EnvelopeStage::Release { time } if time >= adsr.release)
    }

    fn envelope(&self, adsr: &AdsrConfig) -> f32 {
        match self.stage {
            EnvelopeStage::Attack { time } => {
                if adsr.attack == 0.0 {
                    1.0
                } else {
                    (time / adsr.attack).min(1.0)
                }
            }
            EnvelopeStage::Decay { time } => {
                let progress = if adsr.decay == 0.0 {
                    1.0
                } else {
                    (time / adsr.decay).min(1.0)
                };
                1.0 - (1.0 - adsr.sustain) * progress
            }
            EnvelopeStage::Sustain => adsr.sustain,
            EnvelopeStage::Release { time } => {
                let progress = if adsr.release == 0.0 {
                    1.0
                } else {
                    (time / adsr.release).min(1.0)
                };
                self.level * (1.0 - progress)
            }
        }
    }

    /// Adds this voice into a mono buffer and advances phase and envelope by
    /// one buffer's worth of time.
    pub fn render(&mut self, output: &mut [f32], adsr: &AdsrConfig, sample_rate: f32) {
        let envelope = self.envelope(adsr);
        let gain = envelope * self.velocity as f32 / 127.0;
        let step = midi_to_freq(self.pitch) / sample_rate;

        for sample in output.iter_mut() {
            *sample += (self.phase * 2.0 * std::f32::consts::PI).sin() * gain;
            self.phase += step;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }

        self.advance_envelope(adsr, output.len() as f32 / sample_rate);
    }

    fn advance_envelope(&mut self, adsr: &AdsrConfig, dt: f32) {
        match &mut self.stage {
            EnvelopeStage::Attack { time } => {
                *time += dt;
                if *time >= adsr.attack {
                    self.stage = EnvelopeStage::Decay { time: 0.0 };
                    self.level = 1.0;
                } else {
                    self.level = self.envelope(adsr);
                }
            }
            EnvelopeStage::Decay { time } => {
                *time += dt;
                if *time >= adsr.decay {
                    self.stage = EnvelopeStage::Sustain;
                    self.level = adsr.sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.level = adsr.sustain;
            }
            EnvelopeStage::Release { time } => {
                *time += dt;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_settles_on_sustain() {
        let adsr = AdsrConfig::default();
        let mut voice = Voice::new(69, 127, 1_000_000);
        let mut buffer = vec![0.0f32; 512];
        for _ in 0..100 {
            buffer.fill(0.0);
            voice.render(&mut buffer, &adsr, 48_000.0);
        }
        assert!(!voice.is_finished(&adsr));
        assert!((voice.level - adsr.sustain).abs() < 1e-6);
    }

    #[test]
    fn released_voice_finishes() {
        let adsr = AdsrConfig::default();
        let mut voice = Voice::new(60, 100, 0);
        voice.release();
        let mut buffer = vec![0.0f32; 4800];
        for _ in 0..2 {
            voice.render(&mut buffer, &adsr, 48_000.0);
        }
        assert!(voice.is_finished(&adsr));
    }

    #[test]
    fn rendering_adds_signal() {
        let adsr = AdsrConfig {
            attack: 0.0,
            ..Default::default()
        };
        let mut voice = Voice::new(69, 127, 1_000_000);
        let mut buffer = vec![0.0f32; 128];
        voice.render(&mut buffer, &adsr, 48_000.0);
        assert!(buffer.iter().any(|&s| s.abs() > 0.01));
    }
}
