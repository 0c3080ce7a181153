use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use arc_swap::ArcSwap;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Producer, Split},
};
use thiserror::Error;
use tracing::{info, warn};

use super::synth::{AdsrConfig, Voice};
use crate::track::Note;

const COMMAND_QUEUE_CAPACITY: usize = 64;
const MASTER_GAIN: f32 = 0.25;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

#[derive(Debug, Clone, Copy)]
enum PlayerCommand {
    Start { from_us: i64 },
    Stop,
}

/// State shared with the audio callback. The callback is the only writer of
/// `position_us`; the UI thread only writes it when (re)starting playback.
struct Shared {
    position_us: AtomicI64,
    tempo_scale_bits: AtomicU32,
    playing: AtomicBool,
}

/// Audio-output player for the processed track. Once started it owns
/// playback time: its reported position is authoritative for the clock.
///
/// The device is acquired lazily by `warmup_device`; everything crossing
/// into the callback goes through the command queue, the note-list swap or
/// an atomic.
pub struct Player {
    shared: Arc<Shared>,
    notes: Arc<ArcSwap<Vec<Note>>>,
    commands: Option<HeapProd<PlayerCommand>>,
    stream: Option<cpal::Stream>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                position_us: AtomicI64::new(0),
                tempo_scale_bits: AtomicU32::new(1.0f32.to_bits()),
                playing: AtomicBool::new(false),
            }),
            notes: Arc::new(ArcSwap::from_pointee(Vec::new())),
            commands: None,
            stream: None,
        }
    }

    /// Acquires the output device and spins up the (silent) stream. May fail
    /// when the device is busy; the caller logs and continues visual-only.
    pub fn warmup_device(&mut self) -> Result<(), PlayerError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlayerError::NoDevice)?;
        let config = device.default_output_config()?;
        let stream_config: cpal::StreamConfig = config.into();

        let sample_rate = stream_config.sample_rate as f32;
        let channels = stream_config.channels as usize;

        let ring = HeapRb::<PlayerCommand>::new(COMMAND_QUEUE_CAPACITY);
        let (producer, consumer) = ring.split();

        let mut render = RenderState {
            commands: consumer,
            shared: self.shared.clone(),
            notes: self.notes.clone(),
            voices: Vec::new(),
            next_note: 0,
            position_us: 0.0,
            active: false,
            sample_rate,
            channels,
            adsr: AdsrConfig::default(),
            scratch: Vec::new(),
        };

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render.fill(data);
            },
            |err| warn!("audio stream error: {err}"),
            None,
        )?;
        stream.play()?;

        info!(sample_rate, channels, "audio output ready");
        self.commands = Some(producer);
        self.stream = Some(stream);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.stream.is_some()
    }

    /// Swaps in a new processed note list; takes effect on the next start.
    pub fn set_notes(&self, notes: Vec<Note>) {
        self.notes.store(Arc::new(notes));
    }

    pub fn start(&mut self, from_us: i64) -> Result<(), PlayerError> {
        let Some(commands) = self.commands.as_mut() else {
            return Err(PlayerError::NoDevice);
        };
        let from_us = from_us.max(0);
        self.shared.position_us.store(from_us, Ordering::Relaxed);
        if commands
            .try_push(PlayerCommand::Start { from_us })
            .is_err()
        {
            warn!("player command queue full, start dropped");
            return Err(PlayerError::NoDevice);
        }
        self.shared.playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(commands) = self.commands.as_mut() {
            let _ = commands.try_push(PlayerCommand::Stop);
        }
        self.shared.playing.store(false, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    /// Track-time position the callback has rendered up to.
    pub fn reported_position_us(&self) -> i64 {
        self.shared.position_us.load(Ordering::Relaxed)
    }

    pub fn set_tempo_scale(&self, scale: f64) {
        self.shared
            .tempo_scale_bits
            .store((scale as f32).to_bits(), Ordering::Relaxed);
    }
}

/// Everything the audio callback owns. Lives on the audio thread for the
/// lifetime of the stream.
struct RenderState {
    commands: HeapCons<PlayerCommand>,
    shared: Arc<Shared>,
    notes: Arc<ArcSwap<Vec<Note>>>,
    voices: Vec<Voice>,
    next_note: usize,
    position_us: f64,
    active: bool,
    sample_rate: f32,
    channels: usize,
    adsr: AdsrConfig,
    scratch: Vec<f32>,
}

impl RenderState {
    fn fill(&mut self, data: &mut [f32]) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                PlayerCommand::Start { from_us } => {
                    let notes = self.notes.load();
                    self.next_note = notes.partition_point(|n| n.start_us < from_us);
                    self.position_us = from_us as f64;
                    self.voices.clear();
                    self.active = true;
                }
                PlayerCommand::Stop => {
                    self.active = false;
                    self.voices.clear();
                }
            }
        }

        data.fill(0.0);
        if !self.active {
            return;
        }

        let frames = data.len() / self.channels;
        let tempo = f32::from_bits(self.shared.tempo_scale_bits.load(Ordering::Relaxed));
        let delta_us = frames as f64 / self.sample_rate as f64 * tempo as f64 * 1e6;
        let buffer_end_us = self.position_us + delta_us;

        let notes = self.notes.load();
        while self.next_note < notes.len()
            && (notes[self.next_note].start_us as f64) < buffer_end_us
        {
            let note = notes[self.next_note];
            self.voices.push(Voice::new(note.pitch, note.velocity, note.end_us));
            self.next_note += 1;
        }

        for voice in &mut self.voices {
            if (voice.end_us as f64) <= buffer_end_us {
                voice.release();
            }
        }

        self.scratch.resize(frames, 0.0);
        self.scratch.fill(0.0);
        for voice in &mut self.voices {
            voice.render(&mut self.scratch, &self.adsr, self.sample_rate);
        }
        let adsr = self.adsr;
        self.voices.retain(|v| !v.is_finished(&adsr));

        for (frame, sample) in self.scratch.iter().enumerate() {
            let value = sample * MASTER_GAIN;
            for channel in 0..self.channels {
                data[frame * self.channels + channel] = value;
            }
        }

        self.position_us = buffer_end_us;
        self.shared
            .position_us
            .store(buffer_end_us as i64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_without_device_fails_cleanly() {
        let mut player = Player::new();
        assert!(!player.is_ready());
        assert!(matches!(player.start(0), Err(PlayerError::NoDevice)));
        assert!(!player.is_playing());
    }

    #[test]
    fn stop_without_device_is_a_no_op() {
        let mut player = Player::new();
        player.stop();
        assert!(!player.is_playing());
        assert_eq!(player.reported_position_us(), 0);
    }

    #[test]
    fn render_state_plays_notes_and_reports_position() {
        let shared = Arc::new(Shared {
            position_us: AtomicI64::new(0),
            tempo_scale_bits: AtomicU32::new(1.0f32.to_bits()),
            playing: AtomicBool::new(false),
        });
        let notes = Arc::new(ArcSwap::from_pointee(vec![
            Note::new(60, 100, 0, 400_000),
            Note::new(72, 100, 5_000_000, 5_400_000),
        ]));
        let ring = HeapRb::<PlayerCommand>::new(8);
        let (mut producer, consumer) = ring.split();

        let mut render = RenderState {
            commands: consumer,
            shared: shared.clone(),
            notes,
            voices: Vec::new(),
            next_note: 0,
            position_us: 0.0,
            active: false,
            sample_rate: 48_000.0,
            channels: 2,
            adsr: AdsrConfig::default(),
            scratch: Vec::new(),
        };

        // Inactive: silence, no position movement.
        let mut data = vec![1.0f32; 960];
        render.fill(&mut data);
        assert!(data.iter().all(|&s| s == 0.0));
        assert_eq!(shared.position_us.load(Ordering::Relaxed), 0);

        producer.try_push(PlayerCommand::Start { from_us: 0 }).unwrap();
        render.fill(&mut data);
        // 480 frames at 48 kHz = 10 ms of track time at unit tempo.
        assert_eq!(shared.position_us.load(Ordering::Relaxed), 10_000);
        assert_eq!(render.voices.len(), 1);
        assert!(data.iter().any(|&s| s != 0.0));

        producer.try_push(PlayerCommand::Stop).unwrap();
        render.fill(&mut data);
        assert!(render.voices.is_empty());
        assert!(data.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn tempo_scale_speeds_up_reported_time() {
        let shared = Arc::new(Shared {
            position_us: AtomicI64::new(0),
            tempo_scale_bits: AtomicU32::new(2.0f32.to_bits()),
            playing: AtomicBool::new(false),
        });
        let ring = HeapRb::<PlayerCommand>::new(8);
        let (mut producer, consumer) = ring.split();
        let mut render = RenderState {
            commands: consumer,
            shared: shared.clone(),
            notes: Arc::new(ArcSwap::from_pointee(Vec::new())),
            voices: Vec::new(),
            next_note: 0,
            position_us: 0.0,
            active: false,
            sample_rate: 48_000.0,
            channels: 2,
            adsr: AdsrConfig::default(),
            scratch: Vec::new(),
        };
        producer.try_push(PlayerCommand::Start { from_us: 0 }).unwrap();
        let mut data = vec![0.0f32; 960];
        render.fill(&mut data);
        assert_eq!(shared.position_us.load(Ordering::Relaxed), 20_000);
    }
}
