pub mod layout;
mod note_roll;

use std::path::PathBuf;
use std::time::Instant;

use crossbeam::channel::Receiver;
use eframe::egui;
use tracing::warn;

use crate::config::AppConfig;
use crate::loader::{self, LoadedFile};
use crate::session::Session;
use crate::update_check::UpdateStatus;
use note_roll::NoteRoll;

pub struct ClavioApp {
    config: AppConfig,
    loaded: Option<LoadedFile>,
    file_path: Option<PathBuf>,
    selected_track: Option<usize>,
    session: Option<Session>,
    error_message: Option<String>,
    update_rx: Option<Receiver<UpdateStatus>>,
    update_notice: Option<String>,
}

impl ClavioApp {
    pub fn new(update_rx: Receiver<UpdateStatus>) -> Self {
        Self {
            config: AppConfig::load_or_default(),
            loaded: None,
            file_path: None,
            selected_track: None,
            session: None,
            error_message: None,
            update_rx: Some(update_rx),
            update_notice: None,
        }
    }

    fn open_file(&mut self, path: PathBuf) {
        match loader::load(&path) {
            Ok(loaded) => {
                self.error_message = None;
                self.file_path = Some(path);
                self.loaded = Some(loaded);
                self.selected_track = None;
                self.session = None;
                self.select_track(0);
            }
            Err(err) => {
                self.error_message = Some(format!("Failed to load MIDI file: {err}"));
            }
        }
    }

    fn select_track(&mut self, index: usize) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let Some(track) = loaded.tracks.get(index) else {
            return;
        };
        self.selected_track = Some(index);
        self.session = Some(Session::new(track.clone(), &self.config));
    }

    fn process_update_check(&mut self) {
        let Some(rx) = &self.update_rx else {
            return;
        };
        match rx.try_recv() {
            Ok(UpdateStatus::UpdateAvailable { latest }) => {
                self.update_notice = Some(format!("Version {latest} is available"));
                self.update_rx = None;
            }
            Ok(UpdateStatus::UpToDate) => {
                self.update_rx = None;
            }
            Ok(UpdateStatus::CheckFailed { reason }) => {
                warn!(%reason, "update check did not complete");
                self.update_rx = None;
            }
            Err(_) => {}
        }
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui) {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open MIDI File...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .set_title("Open MIDI File")
                        .add_filter("MIDI", &["mid", "midi"])
                        .pick_file()
                    {
                        self.open_file(path);
                    }
                    ui.close();
                }

                ui.separator();

                if ui.button("Save Settings").clicked() {
                    if let Err(err) = self.config.save() {
                        self.error_message = Some(format!("Failed to save settings: {err}"));
                    }
                    ui.close();
                }

                if ui.button("Quit").clicked() {
                    std::process::exit(0);
                }
            });

            if let Some(notice) = &self.update_notice {
                ui.separator();
                ui.colored_label(egui::Color32::from_rgb(235, 190, 80), notice);
            }
        });
    }

    fn transport_controls(&mut self, ui: &mut egui::Ui) {
        let Some(session) = &mut self.session else {
            return;
        };

        ui.horizontal(|ui| {
            if session.is_playing() {
                if ui.button("⏹ Stop").clicked() {
                    session.stop();
                }
            } else if ui.button("▶ Play").clicked() {
                session.play();
            }

            ui.separator();

            ui.label("BPM:");
            let mut bpm = session.target_bpm;
            let response = ui.add(
                egui::DragValue::new(&mut bpm)
                    .speed(1.0)
                    .range(crate::track::MIN_BPM..=crate::track::MAX_BPM),
            );
            if response.changed() {
                session.set_tempo_bpm(bpm);
            }
            ui.label(format!("(source {:.0})", session.source_bpm()));
        });

        let duration = session.duration_us().max(1);
        let mut fraction = session.clock.position_us().max(0) as f64 / duration as f64;
        let scrub = ui.add_enabled(
            !session.is_playing(),
            egui::Slider::new(&mut fraction, 0.0..=1.0).show_value(false),
        );
        if scrub.changed() {
            session.seek_fraction(fraction);
        }
        ui.label(format!(
            "{:+.2}s / {:.2}s",
            session.clock.position_us() as f64 / 1e6,
            duration as f64 / 1e6
        ));
    }

    fn track_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tracks");
        if let Some(path) = &self.file_path {
            if let Some(name) = path.file_name() {
                ui.label(name.to_string_lossy());
            }
        }
        ui.separator();

        let Some(loaded) = &self.loaded else {
            return;
        };
        let mut clicked = None;
        for (i, track) in loaded.tracks.iter().enumerate() {
            let is_selected = self.selected_track == Some(i);
            let label = format!("{} ({} notes)", track.name, track.stats.note_count);
            if ui.selectable_label(is_selected, label).clicked() {
                clicked = Some(i);
            }
        }
        if let Some(i) = clicked {
            self.select_track(i);
        }

        if let Some(session) = &self.session {
            ui.separator();
            let stats = &session.transform_stats;
            ui.label(format!("Playable: {}", stats.kept));
            ui.label(format!("Octave-shifted: {}", stats.shifted));
            ui.label(format!("Extended: {}", stats.extended));
            ui.label(format!(
                "Dropped: {}",
                stats.dropped_low + stats.dropped_unmappable
            ));
        }
    }
}

impl eframe::App for ClavioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_update_check();

        if let Some(session) = &mut self.session {
            session.tick(Instant::now());
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ui);
        });

        if let Some(error) = self.error_message.clone() {
            egui::TopBottomPanel::top("error").show(ctx, |ui| {
                ui.colored_label(egui::Color32::RED, error);
            });
        }

        if self.loaded.is_some() {
            egui::SidePanel::left("tracks")
                .min_width(220.0)
                .show(ctx, |ui| {
                    self.track_panel(ui);
                });

            egui::TopBottomPanel::bottom("transport").show(ctx, |ui| {
                self.transport_controls(ui);
            });

            egui::CentralPanel::default().show(ctx, |ui| {
                if let Some(session) = &self.session {
                    NoteRoll::new(session, self.config.max_bindings_shown).show(ui);
                } else {
                    ui.vertical_centered(|ui| {
                        ui.heading("Select a track to preview");
                    });
                }
            });
        } else {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("No file loaded");
                    ui.label("File → Open MIDI File to get started");
                });
            });
        }

        ctx.request_repaint();
    }
}
