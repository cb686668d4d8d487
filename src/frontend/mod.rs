//! Frontend module for egui UI
//!
//! The viewer is a thin shell around the pipeline: it renders the newest
//! frame from a [`FrameSlot`], turns clicks into [`PipelineCommand`]s and
//! rebuilds its [`ViewerState`] from [`PipelineMessage`]s.
//!
//! # Layout
//!
//! - Top: [`toolbar`] (LUT, camera, record, flip, reset, exit)
//! - Center: the live image, scaled to fit with the aspect ratio kept
//! - Bottom: [`status_bar`] (state, frame counters, last error)
//!
//! [`PipelineCommand`]: crate::pipeline::PipelineCommand
//! [`PipelineMessage`]: crate::pipeline::PipelineMessage

pub mod state;
pub mod status_bar;
pub mod toolbar;

pub use state::{AppAction, ViewerState};

use egui::{Color32, TextureHandle, TextureOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::colormap::LutName;
use crate::pipeline::{FrameSlot, PipelineHandle};
use status_bar::StatusBarContext;

/// Repaint at least this often so status updates show up without frames
const IDLE_REPAINT: Duration = Duration::from_millis(250);

/// Main application state for the viewer
pub struct ThermviewApp {
    pipeline: PipelineHandle,
    slot: Arc<FrameSlot>,
    view: ViewerState,
    texture: Option<TextureHandle>,
    frame_size: Option<(u32, u32)>,
}

impl ThermviewApp {
    /// Create the app. New frames in `slot` wake the UI.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        pipeline: PipelineHandle,
        slot: Arc<FrameSlot>,
        lut: LutName,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        slot.set_waker(move || ctx.request_repaint());
        Self {
            pipeline,
            slot,
            view: ViewerState::new(lut),
            texture: None,
            frame_size: None,
        }
    }

    /// Apply all pending controller messages. Returns true if any arrived.
    fn process_pipeline_messages(&mut self) -> bool {
        let messages = self.pipeline.drain();
        let had_messages = !messages.is_empty();
        for msg in messages {
            self.view.apply(msg);
        }
        had_messages
    }

    /// Upload the newest frame, if there is one
    fn update_texture(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.slot.take() else {
            return;
        };
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgb(size, frame.as_rgb());
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("thermal-frame", image, TextureOptions::NEAREST));
            }
        }
        self.frame_size = Some(frame.dimensions());
    }

    fn handle_action(&mut self, ctx: &egui::Context, action: AppAction) {
        match action {
            AppAction::SelectLut(name) => self.pipeline.select_lut(name),
            AppAction::SelectCamera(identity) => self.pipeline.select_camera(identity),
            AppAction::ToggleRecording => {
                if self.view.status.recording {
                    self.pipeline.stop_recording();
                } else {
                    self.pipeline.start_recording(None);
                }
            }
            AppAction::ToggleFlip(axis) => self.pipeline.toggle_flip(axis),
            AppAction::Reset => {
                self.pipeline.reset();
                self.texture = None;
                self.frame_size = None;
            }
            AppAction::Exit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
        }
    }

    fn render_image(&self, ui: &mut egui::Ui) {
        let (Some(texture), Some((width, height))) = (&self.texture, self.frame_size) else {
            ui.centered_and_justified(|ui| {
                ui.label(egui::RichText::new(self.placeholder_text()).color(Color32::GRAY));
            });
            return;
        };

        let available = ui.available_size();
        let scale = (available.x / width as f32).min(available.y / height as f32).max(0.0);
        let size = egui::vec2(width as f32 * scale, height as f32 * scale);
        ui.centered_and_justified(|ui| {
            ui.add(egui::Image::new(egui::load::SizedTexture::new(texture.id(), size)));
        });
    }

    fn placeholder_text(&self) -> &'static str {
        match self.view.status.state {
            crate::types::PipelineState::Error => "Camera failed. Press Reset to continue.",
            _ if self.view.cameras.is_empty() => "Waiting for a camera...",
            _ => "No camera selected",
        }
    }
}

impl eframe::App for ThermviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let had_messages = self.process_pipeline_messages();
        if !self.view.is_streaming() && had_messages {
            self.texture = None;
            self.frame_size = None;
        }
        self.update_texture(ctx);

        if self.view.shutdown {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            let actions = toolbar::render_toolbar(ui, &self.view);
            for action in actions {
                self.handle_action(ctx, action);
            }
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            status_bar::render_status_bar(
                ui,
                &StatusBarContext {
                    view: &self.view,
                    frames_shown: self.slot.shown(),
                    frames_dropped: self.slot.dropped(),
                    messages_dropped: self.pipeline.dropped_messages(),
                },
            );
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(Color32::BLACK))
            .show(ctx, |ui| self.render_image(ui));

        ctx.request_repaint_after(IDLE_REPAINT);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.pipeline.quit();
    }
}
