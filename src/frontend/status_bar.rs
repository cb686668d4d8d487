//! Status bar panel: pipeline state, frame counters and the last error.

use egui::{Color32, RichText, Ui};

use crate::frontend::state::ViewerState;
use crate::types::PipelineState;

/// Context needed to render the status bar.
pub struct StatusBarContext<'a> {
    pub view: &'a ViewerState,
    /// Frames the capture thread handed to the display
    pub frames_shown: u64,
    /// Frames replaced before the display took them
    pub frames_dropped: u64,
    /// Controller messages dropped because the UI fell behind
    pub messages_dropped: u64,
}

/// Render the status bar.
pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    let status = &ctx.view.status;
    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        let color = match status.state {
            PipelineState::Streaming => Color32::GREEN,
            PipelineState::Idle => Color32::GRAY,
            PipelineState::Error => Color32::RED,
        };
        ui.colored_label(color, "●");
        let text = match &status.active_camera {
            Some(camera) => format!("{}: {}", status.display_name(), camera.display_name()),
            None => status.display_name().to_string(),
        };
        ui.label(RichText::new(text).small());

        ui.separator();
        ui.label(RichText::new(format!("LUT: {}", status.lut)).small());

        ui.separator();
        ui.label(RichText::new(format!("Frames: {}", ctx.frames_shown)).small());

        ui.separator();
        let dropped_color = if ctx.frames_dropped > 0 {
            Color32::YELLOW
        } else {
            Color32::GRAY
        };
        ui.colored_label(
            dropped_color,
            RichText::new(format!("Dropped: {}", ctx.frames_dropped)).small(),
        );

        if ctx.messages_dropped > 0 {
            ui.separator();
            ui.colored_label(
                Color32::LIGHT_RED,
                RichText::new(format!("Lost messages: {}", ctx.messages_dropped)).small(),
            );
        }

        if let Some(summary) = &ctx.view.last_recording {
            ui.separator();
            ui.label(
                RichText::new(format!(
                    "Last recording: {} frames ({} dropped) in {:.1}s",
                    summary.frames_written,
                    summary.frames_dropped,
                    summary.duration.as_secs_f64()
                ))
                .small(),
            );
        }

        if let Some(error) = &ctx.view.last_error {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(Color32::RED, RichText::new(error).small());
            });
        }
    });
}
