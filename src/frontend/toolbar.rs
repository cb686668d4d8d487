//! Toolbar panel: LUT and camera selection, recording, flip, reset, exit.

use egui::{Color32, RichText, Ui};

use crate::colormap::LutName;
use crate::frontend::state::{AppAction, ViewerState};
use crate::types::{FlipAxis, PipelineState};

/// Render the toolbar. Returns the actions the user triggered.
pub fn render_toolbar(ui: &mut Ui, view: &ViewerState) -> Vec<AppAction> {
    let mut actions = Vec::new();

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 4.0;

        // === LUT ===
        render_lut_group(ui, view, &mut actions);

        ui.separator();

        // === Camera ===
        render_camera_group(ui, view, &mut actions);

        ui.separator();

        // === Record ===
        render_recording_group(ui, view, &mut actions);

        ui.separator();

        // === Flip ===
        let flip = view.status.flip;
        if ui.selectable_label(flip.horizontal, "Flip H").clicked() {
            actions.push(AppAction::ToggleFlip(FlipAxis::Horizontal));
        }
        if ui.selectable_label(flip.vertical, "Flip V").clicked() {
            actions.push(AppAction::ToggleFlip(FlipAxis::Vertical));
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("Exit").clicked() {
                actions.push(AppAction::Exit);
            }
            let reset = if view.status.state == PipelineState::Error {
                egui::Button::new(RichText::new("Reset").color(Color32::WHITE))
                    .fill(Color32::from_rgb(150, 50, 50))
            } else {
                egui::Button::new("Reset")
            };
            if ui.add(reset).on_hover_text("Drop the camera and return to Idle").clicked() {
                actions.push(AppAction::Reset);
            }
        });
    });

    actions
}

fn render_lut_group(ui: &mut Ui, view: &ViewerState, actions: &mut Vec<AppAction>) {
    ui.label("LUT:");
    let current = view.status.lut;
    egui::ComboBox::from_id_salt("lut_select")
        .selected_text(current.as_str())
        .width(140.0)
        .show_ui(ui, |ui| {
            for name in LutName::ALL {
                if ui.selectable_label(name == current, name.as_str()).clicked() && name != current {
                    actions.push(AppAction::SelectLut(name));
                }
            }
        });
}

fn render_camera_group(ui: &mut Ui, view: &ViewerState, actions: &mut Vec<AppAction>) {
    ui.label("Camera:");
    let active = view.status.active_camera.as_ref();
    let selected_text = active
        .map(|c| c.display_name())
        .unwrap_or_else(|| "No camera".to_string());

    ui.add_enabled_ui(view.status.state != PipelineState::Error, |ui| {
        egui::ComboBox::from_id_salt("camera_select")
            .selected_text(selected_text)
            .width(220.0)
            .show_ui(ui, |ui| {
                if view.cameras.is_empty() {
                    ui.weak("No cameras attached");
                }
                for camera in &view.cameras {
                    let is_active = active.is_some_and(|a| a.device_path == camera.device_path);
                    if ui.selectable_label(is_active, camera.display_name()).clicked() && !is_active {
                        actions.push(AppAction::SelectCamera(camera.clone()));
                    }
                }
            });
    });
}

fn render_recording_group(ui: &mut Ui, view: &ViewerState, actions: &mut Vec<AppAction>) {
    let recording = view.status.recording;
    let button = if recording {
        egui::Button::new(RichText::new("⏹ Stop").color(Color32::WHITE)).fill(Color32::from_rgb(170, 40, 40))
    } else {
        egui::Button::new("⏺ Record")
    };
    let hover = match &view.recording_path {
        Some(path) => format!("Recording to {}", path.display()),
        None => "Record to .avi".to_string(),
    };
    if ui
        .add_enabled(view.is_streaming(), button)
        .on_hover_text(hover)
        .clicked()
    {
        actions.push(AppAction::ToggleRecording);
    }
    if recording {
        ui.colored_label(Color32::RED, "●");
    }
}
