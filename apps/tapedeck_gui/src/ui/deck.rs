//! 播放控制行

use egui::{RichText, Ui};

use crate::state::AppState;

pub struct TransportRow;

impl TransportRow {
    pub fn show(ui: &mut Ui, state: &mut AppState) {
        ui.horizontal(|ui| {
            // 播放/暂停
            let label = if state.is_playing { "⏸ Pause" } else { "▶ Play" };
            if ui.button(RichText::new(label).size(14.0)).clicked() {
                state.toggle_play();
            }

            if ui.button(RichText::new("⏹ Stop").size(14.0)).clicked() {
                state.stop();
            }

            ui.add_space(8.0);
            Self::volume_control(ui, state);
        });
    }

    fn volume_control(ui: &mut Ui, state: &mut AppState) {
        let icon = if state.volume_draft > 0.5 {
            "🔊"
        } else if state.volume_draft > 0.0 {
            "🔉"
        } else {
            "🔇"
        };
        ui.label(icon);

        let mut draft = state.volume_draft;
        let slider = egui::Slider::new(&mut draft, 0.0..=1.0).show_value(false);
        let response = ui.add_sized([100.0, 16.0], slider);

        if response.changed() {
            state.edit_volume(draft, response.dragged());
        }
        if response.drag_stopped() {
            state.commit_volume();
        }
    }
}
