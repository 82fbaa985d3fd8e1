//! 曲目信息面板

use egui::{RichText, Ui};

use crate::state::AppState;
use crate::ui::theme::DeckTheme;

pub struct TrackInfoPanel;

impl TrackInfoPanel {
    pub fn show(ui: &mut Ui, state: &AppState) {
        egui::Grid::new("track_info")
            .num_columns(2)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                for (label, value) in state.tags.rows() {
                    Self::row(ui, label, value);
                }
                let time = format!(
                    "{} / {}",
                    format_timestamp(state.duration),
                    format_timestamp(state.position)
                );
                Self::row(ui, "Time", &time);
            });

        if let Some(err) = &state.last_error {
            ui.label(RichText::new(err).color(DeckTheme::ERROR).size(11.0));
        }
    }

    fn row(ui: &mut Ui, label: &str, value: &str) {
        ui.label(RichText::new(format!("{}:", label)).color(DeckTheme::TEXT_MUTED));
        ui.label(RichText::new(value).color(DeckTheme::TEXT_PRIMARY));
        ui.end_row();
    }
}

/// 格式化为 `分:秒:百分秒`
pub fn format_timestamp(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let minutes = (secs / 60.0) as u64;
    let seconds = (secs % 60.0) as u64;
    let centis = ((secs - secs.floor()) * 100.0) as u64;
    format!("{:02}:{:02}:{:02}", minutes, seconds, centis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(125.5), "02:05:50");
        assert_eq!(format_timestamp(59.25), "00:59:25");
        assert_eq!(format_timestamp(3600.0), "60:00:00");
    }

    #[test]
    fn test_format_timestamp_rejects_bad_input() {
        assert_eq!(format_timestamp(-3.0), "00:00:00");
        assert_eq!(format_timestamp(f64::NAN), "00:00:00");
    }
}
