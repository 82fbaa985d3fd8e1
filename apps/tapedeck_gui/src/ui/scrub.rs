//! 拖动式进度条
//!
//! 灰色轨道铺满宽度，蓝色填充按比例绘制，两者始终使用同一个比例。
//! 空闲时比例由绑定值计算；拖动时跟随指针；松开时把比例换算回
//! 绑定范围内的值，写回绑定值并返回给调用方提交。

use std::ops::RangeInclusive;

use egui::{vec2, Rect, Response, Rounding, Sense, Ui};

use crate::ui::theme::DeckTheme;

const MIN_HEIGHT: f32 = 15.0;
const TRACK_HEIGHT: f32 = 10.0;
const FILL_HEIGHT: f32 = 8.0;

/// 绑定值在范围内的比例，限制在 [0, 1]
pub fn fraction_of_value(value: f64, range: &RangeInclusive<f64>) -> f32 {
    let span = range.end() - range.start();
    if span.is_nan() || span <= 0.0 {
        return 0.0;
    }
    ((value - range.start()) / span).clamp(0.0, 1.0) as f32
}

/// 指针横坐标在控件内的比例，限制在 [0, 1]
pub fn fraction_of_pointer(x: f32, left: f32, width: f32) -> f32 {
    if width.is_nan() || width <= 0.0 {
        return 0.0;
    }
    ((x - left) / width).clamp(0.0, 1.0)
}

/// 比例换算回范围内的值
pub fn value_of_fraction(fraction: f32, range: &RangeInclusive<f64>) -> f64 {
    let span = (range.end() - range.start()).max(0.0);
    range.start() + fraction.clamp(0.0, 1.0) as f64 * span
}

/// 进度条状态：`drag` 为 `None` 时空闲，否则为拖动中的比例
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrubState {
    drag: Option<f32>,
}

impl ScrubState {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// 当前应显示的比例
    pub fn displayed(&self, value: f64, range: &RangeInclusive<f64>) -> f32 {
        self.drag
            .unwrap_or_else(|| fraction_of_value(value, range))
    }

    /// 进入或保持拖动状态
    pub fn drag_to(&mut self, fraction: f32) {
        self.drag = Some(fraction.clamp(0.0, 1.0));
    }

    /// 结束拖动：写回绑定值并返回提交的值；未在拖动时返回 `None`
    pub fn release(&mut self, value: &mut f64, range: &RangeInclusive<f64>) -> Option<f64> {
        let fraction = self.drag.take()?;
        *value = value_of_fraction(fraction, range);
        Some(*value)
    }
}

/// 进度条控件
pub struct ScrubSlider<'a> {
    value: &'a mut f64,
    range: RangeInclusive<f64>,
}

impl<'a> ScrubSlider<'a> {
    pub fn new(value: &'a mut f64, range: RangeInclusive<f64>) -> Self {
        Self { value, range }
    }

    /// 绘制控件，拖动结束时返回提交的值
    pub fn show(self, ui: &mut Ui) -> Option<f64> {
        let (committed, _) = self.show_with_response(ui);
        committed
    }

    pub fn show_with_response(self, ui: &mut Ui) -> (Option<f64>, Response) {
        let desired = vec2(ui.available_width(), MIN_HEIGHT);
        let (rect, response) = ui.allocate_exact_size(desired, Sense::drag());

        let id = response.id;
        let mut scrub: ScrubState = ui.data(|d| d.get_temp(id)).unwrap_or_default();

        if response.drag_started() || response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                scrub.drag_to(fraction_of_pointer(pos.x, rect.left(), rect.width()));
            }
        }

        let committed = if response.drag_stopped() {
            scrub.release(self.value, &self.range)
        } else {
            None
        };

        if scrub.is_dragging() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        }

        let fraction = scrub.displayed(*self.value, &self.range);
        ui.data_mut(|d| d.insert_temp(id, scrub));

        if ui.is_rect_visible(rect) {
            paint(ui, rect, fraction);
        }

        (committed, response)
    }
}

fn paint(ui: &Ui, rect: Rect, fraction: f32) {
    let painter = ui.painter();

    let track = Rect::from_min_size(
        egui::pos2(rect.left(), rect.center().y - TRACK_HEIGHT / 2.0),
        vec2(rect.width(), TRACK_HEIGHT),
    );
    painter.rect_filled(track, Rounding::ZERO, DeckTheme::TRACK);

    let fill = Rect::from_min_size(
        egui::pos2(rect.left(), rect.center().y - FILL_HEIGHT / 2.0),
        vec2(rect.width() * fraction, FILL_HEIGHT),
    );
    painter.rect_filled(fill, Rounding::ZERO, DeckTheme::ACCENT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_fraction_clamps() {
        let range = 0.0..=200.0;
        assert_eq!(fraction_of_value(50.0, &range), 0.25);
        assert_eq!(fraction_of_value(-10.0, &range), 0.0);
        assert_eq!(fraction_of_value(500.0, &range), 1.0);
    }

    #[test]
    fn test_pointer_fraction_clamps() {
        assert_eq!(fraction_of_pointer(60.0, 10.0, 100.0), 0.5);
        assert_eq!(fraction_of_pointer(-40.0, 10.0, 100.0), 0.0);
        assert_eq!(fraction_of_pointer(400.0, 10.0, 100.0), 1.0);
    }

    #[test]
    fn test_empty_range_has_zero_fraction() {
        let range = 0.0..=0.0;
        assert_eq!(fraction_of_value(3.0, &range), 0.0);
        assert_eq!(value_of_fraction(0.8, &range), 0.0);
        assert_eq!(fraction_of_pointer(5.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_idle_follows_bound_value() {
        let scrub = ScrubState::default();
        let range = 0.0..=10.0;

        assert!(!scrub.is_dragging());
        assert_eq!(scrub.displayed(2.5, &range), 0.25);
        assert_eq!(scrub.displayed(7.5, &range), 0.75);
    }

    #[test]
    fn test_drag_overrides_bound_value_until_release() {
        let mut scrub = ScrubState::default();
        let range = 0.0..=10.0;
        let mut value = 3.0;

        scrub.drag_to(0.6);
        assert!(scrub.is_dragging());
        // 拖动期间绑定值不影响显示
        assert_eq!(scrub.displayed(value, &range), 0.6);

        scrub.drag_to(1.7);
        assert_eq!(scrub.displayed(value, &range), 1.0);

        let committed = scrub.release(&mut value, &range);
        assert_eq!(committed, Some(10.0));
        assert_eq!(value, 10.0);
        assert!(!scrub.is_dragging());
        assert_eq!(scrub.displayed(value, &range), 1.0);
    }

    #[test]
    fn test_release_without_drag_commits_nothing() {
        let mut scrub = ScrubState::default();
        let mut value = 4.0;

        assert_eq!(scrub.release(&mut value, &(0.0..=10.0)), None);
        assert_eq!(value, 4.0);
    }

    #[test]
    fn test_commit_scales_into_offset_range() {
        let mut scrub = ScrubState::default();
        let range = 10.0..=20.0;
        let mut value = 10.0;

        scrub.drag_to(0.5);
        assert_eq!(scrub.release(&mut value, &range), Some(15.0));
    }
}
