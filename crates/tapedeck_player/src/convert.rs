//! 采样格式转换
//!
//! 设备不支持文件的声道数或采样率时，写入环形缓冲前先转换：
//! 单声道复制到所有输出声道，多声道按输出声道数折叠，采样率用线性插值换算。

/// 交错 f32 采样的声道与采样率转换器
///
/// 插值跨越多次 `process` 调用保持连续，`reset` 后从头开始。
#[derive(Debug, Clone)]
pub struct FrameConverter {
    src_channels: usize,
    dst_channels: usize,
    /// 每个输出帧前进的源帧数
    step: f64,
    /// 下一个输出帧在 `[上一块末帧, 本块...]` 序列中的位置
    pos: f64,
    /// 上一块的最后一帧（已映射声道）
    prev: Option<Vec<f32>>,
    mapped: Vec<f32>,
}

impl FrameConverter {
    pub fn new(src_rate: u32, src_channels: usize, dst_rate: u32, dst_channels: usize) -> Self {
        Self {
            src_channels: src_channels.max(1),
            dst_channels: dst_channels.max(1),
            step: src_rate.max(1) as f64 / dst_rate.max(1) as f64,
            pos: 0.0,
            prev: None,
            mapped: Vec::new(),
        }
    }

    /// 输入输出格式一致，无需转换
    pub fn is_passthrough(&self) -> bool {
        self.src_channels == self.dst_channels && self.step == 1.0
    }

    /// 转换一块交错采样，结果追加到 `out`
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if self.is_passthrough() {
            out.extend_from_slice(input);
            return;
        }

        let mut mapped = std::mem::take(&mut self.mapped);
        mapped.clear();
        for frame in input.chunks_exact(self.src_channels) {
            map_channels(frame, self.dst_channels, &mut mapped);
        }

        if self.step == 1.0 {
            out.extend_from_slice(&mapped);
        } else {
            self.resample(&mapped, out);
        }
        self.mapped = mapped;
    }

    /// 丢弃插值状态，用于跳转或停止之后
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev = None;
    }

    fn resample(&mut self, frames: &[f32], out: &mut Vec<f32>) {
        let ch = self.dst_channels;
        let count = frames.len() / ch;
        if count == 0 {
            return;
        }

        let prev = self.prev.take();
        let len = count + usize::from(prev.is_some());
        let last = (len - 1) as f64;

        while self.pos < last {
            let i = self.pos.floor() as usize;
            let t = (self.pos - i as f64) as f32;
            let a = frame_at(prev.as_deref(), frames, ch, i);
            let b = frame_at(prev.as_deref(), frames, ch, i + 1);
            out.extend(a.iter().zip(b).map(|(a, b)| a + (b - a) * t));
            self.pos += self.step;
        }

        self.pos -= last;
        self.prev = Some(frames[(count - 1) * ch..count * ch].to_vec());
    }
}

fn frame_at<'a>(prev: Option<&'a [f32]>, frames: &'a [f32], ch: usize, i: usize) -> &'a [f32] {
    match prev {
        Some(p) if i == 0 => p,
        Some(_) => &frames[(i - 1) * ch..i * ch],
        None => &frames[i * ch..(i + 1) * ch],
    }
}

/// 把一帧映射到目标声道数
fn map_channels(frame: &[f32], dst: usize, out: &mut Vec<f32>) {
    let src = frame.len();
    if src == dst {
        out.extend_from_slice(frame);
    } else if src == 1 {
        out.extend(std::iter::repeat(frame[0]).take(dst));
    } else if src > dst {
        // 源声道 i 折叠到输出声道 i % dst，取平均
        for k in 0..dst {
            let (sum, n) = frame
                .iter()
                .skip(k)
                .step_by(dst)
                .fold((0.0f32, 0usize), |(sum, n), s| (sum + s, n + 1));
            out.push(sum / n as f32);
        }
    } else {
        out.extend_from_slice(frame);
        out.extend(std::iter::repeat(0.0).take(dst - src));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(conv: &mut FrameConverter, input: &[f32]) -> Vec<f32> {
        let mut out = Vec::new();
        conv.process(input, &mut out);
        out
    }

    #[test]
    fn test_matching_format_passes_through() {
        let mut conv = FrameConverter::new(44100, 2, 44100, 2);
        assert!(conv.is_passthrough());
        assert_eq!(convert(&mut conv, &[0.1, 0.2, 0.3, 0.4]), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_mono_is_copied_to_every_channel() {
        let mut conv = FrameConverter::new(8000, 1, 8000, 2);
        assert_eq!(convert(&mut conv, &[0.5, -0.25]), vec![0.5, 0.5, -0.25, -0.25]);
    }

    #[test]
    fn test_stereo_folds_down_to_mono() {
        let mut conv = FrameConverter::new(8000, 2, 8000, 1);
        assert_eq!(convert(&mut conv, &[1.0, 0.0, 0.5, 0.5]), vec![0.5, 0.5]);
    }

    #[test]
    fn test_quad_folds_onto_stereo_pairs() {
        let mut conv = FrameConverter::new(8000, 4, 8000, 2);
        assert_eq!(convert(&mut conv, &[1.0, 0.25, 0.0, 0.75]), vec![0.5, 0.5]);
    }

    #[test]
    fn test_extra_output_channels_are_silent() {
        let mut conv = FrameConverter::new(8000, 2, 8000, 4);
        assert_eq!(convert(&mut conv, &[0.1, 0.2]), vec![0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_upsampling_interpolates_between_frames() {
        let mut conv = FrameConverter::new(8000, 1, 16000, 1);
        let out = convert(&mut conv, &[0.0, 1.0, 0.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_downsampling_skips_frames() {
        let mut conv = FrameConverter::new(16000, 1, 8000, 1);
        let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(convert(&mut conv, &input), vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_resampling_is_continuous_across_chunks() {
        let input: Vec<f32> = (0..12).map(|i| i as f32 * 0.1).collect();

        let mut whole = FrameConverter::new(8000, 1, 12000, 1);
        let expected = convert(&mut whole, &input);

        let mut split = FrameConverter::new(8000, 1, 12000, 1);
        let mut got = convert(&mut split, &input[..5]);
        got.extend(convert(&mut split, &input[5..]));

        assert_eq!(got.len(), expected.len());
        for (a, b) in got.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_reset_forgets_previous_chunk() {
        let mut conv = FrameConverter::new(8000, 1, 16000, 1);
        convert(&mut conv, &[1.0, 1.0]);
        conv.reset();
        assert_eq!(convert(&mut conv, &[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
