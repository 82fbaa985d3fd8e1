//! 音频输出
//!
//! 使用 cpal 进行音频播放

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};

use crate::convert::FrameConverter;

/// 音频输出错误
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("No output device available")]
    NoDevice,
    #[error("No supported config")]
    NoConfig,
    #[error("Stream error: {0}")]
    Stream(String),
}

/// 引擎写入采样的目标
///
/// 位置以输出端实际消费的帧数计算，`flush` 之后从零开始。
pub trait AudioSink {
    /// 追加交错采样（按解码器的声道数和采样率）
    fn write(&self, samples: &[f32]);
    /// 尚未消费的采样数
    fn buffered(&self) -> usize;
    /// 期望的缓冲上限（采样数）
    fn capacity(&self) -> usize;
    /// 设置播放状态
    fn set_playing(&self, playing: bool);
    /// 设置输出增益，立即生效
    fn set_volume(&self, volume: f32);
    /// 自上次 `flush` 以来已播放的时长
    fn position(&self) -> Duration;
    /// 丢弃缓冲并归零位置
    fn flush(&self);
}

/// 解码器输出的流格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// 约 250ms 的缓冲容量（采样数）
pub fn buffer_samples(sample_rate: u32, channels: u16) -> usize {
    (sample_rate as usize * channels as usize / 4).max(4096)
}

/// 音频输出流
pub struct AudioOutput {
    _stream: Stream,
    ring: Arc<RingBuffer>,
    is_playing: Arc<AtomicBool>,
    gain: Arc<AtomicU32>,
    converter: Mutex<FrameConverter>,
    converted: Mutex<Vec<f32>>,
    device_rate: u32,
}

impl AudioOutput {
    /// 在默认设备上创建音频输出
    pub fn new(config: OutputConfig) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(OutputError::NoDevice)?;

        Self::with_device(&device, config)
    }

    /// 使用指定设备创建音频输出
    ///
    /// 优先使用与文件一致的格式；设备不支持时退回设备默认格式，
    /// 写入时再转换声道和采样率。
    pub fn with_device(device: &Device, config: OutputConfig) -> Result<Self, OutputError> {
        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| OutputError::Stream(e.to_string()))?
            .collect();

        let supported = match pick_config(&ranges, config) {
            Some(supported) => supported,
            None => device
                .default_output_config()
                .map_err(|e| OutputError::Stream(e.to_string()))?,
        };

        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported.into();
        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;

        let ring = Arc::new(RingBuffer::new(
            buffer_samples(device_rate, device_channels),
            device_channels as usize,
        ));
        let is_playing = Arc::new(AtomicBool::new(false));
        let gain = Arc::new(AtomicU32::new(1.0f32.to_bits()));

        let shared = CallbackShared {
            ring: ring.clone(),
            is_playing: is_playing.clone(),
            gain: gain.clone(),
        };
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(device, &stream_config, shared)?,
            SampleFormat::F64 => build_stream::<f64>(device, &stream_config, shared)?,
            SampleFormat::I16 => build_stream::<i16>(device, &stream_config, shared)?,
            SampleFormat::I32 => build_stream::<i32>(device, &stream_config, shared)?,
            SampleFormat::U16 => build_stream::<u16>(device, &stream_config, shared)?,
            SampleFormat::U8 => build_stream::<u8>(device, &stream_config, shared)?,
            format => {
                return Err(OutputError::Stream(format!(
                    "Unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream.play().map_err(|e| OutputError::Stream(e.to_string()))?;

        let converter = FrameConverter::new(
            config.sample_rate,
            config.channels as usize,
            device_rate,
            device_channels as usize,
        );
        if converter.is_passthrough() {
            log::debug!(
                "output stream open: rate={} channels={} format={:?}",
                device_rate,
                device_channels,
                sample_format
            );
        } else {
            log::info!(
                "converting {} Hz/{} ch to device {} Hz/{} ch ({:?})",
                config.sample_rate,
                config.channels,
                device_rate,
                device_channels,
                sample_format
            );
        }

        Ok(Self {
            _stream: stream,
            ring,
            is_playing,
            gain,
            converter: Mutex::new(converter),
            converted: Mutex::new(Vec::new()),
            device_rate,
        })
    }
}

impl AudioSink for AudioOutput {
    fn write(&self, samples: &[f32]) {
        let mut converter = lock(&self.converter);
        if converter.is_passthrough() {
            self.ring.write(samples);
            return;
        }
        let mut converted = lock(&self.converted);
        converted.clear();
        converter.process(samples, &mut converted);
        self.ring.write(&converted);
    }

    fn buffered(&self) -> usize {
        self.ring.len()
    }

    fn capacity(&self) -> usize {
        self.ring.capacity
    }

    fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    fn set_volume(&self, volume: f32) {
        self.gain
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn position(&self) -> Duration {
        let frames = self.ring.consumed_frames();
        Duration::from_secs_f64(frames as f64 / self.device_rate as f64)
    }

    fn flush(&self) {
        lock(&self.converter).reset();
        self.ring.clear();
    }
}

/// 在设备支持的格式中挑选：采样率必须包含文件采样率，
/// 声道数一致优先，其次 f32 优先。没有合适的返回 `None`。
fn pick_config(
    ranges: &[SupportedStreamConfigRange],
    wanted: OutputConfig,
) -> Option<SupportedStreamConfig> {
    ranges
        .iter()
        .filter(|c| {
            c.min_sample_rate().0 <= wanted.sample_rate
                && c.max_sample_rate().0 >= wanted.sample_rate
                && is_supported_format(c.sample_format())
        })
        .min_by_key(|c| {
            (
                c.channels() != wanted.channels,
                c.sample_format() != SampleFormat::F32,
            )
        })
        .map(|c| c.clone().with_sample_rate(cpal::SampleRate(wanted.sample_rate)))
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32
            | SampleFormat::F64
            | SampleFormat::I16
            | SampleFormat::I32
            | SampleFormat::U16
            | SampleFormat::U8
    )
}

/// 回调线程与引擎共享的状态
struct CallbackShared {
    ring: Arc<RingBuffer>,
    is_playing: Arc<AtomicBool>,
    gain: Arc<AtomicU32>,
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    shared: CallbackShared,
) -> Result<Stream, OutputError> {
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                let read = if shared.is_playing.load(Ordering::Relaxed) {
                    shared.ring.read(&mut scratch)
                } else {
                    0
                };
                // 填充未读取部分为静音
                scratch[read..].fill(0.0);

                let gain = f32::from_bits(shared.gain.load(Ordering::Relaxed));
                for (out, sample) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample(*sample * gain);
                }
            },
            |err| {
                log::error!("audio output error: {}", err);
            },
            None,
        )
        .map_err(|e| OutputError::Stream(e.to_string()))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct RingState {
    samples: VecDeque<f32>,
    /// 自上次 `clear` 以来读出的帧数
    consumed_frames: u64,
}

/// 简单的环形缓冲区
///
/// 写入方负责控制水位，`write` 不丢弃数据。读出计数与采样在同一把锁下更新，
/// `clear` 之后计数一定从零开始。
struct RingBuffer {
    state: Mutex<RingState>,
    capacity: usize,
    channels: usize,
}

impl RingBuffer {
    fn new(capacity: usize, channels: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                samples: VecDeque::with_capacity(capacity),
                consumed_frames: 0,
            }),
            capacity,
            channels: channels.max(1),
        }
    }

    fn write(&self, data: &[f32]) {
        lock(&self.state).samples.extend(data.iter().copied());
    }

    fn read(&self, output: &mut [f32]) -> usize {
        let mut state = lock(&self.state);
        let buf = &mut state.samples;
        let to_read = output.len().min(buf.len());

        let (a, b) = buf.as_slices();
        let a_len = a.len().min(to_read);
        output[..a_len].copy_from_slice(&a[..a_len]);
        let b_len = to_read - a_len;
        if b_len > 0 {
            output[a_len..to_read].copy_from_slice(&b[..b_len]);
        }

        buf.drain(..to_read);
        state.consumed_frames += (to_read / self.channels) as u64;
        to_read
    }

    fn len(&self) -> usize {
        lock(&self.state).samples.len()
    }

    fn consumed_frames(&self) -> u64 {
        lock(&self.state).consumed_frames
    }

    fn clear(&self) {
        let mut state = lock(&self.state);
        state.samples.clear();
        state.consumed_frames = 0;
    }
}
