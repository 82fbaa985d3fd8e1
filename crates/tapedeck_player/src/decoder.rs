//! 音频解码器
//!
//! 使用 symphonia 解码音频流

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// 解码器错误
#[derive(thiserror::Error, Debug)]
pub enum DecoderError {
    #[error("No supported audio track found")]
    NoTrack,
    #[error("Unsupported codec")]
    UnsupportedCodec,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SymphoniaError> for DecoderError {
    fn from(e: SymphoniaError) -> Self {
        DecoderError::Decode(e.to_string())
    }
}

/// 音频信息
#[derive(Debug, Clone)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub duration: Option<Duration>,
    pub codec: String,
}

/// 音频解码器
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    pub info: AudioInfo,
}

impl AudioDecoder {
    /// 打开文件并创建解码器，扩展名作为探测提示
    pub fn open(path: &Path) -> Result<Self, DecoderError> {
        let file = File::open(path)?;
        let hint = path.extension().and_then(|ext| ext.to_str());
        Self::new(file, hint)
    }

    /// 从可读流创建解码器
    pub fn new<R: MediaSource + 'static>(source: R, hint: Option<&str>) -> Result<Self, DecoderError> {
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut probe_hint = Hint::new();
        if let Some(ext) = hint {
            probe_hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &probe_hint,
                mss,
                &FormatOptions {
                    enable_gapless: true,
                    ..Default::default()
                },
                &MetadataOptions::default(),
            )
            .map_err(|e| DecoderError::Decode(e.to_string()))?;

        let format = probed.format;

        // 查找第一个音频轨道
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoTrack)?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let duration = codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));

        let codec = symphonia::default::get_codecs()
            .get_codec(codec_params.codec)
            .map(|d| d.short_name.to_string())
            .unwrap_or_else(|| format!("{:?}", codec_params.codec));

        let info = AudioInfo {
            sample_rate,
            channels,
            duration,
            codec,
        };

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|_| DecoderError::UnsupportedCodec)?;

        log::debug!(
            "decoder ready: codec={} rate={} channels={} duration={:?}",
            info.codec,
            info.sample_rate,
            info.channels,
            info.duration
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_buf: None,
            info,
        })
    }

    /// 总时长，未知时为零
    pub fn duration(&self) -> Duration {
        self.info.duration.unwrap_or(Duration::ZERO)
    }

    /// 解码下一帧，返回交错的 f32 采样；`None` 表示流结束
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            // 跳过非目标轨道
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let capacity = decoded.capacity();

            if self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < capacity)
            {
                self.sample_buf = Some(SampleBuffer::new(capacity as u64, spec));
            }

            let Some(sample_buf) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(sample_buf.samples().to_vec()));
        }
    }

    /// 跳转到指定时间
    pub fn seek(&mut self, time: Duration) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: symphonia::core::units::Time::from(time.as_secs_f64()),
            track_id: Some(self.track_id),
        };

        self.format
            .seek(SeekMode::Accurate, seek_to)
            .map_err(|e| DecoderError::Decode(e.to_string()))?;

        // 重置解码器状态
        self.decoder.reset();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::wav_bytes;
    use std::io::Cursor;

    fn decoder_for(frames: u32) -> AudioDecoder {
        AudioDecoder::new(Cursor::new(wav_bytes(8000, 2, frames, &[])), Some("wav")).unwrap()
    }

    #[test]
    fn test_probe_reports_stream_info() {
        let decoder = decoder_for(8000);

        assert_eq!(decoder.info.sample_rate, 8000);
        assert_eq!(decoder.info.channels, 2);
        assert_eq!(decoder.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_decode_until_end_of_stream() {
        let mut decoder = decoder_for(4000);

        let mut total = 0;
        while let Some(samples) = decoder.decode_next().unwrap() {
            total += samples.len();
        }

        assert_eq!(total, 4000 * 2);
        assert!(decoder.decode_next().unwrap().is_none());
    }

    #[test]
    fn test_seek_to_start_replays_stream() {
        let mut decoder = decoder_for(4000);
        while decoder.decode_next().unwrap().is_some() {}

        decoder.seek(Duration::ZERO).unwrap();

        assert!(decoder.decode_next().unwrap().is_some());
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        let garbage = vec![0x5Au8; 4096];
        let result = AudioDecoder::new(Cursor::new(garbage), None);

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AudioDecoder::open(Path::new("/nonexistent/tapedeck/track.flac"));

        assert!(matches!(result, Err(DecoderError::Io(_))));
    }
}
