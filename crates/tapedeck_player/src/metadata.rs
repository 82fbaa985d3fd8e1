//! 标签读取
//!
//! 从音频文件的标签字典中提取标题、专辑和艺术家。

use std::fs::File;
use std::path::Path;

use serde::Serialize;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey, Value as MetaValue};
use symphonia::core::probe::Hint;

/// 缺失字段的占位文本
pub const PLACEHOLDER: &str = "Not found";

/// 曲目标签
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackTags {
    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
}

impl TrackTags {
    /// 面板显示用的 (标签, 值) 行，缺失的值用占位文本
    pub fn rows(&self) -> [(&'static str, &str); 3] {
        [
            ("Title", or_placeholder(&self.title)),
            ("Album", or_placeholder(&self.album)),
            ("Artist", or_placeholder(&self.artist)),
        ]
    }

    fn absorb(&mut self, revision: &MetadataRevision) {
        for tag in revision.tags() {
            let Some(value) = tag_text(&tag.value) else {
                continue;
            };

            let slot = match tag.std_key {
                Some(StandardTagKey::TrackTitle) => &mut self.title,
                Some(StandardTagKey::Album) => &mut self.album,
                Some(StandardTagKey::Artist) => &mut self.artist,
                Some(_) => continue,
                None => match tag.key.to_ascii_lowercase().as_str() {
                    "title" => &mut self.title,
                    "album" => &mut self.album,
                    "artist" => &mut self.artist,
                    _ => continue,
                },
            };
            slot.get_or_insert(value);
        }
    }
}

/// 读取文件标签；文件无法打开或探测失败时返回 `None`
pub fn read_tags(path: &Path) -> Option<TrackTags> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("cannot open {} for tags: {}", path.display(), e);
            return None;
        }
    };
    let hint = path.extension().and_then(|ext| ext.to_str());
    read_tags_from(file, hint)
}

/// 从任意媒体源读取标签
pub fn read_tags_from<R: MediaSource + 'static>(source: R, hint: Option<&str>) -> Option<TrackTags> {
    let mut probe_hint = Hint::new();
    if let Some(ext) = hint {
        probe_hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(source), Default::default());
    let mut probed = match symphonia::default::get_probe().format(
        &probe_hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(p) => p,
        Err(e) => {
            log::debug!("tag probe failed: {}", e);
            return None;
        }
    };

    let mut tags = TrackTags::default();

    // 容器内的标签优先，其次是流前面的标签（如 ID3）
    if let Some(revision) = probed.format.metadata().current() {
        tags.absorb(revision);
    }
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            tags.absorb(revision);
        }
    }

    Some(tags)
}

fn or_placeholder(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(PLACEHOLDER)
}

fn tag_text(value: &MetaValue) -> Option<String> {
    let text = match value {
        MetaValue::String(s) => s.clone(),
        MetaValue::UnsignedInt(u) => u.to_string(),
        MetaValue::SignedInt(i) => i.to_string(),
        MetaValue::Float(f) => f.to_string(),
        MetaValue::Boolean(_) | MetaValue::Binary(_) | MetaValue::Flag => return None,
    };

    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::wav_bytes;
    use std::io::Cursor;

    #[test]
    fn test_untagged_file_shows_placeholders() {
        let tags = read_tags_from(Cursor::new(wav_bytes(8000, 1, 800, &[])), Some("wav")).unwrap();

        assert_eq!(tags, TrackTags::default());
        for (_, value) in tags.rows() {
            assert_eq!(value, PLACEHOLDER);
        }
    }

    #[test]
    fn test_unreadable_source_yields_none() {
        let garbage = b"definitely not audio".repeat(64);
        assert!(read_tags_from(Cursor::new(garbage), None).is_none());
        assert!(read_tags(Path::new("/nonexistent/tapedeck/track.flac")).is_none());
    }

    #[test]
    fn test_riff_info_tags_are_extracted() {
        let bytes = wav_bytes(
            8000,
            1,
            800,
            &[("INAM", "Blue Train"), ("IART", "John Coltrane")],
        );
        let tags = read_tags_from(Cursor::new(bytes), Some("wav")).unwrap();

        assert_eq!(tags.title.as_deref(), Some("Blue Train"));
        assert_eq!(tags.artist.as_deref(), Some("John Coltrane"));
        assert_eq!(tags.album, None);

        let rows = tags.rows();
        assert_eq!(rows[0], ("Title", "Blue Train"));
        assert_eq!(rows[1], ("Album", PLACEHOLDER));
        assert_eq!(rows[2], ("Artist", "John Coltrane"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        assert_eq!(tag_text(&MetaValue::String("  \0".into())), None);
        assert_eq!(
            tag_text(&MetaValue::String(" Giant Steps\0".into())).as_deref(),
            Some("Giant Steps")
        );
        assert_eq!(tag_text(&MetaValue::UnsignedInt(7)).as_deref(), Some("7"));
        assert_eq!(tag_text(&MetaValue::Binary(vec![1, 2, 3].into())), None);
    }

    #[test]
    fn test_tags_serialize_as_json() {
        let tags = TrackTags {
            title: Some("So What".into()),
            album: None,
            artist: Some("Miles Davis".into()),
        };

        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(
            json,
            r#"{"title":"So What","album":null,"artist":"Miles Davis"}"#
        );
    }
}
