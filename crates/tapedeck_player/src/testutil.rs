//! 测试用的内存 WAV 生成

/// 生成 16-bit PCM WAV，`info` 为 RIFF INFO 标签（如 `("INAM", "Title")`）
pub fn wav_bytes(sample_rate: u32, channels: u16, frames: u32, info: &[(&str, &str)]) -> Vec<u8> {
    let block_align = channels as u32 * 2;
    let data_len = frames * block_align;

    let mut list = Vec::new();
    if !info.is_empty() {
        list.extend_from_slice(b"INFO");
        for (id, value) in info {
            let mut bytes = value.as_bytes().to_vec();
            bytes.push(0);
            list.extend_from_slice(id.as_bytes());
            list.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            if bytes.len() % 2 == 1 {
                bytes.push(0);
            }
            list.extend_from_slice(&bytes);
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    let list_total = if list.is_empty() { 0 } else { 8 + list.len() as u32 };
    let riff_len = 4 + (8 + 16) + list_total + (8 + data_len);
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align).to_le_bytes());
    out.extend_from_slice(&(block_align as u16).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    if !list.is_empty() {
        out.extend_from_slice(b"LIST");
        out.extend_from_slice(&(list.len() as u32).to_le_bytes());
        out.extend_from_slice(&list);
    }

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames * channels as u32 {
        // 低幅度锯齿波，避免全零
        let sample = ((i % 200) as i16 - 100) * 50;
        out.extend_from_slice(&sample.to_le_bytes());
    }

    out
}
