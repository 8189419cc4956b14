// src/framing/framer.rs
//
// Pure framing strategies: given a session's buffered bytes and its framing
// configuration, extract the complete frames and leave any partial tail in
// the buffer. The engine in framing/mod.rs owns buffers, timers, and logs;
// everything in this file is side-effect free.

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Types
// ============================================================================

/// How a session's byte stream is cut into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingStrategy {
    /// Every chunk of buffered data is flushed as one frame
    None,
    /// Frames end at a delimiter byte sequence (delimiter excluded)
    Delimiter,
    /// Frames end after a quiet period on the line (timer driven)
    Timeout,
    /// Frames carry a leading length prefix; the frame is the payload
    PrefixLength,
}

/// Width of the length prefix for `FramingStrategy::PrefixLength`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixWidth {
    U8,
    U16,
    U32,
}

impl PrefixWidth {
    pub fn bytes(&self) -> usize {
        match self {
            PrefixWidth::U8 => 1,
            PrefixWidth::U16 => 2,
            PrefixWidth::U32 => 4,
        }
    }
}

/// Byte order of the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    Le,
    Be,
}

/// Framing configuration for a session.
/// Fields not used by the selected strategy are ignored, not validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramingConfig {
    pub strategy: FramingStrategy,
    /// Delimiter byte sequence (DELIMITER strategy)
    #[serde(default = "default_delimiter")]
    pub delimiter: Vec<u8>,
    /// Quiet period in milliseconds (TIMEOUT strategy)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Length prefix width (PREFIX_LENGTH strategy)
    #[serde(default = "default_prefix_width")]
    pub prefix_width: PrefixWidth,
    /// Length prefix byte order (PREFIX_LENGTH strategy)
    #[serde(default = "default_byte_order")]
    pub byte_order: ByteOrder,
    /// Force split on max length: a buffer that reaches this size without
    /// satisfying its strategy is flushed as one frame, so a stream that
    /// never delivers its delimiter (or declares an absurd prefix length)
    /// cannot grow the buffer without bound.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_delimiter() -> Vec<u8> {
    vec![0x0A]
}

fn default_timeout_ms() -> u64 {
    50
}

fn default_prefix_width() -> PrefixWidth {
    PrefixWidth::U8
}

fn default_byte_order() -> ByteOrder {
    ByteOrder::Be
}

fn default_max_frame_bytes() -> usize {
    4096
}

impl Default for FramingConfig {
    fn default() -> Self {
        FramingConfig {
            strategy: FramingStrategy::None,
            delimiter: default_delimiter(),
            timeout_ms: default_timeout_ms(),
            prefix_width: default_prefix_width(),
            byte_order: default_byte_order(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

// ============================================================================
// Frame Extraction
// ============================================================================

/// Extract all complete frames from `buffer` under `config`, draining the
/// consumed bytes and leaving any partial frame in place.
///
/// TIMEOUT never extracts here; its flush is driven by the engine's timer.
pub fn extract_frames(config: &FramingConfig, buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut frames = match config.strategy {
        FramingStrategy::None => flush_whole_buffer(buffer),
        FramingStrategy::Delimiter => {
            if config.delimiter.is_empty() {
                // An empty delimiter would match between every byte; treat
                // it as an unframed stream instead.
                flush_whole_buffer(buffer)
            } else {
                extract_delimited(&config.delimiter, buffer)
            }
        }
        FramingStrategy::Timeout => Vec::new(),
        FramingStrategy::PrefixLength => {
            extract_prefixed(config.prefix_width, config.byte_order, buffer)
        }
    };

    // Force split on max length
    if buffer.len() >= config.max_frame_bytes {
        frames.append(&mut flush_whole_buffer(buffer));
    }

    frames
}

/// Drain the entire buffer as a single frame. Empty buffer yields nothing.
pub fn flush_whole_buffer(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    if buffer.is_empty() {
        Vec::new()
    } else {
        vec![std::mem::take(buffer)]
    }
}

/// Split on a multi-byte delimiter. The delimiter is excluded from frames
/// and empty segments between adjacent delimiters are dropped. Bytes after
/// the last delimiter stay buffered.
fn extract_delimited(delimiter: &[u8], buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i + delimiter.len() <= buffer.len() {
        if &buffer[i..i + delimiter.len()] == delimiter {
            let frame = &buffer[start..i];
            if !frame.is_empty() {
                frames.push(frame.to_vec());
            }
            i += delimiter.len();
            start = i;
        } else {
            i += 1;
        }
    }

    buffer.drain(..start);
    frames
}

/// Decode length-prefixed frames. Each frame in the stream is
/// `[prefix][payload]`; the extracted frame is the payload only. An
/// incomplete prefix or payload stays buffered until more data arrives.
fn extract_prefixed(
    width: PrefixWidth,
    byte_order: ByteOrder,
    buffer: &mut Vec<u8>,
) -> Vec<Vec<u8>> {
    let prefix_len = width.bytes();
    let mut frames = Vec::new();
    let mut offset = 0;

    loop {
        if buffer.len() < offset + prefix_len {
            break;
        }
        let payload_len = decode_prefix(width, byte_order, &buffer[offset..offset + prefix_len]);
        let frame_end = offset + prefix_len + payload_len;
        if buffer.len() < frame_end {
            break;
        }
        frames.push(buffer[offset + prefix_len..frame_end].to_vec());
        offset = frame_end;
    }

    buffer.drain(..offset);
    frames
}

fn decode_prefix(width: PrefixWidth, byte_order: ByteOrder, bytes: &[u8]) -> usize {
    match (width, byte_order) {
        (PrefixWidth::U8, _) => bytes[0] as usize,
        (PrefixWidth::U16, ByteOrder::Be) => u16::from_be_bytes([bytes[0], bytes[1]]) as usize,
        (PrefixWidth::U16, ByteOrder::Le) => u16::from_le_bytes([bytes[0], bytes[1]]) as usize,
        (PrefixWidth::U32, ByteOrder::Be) => {
            u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
        }
        (PrefixWidth::U32, ByteOrder::Le) => {
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
        }
    }
}
