// Digital input event extraction

use crate::core::format::ChannelDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Optional decoding of a fixed-length bit run after each edge into a short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDecoding {
    /// Samples in the code window; also the minimum gap separating two edges.
    pub code_length: usize,
    pub bits_per_char: usize,
}

/// Why a code could not be decoded. Never fatal to edge extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("bits per char must be between 1 and 8, got {0}")]
    InvalidWidth(usize),

    #[error("code window of {needed} samples at edge {edge} runs past the end ({available} left)")]
    WindowPastEnd {
        edge: usize,
        needed: usize,
        available: usize,
    },
}

/// Rising edges found on one digital input channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvents {
    pub native_order: i32,
    pub channel_name: String,
    pub sample_indexes: Vec<usize>,
    /// Edge times in seconds.
    pub times: Vec<f64>,
    /// One entry per edge when code decoding is on, empty otherwise.
    pub codes: Vec<Option<Vec<u8>>>,
}

/// Unpacks one channel (bit `bit`) from the per-timestep digital words.
pub fn unpack_bits(words: &[u16], bit: i32) -> Vec<u8> {
    let mask = 1u16 << bit;
    words.iter().map(|w| u8::from(w & mask != 0)).collect()
}

/// Samples where the line goes from 0 to 1. A line that is high at
/// sample 0 counts as rising there.
pub fn rising_edges(bits: &[u8]) -> Vec<usize> {
    let mut previous = 0u8;
    let mut edges = Vec::new();
    for (i, &bit) in bits.iter().enumerate() {
        if bit != 0 && previous == 0 {
            edges.push(i);
        }
        previous = bit;
    }
    edges
}

/// Edges for coded pulses: "on" samples closer than `min_gap` to the
/// previous "on" sample belong to the same edge.
pub fn clustered_edges(bits: &[u8], min_gap: usize) -> Vec<usize> {
    let mut edges = Vec::new();
    let mut last_on: Option<usize> = None;
    for (i, _) in bits.iter().enumerate().filter(|&(_, &b)| b != 0) {
        match last_on {
            Some(prev) if i - prev < min_gap => {}
            _ => edges.push(i),
        }
        last_on = Some(i);
    }
    edges
}

/// Packs `code` into `bits_per_char`-bit values, most significant bit first.
/// Trailing bits that do not fill a whole char are ignored.
pub fn binary_converter(code: &[u8], bits_per_char: usize) -> Result<Vec<u8>, CodeError> {
    if bits_per_char == 0 || bits_per_char > 8 {
        return Err(CodeError::InvalidWidth(bits_per_char));
    }
    Ok(code
        .chunks_exact(bits_per_char)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | (bit & 1)))
        .collect())
}

fn decode_code(bits: &[u8], edge: usize, code: CodeDecoding) -> Result<Vec<u8>, CodeError> {
    let available = bits.len() - edge;
    if code.code_length > available {
        return Err(CodeError::WindowPastEnd {
            edge,
            needed: code.code_length,
            available,
        });
    }
    binary_converter(&bits[edge..edge + code.code_length], code.bits_per_char)
}

/// Extracts the rising edges of one channel. Returns `None` when the
/// channel never rises; such channels get no event object at all.
pub fn extract_events(
    bits: &[u8],
    sampling_rate: f64,
    channel: &ChannelDescriptor,
    code: Option<CodeDecoding>,
) -> Option<ChannelEvents> {
    let sample_indexes = match code {
        Some(code) => clustered_edges(bits, code.code_length),
        None => rising_edges(bits),
    };
    if sample_indexes.is_empty() {
        return None;
    }

    let codes = match code {
        Some(code) => sample_indexes
            .iter()
            .map(|&edge| {
                match decode_code(bits, edge, code) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!("{}: dropping code at sample {}: {}", channel.native_channel_name, edge, e);
                        None
                    }
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let times = sample_indexes
        .iter()
        .map(|&i| i as f64 / sampling_rate)
        .collect();

    Some(ChannelEvents {
        native_order: channel.native_order,
        channel_name: channel.native_channel_name.clone(),
        sample_indexes,
        times,
        codes,
    })
}
