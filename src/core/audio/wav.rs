//! WAV container encoding.
//!
//! Builds a self-contained RIFF/WAVE file from an ordered sequence of raw
//! PCM chunks. The layout is the canonical 44-byte header followed by the
//! PCM bytes in arrival order:
//!
//! | offset | field                                  |
//! |--------|----------------------------------------|
//! | 0..4   | `"RIFF"`                               |
//! | 4..8   | u32 LE: 36 + data size                 |
//! | 8..12  | `"WAVE"`                               |
//! | 12..16 | `"fmt "`                               |
//! | 16..20 | u32 LE: 16 (PCM subchunk size)         |
//! | 20..22 | u16 LE: 1 (PCM)                        |
//! | 22..24 | u16 LE: channels                       |
//! | 24..28 | u32 LE: sample rate                    |
//! | 28..32 | u32 LE: byte rate                      |
//! | 32..34 | u16 LE: block align                    |
//! | 34..36 | u16 LE: bits per sample                |
//! | 36..40 | `"data"`                               |
//! | 40..44 | u32 LE: data size                      |

use bytes::Bytes;

/// Sample rate the upstream provider emits PCM at.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Mono output.
pub const DEFAULT_CHANNELS: u16 = 1;

/// 16-bit signed little-endian samples.
pub const DEFAULT_BYTES_PER_SAMPLE: u16 = 2;

/// WAV header size in bytes.
pub const HEADER_SIZE: usize = 44;

/// Encode ordered PCM chunks into a complete WAV file.
///
/// Callers must not pass an empty chunk sequence; the turn aggregator
/// suppresses empty turns before encoding.
pub fn encode_wav(
    chunks: &[Bytes],
    sample_rate: u32,
    channels: u16,
    bytes_per_sample: u16,
) -> Vec<u8> {
    let bits_per_sample = bytes_per_sample * 8;
    let block_align = channels * bytes_per_sample;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_size: u32 = chunks.iter().map(|c| c.len() as u32).sum();
    let file_size = 36 + data_size;

    let mut wav = Vec::with_capacity(HEADER_SIZE + data_size as usize);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt subchunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // Subchunk1Size (16 for PCM)
    wav.extend_from_slice(&1u16.to_le_bytes()); // AudioFormat (1 = PCM)
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data subchunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for chunk in chunks {
        wav.extend_from_slice(chunk);
    }

    wav
}
