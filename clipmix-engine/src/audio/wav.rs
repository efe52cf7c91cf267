//! WAV writing
//!
//! Canonical 44-byte RIFF/WAVE header followed by interleaved little-endian
//! 16-bit PCM. Used for noise-bed export and for the WAV output format of the
//! chunked encoder.

use crate::audio::pcm::interleave_block;
use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use std::io::Write;

/// Size of the canonical PCM header
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;

/// WAV format parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl WavFormat {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self { channels, sample_rate }
    }

    /// Bytes per second
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * 2
    }

    /// Bytes per frame
    pub fn block_align(&self) -> u16 {
        self.channels * 2
    }
}

/// Write the 44-byte header for `data_len` bytes of PCM.
pub fn write_wav_header<W: Write>(writer: &mut W, format: &WavFormat, data_len: u32) -> Result<()> {
    let riff_size = data_len
        .checked_add(36)
        .ok_or_else(|| Error::Encode("WAV data exceeds 4 GiB".to_string()))?;

    // RIFF header
    writer.write_all(b"RIFF")?;
    writer.write_all(&riff_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // fmt chunk
    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?; // Chunk size (16 for PCM)
    writer.write_all(&1u16.to_le_bytes())?; // Audio format (1 = PCM)
    writer.write_all(&format.channels.to_le_bytes())?;
    writer.write_all(&format.sample_rate.to_le_bytes())?;
    writer.write_all(&format.byte_rate().to_le_bytes())?;
    writer.write_all(&format.block_align().to_le_bytes())?;
    writer.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    // data chunk
    writer.write_all(b"data")?;
    writer.write_all(&data_len.to_le_bytes())?;
    Ok(())
}

/// PCM payload size in bytes for `frames` frames of `channels` channels
pub fn pcm_data_len(frames: usize, channels: usize) -> Result<u32> {
    frames
        .checked_mul(channels)
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::Encode("WAV data exceeds 4 GiB".to_string()))
}

/// Encode a whole buffer as a WAV file.
///
/// Output length is exactly `44 + frames * channels * 2`.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let channels = u16::try_from(buffer.channel_count())
        .map_err(|_| Error::Encode("Too many channels for WAV".to_string()))?;
    let format = WavFormat::new(channels, buffer.sample_rate());
    let data_len = pcm_data_len(buffer.frames(), buffer.channel_count())?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    write_wav_header(&mut out, &format, data_len)?;

    let mut pcm = Vec::new();
    interleave_block(buffer, 0, buffer.frames(), &mut pcm);
    for s in pcm {
        out.extend_from_slice(&s.to_le_bytes());
    }

    Ok(out)
}
