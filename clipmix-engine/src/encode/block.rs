//! Block encoders
//!
//! A `BlockEncoder` consumes interleaved i16 PCM one block at a time and
//! appends whatever compressed bytes it has ready. `finish` flushes
//! trailing state. Implementations are created on the encoder worker
//! thread and never leave it.

use crate::audio::wav::{pcm_data_len, write_wav_header, WavFormat};
use crate::error::{Error, Result};
use mp3lame_encoder::{Bitrate, Builder, Encoder, FlushNoGap, InterleavedPcm, Quality};
use std::mem::MaybeUninit;
use tracing::debug;

/// Shape of the PCM stream handed to an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
    /// Frames the stream will contain in total
    pub total_frames: usize,
    pub bitrate_kbps: u32,
}

/// Incremental PCM-to-bytes encoder
pub trait BlockEncoder {
    /// Encode one interleaved block, appending output to `out`
    fn encode_block(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> Result<()>;

    /// Flush trailing state, appending output to `out`
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<()>;
}

/// Sample rates LAME accepts for MPEG-1/2/2.5 Layer III
const MP3_SAMPLE_RATES: [u32; 9] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

/// LAME CBR encoder for interleaved stereo
pub struct Mp3BlockEncoder {
    encoder: Encoder,
    scratch: Vec<MaybeUninit<u8>>,
}

impl Mp3BlockEncoder {
    pub fn new(format: &StreamFormat) -> Result<Self> {
        if format.channels != 2 {
            return Err(Error::Encode(format!(
                "MP3 encoder expects interleaved stereo, got {} channels",
                format.channels
            )));
        }
        if !MP3_SAMPLE_RATES.contains(&format.sample_rate) {
            return Err(Error::Encode(format!(
                "Unsupported MP3 sample rate: {}Hz",
                format.sample_rate
            )));
        }

        let mut builder =
            Builder::new().ok_or_else(|| Error::Encode("Failed to create LAME encoder".to_string()))?;

        builder
            .set_sample_rate(format.sample_rate)
            .map_err(|e| Error::Encode(format!("Invalid sample rate: {:?}", e)))?;
        builder
            .set_num_channels(format.channels as u8)
            .map_err(|e| Error::Encode(format!("Invalid channel count: {:?}", e)))?;
        builder
            .set_brate(bitrate_for(format.bitrate_kbps))
            .map_err(|e| Error::Encode(format!("Failed to set bitrate: {:?}", e)))?;
        builder
            .set_quality(Quality::Best)
            .map_err(|e| Error::Encode(format!("Failed to set quality: {:?}", e)))?;

        let encoder = builder
            .build()
            .map_err(|e| Error::Encode(format!("Failed to build encoder: {:?}", e)))?;

        debug!(
            sample_rate = format.sample_rate,
            bitrate_kbps = format.bitrate_kbps,
            "LAME encoder ready"
        );

        Ok(Self { encoder, scratch: Vec::new() })
    }

    /// Worst-case MP3 output for `samples` input samples per channel
    fn max_output_size(samples: usize) -> usize {
        (samples as f64 * 1.25) as usize + 7200
    }

    fn drain_scratch(&self, len: usize, out: &mut Vec<u8>) {
        // SAFETY: LAME reported `len` bytes written at the start of `scratch`
        out.extend(self.scratch[..len].iter().map(|b| unsafe { b.assume_init() }));
    }
}

impl BlockEncoder for Mp3BlockEncoder {
    fn encode_block(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> Result<()> {
        if pcm.len() % 2 != 0 {
            return Err(Error::Encode("Interleaved stereo block has odd length".to_string()));
        }
        let needed = Self::max_output_size(pcm.len() / 2);
        if self.scratch.len() < needed {
            self.scratch.resize(needed, MaybeUninit::uninit());
        }

        let written = self
            .encoder
            .encode(InterleavedPcm(pcm), &mut self.scratch)
            .map_err(|e| Error::Encode(format!("MP3 encoding failed: {:?}", e)))?;
        self.drain_scratch(written, out);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let needed = Self::max_output_size(0);
        if self.scratch.len() < needed {
            self.scratch.resize(needed, MaybeUninit::uninit());
        }

        let written = self
            .encoder
            .flush::<FlushNoGap>(&mut self.scratch)
            .map_err(|e| Error::Encode(format!("MP3 flush failed: {:?}", e)))?;
        self.drain_scratch(written, out);
        Ok(())
    }
}

fn bitrate_for(kbps: u32) -> Bitrate {
    match kbps {
        0..=96 => Bitrate::Kbps96,
        97..=112 => Bitrate::Kbps112,
        113..=128 => Bitrate::Kbps128,
        129..=160 => Bitrate::Kbps160,
        161..=192 => Bitrate::Kbps192,
        193..=224 => Bitrate::Kbps224,
        225..=256 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

/// 16-bit PCM WAV writer.
///
/// The header is emitted with the first block using the precomputed stream
/// length, so the output is byte-identical to `encode_wav`.
pub struct WavBlockEncoder {
    format: WavFormat,
    data_len: u32,
    header_written: bool,
}

impl WavBlockEncoder {
    pub fn new(format: &StreamFormat) -> Result<Self> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(Error::Encode("WAV stream needs channels and a sample rate".to_string()));
        }
        Ok(Self {
            format: WavFormat::new(format.channels, format.sample_rate),
            data_len: pcm_data_len(format.total_frames, format.channels as usize)?,
            header_written: false,
        })
    }

    fn ensure_header(&mut self, out: &mut Vec<u8>) -> Result<()> {
        if !self.header_written {
            write_wav_header(out, &self.format, self.data_len)?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl BlockEncoder for WavBlockEncoder {
    fn encode_block(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> Result<()> {
        self.ensure_header(out)?;
        out.reserve(pcm.len() * 2);
        for s in pcm {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        // An empty stream is still a valid file
        self.ensure_header(out)
    }
}
