//! In-memory WAV fixture generation
//!
//! Builds small 16-bit PCM WAV blobs with known content so tests can feed
//! the decoder and the pipeline without touching the file system.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

/// Default fixture sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

fn write_wav(sample_rate: u32, channels: u16, frames: usize, sample: impl Fn(usize, u16) -> f32) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for frame in 0..frames {
            for ch in 0..channels {
                let value = (sample(frame, ch).clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    bytes
}

fn frames_for(sample_rate: u32, duration_ms: u64) -> usize {
    (sample_rate as u64 * duration_ms / 1000) as usize
}

/// Silent WAV
pub fn silent_wav(sample_rate: u32, channels: u16, duration_ms: u64) -> Vec<u8> {
    write_wav(sample_rate, channels, frames_for(sample_rate, duration_ms), |_, _| 0.0)
}

/// Sine WAV, same signal on every channel
pub fn sine_wav(sample_rate: u32, channels: u16, duration_ms: u64, frequency_hz: f32, amplitude: f32) -> Vec<u8> {
    write_wav(sample_rate, channels, frames_for(sample_rate, duration_ms), |frame, _| {
        let t = frame as f32 / sample_rate as f32;
        amplitude * (2.0 * PI * frequency_hz * t).sin()
    })
}

/// Constant-level WAV (a DC offset), handy for checking gains exactly
pub fn constant_wav(sample_rate: u32, channels: u16, duration_ms: u64, level: f32) -> Vec<u8> {
    write_wav(sample_rate, channels, frames_for(sample_rate, duration_ms), |_, _| level)
}

/// Stereo WAV with different constant levels per side
pub fn split_stereo_wav(sample_rate: u32, duration_ms: u64, left: f32, right: f32) -> Vec<u8> {
    write_wav(sample_rate, 2, frames_for(sample_rate, duration_ms), |_, ch| if ch == 0 { left } else { right })
}
