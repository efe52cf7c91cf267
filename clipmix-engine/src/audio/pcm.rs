//! Float to 16-bit PCM conversion
//!
//! Shared by the chunked encoder and the WAV writer so both produce the
//! same integer samples for the same float input.

use crate::audio::types::AudioBuffer;

/// Quantize one float sample to i16.
///
/// `round(clamp(x, -1, 1) * (x < 0 ? 32768 : 32767))`: the asymmetric scale
/// maps -1.0 to `i16::MIN` and 1.0 to `i16::MAX`. This is the only place
/// where a hot mix gets hard-clipped. NaN quantizes to silence.
#[inline]
pub fn quantize_sample(x: f32) -> i16 {
    if x.is_nan() {
        return 0;
    }
    let c = x.clamp(-1.0, 1.0);
    let scale = if c < 0.0 { 32768.0 } else { 32767.0 };
    (c * scale).round() as i16
}

/// Append frames `[start, end)` of `buffer` to `out`, interleaved and
/// quantized (`L R L R ...` for stereo).
pub fn interleave_block(buffer: &AudioBuffer, start: usize, end: usize, out: &mut Vec<i16>) {
    let end = end.min(buffer.frames());
    if start >= end {
        return;
    }
    let channels = buffer.channels();
    out.reserve((end - start) * channels.len());
    for frame in start..end {
        for ch in channels {
            out.push(quantize_sample(ch[frame]));
        }
    }
}
