//! Frame/second conversions for the mixing timeline
//!
//! The pipeline keeps clip durations and crossfades in seconds (`f64`) and
//! converts to frame indices only when touching sample buffers. A *frame* is
//! one sample per channel.
//!
//! # Examples
//!
//! ```rust
//! use clipmix_common::timing::*;
//!
//! assert_eq!(seconds_to_frames(2.0, OUTPUT_SAMPLE_RATE), 88_200);
//! assert_eq!(seconds_to_frames_ceil(0.00001, OUTPUT_SAMPLE_RATE), 1);
//! assert_eq!(frames_to_seconds(44_100, OUTPUT_SAMPLE_RATE), 1.0);
//! ```

/// Fixed output sample rate of every rendered composite (Hz)
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Fixed output channel count (stereo)
pub const OUTPUT_CHANNELS: usize = 2;

/// Fixed target bitrate of the compressed output (kbps)
pub const OUTPUT_BITRATE_KBPS: u32 = 128;

/// Convert seconds to the nearest frame index.
///
/// Negative and non-finite inputs map to frame 0.
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}

/// Convert seconds to a frame count, rounding up to whole frames.
///
/// Used for buffer lengths so a partial trailing frame is never dropped.
/// A tiny epsilon absorbs float noise (e.g. `18.000000000000004 s`).
pub fn seconds_to_frames_ceil(seconds: f64, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    let exact = seconds * sample_rate as f64;
    (exact - 1e-6).ceil().max(0.0) as usize
}

/// Convert a frame count to seconds.
pub fn frames_to_seconds(frames: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    frames as f64 / sample_rate as f64
}
