//! Procedural ambient noise
//!
//! Synthesizes stereo 44.1kHz beds from a base colour (white, pink, brown)
//! plus optional biquad shaping. Used for intro/outro beds in a merge and
//! for standalone WAV export.

pub mod filter;
pub mod generators;

use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use clipmix_common::timing::{seconds_to_frames, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use filter::Biquad;
use generators::NoiseColor;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Noise preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseKind {
    White,
    Pink,
    Brown,
    LightRain,
    HeavyRain,
    River,
    Thunder,
}

/// Shaping stage applied after the base colour
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Lowpass(f64),
    Highpass(f64),
}

impl NoiseKind {
    pub fn all_variants() -> &'static [NoiseKind] {
        &[
            NoiseKind::White,
            NoiseKind::Pink,
            NoiseKind::Brown,
            NoiseKind::LightRain,
            NoiseKind::HeavyRain,
            NoiseKind::River,
            NoiseKind::Thunder,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseKind::White => "white",
            NoiseKind::Pink => "pink",
            NoiseKind::Brown => "brown",
            NoiseKind::LightRain => "light-rain",
            NoiseKind::HeavyRain => "heavy-rain",
            NoiseKind::River => "river",
            NoiseKind::Thunder => "thunder",
        }
    }

    /// Base colour the preset starts from
    pub fn color(&self) -> NoiseColor {
        match self {
            NoiseKind::White => NoiseColor::White,
            NoiseKind::Pink | NoiseKind::LightRain | NoiseKind::HeavyRain => NoiseColor::Pink,
            NoiseKind::Brown | NoiseKind::River | NoiseKind::Thunder => NoiseColor::Brown,
        }
    }

    /// Output gain of the preset
    pub fn gain(&self) -> f32 {
        match self {
            NoiseKind::White | NoiseKind::Pink | NoiseKind::Brown => 0.5,
            NoiseKind::LightRain => 0.6,
            NoiseKind::HeavyRain => 0.8,
            NoiseKind::River => 0.7,
            // Constant low rumble, no strike events
            NoiseKind::Thunder => 1.0,
        }
    }

    fn shaping(&self) -> &'static [Shape] {
        match self {
            NoiseKind::White | NoiseKind::Pink | NoiseKind::Brown => &[],
            NoiseKind::LightRain => &[Shape::Lowpass(800.0)],
            NoiseKind::HeavyRain => &[Shape::Lowpass(2500.0)],
            NoiseKind::River => &[Shape::Lowpass(1000.0), Shape::Highpass(200.0)],
            NoiseKind::Thunder => &[Shape::Lowpass(150.0)],
        }
    }
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NoiseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        NoiseKind::all_variants()
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Unknown noise kind '{}' (expected one of: {})",
                    s,
                    NoiseKind::all_variants()
                        .iter()
                        .map(NoiseKind::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Synthesize a stereo 44.1kHz noise bed with thread-local randomness.
pub fn synthesize(kind: NoiseKind, duration_seconds: f64) -> Result<AudioBuffer> {
    synthesize_with_rng(kind, duration_seconds, &mut rand::thread_rng())
}

/// Synthesize with a caller-supplied RNG (seed it for reproducible output).
///
/// Each channel gets independent noise and its own filter state.
///
/// # Errors
/// `InvalidInput` when the duration is not a positive finite number.
pub fn synthesize_with_rng<R: Rng + ?Sized>(
    kind: NoiseKind,
    duration_seconds: f64,
    rng: &mut R,
) -> Result<AudioBuffer> {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "Noise duration must be a positive number of seconds, got {}",
            duration_seconds
        )));
    }

    let frames = seconds_to_frames(duration_seconds, OUTPUT_SAMPLE_RATE);
    let color = kind.color();
    let gain = kind.gain();

    let mut channels = Vec::with_capacity(OUTPUT_CHANNELS);
    for _ in 0..OUTPUT_CHANNELS {
        let mut samples = vec![0.0f32; frames];
        color.fill(rng, &mut samples);

        for shape in kind.shaping() {
            let mut biquad = match *shape {
                Shape::Lowpass(hz) => Biquad::lowpass(hz, OUTPUT_SAMPLE_RATE),
                Shape::Highpass(hz) => Biquad::highpass(hz, OUTPUT_SAMPLE_RATE),
            };
            biquad.process_slice(&mut samples);
        }

        for s in samples.iter_mut() {
            *s *= gain;
        }
        channels.push(samples);
    }

    debug!(kind = %kind, frames, "Synthesized noise bed");

    AudioBuffer::new(OUTPUT_SAMPLE_RATE, channels)
}
