//! RMS-based loudness normalization
//!
//! Computes a per-clip gain that brings its RMS level toward a target so
//! clips recorded at different levels sit together in the mix.

use crate::audio::types::AudioBuffer;
use tracing::debug;

/// Target RMS used when the caller does not configure one
pub const DEFAULT_TARGET_RMS: f32 = clipmix_common::config::DEFAULT_TARGET_RMS;

/// Lowest gain the analyzer will return
pub const MIN_GAIN: f32 = 0.1;

/// Highest gain the analyzer will return
pub const MAX_GAIN: f32 = 3.0;

/// Only every Nth sample contributes to the estimate
const SAMPLE_STRIDE: usize = 4;

/// Loudness analyzer
#[derive(Debug, Clone, Copy)]
pub struct LoudnessAnalyzer {
    target_rms: f32,
}

impl Default for LoudnessAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_RMS)
    }
}

impl LoudnessAnalyzer {
    pub fn new(target_rms: f32) -> Self {
        Self { target_rms }
    }

    pub fn target_rms(&self) -> f32 {
        self.target_rms
    }

    /// RMS of the first channel, sampling every 4th frame.
    ///
    /// An empty buffer has RMS 0.
    pub fn rms(buffer: &AudioBuffer) -> f32 {
        let Some(samples) = buffer.channel(0) else {
            return 0.0;
        };

        let (sum, count) = samples
            .iter()
            .step_by(SAMPLE_STRIDE)
            .fold((0.0f64, 0usize), |(sum, count), &s| (sum + (s as f64) * (s as f64), count + 1));

        if count == 0 {
            return 0.0;
        }
        (sum / count as f64).sqrt() as f32
    }

    /// Normalization gain for one clip.
    ///
    /// Silence (RMS exactly 0) gets unity gain. Otherwise `target / rms`,
    /// clamped to `[0.1, 3.0]`. Never fails.
    pub fn analyze(&self, buffer: &AudioBuffer) -> f32 {
        let rms = Self::rms(buffer);
        let gain = if rms == 0.0 {
            1.0
        } else {
            (self.target_rms / rms).clamp(MIN_GAIN, MAX_GAIN)
        };

        debug!(rms, gain, target = self.target_rms, "Loudness analyzed");
        gain
    }
}

/// Normalization gain with the default target
pub fn analyze(buffer: &AudioBuffer) -> f32 {
    LoudnessAnalyzer::default().analyze(buffer)
}
