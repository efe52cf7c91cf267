//! Engine runtime settings
//!
//! Typed views of `ClipmixConfig` handed to the renderer and encoder. Output
//! rate and bitrate come from constants, not from the file.

use clipmix_common::config::{
    ClipmixConfig, OutputFormat, DEFAULT_BLOCK_FRAMES, DEFAULT_PROGRESS_INTERVAL_BLOCKS,
    DEFAULT_TARGET_RMS, MAX_CROSSFADE_SECONDS,
};
use clipmix_common::timing::{OUTPUT_BITRATE_KBPS, OUTPUT_SAMPLE_RATE};

use crate::error::{Error, Result};

/// Mix parameters for one merge
#[derive(Debug, Clone, PartialEq)]
pub struct MixConfig {
    pub crossfade_seconds: f64,
    pub output_sample_rate: u32,
    pub bitrate_kbps: u32,
    pub target_rms: f32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            crossfade_seconds: 2.0,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            bitrate_kbps: OUTPUT_BITRATE_KBPS,
            target_rms: DEFAULT_TARGET_RMS,
        }
    }
}

impl MixConfig {
    /// Crossfade bounded to what the UI offers, `[0, 12]` seconds
    pub fn bounded_crossfade(&self) -> f64 {
        if self.crossfade_seconds.is_finite() {
            self.crossfade_seconds.clamp(0.0, MAX_CROSSFADE_SECONDS)
        } else {
            0.0
        }
    }

    /// Reject values the renderer cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.target_rms.is_finite() || self.target_rms <= 0.0 {
            return Err(Error::Config(format!(
                "mix.target_rms must be a positive number, got {}",
                self.target_rms
            )));
        }
        if self.crossfade_seconds.is_nan() {
            return Err(Error::Config("mix.crossfade_seconds is not a number".to_string()));
        }
        Ok(())
    }
}

impl From<&ClipmixConfig> for MixConfig {
    fn from(config: &ClipmixConfig) -> Self {
        Self {
            crossfade_seconds: config.mix.crossfade_seconds,
            output_sample_rate: config.output_sample_rate(),
            bitrate_kbps: config.output_bitrate_kbps(),
            target_rms: config.mix.target_rms,
        }
    }
}

/// Chunked encoder parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub format: OutputFormat,
    pub bitrate_kbps: u32,
    /// Frames per encoder block
    pub block_frames: usize,
    /// Blocks between progress reports
    pub progress_interval_blocks: usize,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Mp3,
            bitrate_kbps: OUTPUT_BITRATE_KBPS,
            block_frames: DEFAULT_BLOCK_FRAMES,
            progress_interval_blocks: DEFAULT_PROGRESS_INTERVAL_BLOCKS,
        }
    }
}

impl EncodeSettings {
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

impl From<&ClipmixConfig> for EncodeSettings {
    fn from(config: &ClipmixConfig) -> Self {
        Self {
            format: config.encoder.format,
            bitrate_kbps: config.output_bitrate_kbps(),
            block_frames: config.encoder.block_frames.max(1),
            progress_interval_blocks: config.encoder.progress_interval_blocks.max(1),
        }
    }
}
