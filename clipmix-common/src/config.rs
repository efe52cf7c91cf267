//! Configuration loading and config file resolution
//!
//! clipmix reads a small TOML file for its tunables. Every field has a
//! built-in default, so a missing file (or a file with only some keys) is
//! never an error.
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config file (`<config dir>/clipmix/config.toml`)
//! 4. Built-in defaults (fallback)

use crate::timing::{OUTPUT_BITRATE_KBPS, OUTPUT_SAMPLE_RATE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CLIPMIX_CONFIG";

/// Upper bound the UI places on the crossfade slider (seconds)
pub const MAX_CROSSFADE_SECONDS: f64 = 12.0;

/// Canonical block size of the target codec (frames per channel)
pub const DEFAULT_BLOCK_FRAMES: usize = 1152;

/// Encoder progress is reported every this many blocks
pub const DEFAULT_PROGRESS_INTERVAL_BLOCKS: usize = 50;

/// RMS level the loudness analyzer normalizes towards
pub const DEFAULT_TARGET_RMS: f32 = 0.15;

/// Output container of the merged track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MPEG-1 Layer III, 128 kbps CBR
    #[default]
    Mp3,
    /// Uncompressed 16-bit PCM WAV
    Wav,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Wav => "wav",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(OutputFormat::Mp3),
            "wav" => Ok(OutputFormat::Wav),
            other => Err(Error::InvalidInput(format!("Unknown output format '{}'", other))),
        }
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipmixConfig {
    pub mix: MixSettings,
    pub encoder: EncoderSettings,
    pub logging: LoggingConfig,
}

/// Mixing defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixSettings {
    /// Default crossfade between adjacent clips (seconds)
    pub crossfade_seconds: f64,

    /// Target RMS for loudness normalization
    pub target_rms: f32,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            crossfade_seconds: 2.0,
            target_rms: DEFAULT_TARGET_RMS,
        }
    }
}

/// Chunked encoder tunables
///
/// Output sample rate and bitrate are fixed, not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub block_frames: usize,
    pub progress_interval_blocks: usize,
    pub format: OutputFormat,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            progress_interval_blocks: DEFAULT_PROGRESS_INTERVAL_BLOCKS,
            format: OutputFormat::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ClipmixConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClipmixConfig = toml::from_str(content)?;
        config.validated()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Output sample rate (fixed)
    pub fn output_sample_rate(&self) -> u32 {
        OUTPUT_SAMPLE_RATE
    }

    /// Output bitrate in kbps (fixed)
    pub fn output_bitrate_kbps(&self) -> u32 {
        OUTPUT_BITRATE_KBPS
    }

    /// Clamp soft limits and reject values the pipeline cannot run with
    fn validated(mut self) -> Result<Self> {
        if !self.mix.crossfade_seconds.is_finite() {
            return Err(Error::Config("mix.crossfade_seconds must be finite".to_string()));
        }
        let clamped = self.mix.crossfade_seconds.clamp(0.0, MAX_CROSSFADE_SECONDS);
        if clamped != self.mix.crossfade_seconds {
            warn!(
                requested = self.mix.crossfade_seconds,
                clamped,
                "Crossfade outside [0, {}] seconds, clamping",
                MAX_CROSSFADE_SECONDS
            );
            self.mix.crossfade_seconds = clamped;
        }

        if !(self.mix.target_rms.is_finite() && self.mix.target_rms > 0.0) {
            return Err(Error::Config(format!(
                "mix.target_rms must be positive, got {}",
                self.mix.target_rms
            )));
        }
        if self.encoder.block_frames == 0 {
            return Err(Error::Config("encoder.block_frames must be > 0".to_string()));
        }
        if self.encoder.progress_interval_blocks == 0 {
            return Err(Error::Config(
                "encoder.progress_interval_blocks must be > 0".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Resolve which config file to read, if any.
///
/// Returns `None` when no candidate exists; callers fall back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config file
    default_config_path().filter(|p| p.exists())
}

/// Load configuration using the resolution order above.
///
/// An explicitly named file (CLI or environment) that fails to load is an
/// error; a missing default file is not.
pub fn load_config(cli_arg: Option<&Path>, env_var_name: &str) -> Result<ClipmixConfig> {
    match resolve_config_path(cli_arg, env_var_name) {
        Some(path) => ClipmixConfig::load(&path),
        None => {
            debug!("No config file found, using built-in defaults");
            Ok(ClipmixConfig::default())
        }
    }
}

/// Get default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clipmix").join("config.toml"))
}
