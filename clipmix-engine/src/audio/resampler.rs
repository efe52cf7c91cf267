//! Audio resampling using rubato
//!
//! Converts decoded clips to the fixed 44.1kHz output rate before they are
//! placed on the mix timeline.

use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler using rubato for sample rate conversion.
pub struct Resampler;

impl Resampler {
    /// Resample a planar buffer to `output_rate`.
    ///
    /// # Notes
    /// If the buffer is already at `output_rate` it is returned untouched
    /// (no copy).
    pub fn resample(buffer: AudioBuffer, output_rate: u32) -> Result<AudioBuffer> {
        let input_rate = buffer.sample_rate();

        // If already at target rate, return as is
        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(buffer);
        }
        if output_rate == 0 {
            return Err(Error::Render("Output sample rate must be > 0".to_string()));
        }

        let channels = buffer.channel_count();
        let input_frames = buffer.frames();

        if input_frames == 0 {
            return Ok(AudioBuffer::silent(output_rate, channels, 0));
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels, {} frames)",
            input_rate, output_rate, channels, input_frames
        );

        let ratio = output_rate as f64 / input_rate as f64;
        let mut resampler = Self::create_resampler(ratio, channels, input_frames)?;

        let planar_input = buffer.into_channels();
        let mut planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Render(format!("Resampling failed: {}", e)))?;

        // Trim/pad to the exact expected length so clip durations survive
        // the rate change
        let expected_frames = (input_frames as f64 * ratio).round() as usize;
        for ch in planar_output.iter_mut() {
            ch.resize(expected_frames, 0.0);
        }

        debug!(
            "Resampled {} input frames to {} output frames",
            input_frames, expected_frames
        );

        AudioBuffer::new(output_rate, planar_output)
    }

    /// Create a rubato resampler.
    ///
    /// Uses FastFixedIn (polynomial interpolation) with the whole clip as a
    /// single chunk.
    fn create_resampler(
        ratio: f64,
        channels: usize,
        chunk_size: usize,
    ) -> Result<FastFixedIn<f32>> {
        FastFixedIn::<f32>::new(
            ratio,
            1.0, // max_relative_ratio (no runtime changes)
            PolynomialDegree::Septic,
            chunk_size,
            channels,
        )
        .map_err(|e| Error::Render(format!("Failed to create resampler: {}", e)))
    }
}
