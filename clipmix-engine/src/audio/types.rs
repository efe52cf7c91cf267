//! Core audio data types
//!
//! Defines the planar float buffer passed between every pipeline stage.

use crate::error::{Error, Result};
use clipmix_common::timing::frames_to_seconds;

/// Decoded or rendered PCM audio.
///
/// **Format:**
/// - Samples are f32, nominally -1.0 to 1.0 (rendered mixes may exceed this)
/// - Planar: one `Vec<f32>` per channel, all of equal length
/// - Sample rate is whatever the producer emitted; only the renderer
///   guarantees the fixed output rate
///
/// Buffers are moved from stage to stage. Once built, the only mutation
/// offered is in-place, length-preserving processing of channel slices.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a buffer from per-channel sample vectors.
    ///
    /// # Errors
    /// - No channels
    /// - Zero sample rate
    /// - Channels of unequal length
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::InvalidInput("Audio buffer needs at least one channel".to_string()));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidInput("Sample rate must be > 0".to_string()));
        }
        let frames = channels[0].len();
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, c)| c.len() != frames) {
            return Err(Error::InvalidInput(format!(
                "Channel {} has {} frames, expected {}",
                idx,
                ch.len(),
                frames
            )));
        }

        Ok(Self { sample_rate, channels })
    }

    /// Create a silent buffer
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: vec![vec![0.0; frames]; channel_count.max(1)],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Get duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        frames_to_seconds(self.frames(), self.sample_rate)
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Mutable channel slices for in-place processing (filters, gain)
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Multiply every sample by `gain`
    pub fn apply_gain(&mut self, gain: f32) {
        for ch in self.channels_mut() {
            for s in ch.iter_mut() {
                *s *= gain;
            }
        }
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Map to exactly two channels.
    ///
    /// Mono is duplicated to both sides; anything wider keeps its first two
    /// channels.
    pub fn into_stereo(self) -> Self {
        let sample_rate = self.sample_rate;
        let mut channels = self.channels;
        match channels.len() {
            1 => {
                let mono = channels.remove(0);
                Self { sample_rate, channels: vec![mono.clone(), mono] }
            }
            2 => Self { sample_rate, channels },
            _ => {
                channels.truncate(2);
                Self { sample_rate, channels }
            }
        }
    }

    /// Peak absolute sample value over all channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}
