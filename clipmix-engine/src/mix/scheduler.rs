//! Timeline placement
//!
//! Turns clip durations, gains and a crossfade length into start times and
//! gain envelopes. Pure arithmetic: nothing here touches samples, so the
//! result can be inspected (or printed by `--dry-run`) before rendering.

use crate::error::{Error, Result};
use crate::mix::envelope::GainEnvelope;
use clipmix_common::timing::seconds_to_frames_ceil;
use clipmix_common::FadeCurve;
use tracing::debug;

/// Shortest composite the scheduler will produce, in seconds
pub const MIN_OUTPUT_SECONDS: f64 = 1.0;

/// One clip's position on the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlacement {
    /// Timeline start (seconds)
    pub start: f64,
    /// Clip length (seconds)
    pub duration: f64,
    /// Effective fade length, `min(crossfade, duration / 2)`
    pub fade: f64,
    /// Gain automation in timeline seconds
    pub envelope: GainEnvelope,
}

impl ClipPlacement {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Placement of every clip plus the composite length
#[derive(Debug, Clone, PartialEq)]
pub struct MixSchedule {
    pub placements: Vec<ClipPlacement>,
    /// Composite length in seconds, `max(1, Σd − c(n−1))`
    pub total_duration: f64,
    /// Crossfade actually used after sanitizing
    pub crossfade: f64,
}

impl MixSchedule {
    /// Composite length in frames at `sample_rate`, rounded up
    pub fn output_frames(&self, sample_rate: u32) -> usize {
        seconds_to_frames_ceil(self.total_duration, sample_rate)
    }
}

/// Negative or non-finite crossfades mean "no crossfade"
pub fn sanitize_crossfade(crossfade_seconds: f64) -> f64 {
    if crossfade_seconds.is_finite() && crossfade_seconds > 0.0 {
        crossfade_seconds
    } else {
        0.0
    }
}

/// Schedule clips with linear fades.
pub fn schedule(durations: &[f64], gains: &[f32], crossfade_seconds: f64) -> Result<MixSchedule> {
    schedule_with_curve(durations, gains, crossfade_seconds, FadeCurve::Linear)
}

/// Schedule clips, shaping fade ramps with `curve`.
///
/// Clip *i* starts at the running cursor; its fade is `min(c, d/2)`. It
/// ramps in from silence unless it is first and ramps out to silence unless
/// it is last. The cursor then advances by `max(0, d − c)`.
///
/// # Errors
/// `Render` for an empty clip list, a gain count that differs from the clip
/// count, or a negative/non-finite duration or gain.
pub fn schedule_with_curve(
    durations: &[f64],
    gains: &[f32],
    crossfade_seconds: f64,
    curve: FadeCurve,
) -> Result<MixSchedule> {
    if durations.is_empty() {
        return Err(Error::Render("No clips to mix".to_string()));
    }
    if gains.len() != durations.len() {
        return Err(Error::Render(format!(
            "Got {} gains for {} clips",
            gains.len(),
            durations.len()
        )));
    }
    if let Some(d) = durations.iter().find(|d| !d.is_finite() || **d < 0.0) {
        return Err(Error::Render(format!("Invalid clip duration: {}", d)));
    }
    if let Some(g) = gains.iter().find(|g| !g.is_finite() || **g < 0.0) {
        return Err(Error::Render(format!("Invalid clip gain: {}", g)));
    }

    let c = sanitize_crossfade(crossfade_seconds);
    let last = durations.len() - 1;
    let mut cursor = 0.0f64;
    let mut placements = Vec::with_capacity(durations.len());

    for (i, (&d, &g)) in durations.iter().zip(gains).enumerate() {
        let start = cursor;
        let fade = c.min(d / 2.0);

        let mut envelope = GainEnvelope::new(curve);
        if i > 0 && fade > 0.0 {
            envelope.push(start, 0.0);
            envelope.push(start + fade, g);
        } else {
            envelope.push(start, g);
        }
        if i < last && fade > 0.0 {
            envelope.push(start + d - fade, g);
            envelope.push(start + d, 0.0);
        } else {
            envelope.push(start + d, g);
        }

        placements.push(ClipPlacement { start, duration: d, fade, envelope });
        cursor += (d - c).max(0.0);
    }

    let sum: f64 = durations.iter().sum();
    let total_duration = (sum - c * last as f64).max(MIN_OUTPUT_SECONDS);

    debug!(
        clips = durations.len(),
        crossfade = c,
        total_duration,
        "Scheduled mix"
    );

    Ok(MixSchedule { placements, total_duration, crossfade: c })
}
