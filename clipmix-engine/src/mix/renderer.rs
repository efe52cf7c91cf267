//! Offline mix rendering
//!
//! Brings every clip to stereo 44.1kHz, schedules it, and sums all clips
//! into one composite buffer in a single additive pass. Output is not
//! limited; samples above full scale are clipped only when quantized.

use crate::audio::resampler::Resampler;
use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use crate::mix::scheduler::{schedule_with_curve, MixSchedule};
use clipmix_common::timing::{seconds_to_frames, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use clipmix_common::FadeCurve;
use tracing::{debug, info};

/// Convert a decoded clip to the output layout (stereo, 44.1kHz).
pub fn prepare_clip(buffer: AudioBuffer) -> Result<AudioBuffer> {
    let stereo = buffer.into_stereo();
    Resampler::resample(stereo, OUTPUT_SAMPLE_RATE)
}

/// Render clips with linear crossfades.
pub fn render(clips: Vec<AudioBuffer>, gains: &[f32], crossfade_seconds: f64) -> Result<AudioBuffer> {
    render_with_curve(clips, gains, crossfade_seconds, FadeCurve::Linear)
}

/// Render clips, shaping crossfade ramps with `curve`.
///
/// # Errors
/// `Render` for zero clips, mismatched gain count, or a failed resample.
pub fn render_with_curve(
    clips: Vec<AudioBuffer>,
    gains: &[f32],
    crossfade_seconds: f64,
    curve: FadeCurve,
) -> Result<AudioBuffer> {
    if clips.is_empty() {
        return Err(Error::Render("No clips to mix".to_string()));
    }
    if gains.len() != clips.len() {
        return Err(Error::Render(format!(
            "Got {} gains for {} clips",
            gains.len(),
            clips.len()
        )));
    }

    let prepared = clips
        .into_iter()
        .map(prepare_clip)
        .collect::<Result<Vec<_>>>()?;

    let durations: Vec<f64> = prepared.iter().map(AudioBuffer::duration_seconds).collect();
    let schedule = schedule_with_curve(&durations, gains, crossfade_seconds, curve)?;

    let composite = mix_down(&prepared, &schedule)?;

    info!(
        clips = prepared.len(),
        frames = composite.frames(),
        duration_seconds = schedule.total_duration,
        "Rendered composite"
    );

    Ok(composite)
}

/// Sum prepared clips into a fresh composite according to `schedule`.
///
/// Clips must already be stereo at the output rate (see `prepare_clip`).
/// Clip audio that falls past the composite's end is dropped.
pub fn mix_down(prepared: &[AudioBuffer], schedule: &MixSchedule) -> Result<AudioBuffer> {
    if prepared.len() != schedule.placements.len() {
        return Err(Error::Render(format!(
            "Schedule has {} placements for {} clips",
            schedule.placements.len(),
            prepared.len()
        )));
    }

    let rate = OUTPUT_SAMPLE_RATE;
    let out_frames = schedule.output_frames(rate);
    let mut out = vec![vec![0.0f32; out_frames]; OUTPUT_CHANNELS];

    for (clip, placement) in prepared.iter().zip(&schedule.placements) {
        let start_frame = seconds_to_frames(placement.start, rate);
        if start_frame >= out_frames {
            continue;
        }
        let frames = clip.frames().min(out_frames - start_frame);

        debug!(
            start_frame,
            frames,
            fade = placement.fade,
            "Mixing clip"
        );

        for k in 0..frames {
            let t = placement.start + k as f64 / rate as f64;
            let gain = placement.envelope.gain_at(t);
            if gain == 0.0 {
                continue;
            }
            for (dst, src) in out.iter_mut().zip(clip.channels()) {
                dst[start_frame + k] += src[k] * gain;
            }
        }
    }

    AudioBuffer::new(rate, out)
}
