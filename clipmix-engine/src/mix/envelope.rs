//! Breakpoint gain envelopes
//!
//! A clip's gain over the timeline is a short list of `(time, gain)`
//! breakpoints. Between two breakpoints the gain follows the envelope's
//! fade curve (linear by default); before the first and after the last it
//! holds.

use clipmix_common::FadeCurve;

/// One envelope breakpoint, time in timeline seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub time: f64,
    pub gain: f32,
}

/// Piecewise gain automation for one clip
#[derive(Debug, Clone, PartialEq)]
pub struct GainEnvelope {
    points: Vec<Breakpoint>,
    curve: FadeCurve,
}

impl GainEnvelope {
    /// Empty envelope (evaluates to unity) using `curve` for ramps
    pub fn new(curve: FadeCurve) -> Self {
        Self { points: Vec::with_capacity(4), curve }
    }

    /// Append a breakpoint.
    ///
    /// Breakpoints must be pushed in time order; a time earlier than the
    /// previous breakpoint is moved up to it.
    pub fn push(&mut self, time: f64, gain: f32) {
        let time = match self.points.last() {
            Some(last) if time < last.time => last.time,
            _ => time,
        };
        self.points.push(Breakpoint { time, gain });
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.points
    }

    pub fn curve(&self) -> FadeCurve {
        self.curve
    }

    /// Gain at timeline position `t` (seconds)
    pub fn gain_at(&self, t: f64) -> f32 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 1.0,
        };
        if t <= first.time {
            return first.gain;
        }
        if t >= last.time {
            return last.gain;
        }

        // Find the segment containing t; at most a handful of points
        let idx = self.points.partition_point(|p| p.time <= t);
        let a = self.points[idx - 1];
        let b = self.points[idx];
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.gain;
        }
        let position = ((t - a.time) / span) as f32;

        if b.gain >= a.gain {
            a.gain + (b.gain - a.gain) * self.curve.calculate_fade_in(position)
        } else {
            b.gain + (a.gain - b.gain) * self.curve.calculate_fade_out(position)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(curve: FadeCurve) -> GainEnvelope {
        let mut env = GainEnvelope::new(curve);
        env.push(0.0, 0.0);
        env.push(2.0, 1.0);
        env.push(8.0, 1.0);
        env.push(10.0, 0.0);
        env
    }

    #[test]
    fn test_empty_is_unity() {
        assert_eq!(GainEnvelope::new(FadeCurve::Linear).gain_at(3.0), 1.0);
    }

    #[test]
    fn test_single_breakpoint_holds() {
        let mut env = GainEnvelope::new(FadeCurve::Linear);
        env.push(0.0, 0.7);
        assert_eq!(env.gain_at(-5.0), 0.7);
        assert_eq!(env.gain_at(1e6), 0.7);
    }

    #[test]
    fn test_linear_interpolation() {
        let env = ramp(FadeCurve::Linear);
        assert_eq!(env.gain_at(0.0), 0.0);
        assert!((env.gain_at(1.0) - 0.5).abs() < 1e-6);
        assert_eq!(env.gain_at(5.0), 1.0);
        assert!((env.gain_at(9.0) - 0.5).abs() < 1e-6);
        assert!((env.gain_at(9.5) - 0.25).abs() < 1e-6);
        assert_eq!(env.gain_at(10.0), 0.0);
        assert_eq!(env.gain_at(11.0), 0.0);
    }

    #[test]
    fn test_curve_shapes_ramps() {
        let env = ramp(FadeCurve::EqualPower);
        let mid = env.gain_at(1.0);
        assert!((mid - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        // Fade-out of an equal-power ramp mirrors the fade-in
        assert!((env.gain_at(9.0) - mid).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_order_push_is_clamped() {
        let mut env = GainEnvelope::new(FadeCurve::Linear);
        env.push(5.0, 1.0);
        env.push(3.0, 0.0);
        assert_eq!(env.breakpoints()[1].time, 5.0);
        assert_eq!(env.gain_at(6.0), 0.0);
    }
}
