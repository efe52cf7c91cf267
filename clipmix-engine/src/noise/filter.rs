//! Biquad filters for noise shaping
//!
//! Audio EQ Cookbook (RBJ) lowpass/highpass with Butterworth Q. Coefficients
//! are computed in f64; the running state is per channel.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Butterworth Q (1/√2)
pub const Q_BUTTERWORTH: f64 = FRAC_1_SQRT_2;

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Lowpass at `cutoff` Hz
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let (cos_w, alpha) = Self::prewarp(cutoff, q, sample_rate);
        let b1 = 1.0 - cos_w;
        Self::normalize(b1 / 2.0, b1, b1 / 2.0, cos_w, alpha)
    }

    /// Highpass at `cutoff` Hz
    pub fn highpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let (cos_w, alpha) = Self::prewarp(cutoff, q, sample_rate);
        let b1 = -(1.0 + cos_w);
        Self::normalize(-b1 / 2.0, b1, -b1 / 2.0, cos_w, alpha)
    }

    fn prewarp(cutoff: f64, q: f64, sample_rate: f64) -> (f64, f64) {
        // Keep the cutoff strictly inside (0, Nyquist)
        let nyquist = sample_rate / 2.0;
        let cutoff = cutoff.clamp(1.0, nyquist * 0.999);
        let omega = 2.0 * PI * cutoff / sample_rate;
        (omega.cos(), omega.sin() / (2.0 * q.max(0.1)))
    }

    fn normalize(b0: f64, b1: f64, b2: f64, cos_w: f64, alpha: f64) -> Self {
        let a0 = 1.0 + alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Biquad in transposed direct form II
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self { coeffs, z1: 0.0, z2: 0.0 }
    }

    pub fn lowpass(cutoff: f64, sample_rate: u32) -> Self {
        Self::new(BiquadCoeffs::lowpass(cutoff, Q_BUTTERWORTH, sample_rate as f64))
    }

    pub fn highpass(cutoff: f64, sample_rate: u32) -> Self {
        Self::new(BiquadCoeffs::highpass(cutoff, Q_BUTTERWORTH, sample_rate as f64))
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let x = input as f64;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y as f32
    }

    /// Filter a slice in place
    pub fn process_slice(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(filter: &mut Biquad, input: impl Fn(usize) -> f32, n: usize) -> f32 {
        let mut last = 0.0;
        for i in 0..n {
            last = filter.process(input(i));
        }
        last
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut lp = Biquad::lowpass(800.0, 44100);
        let out = settle(&mut lp, |_| 1.0, 10_000);
        assert!((out - 1.0).abs() < 1e-3, "DC through lowpass = {}", out);
    }

    #[test]
    fn test_lowpass_blocks_nyquist() {
        let mut lp = Biquad::lowpass(800.0, 44100);
        let out = settle(&mut lp, |i| if i % 2 == 0 { 1.0 } else { -1.0 }, 10_000);
        assert!(out.abs() < 1e-3, "Nyquist through lowpass = {}", out);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut hp = Biquad::highpass(200.0, 44100);
        let out = settle(&mut hp, |_| 1.0, 20_000);
        assert!(out.abs() < 1e-3, "DC through highpass = {}", out);
    }
}
