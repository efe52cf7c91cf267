//! Coloured noise sources
//!
//! White noise is drawn straight from the RNG; pink and brown are
//! deterministic filters over a white input, so their state is plain data
//! and one instance serves exactly one channel of one synthesis call.

use rand::Rng;

/// One uniform sample in [-1, 1]
#[inline]
pub fn white_sample<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen_range(-1.0f32..=1.0)
}

/// Paul Kellet's refined pink-noise filter bank
#[derive(Debug, Clone, Default)]
pub struct PinkFilter {
    b: [f32; 7],
}

impl PinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn one white sample into one pink sample
    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let out = (b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362) * 0.11;
        b[6] = white * 0.115926;
        out
    }
}

/// Leaky integrator producing brown (red) noise
#[derive(Debug, Clone, Default)]
pub struct BrownFilter {
    last: f32,
}

impl BrownFilter {
    /// Output scale that brings the integrator back to roughly unit level
    pub const SCALE: f32 = 3.5;

    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        self.last = (self.last + 0.02 * white) / 1.02;
        self.last * Self::SCALE
    }
}

/// Base colour of a noise preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    /// Fill `out` with noise of this colour using fresh filter state
    pub fn fill<R: Rng + ?Sized>(self, rng: &mut R, out: &mut [f32]) {
        match self {
            NoiseColor::White => {
                for s in out.iter_mut() {
                    *s = white_sample(rng);
                }
            }
            NoiseColor::Pink => {
                let mut pink = PinkFilter::new();
                for s in out.iter_mut() {
                    *s = pink.process(white_sample(rng));
                }
            }
            NoiseColor::Brown => {
                let mut brown = BrownFilter::new();
                for s in out.iter_mut() {
                    *s = brown.process(white_sample(rng));
                }
            }
        }
    }
}
