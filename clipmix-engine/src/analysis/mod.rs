//! Signal analysis

pub mod loudness;

pub use loudness::LoudnessAnalyzer;
