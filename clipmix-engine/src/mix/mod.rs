//! Timeline scheduling and offline mixing

pub mod envelope;
pub mod renderer;
pub mod scheduler;

pub use envelope::{Breakpoint, GainEnvelope};
pub use renderer::{mix_down, prepare_clip, render, render_with_curve};
pub use scheduler::{schedule, schedule_with_curve, ClipPlacement, MixSchedule};
