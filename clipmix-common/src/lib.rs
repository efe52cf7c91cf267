//! # clipmix Common Library
//!
//! Shared code for the clipmix workspace including:
//! - Error type shared by every crate
//! - Configuration loading (TOML bootstrap + built-in defaults)
//! - Pipeline event types (MergeEvent enum)
//! - Sample/second conversions at the fixed output rate
//! - Fade curve definitions and calculations

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod timing;

pub use error::{Error, Result};
pub use events::{MergeEvent, MergeStage, PipelineState};
pub use fade_curves::FadeCurve;
