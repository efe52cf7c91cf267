//! # clipmix Engine Library (clipmix-engine)
//!
//! Offline audio merge pipeline with per-clip gain and crossfades.
//!
//! **Purpose:** Decode compressed clips, schedule them on one timeline,
//! render the composite at 44.1kHz stereo, and encode it to MP3 (or WAV)
//! with progress and cancellation.
//!
//! **Architecture:** symphonia decode → rubato resample → additive mix →
//! chunked LAME encode on a worker thread, driven by `MergeOrchestrator`.
//!
//! ```text
//! bytes ──decode──▶ AudioBuffer ──render──▶ composite ──encode──▶ MP3
//!                        ▲
//!          noise beds ───┘
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod encode;
pub mod error;
pub mod mix;
pub mod noise;
pub mod pipeline;
pub mod playlist;

pub use audio::{AudioBuffer, SampleDecoder};
pub use config::{EncodeSettings, MixConfig};
pub use error::{Error, Result};
pub use noise::NoiseKind;
pub use pipeline::{AmbientBed, MergeOrchestrator, MergeOutcome, MergeRequest, PipelineStatus};
pub use playlist::{Clip, Playlist};
