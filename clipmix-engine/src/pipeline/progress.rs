//! Unified merge progress
//!
//! Maps per-stage progress onto one 0-100 scale:
//!
//! | Stage    | Range  |
//! |----------|--------|
//! | Decoding | 0-30   |
//! | Rendering| 35, 50 |
//! | Encoding | 50-100 |
//!
//! The value only moves forward within one merge; `reset` starts over.

use chrono::Utc;
use clipmix_common::{MergeEvent, MergeStage};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::broadcast;

/// End of the decode range
pub const DECODE_END: u8 = 30;
/// Reported when rendering starts
pub const RENDER_START: u8 = 35;
/// Reported when rendering finishes (start of encode range)
pub const RENDER_END: u8 = 50;
/// Merge finished
pub const COMPLETE: u8 = 100;

/// Percent after `done` of `total` decode steps
pub fn decode_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return DECODE_END;
    }
    let done = done.min(total);
    ((DECODE_END as usize * done) / total) as u8
}

/// Percent for an encoder fraction in [0, 1]
pub fn encode_percent(fraction: f32) -> u8 {
    let f = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    RENDER_END + ((COMPLETE - RENDER_END) as f32 * f).round() as u8
}

/// Monotonic progress counter that publishes `Progress` events.
///
/// Lock-free so the encoder's synchronous progress callback can drive it.
#[derive(Debug)]
pub struct ProgressTracker {
    percent: AtomicU8,
    events: broadcast::Sender<MergeEvent>,
}

impl ProgressTracker {
    pub fn new(events: broadcast::Sender<MergeEvent>) -> Self {
        Self {
            percent: AtomicU8::new(0),
            events,
        }
    }

    pub fn get(&self) -> u8 {
        self.percent.load(Ordering::Acquire)
    }

    /// Move progress to `percent` if that is forward.
    ///
    /// Returns true (and emits an event) only when the value increased.
    pub fn advance(&self, percent: u8, stage: MergeStage) -> bool {
        let percent = percent.min(COMPLETE);
        let previous = self.percent.fetch_max(percent, Ordering::AcqRel);
        if percent <= previous {
            return false;
        }
        // No subscribers is fine
        let _ = self.events.send(MergeEvent::Progress {
            percent,
            stage,
            timestamp: Utc::now(),
        });
        true
    }

    pub fn reset(&self) {
        self.percent.store(0, Ordering::Release);
    }
}
