//! Merge pipeline: orchestration, status and progress

pub mod orchestrator;
pub mod progress;
pub mod state;

pub use orchestrator::{
    AmbientBed, ClipDuration, MergeOrchestrator, MergeOutcome, MergeRequest, MergeSummary,
};
pub use progress::ProgressTracker;
pub use state::PipelineStatus;
