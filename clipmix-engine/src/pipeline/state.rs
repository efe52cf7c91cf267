//! Orchestrator status

use clipmix_common::PipelineState;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    /// Integer percent, 0-100
    pub progress: u8,
    /// Message of the last failure, cleared when a merge starts
    pub error: Option<String>,
    /// Size of the stored output, if any
    pub output_len: Option<usize>,
}

/// Mutable orchestrator state, guarded by the orchestrator's lock
#[derive(Debug, Default)]
pub(crate) struct StatusInner {
    pub state: PipelineState,
    pub error: Option<String>,
    pub output: Option<Vec<u8>>,
    /// Set while a merge is in Processing
    pub active: Option<ActiveMerge>,
}

/// Handles on the in-flight merge
#[derive(Debug, Clone)]
pub(crate) struct ActiveMerge {
    pub merge_id: Uuid,
    /// Stops the merge at its next checkpoint
    pub token: CancellationToken,
    /// Cancelled once the merge has left Processing
    pub finished: CancellationToken,
}

impl StatusInner {
    pub fn snapshot(&self, progress: u8) -> PipelineStatus {
        PipelineStatus {
            state: self.state,
            progress,
            error: self.error.clone(),
            output_len: self.output.as_ref().map(Vec::len),
        }
    }
}
