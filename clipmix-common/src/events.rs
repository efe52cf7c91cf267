//! Event types for the merge pipeline
//!
//! Emitted by the orchestrator over a `tokio::sync::broadcast` channel so a
//! front end can follow a merge without polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Merge pipeline state
///
/// `Idle → Processing → {Completed | Failed | Idle (cancelled)}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Processing,
    Completed,
    Failed,
}

impl PipelineState {
    /// True while a merge is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Processing)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Processing => write!(f, "processing"),
            PipelineState::Completed => write!(f, "completed"),
            PipelineState::Failed => write!(f, "failed"),
        }
    }
}

/// Stage of an in-flight merge, attached to progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStage {
    Decoding,
    Rendering,
    Encoding,
}

/// Merge pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MergeEvent {
    /// Pipeline state changed
    StateChanged {
        old_state: PipelineState,
        new_state: PipelineState,
        timestamp: DateTime<Utc>,
    },

    /// Overall progress moved (0-100, non-decreasing within one merge)
    Progress {
        percent: u8,
        stage: MergeStage,
        timestamp: DateTime<Utc>,
    },

    /// A clip finished decoding; carries its now-known duration
    ClipDecoded {
        clip_id: Uuid,
        name: String,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Merge finished and output bytes are stored
    Completed {
        output_bytes: usize,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Merge failed
    Failed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Merge was cancelled by the caller (not a failure)
    Cancelled { timestamp: DateTime<Utc> },
}

impl MergeEvent {
    /// Event type name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            MergeEvent::StateChanged { .. } => "StateChanged",
            MergeEvent::Progress { .. } => "Progress",
            MergeEvent::ClipDecoded { .. } => "ClipDecoded",
            MergeEvent::Completed { .. } => "Completed",
            MergeEvent::Failed { .. } => "Failed",
            MergeEvent::Cancelled { .. } => "Cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default_is_idle() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
        assert!(!PipelineState::Idle.is_busy());
        assert!(PipelineState::Processing.is_busy());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = MergeEvent::Progress {
            percent: 42,
            stage: MergeStage::Encoding,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Progress");
        assert_eq!(json["percent"], 42);
        assert_eq!(json["stage"], "encoding");
        assert_eq!(event.event_type(), "Progress");
    }

    #[test]
    fn test_state_changed_round_trip() {
        let event = MergeEvent::StateChanged {
            old_state: PipelineState::Idle,
            new_state: PipelineState::Processing,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: MergeEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            MergeEvent::StateChanged { old_state, new_state, .. } => {
                assert_eq!(old_state, PipelineState::Idle);
                assert_eq!(new_state, PipelineState::Processing);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
