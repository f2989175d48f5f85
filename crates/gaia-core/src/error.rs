//! Model error types

use crate::finding::{FindingId, FindingStatus};

/// Errors raised when building or mutating model types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Finding '{title}' has no supporting evidence")]
    NoEvidence { title: String },

    #[error("Finding {id}: illegal status transition {from:?} -> {to:?}")]
    InvalidTransition {
        id: FindingId,
        from: FindingStatus,
        to: FindingStatus,
    },

    #[error("Challenge targets {challenge_target} but was applied to {finding}")]
    TargetMismatch {
        challenge_target: FindingId,
        finding: FindingId,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
