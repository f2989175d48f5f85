//! Challenge and debate round types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::evidence::Evidence;
use crate::finding::{FindingId, WorkerId};

/// Run-unique challenge sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub u32);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{:04}", self.0)
    }
}

/// A contest submitted against a finding, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeProposal {
    pub target: FindingId,
    pub challenger: WorkerId,
    pub counter_evidence: Vec<Arc<Evidence>>,
    pub rationale: String,
}

impl ChallengeProposal {
    pub fn new(target: FindingId, challenger: impl Into<WorkerId>) -> Self {
        Self {
            target,
            challenger: challenger.into(),
            counter_evidence: Vec::new(),
            rationale: String::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Arc<Evidence>) -> Self {
        self.counter_evidence.push(evidence);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}

/// An accepted challenge. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    /// 1-based debate round
    pub round: u32,
    pub target: FindingId,
    pub challenger: WorkerId,
    /// Never empty
    pub counter_evidence: Vec<Arc<Evidence>>,
    pub rationale: String,
    /// Challenger's domain differs from the producer's
    pub cross_domain: bool,
    pub confidence_before: f64,
    pub confidence_after: f64,
}

/// Why a proposal was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeRejection {
    /// No counter-evidence at all
    Malformed,
    UnknownTarget,
    SelfChallenge,
    /// Target is below the severity floor or already terminal
    TargetNotEligible,
    /// Every counter-evidence item is already attached to the target
    NoNewEvidence,
}

/// A discarded proposal, kept for the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedChallenge {
    pub round: u32,
    pub proposal: ChallengeProposal,
    pub reason: ChallengeRejection,
}

/// Clear outcome of a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Worker whose position prevailed, if any
    pub winner: Option<WorkerId>,
    pub final_confidence: f64,
    pub reasoning: String,
}

/// One round of challenge submission and confidence re-evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRound {
    /// 1-based round number
    pub round: u32,
    pub accepted: Vec<Challenge>,
    pub rejected: Vec<RejectedChallenge>,
    /// Findings moved to `challenged` during this round
    pub newly_challenged: Vec<FindingId>,
    /// Findings moved to `rejected` at the end of this round
    pub newly_rejected: Vec<FindingId>,
    /// Findings still standing (not rejected) after resolution
    pub standing: Vec<FindingId>,
    pub resolution: Option<Resolution>,
}

impl DebateRound {
    pub fn new(round: u32) -> Self {
        Self {
            round,
            accepted: Vec::new(),
            rejected: Vec::new(),
            newly_challenged: Vec::new(),
            newly_rejected: Vec::new(),
            standing: Vec::new(),
            resolution: None,
        }
    }

    pub fn challenges_accepted(&self) -> usize {
        self.accepted.len()
    }

    /// No accepted challenges: debate has reached a fixed point
    pub fn is_fixed_point(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_fixed_point() {
        let round = DebateRound::new(2);
        assert!(round.is_fixed_point());
        assert_eq!(round.challenges_accepted(), 0);
    }

    #[test]
    fn test_challenge_id_display() {
        assert_eq!(ChallengeId(12).to_string(), "ch-0012");
    }
}
