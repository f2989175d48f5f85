//! Conflict-driven challenge generation
//!
//! Every worker shadows the others: when one of its own findings disagrees
//! with another worker's finding, it contests that finding with whatever of
//! its evidence the target has not yet seen.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use gaia_core::{ChallengeProposal, Evidence, Finding, FindingStatus, Severity};

use crate::debate::ChallengeSource;

/// Challenges findings using the evidence of conflicting findings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictChallenger {
    /// Targets below this severity are skipped
    pub min_severity: Severity,
    /// Prefer counter-evidence of kinds the target does not hold
    pub prefer_disjoint_kinds: bool,
}

impl Default for ConflictChallenger {
    fn default() -> Self {
        Self {
            min_severity: Severity::Medium,
            prefer_disjoint_kinds: true,
        }
    }
}

impl ConflictChallenger {
    pub fn new(min_severity: Severity) -> Self {
        Self {
            min_severity,
            ..Default::default()
        }
    }

    /// Does `candidate` conflict with `target`?
    fn conflicts(target: &Finding, candidate: &Finding) -> bool {
        candidate.produced_by != target.produced_by
            && candidate.status() != FindingStatus::Rejected
            && candidate.category == target.category
            && candidate.polarity.opposes(&target.polarity)
    }

    /// Counter-evidence `candidate` can still bring against `target`
    fn counter_evidence(&self, target: &Finding, candidate: &Finding) -> Vec<Arc<Evidence>> {
        let fresh: Vec<Arc<Evidence>> = candidate
            .supporting_evidence()
            .filter(|e| !target.has_evidence(&e.id))
            .cloned()
            .collect();

        if !self.prefer_disjoint_kinds {
            return fresh;
        }

        let held = target.evidence_kinds();
        let disjoint: Vec<Arc<Evidence>> = fresh
            .iter()
            .filter(|e| !held.contains(&e.kind))
            .cloned()
            .collect();
        if disjoint.is_empty() {
            fresh
        } else {
            disjoint
        }
    }
}

impl ChallengeSource for ConflictChallenger {
    fn propose(&self, _round: u32, findings: &[Finding]) -> Vec<ChallengeProposal> {
        let mut proposals = Vec::new();

        for target in findings
            .iter()
            .filter(|f| f.is_eligible_for_challenge(self.min_severity))
        {
            // One challenge per (worker, target) per round.
            let mut challengers = BTreeSet::new();
            for candidate in findings.iter().filter(|c| Self::conflicts(target, c)) {
                if challengers.contains(&candidate.produced_by) {
                    continue;
                }
                let counter = self.counter_evidence(target, candidate);
                if counter.is_empty() {
                    continue;
                }
                challengers.insert(candidate.produced_by.clone());

                let mut proposal = ChallengeProposal::new(target.id.clone(), &candidate.produced_by)
                    .with_rationale(format!(
                        "{} reports {:?} \"{}\" against {:?} \"{}\"",
                        candidate.produced_by,
                        candidate.polarity,
                        candidate.title,
                        target.polarity,
                        target.title
                    ));
                for item in counter {
                    proposal = proposal.with_evidence(item);
                }
                proposals.push(proposal);
            }
        }

        proposals
    }
}
