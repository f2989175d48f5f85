//! Finding types
//!
//! A [`Finding`] is one worker's claim about the target entity. Its
//! confidence is never set directly: it is always the output of
//! [`ConfidenceModel::calculate`] over the finding's current evidence list,
//! which only grows (challenges append counter-evidence, nothing is removed).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::challenge::{Challenge, ChallengeId};
use crate::confidence::ConfidenceModel;
use crate::error::ModelError;
use crate::evidence::{Evidence, EvidenceId, EvidenceKind};

/// Identifier of an analysis worker
pub type WorkerId = String;

/// Run-unique finding identifier: `{worker_id}-{seq:04}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingId(String);

impl FindingId {
    /// Build the id of the `seq`-th (1-based) finding emitted by `worker`
    pub fn new(worker: &str, seq: u32) -> Self {
        Self(format!("{}-{:04}", worker, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Domain classification of a finding
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Environmental,
    Social,
    Governance,
    FinancialInclusion,
    Compliance,
    /// Worker-defined category
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Environmental => "environmental",
            Self::Social => "social",
            Self::Governance => "governance",
            Self::FinancialInclusion => "financial_inclusion",
            Self::Compliance => "compliance",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Strength,
    Weakness,
    Risk,
    Opportunity,
}

impl Polarity {
    /// Strengths and opportunities are positive; weaknesses and risks negative
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Strength | Self::Opportunity)
    }

    /// +1.0 for positive polarity, -1.0 for negative
    pub fn sign(&self) -> f64 {
        if self.is_positive() {
            1.0
        } else {
            -1.0
        }
    }

    /// True when one side is positive and the other negative
    pub fn opposes(&self, other: &Polarity) -> bool {
        self.is_positive() != other.is_positive()
    }
}

/// Ordinal severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Aggregation weight
    pub fn weight(&self) -> f64 {
        match self {
            Self::Info => 0.1,
            Self::Low => 0.3,
            Self::Medium => 0.5,
            Self::High => 0.8,
            Self::Critical => 1.0,
        }
    }
}

/// Lifecycle status, driven by the debate coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Proposed,
    Challenged,
    Validated,
    Rejected,
}

impl FindingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Validated | Self::Rejected)
    }

    /// proposed -> {challenged}* -> {validated | rejected}
    pub fn can_transition_to(&self, to: FindingStatus) -> bool {
        use FindingStatus::*;
        matches!(
            (self, to),
            (Proposed, Challenged)
                | (Proposed, Validated)
                | (Challenged, Challenged)
                | (Challenged, Validated)
                | (Challenged, Rejected)
        )
    }
}

/// Human-facing confidence bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_score(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Self::VeryHigh
        } else if confidence >= 0.75 {
            Self::High
        } else if confidence >= 0.5 {
            Self::Medium
        } else if confidence >= 0.3 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

/// How an evidence item relates to the finding it is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum EvidenceRole {
    Supporting,
    Counter {
        challenge: ChallengeId,
        /// Challenger works in a different domain than the producer
        cross_domain: bool,
    },
}

/// An evidence reference attached to a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedEvidence {
    pub evidence: Arc<Evidence>,
    #[serde(flatten)]
    pub role: EvidenceRole,
}

impl AttachedEvidence {
    pub fn supporting(evidence: Arc<Evidence>) -> Self {
        Self {
            evidence,
            role: EvidenceRole::Supporting,
        }
    }

    pub fn is_supporting(&self) -> bool {
        matches!(self.role, EvidenceRole::Supporting)
    }
}

/// A claim as emitted by a worker, before the engine assigns identity and confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingDraft {
    pub category: Category,
    pub polarity: Polarity,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub evidence: Vec<Arc<Evidence>>,
}

impl FindingDraft {
    pub fn new(
        category: Category,
        polarity: Polarity,
        severity: Severity,
        title: impl Into<String>,
    ) -> Self {
        Self {
            category,
            polarity,
            severity,
            title: title.into(),
            description: String::new(),
            evidence: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_evidence(mut self, evidence: Arc<Evidence>) -> Self {
        self.evidence.push(evidence);
        self
    }
}

/// A worker's evidence-backed claim about the target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique within a run
    pub id: FindingId,
    /// Worker that produced this finding
    pub produced_by: WorkerId,
    /// Producer's analysis domain (used to weigh cross-domain challenges)
    pub domain: String,
    pub category: Category,
    pub polarity: Polarity,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    confidence: f64,
    initial_confidence: f64,
    evidence: Vec<AttachedEvidence>,
    status: FindingStatus,
}

impl Finding {
    /// Turn a worker draft into a proposed finding
    pub fn propose(
        id: FindingId,
        produced_by: &str,
        domain: &str,
        draft: FindingDraft,
        model: &ConfidenceModel,
    ) -> Result<Self, ModelError> {
        if draft.evidence.is_empty() {
            return Err(ModelError::NoEvidence { title: draft.title });
        }

        let evidence: Vec<AttachedEvidence> = draft
            .evidence
            .into_iter()
            .map(AttachedEvidence::supporting)
            .collect();
        let confidence = model.calculate(&evidence);

        Ok(Self {
            id,
            produced_by: produced_by.to_string(),
            domain: domain.to_string(),
            category: draft.category,
            polarity: draft.polarity,
            severity: draft.severity,
            title: draft.title,
            description: draft.description,
            created_at: Utc::now(),
            confidence,
            initial_confidence: confidence,
            evidence,
            status: FindingStatus::Proposed,
        })
    }

    /// Current confidence, always derived from the evidence list
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Confidence at proposal time, before any challenge
    pub fn initial_confidence(&self) -> f64 {
        self.initial_confidence
    }

    pub fn evidence(&self) -> &[AttachedEvidence] {
        &self.evidence
    }

    pub fn status(&self) -> FindingStatus {
        self.status
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }

    pub fn supporting_evidence(&self) -> impl Iterator<Item = &Arc<Evidence>> {
        self.evidence
            .iter()
            .filter(|e| e.is_supporting())
            .map(|e| &e.evidence)
    }

    /// Kinds of every attached evidence item
    pub fn evidence_kinds(&self) -> BTreeSet<EvidenceKind> {
        self.evidence.iter().map(|e| e.evidence.kind).collect()
    }

    pub fn has_evidence(&self, id: &EvidenceId) -> bool {
        self.evidence.iter().any(|e| &e.evidence.id == id)
    }

    /// `[oldest, newest]` observation time over supporting evidence
    pub fn evidence_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut times = self.supporting_evidence().map(|e| e.observed_at);
        let first = times.next()?;
        Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// Stable ordering key: worker id, then finding id
    pub fn sort_key(&self) -> (&str, &FindingId) {
        (&self.produced_by, &self.id)
    }

    pub fn is_eligible_for_challenge(&self, min_severity: Severity) -> bool {
        self.severity >= min_severity && !self.status.is_terminal()
    }

    /// Same category, opposing polarity and overlapping evidence windows.
    ///
    /// Each window is widened by `slack` on both sides before the overlap test.
    pub fn contradicts(&self, other: &Finding, slack: Duration) -> bool {
        if self.category != other.category || !self.polarity.opposes(&other.polarity) {
            return false;
        }
        match (self.evidence_window(), other.evidence_window()) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => {
                a_lo - slack <= b_hi + slack && b_lo - slack <= a_hi + slack
            }
            _ => false,
        }
    }

    /// Append a challenge's counter-evidence and recompute confidence.
    ///
    /// Items already attached are skipped. Returns the new confidence.
    pub fn apply_challenge(
        &mut self,
        challenge: &Challenge,
        model: &ConfidenceModel,
    ) -> Result<f64, ModelError> {
        if challenge.target != self.id {
            return Err(ModelError::TargetMismatch {
                challenge_target: challenge.target.clone(),
                finding: self.id.clone(),
            });
        }

        for item in &challenge.counter_evidence {
            if self.has_evidence(&item.id) {
                continue;
            }
            self.evidence.push(AttachedEvidence {
                evidence: Arc::clone(item),
                role: EvidenceRole::Counter {
                    challenge: challenge.id,
                    cross_domain: challenge.cross_domain,
                },
            });
        }

        self.confidence = model.calculate(&self.evidence);
        Ok(self.confidence)
    }

    /// Move along the status state machine
    pub fn transition(&mut self, to: FindingStatus) -> Result<(), ModelError> {
        if !self.status.can_transition_to(to) {
            return Err(ModelError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
