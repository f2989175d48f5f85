//! Consensus assessment types
//!
//! [`ConsensusResult`] is the final reduction of a run: per-category scores,
//! the overall score with its risk band and grade, the contradictions that
//! survived debate ([`Signal`]s), and the full [`AuditTrail`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::audit::Hash;
use crate::challenge::{Challenge, DebateRound};
use crate::error::ModelError;
use crate::evidence::{Evidence, EvidenceId};
use crate::finding::{Category, Finding, FindingId, FindingStatus, Severity, WorkerId};

/// Risk band derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Critical,
    High,
    Moderate,
    Low,
    Minimal,
}

impl RiskLevel {
    /// critical < 20 <= high < 40 <= moderate < 60 <= low < 80 <= minimal
    pub fn from_score(score: f64) -> Self {
        if score < 20.0 {
            Self::Critical
        } else if score < 40.0 {
            Self::High
        } else if score < 60.0 {
            Self::Moderate
        } else if score < 80.0 {
            Self::Low
        } else {
            Self::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
            Self::Minimal => "minimal",
        }
    }
}

/// Letter grade for the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    AAA,
    AA,
    A,
    BBB,
    BB,
    B,
    CCC,
    CC,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Self::AAA,
            s if s >= 80.0 => Self::AA,
            s if s >= 70.0 => Self::A,
            s if s >= 60.0 => Self::BBB,
            s if s >= 50.0 => Self::BB,
            s if s >= 40.0 => Self::B,
            s if s >= 30.0 => Self::CCC,
            s if s >= 20.0 => Self::CC,
            s if s >= 10.0 => Self::C,
            _ => Self::D,
        }
    }
}

/// Named greenwashing pattern a signal matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreenwashingPattern {
    /// Environmental claim contradicted by operational data
    ContradictoryData,
}

/// A contradiction between two validated findings that survived debate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub category: Category,
    /// Higher-confidence side, kept as the category's claim
    pub authoritative: FindingId,
    /// Lower-confidence side, excluded from the category score
    pub superseded: FindingId,
    pub authoritative_confidence: f64,
    pub superseded_confidence: f64,
    /// Higher of the two findings' severities
    pub severity: Severity,
    pub pattern: Option<GreenwashingPattern>,
    pub description: String,
}

impl Signal {
    /// True when the signal concerns both findings, in either role
    pub fn involves(&self, a: &FindingId, b: &FindingId) -> bool {
        (&self.authoritative == a && &self.superseded == b)
            || (&self.authoritative == b && &self.superseded == a)
    }
}

/// Aggregate for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    /// 0 - 100, higher is better
    pub score: f64,
    /// Normalized rollup weight
    pub weight: f64,
    /// Findings that contributed
    pub findings: Vec<FindingId>,
    /// Share of findings agreeing with the majority severity
    pub agreement: f64,
    pub participating_workers: Vec<WorkerId>,
    pub dissenting_workers: Vec<WorkerId>,
}

/// Everything that contributed to a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    /// Every finding, including rejected ones, in (worker, id) order
    pub findings: Vec<Finding>,
    pub rounds: Vec<DebateRound>,
    /// Every evidence item referenced by a finding or challenge, once
    pub evidence: Vec<Arc<Evidence>>,
    pub digest: Hash,
}

impl AuditTrail {
    /// Build a trail and seal it with a digest over findings and rounds
    pub fn seal(findings: Vec<Finding>, rounds: Vec<DebateRound>) -> Result<Self, ModelError> {
        let mut seen: BTreeMap<EvidenceId, Arc<Evidence>> = BTreeMap::new();
        for finding in &findings {
            for item in finding.evidence() {
                seen.entry(item.evidence.id)
                    .or_insert_with(|| Arc::clone(&item.evidence));
            }
        }
        for challenge in rounds.iter().flat_map(|r| r.accepted.iter()) {
            for item in &challenge.counter_evidence {
                seen.entry(item.id).or_insert_with(|| Arc::clone(item));
            }
        }

        let digest = Hash::of_json(&(&findings, &rounds))?;
        Ok(Self {
            findings,
            rounds,
            evidence: seen.into_values().collect(),
            digest,
        })
    }

    /// Recompute the digest and compare
    pub fn verify(&self) -> bool {
        Hash::of_json(&(&self.findings, &self.rounds))
            .map(|d| d == self.digest)
            .unwrap_or(false)
    }

    pub fn challenges(&self) -> impl Iterator<Item = &Challenge> {
        self.rounds.iter().flat_map(|r| r.accepted.iter())
    }

    pub fn finding(&self, id: &FindingId) -> Option<&Finding> {
        self.findings.iter().find(|f| &f.id == id)
    }
}

/// Final reduction of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub target: String,
    pub category_scores: Vec<CategoryScore>,
    /// 0 - 100, higher is better
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub grade: Grade,
    /// 0 - 100, grows with the number of signals
    pub greenwashing_risk: f64,
    /// Unresolved contradictions, carried verbatim
    pub signals: Vec<Signal>,
    /// Workers that contributed at least one finding
    pub workers: Vec<WorkerId>,
    pub audit: AuditTrail,
    pub completed_at: DateTime<Utc>,
}

impl ConsensusResult {
    pub fn category(&self, category: &Category) -> Option<&CategoryScore> {
        self.category_scores.iter().find(|c| &c.category == category)
    }

    pub fn count_with_status(&self, status: FindingStatus) -> usize {
        self.audit
            .findings
            .iter()
            .filter(|f| f.status() == status)
            .count()
    }
}
