//! Consensus building
//!
//! Reduces a concluded debate into per-category scores, an overall score with
//! its risk band and grade, and a sealed audit trail. Signals are carried
//! through unchanged.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use gaia_core::{
    AuditTrail, Category, CategoryScore, ConsensusResult, Finding, Grade, ModelError, RiskLevel,
    Severity, WorkerId,
};

use crate::debate::DebateOutcome;

/// Neutral score used when nothing could be scored
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Rollup weights per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryWeights(BTreeMap<Category, f64>);

impl Default for CategoryWeights {
    fn default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(Category::Environmental, 0.33);
        weights.insert(Category::Social, 0.33);
        weights.insert(Category::Governance, 0.34);
        Self(weights)
    }
}

impl CategoryWeights {
    /// An empty table: every category gets an even share
    pub fn even() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, category: Category, weight: f64) -> Self {
        self.0.insert(category, weight.max(0.0));
        self
    }

    /// Weight for `category` when `scored` categories take part
    pub fn weight_for(&self, category: &Category, scored: usize) -> f64 {
        match self.0.get(category) {
            Some(w) => *w,
            None if scored > 0 => 1.0 / scored as f64,
            None => 0.0,
        }
    }
}

/// Builds a [`ConsensusResult`] from a debate outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusBuilder {
    pub weights: CategoryWeights,
    /// Greenwashing risk added per signal (capped at 100)
    pub greenwashing_per_signal: f64,
}

impl Default for ConsensusBuilder {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            greenwashing_per_signal: 12.0,
        }
    }
}

impl ConsensusBuilder {
    pub fn new(weights: CategoryWeights) -> Self {
        Self {
            weights,
            ..Default::default()
        }
    }

    pub fn build(
        &self,
        target: &str,
        outcome: DebateOutcome,
    ) -> Result<ConsensusResult, ModelError> {
        let superseded = outcome.superseded();

        let mut by_category: BTreeMap<Category, Vec<&Finding>> = BTreeMap::new();
        for finding in outcome.validated() {
            if superseded.contains(&finding.id) {
                continue;
            }
            by_category
                .entry(finding.category.clone())
                .or_default()
                .push(finding);
        }

        let scored = by_category.len();
        let mut category_scores: Vec<CategoryScore> = by_category
            .iter()
            .map(|(category, findings)| {
                let (agreement, participating, dissenting) = agreement(findings);
                CategoryScore {
                    category: category.clone(),
                    score: category_score(findings),
                    weight: self.weights.weight_for(category, scored),
                    findings: findings.iter().map(|f| f.id.clone()).collect(),
                    agreement,
                    participating_workers: participating,
                    dissenting_workers: dissenting,
                }
            })
            .collect();

        let total_weight: f64 = category_scores.iter().map(|c| c.weight).sum();
        let overall_score = if total_weight > 0.0 {
            category_scores
                .iter()
                .map(|c| c.score * c.weight)
                .sum::<f64>()
                / total_weight
        } else {
            NEUTRAL_SCORE
        };
        // Normalized so weights read as shares of the overall score.
        if total_weight > 0.0 {
            for c in category_scores.iter_mut() {
                c.weight /= total_weight;
            }
        }

        let workers: Vec<WorkerId> = outcome
            .findings
            .iter()
            .map(|f| f.produced_by.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let greenwashing_risk =
            (outcome.signals.len() as f64 * self.greenwashing_per_signal).min(100.0);

        let DebateOutcome {
            findings,
            rounds,
            signals,
        } = outcome;
        let audit = AuditTrail::seal(findings, rounds)?;

        let result = ConsensusResult {
            target: target.to_string(),
            category_scores,
            overall_score,
            risk_level: RiskLevel::from_score(overall_score),
            grade: Grade::from_score(overall_score),
            greenwashing_risk,
            signals,
            workers,
            audit,
            completed_at: Utc::now(),
        };

        info!(
            entity = %result.target,
            overall = result.overall_score,
            risk = result.risk_level.as_str(),
            signals = result.signals.len(),
            digest = %result.audit.digest,
            "Consensus built"
        );
        Ok(result)
    }
}

/// `clamp(50 + 50 * Σ(sign × weight × confidence) / Σ weight, 0, 100)`
pub fn category_score(findings: &[&Finding]) -> f64 {
    let total: f64 = findings.iter().map(|f| f.severity.weight()).sum();
    if total <= 0.0 {
        return NEUTRAL_SCORE;
    }
    let signed: f64 = findings
        .iter()
        .map(|f| f.polarity.sign() * f.severity.weight() * f.confidence())
        .sum();
    (NEUTRAL_SCORE + NEUTRAL_SCORE * signed / total).clamp(0.0, 100.0)
}

/// Share of findings at the majority severity, with participating and dissenting workers
fn agreement(findings: &[&Finding]) -> (f64, Vec<WorkerId>, Vec<WorkerId>) {
    let mut counts: BTreeMap<Severity, usize> = BTreeMap::new();
    for finding in findings {
        *counts.entry(finding.severity).or_default() += 1;
    }
    // Ties go to the higher severity.
    let majority = counts
        .iter()
        .max_by(|(sa, ca), (sb, cb)| ca.cmp(cb).then(sa.cmp(sb)))
        .map(|(s, c)| (*s, *c));

    let participating: BTreeSet<WorkerId> =
        findings.iter().map(|f| f.produced_by.clone()).collect();

    let Some((majority, count)) = majority else {
        return (0.0, Vec::new(), Vec::new());
    };

    let dissenting = participating
        .iter()
        .filter(|w| {
            !findings
                .iter()
                .any(|f| &f.produced_by == *w && f.severity == majority)
        })
        .cloned()
        .collect();

    (
        count as f64 / findings.len() as f64,
        participating.into_iter().collect(),
        dissenting,
    )
}
