//! Debate coordinator
//!
//! Drives every finding of a run through the state machine
//! `proposed → {challenged}* → {validated | rejected}` over a bounded number
//! of challenge rounds, then reports the contradictions that survived.
//!
//! The coordinator is step-driven so a host can report progress and honour
//! cancellation between rounds:
//!
//! ```rust
//! use gaia_adversarial::{ConflictChallenger, DebateConfig, DebateCoordinator};
//! use gaia_core::ConfidenceModel;
//!
//! let coordinator = DebateCoordinator::new(DebateConfig::default(), ConfidenceModel::default());
//! let challenger = ConflictChallenger::new(DebateConfig::default().min_challenge_severity);
//!
//! let mut debate = coordinator.begin(Vec::new()).unwrap();
//! while !debate.is_finished() {
//!     debate.play_round(&challenger).unwrap();
//! }
//! let outcome = debate.conclude().unwrap();
//! assert!(outcome.signals.is_empty());
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use gaia_core::{
    Challenge, ChallengeId, ChallengeProposal, ChallengeRejection, Category, ConfidenceModel,
    DebateRound, Finding, FindingId, FindingStatus, GreenwashingPattern, ModelError,
    RejectedChallenge, Resolution, Severity, Signal, WorkerId,
};

/// Debate parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    /// Maximum number of rounds
    pub rounds: u32,
    /// Cumulative confidence drop that marks a finding challenged
    pub challenge_threshold: f64,
    /// Challenged findings below this confidence are rejected at round end
    pub rejection_threshold: f64,
    /// Findings below this severity cannot be challenged
    pub min_challenge_severity: Severity,
    /// Evidence windows are widened by this many days before contradiction checks
    pub contradiction_slack_days: i64,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            challenge_threshold: 0.25,
            rejection_threshold: 0.35,
            min_challenge_severity: Severity::Medium,
            contradiction_slack_days: 30,
        }
    }
}

/// Errors from the debate coordinator
#[derive(Debug, Error)]
pub enum DebateError {
    #[error("duplicate finding id in run: {0}")]
    DuplicateFinding(FindingId),
    #[error("finding not in this debate: {0}")]
    UnknownFinding(FindingId),
    #[error("debate already finished after {0} rounds")]
    Finished(u32),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Produces challenge proposals for a round.
///
/// Sources see the round-start snapshot only; the coordinator validates and
/// orders whatever they return.
pub trait ChallengeSource: Send + Sync {
    fn propose(&self, round: u32, findings: &[Finding]) -> Vec<ChallengeProposal>;
}

/// Run-local finding storage, ordered by (worker id, finding id)
#[derive(Debug, Default)]
struct FindingArena {
    findings: Vec<Finding>,
    index: BTreeMap<FindingId, usize>,
}

impl FindingArena {
    fn new(mut findings: Vec<Finding>) -> Result<Self, DebateError> {
        findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut index = BTreeMap::new();
        for (i, finding) in findings.iter().enumerate() {
            if index.insert(finding.id.clone(), i).is_some() {
                return Err(DebateError::DuplicateFinding(finding.id.clone()));
            }
        }
        Ok(Self { findings, index })
    }

    fn get(&self, id: &FindingId) -> Option<&Finding> {
        self.index.get(id).map(|&i| &self.findings[i])
    }

    fn get_mut(&mut self, id: &FindingId) -> Option<&mut Finding> {
        match self.index.get(id) {
            Some(&i) => self.findings.get_mut(i),
            None => None,
        }
    }
}

/// Runs debates with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct DebateCoordinator {
    config: DebateConfig,
    model: ConfidenceModel,
}

impl DebateCoordinator {
    pub fn new(config: DebateConfig, model: ConfidenceModel) -> Self {
        Self { config, model }
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    pub fn model(&self) -> &ConfidenceModel {
        &self.model
    }

    /// Start a debate over a run's findings
    pub fn begin(&self, findings: Vec<Finding>) -> Result<Debate, DebateError> {
        let arena = FindingArena::new(findings)?;
        let mut domains = BTreeMap::new();
        for finding in &arena.findings {
            domains
                .entry(finding.produced_by.clone())
                .or_insert_with(|| finding.domain.clone());
        }

        Ok(Debate {
            config: self.config.clone(),
            model: self.model.clone(),
            arena,
            domains,
            rounds: Vec::new(),
            next_challenge: 1,
            fixed_point: false,
        })
    }

    /// Play every round and conclude
    pub fn run(
        &self,
        findings: Vec<Finding>,
        source: &dyn ChallengeSource,
    ) -> Result<DebateOutcome, DebateError> {
        let mut debate = self.begin(findings)?;
        while !debate.is_finished() {
            debate.play_round(source)?;
        }
        debate.conclude()
    }
}

/// A debate in progress
#[derive(Debug)]
pub struct Debate {
    config: DebateConfig,
    model: ConfidenceModel,
    arena: FindingArena,
    domains: BTreeMap<WorkerId, String>,
    rounds: Vec<DebateRound>,
    next_challenge: u32,
    fixed_point: bool,
}

impl Debate {
    /// Declare a worker's domain (needed for challengers with no findings)
    pub fn register_domain(&mut self, worker: impl Into<WorkerId>, domain: impl Into<String>) {
        self.domains.entry(worker.into()).or_insert_with(|| domain.into());
    }

    pub fn findings(&self) -> &[Finding] {
        &self.arena.findings
    }

    pub fn rounds(&self) -> &[DebateRound] {
        &self.rounds
    }

    /// Rounds played so far
    pub fn rounds_played(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Round limit reached, or the last round accepted nothing
    pub fn is_finished(&self) -> bool {
        self.fixed_point || self.rounds_played() >= self.config.rounds
    }

    /// Collect, validate and apply one round of challenges
    pub fn play_round(
        &mut self,
        source: &dyn ChallengeSource,
    ) -> Result<&DebateRound, DebateError> {
        if self.is_finished() {
            return Err(DebateError::Finished(self.rounds_played()));
        }

        let number = self.rounds_played() + 1;
        let mut round = DebateRound::new(number);
        debug!(round = number, "Debate round started");

        let proposals = source.propose(number, &self.arena.findings);

        // Validate everything against the round-start snapshot first.
        let mut accepted: Vec<(ChallengeProposal, bool)> = Vec::new();
        for proposal in proposals {
            match self.validate(&proposal) {
                Ok(cross_domain) => accepted.push((proposal, cross_domain)),
                Err(reason) => discard(&mut round, proposal, reason),
            }
        }
        accepted.sort_by(|(a, _), (b, _)| {
            (&a.target, &a.challenger).cmp(&(&b.target, &b.challenger))
        });

        for (proposal, cross_domain) in accepted {
            // An earlier challenge this round may have attached the same items.
            let adds_evidence = self
                .arena
                .get(&proposal.target)
                .is_some_and(|target| brings_new_evidence(target, &proposal));
            if !adds_evidence {
                discard(&mut round, proposal, ChallengeRejection::NoNewEvidence);
                continue;
            }

            let challenge = self.apply(number, proposal, cross_domain)?;
            let finding = self
                .arena
                .get_mut(&challenge.target)
                .ok_or_else(|| DebateError::UnknownFinding(challenge.target.clone()))?;

            let drop = finding.initial_confidence() - finding.confidence();
            if finding.status() == FindingStatus::Proposed && drop > self.config.challenge_threshold
            {
                finding.transition(FindingStatus::Challenged)?;
                round.newly_challenged.push(finding.id.clone());
            }
            round.accepted.push(challenge);
        }
        metrics::counter!("gaia_challenges_accepted_total").increment(round.accepted.len() as u64);

        for finding in self.arena.findings.iter_mut() {
            if finding.status() == FindingStatus::Challenged
                && finding.confidence() < self.config.rejection_threshold
            {
                finding.transition(FindingStatus::Rejected)?;
                info!(
                    finding = %finding.id,
                    confidence = finding.confidence(),
                    "Finding rejected"
                );
                round.newly_rejected.push(finding.id.clone());
            }
        }

        round.standing = self
            .arena
            .findings
            .iter()
            .filter(|f| f.status() != FindingStatus::Rejected)
            .map(|f| f.id.clone())
            .collect();
        round.resolution = self.resolve(&round);

        if round.is_fixed_point() {
            debug!(round = number, "Debate reached a fixed point");
            self.fixed_point = true;
        }
        info!(
            round = number,
            accepted = round.accepted.len(),
            rejected = round.rejected.len(),
            newly_rejected = round.newly_rejected.len(),
            "Debate round completed"
        );

        self.rounds.push(round);
        let played = self.rounds.len() - 1;
        Ok(&self.rounds[played])
    }

    /// Validate survivors and detect signals
    pub fn conclude(mut self) -> Result<DebateOutcome, DebateError> {
        for finding in self.arena.findings.iter_mut() {
            if finding.status() != FindingStatus::Rejected {
                finding.transition(FindingStatus::Validated)?;
            }
        }

        let signals = detect_signals(
            &self.arena.findings,
            Duration::days(self.config.contradiction_slack_days),
        );
        if !signals.is_empty() {
            info!(count = signals.len(), "Unresolved contradictions recorded");
        }

        Ok(DebateOutcome {
            findings: self.arena.findings,
            rounds: self.rounds,
            signals,
        })
    }

    /// Check a proposal; on success, returns whether it is cross-domain
    fn validate(&self, proposal: &ChallengeProposal) -> Result<bool, ChallengeRejection> {
        if proposal.counter_evidence.is_empty() {
            return Err(ChallengeRejection::Malformed);
        }
        let target = self
            .arena
            .get(&proposal.target)
            .ok_or(ChallengeRejection::UnknownTarget)?;
        if target.produced_by == proposal.challenger {
            return Err(ChallengeRejection::SelfChallenge);
        }
        if !target.is_eligible_for_challenge(self.config.min_challenge_severity) {
            return Err(ChallengeRejection::TargetNotEligible);
        }
        if !brings_new_evidence(target, proposal) {
            return Err(ChallengeRejection::NoNewEvidence);
        }

        Ok(self
            .domains
            .get(&proposal.challenger)
            .map_or(true, |domain| domain != &target.domain))
    }

    fn apply(
        &mut self,
        round: u32,
        proposal: ChallengeProposal,
        cross_domain: bool,
    ) -> Result<Challenge, DebateError> {
        let id = ChallengeId(self.next_challenge);
        self.next_challenge += 1;

        let finding = self
            .arena
            .get_mut(&proposal.target)
            .ok_or_else(|| DebateError::UnknownFinding(proposal.target.clone()))?;
        let before = finding.confidence();

        let mut challenge = Challenge {
            id,
            round,
            target: proposal.target,
            challenger: proposal.challenger,
            counter_evidence: proposal.counter_evidence,
            rationale: proposal.rationale,
            cross_domain,
            confidence_before: before,
            confidence_after: before,
        };
        challenge.confidence_after = finding.apply_challenge(&challenge, &self.model)?;

        debug!(
            challenge = %challenge.id,
            target = %challenge.target,
            challenger = %challenge.challenger,
            before = challenge.confidence_before,
            after = challenge.confidence_after,
            "Challenge applied"
        );
        Ok(challenge)
    }

    fn resolve(&self, round: &DebateRound) -> Option<Resolution> {
        if let Some(id) = round.newly_rejected.first() {
            let finding = self.arena.get(id)?;
            let winner = round
                .accepted
                .iter()
                .rev()
                .find(|c| &c.target == id)
                .map(|c| c.challenger.clone());
            return Some(Resolution {
                winner,
                final_confidence: finding.confidence(),
                reasoning: format!(
                    "{} fell to {:.3} after {} challenge(s) and was rejected",
                    id,
                    finding.confidence(),
                    round.accepted.iter().filter(|c| &c.target == id).count()
                ),
            });
        }

        if round.is_fixed_point() {
            let standing: Vec<&Finding> = round
                .standing
                .iter()
                .filter_map(|id| self.arena.get(id))
                .collect();
            let mean = if standing.is_empty() {
                0.0
            } else {
                standing.iter().map(|f| f.confidence()).sum::<f64>() / standing.len() as f64
            };
            return Some(Resolution {
                winner: None,
                final_confidence: mean,
                reasoning: format!(
                    "No challenge accepted; {} finding(s) stand",
                    standing.len()
                ),
            });
        }

        None
    }
}

fn brings_new_evidence(target: &Finding, proposal: &ChallengeProposal) -> bool {
    proposal
        .counter_evidence
        .iter()
        .any(|e| !target.has_evidence(&e.id))
}

fn discard(round: &mut DebateRound, proposal: ChallengeProposal, reason: ChallengeRejection) {
    warn!(
        round = round.round,
        target = %proposal.target,
        challenger = %proposal.challenger,
        reason = ?reason,
        "Challenge discarded"
    );
    metrics::counter!("gaia_challenges_rejected_total").increment(1);
    round.rejected.push(RejectedChallenge {
        round: round.round,
        proposal,
        reason,
    });
}

/// One signal per contradicting pair of validated findings
fn detect_signals(findings: &[Finding], slack: Duration) -> Vec<Signal> {
    let validated: Vec<&Finding> = findings
        .iter()
        .filter(|f| f.status() == FindingStatus::Validated)
        .collect();

    let mut signals = Vec::new();
    for (i, a) in validated.iter().enumerate() {
        for b in &validated[i + 1..] {
            if !a.contradicts(b, slack) {
                continue;
            }
            // Ties go to the earlier (worker id, finding id).
            let (winner, loser) = if b.confidence() > a.confidence() {
                (*b, *a)
            } else {
                (*a, *b)
            };
            let positive = if winner.polarity.is_positive() {
                winner
            } else {
                loser
            };
            let pattern = (positive.category == Category::Environmental)
                .then_some(GreenwashingPattern::ContradictoryData);

            signals.push(Signal {
                category: winner.category.clone(),
                authoritative: winner.id.clone(),
                superseded: loser.id.clone(),
                authoritative_confidence: winner.confidence(),
                superseded_confidence: loser.confidence(),
                severity: winner.severity.max(loser.severity),
                pattern,
                description: format!(
                    "{} ({}) contradicts {} ({}) in {}",
                    winner.title,
                    winner.produced_by,
                    loser.title,
                    loser.produced_by,
                    winner.category
                ),
            });
        }
    }
    signals
}

/// Terminal state of a debate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateOutcome {
    /// Every finding, validated or rejected, in (worker, id) order
    pub findings: Vec<Finding>,
    pub rounds: Vec<DebateRound>,
    pub signals: Vec<Signal>,
}

impl DebateOutcome {
    pub fn validated(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.status() == FindingStatus::Validated)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.status() == FindingStatus::Rejected)
    }

    /// Losing sides of every signal
    pub fn superseded(&self) -> BTreeSet<FindingId> {
        self.signals.iter().map(|s| s.superseded.clone()).collect()
    }

    pub fn finding(&self, id: &FindingId) -> Option<&Finding> {
        self.findings.iter().find(|f| &f.id == id)
    }

    pub fn challenges(&self) -> impl Iterator<Item = &Challenge> {
        self.rounds.iter().flat_map(|r| r.accepted.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gaia_core::{Evidence, EvidenceKind, FindingDraft, Polarity};
    use std::sync::Arc;

    struct Scripted(Vec<(u32, ChallengeProposal)>);

    impl ChallengeSource for Scripted {
        fn propose(&self, round: u32, _: &[Finding]) -> Vec<ChallengeProposal> {
            self.0
                .iter()
                .filter(|(r, _)| *r == round)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    fn evidence(kind: EvidenceKind, reliability: f64) -> Arc<Evidence> {
        Arc::new(Evidence::new(kind, "test", reliability, Utc::now()))
    }

    fn finding(worker: &str, severity: Severity, reliability: f64) -> Finding {
        let draft = FindingDraft::new(Category::Social, Polarity::Strength, severity, "claim")
            .with_evidence(evidence(EvidenceKind::Document, reliability));
        Finding::propose(
            FindingId::new(worker, 1),
            worker,
            worker,
            draft,
            &ConfidenceModel::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let coordinator = DebateCoordinator::default();
        let err = coordinator
            .begin(vec![
                finding("a", Severity::High, 0.9),
                finding("a", Severity::High, 0.5),
            ])
            .unwrap_err();
        assert!(matches!(err, DebateError::DuplicateFinding(_)));
    }

    #[test]
    fn test_malformed_and_self_challenges_discarded() {
        let coordinator = DebateCoordinator::default();
        let target = FindingId::new("a", 1);
        let source = Scripted(vec![
            (1, ChallengeProposal::new(target.clone(), "b")),
            (
                1,
                ChallengeProposal::new(target.clone(), "a")
                    .with_evidence(evidence(EvidenceKind::MediaMention, 0.9)),
            ),
            (
                1,
                ChallengeProposal::new(FindingId::new("z", 9), "b")
                    .with_evidence(evidence(EvidenceKind::MediaMention, 0.9)),
            ),
        ]);

        let mut debate = coordinator
            .begin(vec![finding("a", Severity::High, 0.9)])
            .unwrap();
        let round = debate.play_round(&source).unwrap();

        let reasons: Vec<_> = round.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                ChallengeRejection::Malformed,
                ChallengeRejection::SelfChallenge,
                ChallengeRejection::UnknownTarget
            ]
        );
        assert!(round.is_fixed_point());
        assert!(debate.is_finished());
        assert!((debate.findings()[0].confidence() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_low_severity_is_not_eligible() {
        let coordinator = DebateCoordinator::default();
        let source = Scripted(vec![(
            1,
            ChallengeProposal::new(FindingId::new("a", 1), "b")
                .with_evidence(evidence(EvidenceKind::MediaMention, 0.9)),
        )]);
        let outcome = coordinator
            .run(vec![finding("a", Severity::Low, 0.9)], &source)
            .unwrap();
        assert_eq!(
            outcome.rounds[0].rejected[0].reason,
            ChallengeRejection::TargetNotEligible
        );
        assert_eq!(outcome.findings[0].status(), FindingStatus::Validated);
    }

    #[test]
    fn test_weak_challenge_leaves_finding_proposed() {
        let coordinator = DebateCoordinator::default();
        let source = Scripted(vec![(
            1,
            ChallengeProposal::new(FindingId::new("a", 1), "b")
                .with_evidence(evidence(EvidenceKind::MediaMention, 0.2)),
        )]);
        let mut debate = coordinator
            .begin(vec![finding("a", Severity::High, 0.9)])
            .unwrap();
        let round = debate.play_round(&source).unwrap();
        assert_eq!(round.challenges_accepted(), 1);
        assert!(round.newly_challenged.is_empty());
        assert_eq!(debate.findings()[0].status(), FindingStatus::Proposed);
    }

    #[test]
    fn test_repeated_evidence_in_one_round_is_not_accepted_twice() {
        let coordinator = DebateCoordinator::default();
        let target = FindingId::new("a", 1);
        let shared = evidence(EvidenceKind::MediaMention, 0.9);
        let source = Scripted(vec![
            (
                1,
                ChallengeProposal::new(target.clone(), "b").with_evidence(Arc::clone(&shared)),
            ),
            (
                1,
                ChallengeProposal::new(target.clone(), "c").with_evidence(Arc::clone(&shared)),
            ),
        ]);
        let mut debate = coordinator
            .begin(vec![finding("a", Severity::High, 0.9)])
            .unwrap();
        let round = debate.play_round(&source).unwrap();

        assert_eq!(round.challenges_accepted(), 1);
        assert_eq!(round.accepted[0].challenger, "b");
        assert_eq!(round.rejected.len(), 1);
        assert_eq!(round.rejected[0].proposal.challenger, "c");
        assert_eq!(round.rejected[0].reason, ChallengeRejection::NoNewEvidence);
        assert_eq!(debate.findings()[0].evidence().len(), 2);
    }

    #[test]
    fn test_play_after_finish_errors() {
        let coordinator = DebateCoordinator::default();
        let mut debate = coordinator.begin(Vec::new()).unwrap();
        debate.play_round(&Scripted(Vec::new())).unwrap();
        assert!(matches!(
            debate.play_round(&Scripted(Vec::new())),
            Err(DebateError::Finished(1))
        ));
    }
}
