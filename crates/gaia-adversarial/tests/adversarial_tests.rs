use chrono::{Duration, TimeZone, Utc};
use gaia_adversarial::{
    ChallengeSource, ConflictChallenger, ConsensusBuilder, DebateConfig, DebateCoordinator,
};
use gaia_core::{
    Category, ChallengeProposal, ChallengeRejection, ConfidenceModel, Evidence, EvidenceKind,
    Finding, FindingDraft, FindingId, FindingStatus, GreenwashingPattern, Polarity, RiskLevel,
    Severity,
};
use proptest::prelude::*;
use std::sync::Arc;

/// Replays a fixed list of proposals, each tagged with its round
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

fn at(day: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::days(day)
}

fn item(kind: EvidenceKind, reliability: f64) -> Arc<Evidence> {
    Arc::new(Evidence::new(kind, "fixture", reliability, at(0)))
}

fn propose(
    worker: &str,
    domain: &str,
    category: Category,
    polarity: Polarity,
    severity: Severity,
    evidence: Vec<Arc<Evidence>>,
) -> Finding {
    let mut draft = FindingDraft::new(category, polarity, severity, format!("{worker} claim"));
    for e in evidence {
        draft = draft.with_evidence(e);
    }
    Finding::propose(
        FindingId::new(worker, 1),
        worker,
        domain,
        draft,
        &ConfidenceModel::default(),
    )
    .unwrap()
}

#[test]
fn test_single_cross_domain_challenge_is_survived() {
    let a = propose(
        "sentinel",
        "environmental",
        Category::Environmental,
        Polarity::Strength,
        Severity::High,
        vec![item(EvidenceKind::Certification, 0.9)],
    );
    assert!((a.confidence() - 0.9).abs() < 1e-12);

    let source = Scripted(vec![(
        1,
        ChallengeProposal::new(a.id.clone(), "pulse")
            .with_evidence(item(EvidenceKind::MediaMention, 0.8))
            .with_rationale("Coverage disputes the certificate"),
    )]);

    let outcome = DebateCoordinator::default().run(vec![a], &source).unwrap();
    let finding = &outcome.findings[0];

    assert_eq!(finding.status(), FindingStatus::Validated);
    assert!(finding.confidence() > 0.35 && finding.confidence() < 0.9);
    assert!((finding.confidence() - 0.468).abs() < 1e-9);
    // Round 2 had nothing to accept.
    assert_eq!(outcome.rounds.len(), 2);
    assert!(outcome.rounds[1].is_fixed_point());
    assert_eq!(outcome.rounds[0].newly_challenged, vec![finding.id.clone()]);
}

#[test]
fn test_two_independent_challenges_reject_in_first_round() {
    let a = propose(
        "regulus",
        "compliance",
        Category::Governance,
        Polarity::Strength,
        Severity::Critical,
        vec![item(EvidenceKind::PublicRecord, 0.8)],
    );
    let target = a.id.clone();
    let source = Scripted(vec![
        (
            1,
            ChallengeProposal::new(target.clone(), "veritas")
                .with_evidence(item(EvidenceKind::Document, 0.7)),
        ),
        (
            1,
            ChallengeProposal::new(target.clone(), "pulse")
                .with_evidence(item(EvidenceKind::NewsArticle, 0.7)),
        ),
    ]);

    let outcome = DebateCoordinator::default().run(vec![a], &source).unwrap();
    let finding = &outcome.findings[0];

    assert_eq!(finding.status(), FindingStatus::Rejected);
    assert!((finding.confidence() - 0.8 * 0.58 * 0.58).abs() < 1e-9);
    assert_eq!(outcome.rounds[0].newly_rejected, vec![target]);
    // Applied in challenger order: pulse before veritas.
    let order: Vec<&str> = outcome.rounds[0]
        .accepted
        .iter()
        .map(|c| c.challenger.as_str())
        .collect();
    assert_eq!(order, vec!["pulse", "veritas"]);
    let resolution = outcome.rounds[0].resolution.as_ref().unwrap();
    assert_eq!(resolution.winner.as_deref(), Some("veritas"));
    assert!(outcome.rounds.len() <= 2);
}

#[test]
fn test_empty_challenge_never_changes_confidence() {
    let a = propose(
        "sentinel",
        "environmental",
        Category::Environmental,
        Polarity::Strength,
        Severity::High,
        vec![item(EvidenceKind::SensorReading, 0.7)],
    );
    let before = a.confidence();
    let source = Scripted(vec![(1, ChallengeProposal::new(a.id.clone(), "pulse"))]);

    let outcome = DebateCoordinator::default().run(vec![a], &source).unwrap();

    assert_eq!(outcome.findings[0].confidence(), before);
    assert_eq!(
        outcome.rounds[0].rejected[0].reason,
        ChallengeRejection::Malformed
    );
    assert_eq!(outcome.findings[0].status(), FindingStatus::Validated);
}

#[test]
fn test_confidence_replays_from_evidence() {
    let a = propose(
        "sentinel",
        "environmental",
        Category::Environmental,
        Polarity::Strength,
        Severity::High,
        vec![item(EvidenceKind::Certification, 0.9), item(EvidenceKind::Document, 0.6)],
    );
    let id = a.id.clone();
    let source = Scripted(vec![
        (
            1,
            ChallengeProposal::new(id.clone(), "pulse")
                .with_evidence(item(EvidenceKind::SocialMedia, 0.3)),
        ),
        (
            2,
            ChallengeProposal::new(id.clone(), "veritas")
                .with_evidence(item(EvidenceKind::Document, 0.4)),
        ),
        (
            3,
            ChallengeProposal::new(id.clone(), "pulse")
                .with_evidence(item(EvidenceKind::NewsArticle, 0.2)),
        ),
    ]);

    let outcome = DebateCoordinator::default().run(vec![a], &source).unwrap();
    let finding = outcome.finding(&id).unwrap();

    let replayed = ConfidenceModel::default().calculate(finding.evidence());
    assert_eq!(replayed.to_bits(), finding.confidence().to_bits());
    assert_eq!(outcome.challenges().count(), 3);
    assert_eq!(outcome.rounds.len(), 3);
}

#[test]
fn test_surviving_contradiction_yields_one_signal() {
    // Both sides survive the mutual challenge, so the contradiction stands.
    let claim = propose(
        "sentinel",
        "environmental",
        Category::Environmental,
        Polarity::Strength,
        Severity::High,
        vec![item(EvidenceKind::Certification, 0.9)],
    );
    let report = propose(
        "pulse",
        "news",
        Category::Environmental,
        Polarity::Risk,
        Severity::High,
        vec![item(EvidenceKind::MediaMention, 0.8)],
    );

    let outcome = DebateCoordinator::default()
        .run(vec![claim, report], &ConflictChallenger::default())
        .unwrap();

    assert!(outcome.findings.iter().all(|f| f.status() == FindingStatus::Validated));
    assert_eq!(outcome.signals.len(), 1);

    let signal = &outcome.signals[0];
    assert_eq!(signal.authoritative.as_str(), "sentinel-0001");
    assert_eq!(signal.superseded.as_str(), "pulse-0001");
    assert_eq!(signal.pattern, Some(GreenwashingPattern::ContradictoryData));
    assert!(signal.authoritative_confidence >= signal.superseded_confidence);

    let result = ConsensusBuilder::default().build("acme", outcome).unwrap();
    let env = result.category(&Category::Environmental).unwrap();
    assert_eq!(env.findings.len(), 1);
    assert!(env.score > 50.0);
    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.greenwashing_risk, 12.0);
    assert!(result.audit.verify());
    assert_eq!(result.audit.evidence.len(), 2);
}

#[test]
fn test_distant_evidence_windows_do_not_contradict() {
    let old = Arc::new(Evidence::new(EvidenceKind::Document, "archive", 0.9, at(-900)));
    let claim = propose(
        "veritas",
        "claims",
        Category::Social,
        Polarity::Strength,
        Severity::Low,
        vec![old],
    );
    let report = propose(
        "pulse",
        "news",
        Category::Social,
        Polarity::Weakness,
        Severity::Low,
        vec![item(EvidenceKind::NewsArticle, 0.9)],
    );

    let outcome = DebateCoordinator::default()
        .run(vec![claim, report], &ConflictChallenger::default())
        .unwrap();
    assert!(outcome.signals.is_empty());
}

#[test]
fn test_consensus_of_rejected_only_is_neutral() {
    let a = propose(
        "regulus",
        "compliance",
        Category::Governance,
        Polarity::Risk,
        Severity::Critical,
        vec![item(EvidenceKind::PublicRecord, 0.5)],
    );
    let id = a.id.clone();
    let source = Scripted(vec![(
        1,
        ChallengeProposal::new(id, "veritas").with_evidence(item(EvidenceKind::LedgerRecord, 1.0)),
    )]);

    let outcome = DebateCoordinator::default().run(vec![a], &source).unwrap();
    let result = ConsensusBuilder::default().build("acme", outcome).unwrap();

    assert!(result.category_scores.is_empty());
    assert_eq!(result.overall_score, 50.0);
    assert_eq!(result.risk_level, RiskLevel::Moderate);
    assert_eq!(result.count_with_status(FindingStatus::Rejected), 1);
}

#[test]
fn test_round_limit_is_respected() {
    let a = propose(
        "sentinel",
        "environmental",
        Category::Environmental,
        Polarity::Strength,
        Severity::Critical,
        vec![item(EvidenceKind::Certification, 1.0)],
    );
    let id = a.id.clone();
    let source = Scripted(
        (1..=5)
            .map(|r| {
                (
                    r,
                    ChallengeProposal::new(id.clone(), "pulse")
                        .with_evidence(item(EvidenceKind::SocialMedia, 0.05)),
                )
            })
            .collect(),
    );

    let config = DebateConfig {
        rounds: 2,
        ..Default::default()
    };
    let outcome = DebateCoordinator::new(config, ConfidenceModel::default())
        .run(vec![a], &source)
        .unwrap();
    assert_eq!(outcome.rounds.len(), 2);
    assert_eq!(outcome.challenges().count(), 2);
}

fn arb_finding(worker: &'static str) -> impl Strategy<Value = Finding> {
    (
        prop_oneof![
            Just(Category::Environmental),
            Just(Category::Social),
            Just(Category::Governance)
        ],
        prop_oneof![
            Just(Polarity::Strength),
            Just(Polarity::Weakness),
            Just(Polarity::Risk),
            Just(Polarity::Opportunity)
        ],
        prop_oneof![
            Just(Severity::Low),
            Just(Severity::Medium),
            Just(Severity::High),
            Just(Severity::Critical)
        ],
        prop::collection::vec(0.05f64..=1.0, 1..4),
    )
        .prop_map(move |(category, polarity, severity, reliabilities)| {
            let evidence = reliabilities
                .into_iter()
                .map(|r| item(EvidenceKind::Document, r))
                .collect();
            propose(worker, worker, category, polarity, severity, evidence)
        })
}

proptest! {
    #[test]
    fn prop_debate_terminates_in_terminal_states(
        a in arb_finding("a"),
        b in arb_finding("b"),
        c in arb_finding("c"),
        rounds in 0u32..5,
    ) {
        let config = DebateConfig { rounds, ..Default::default() };
        let outcome = DebateCoordinator::new(config, ConfidenceModel::default())
            .run(vec![c, a, b], &ConflictChallenger::default())
            .unwrap();

        prop_assert!(outcome.rounds.len() as u32 <= rounds);
        prop_assert!(outcome.findings.iter().all(|f| f.status().is_terminal()));
        // Ordered by worker regardless of input order.
        let workers: Vec<&str> = outcome.findings.iter().map(|f| f.produced_by.as_str()).collect();
        prop_assert_eq!(workers, vec!["a", "b", "c"]);
        for finding in &outcome.findings {
            let replay = ConfidenceModel::default().calculate(finding.evidence());
            prop_assert_eq!(replay.to_bits(), finding.confidence().to_bits());
        }
    }

    #[test]
    fn prop_unchallenged_findings_are_validated(
        a in arb_finding("a"),
        b in arb_finding("b"),
    ) {
        let outcome = DebateCoordinator::default()
            .run(vec![a, b], &ConflictChallenger::default())
            .unwrap();
        let challenged: std::collections::BTreeSet<_> =
            outcome.challenges().map(|c| c.target.clone()).collect();
        for finding in &outcome.findings {
            if !challenged.contains(&finding.id) {
                prop_assert_eq!(finding.status(), FindingStatus::Validated);
            }
        }
    }
}
