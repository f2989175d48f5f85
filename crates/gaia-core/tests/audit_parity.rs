use chrono::{TimeZone, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use gaia_core::{
    AuditTrail, Category, ConfidenceModel, DebateRound, Evidence, EvidenceKind, Finding,
    FindingDraft, FindingId, Polarity, Severity,
};

fn finding(worker: &str, seq: u32, shared: &Arc<Evidence>) -> Finding {
    let own = Arc::new(Evidence::new(
        EvidenceKind::PublicRecord,
        format!("{worker}/filing"),
        0.9,
        Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap(),
    ));
    let draft = FindingDraft::new(
        Category::Governance,
        Polarity::Strength,
        Severity::Medium,
        format!("{worker} finding {seq}"),
    )
    .with_evidence(own)
    .with_evidence(Arc::clone(shared));
    Finding::propose(
        FindingId::new(worker, seq),
        worker,
        "compliance",
        draft,
        &ConfidenceModel::default(),
    )
    .unwrap()
}

#[test]
fn test_digest_matches_independent_sha256() {
    let shared = Arc::new(Evidence::new(
        EvidenceKind::LedgerRecord,
        "ledger/2025",
        0.8,
        Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap(),
    ));
    let findings = vec![finding("regulus", 1, &shared), finding("veritas", 1, &shared)];
    let rounds = vec![DebateRound::new(1)];

    let expected = {
        let bytes = serde_json::to_vec(&(&findings, &rounds)).unwrap();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    };

    let trail = AuditTrail::seal(findings, rounds).unwrap();
    assert_eq!(trail.digest.to_hex(), expected);
    assert!(trail.verify());

    // Shared evidence is listed once.
    assert_eq!(trail.evidence.len(), 3);
}

#[test]
fn test_tampering_is_detected() {
    let shared = Arc::new(Evidence::new(
        EvidenceKind::Document,
        "report",
        0.7,
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
    ));
    let trail = AuditTrail::seal(vec![finding("regulus", 1, &shared)], Vec::new()).unwrap();

    let mut edited = trail.clone();
    edited.findings[0].title = "Something else".into();
    assert!(!edited.verify());

    let mut extended = trail.clone();
    extended.rounds.push(DebateRound::new(2));
    assert!(!extended.verify());

    assert!(trail.verify());
}
