//! # GAIA Adversarial
//!
//! Adversarial verification of worker findings.
//!
//! Workers contest each other's findings with counter-evidence over a bounded
//! number of rounds; findings that lose too much confidence are rejected, the
//! rest are validated, and contradictions that survive become signals.
//!
//! ## Key Types
//!
//! - [`DebateCoordinator`] — Runs the challenge rounds for one run
//! - [`ConflictChallenger`] — Default challenge source built from conflicting findings
//! - [`ConsensusBuilder`] — Reduces the debate outcome into a scored assessment
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use gaia_adversarial::{ConflictChallenger, ConsensusBuilder, DebateCoordinator};
//! use gaia_core::{
//!     Category, ConfidenceModel, Evidence, EvidenceKind, Finding, FindingDraft, FindingId,
//!     Polarity, Severity,
//! };
//!
//! let model = ConfidenceModel::default();
//! let draft = FindingDraft::new(
//!     Category::Governance,
//!     Polarity::Strength,
//!     Severity::High,
//!     "Independent board",
//! )
//! .with_evidence(Arc::new(Evidence::new(
//!     EvidenceKind::PublicRecord,
//!     "registry",
//!     0.9,
//!     Utc::now(),
//! )));
//! let id = FindingId::new("regulus", 1);
//! let finding = Finding::propose(id, "regulus", "compliance", draft, &model).unwrap();
//!
//! let outcome = DebateCoordinator::default()
//!     .run(vec![finding], &ConflictChallenger::default())
//!     .unwrap();
//! let result = ConsensusBuilder::default().build("acme", outcome).unwrap();
//!
//! assert!(result.overall_score > 50.0);
//! assert!(result.signals.is_empty());
//! ```

pub mod challenger;
pub mod consensus;
pub mod debate;

pub use challenger::ConflictChallenger;
pub use consensus::{category_score, CategoryWeights, ConsensusBuilder, NEUTRAL_SCORE};
pub use debate::{
    ChallengeSource, Debate, DebateConfig, DebateCoordinator, DebateError, DebateOutcome,
};
