//! # GAIA Core
//!
//! Core types for the GAIA analysis engine:
//! - [`Evidence`] — Immutable, shared unit of supporting or contradicting data
//! - [`Finding`] — A worker's evidence-backed claim with a lifecycle status
//! - [`Challenge`] / [`DebateRound`] — Adversarial contests and their rounds
//! - [`ConfidenceModel`] — Deterministic confidence calculation
//! - [`ConsensusResult`] — Final assessment with its audit trail

pub mod assessment;
pub mod audit;
pub mod challenge;
pub mod confidence;
pub mod error;
pub mod evidence;
pub mod finding;

pub use assessment::{
    AuditTrail, CategoryScore, ConsensusResult, Grade, GreenwashingPattern, RiskLevel, Signal,
};
pub use audit::Hash;
pub use challenge::{
    Challenge, ChallengeId, ChallengeProposal, ChallengeRejection, DebateRound, RejectedChallenge,
    Resolution,
};
pub use confidence::ConfidenceModel;
pub use error::ModelError;
pub use evidence::{Evidence, EvidenceId, EvidenceKind};
pub use finding::{
    AttachedEvidence, Category, ConfidenceLevel, EvidenceRole, Finding, FindingDraft, FindingId,
    FindingStatus, Polarity, Severity, WorkerId,
};
