//! Simulated analysis workers
//!
//! Stand-ins for real data collectors. Each one emits a fixed set of claims
//! about the target, spaced out by a short delay so progress is visible.

use async_trait::async_trait;
use chrono::{DateTime, Duration as Days, Utc};
use std::sync::Arc;
use std::time::Duration;

use gaia_core::{Category, Evidence, EvidenceKind, FindingDraft, Polarity, Severity};
use gaia_runtime::{AnalysisContext, AnalysisWorker, FindingSink, WorkerError};

struct Source {
    kind: EvidenceKind,
    path: &'static str,
    reliability: f64,
    age_days: i64,
}

struct Claim {
    category: Category,
    polarity: Polarity,
    severity: Severity,
    title: &'static str,
    sources: Vec<Source>,
}

fn source(kind: EvidenceKind, path: &'static str, reliability: f64, age_days: i64) -> Source {
    Source {
        kind,
        path,
        reliability,
        age_days,
    }
}

/// A worker replaying a fixed script of claims
pub struct SimulatedWorker {
    id: &'static str,
    domain: &'static str,
    claims: Vec<Claim>,
    as_of: DateTime<Utc>,
    pace: Duration,
    /// Hang after the first claim
    stall: Option<Duration>,
}

impl SimulatedWorker {
    fn draft(&self, target: &str, claim: &Claim) -> FindingDraft {
        let mut draft = FindingDraft::new(
            claim.category.clone(),
            claim.polarity,
            claim.severity,
            claim.title,
        )
        .with_description(format!("{} on {}", self.id, target));

        for s in &claim.sources {
            let evidence = Evidence::new(
                s.kind,
                format!("{}://{}/{}", self.id, target, s.path),
                s.reliability,
                self.as_of - Days::days(s.age_days),
            );
            draft = draft.with_evidence(Arc::new(evidence));
        }
        draft
    }
}

#[async_trait]
impl AnalysisWorker for SimulatedWorker {
    fn id(&self) -> &str {
        self.id
    }

    fn domain(&self) -> &str {
        self.domain
    }

    async fn collect(
        &self,
        target: &str,
        _context: &AnalysisContext,
        sink: &FindingSink,
    ) -> Result<(), WorkerError> {
        if target.trim().is_empty() {
            return Err(WorkerError::InvalidInput("empty target".into()));
        }

        for (i, claim) in self.claims.iter().enumerate() {
            tokio::time::sleep(self.pace).await;
            sink.push(self.draft(target, claim));
            if i == 0 {
                if let Some(stall) = self.stall {
                    tokio::time::sleep(stall).await;
                }
            }
        }
        Ok(())
    }
}

/// Satellite and sensor monitoring
fn sentinel(as_of: DateTime<Utc>) -> SimulatedWorker {
    SimulatedWorker {
        id: "sentinel",
        domain: "environmental",
        claims: vec![Claim {
            category: Category::Environmental,
            polarity: Polarity::Risk,
            severity: Severity::High,
            title: "Land clearing detected around operating sites",
            sources: vec![
                source(EvidenceKind::SatelliteImage, "tiles/2024-q3", 0.9, 20),
                source(EvidenceKind::SensorReading, "air-quality/station-4", 0.8, 12),
            ],
        }],
        as_of,
        pace: Duration::from_millis(150),
        stall: None,
    }
}

/// Verification of the company's own claims
fn veritas(as_of: DateTime<Utc>) -> SimulatedWorker {
    SimulatedWorker {
        id: "veritas",
        domain: "claims",
        claims: vec![
            Claim {
                category: Category::Environmental,
                polarity: Polarity::Strength,
                severity: Severity::High,
                title: "Reports zero net deforestation across supply chain",
                sources: vec![source(EvidenceKind::Document, "sustainability-report", 0.6, 30)],
            },
            Claim {
                category: Category::Governance,
                polarity: Polarity::Strength,
                severity: Severity::Medium,
                title: "Board-level sustainability committee in place",
                sources: vec![source(EvidenceKind::Certification, "governance-charter", 0.85, 90)],
            },
        ],
        as_of,
        pace: Duration::from_millis(100),
        stall: None,
    }
}

/// News and social sentiment
fn pulse(as_of: DateTime<Utc>, slow: bool) -> SimulatedWorker {
    SimulatedWorker {
        id: "pulse",
        domain: "news",
        claims: vec![
            Claim {
                category: Category::Social,
                polarity: Polarity::Risk,
                severity: Severity::Medium,
                title: "Sustained coverage of a labour dispute",
                sources: vec![
                    source(EvidenceKind::NewsArticle, "wire/labour-dispute", 0.65, 7),
                    source(EvidenceKind::SocialMedia, "threads/strike", 0.4, 3),
                ],
            },
            Claim {
                category: Category::Environmental,
                polarity: Polarity::Risk,
                severity: Severity::Medium,
                title: "NGO report alleges clearing of protected land",
                sources: vec![source(EvidenceKind::MediaMention, "ngo/land-report", 0.55, 25)],
            },
        ],
        as_of,
        pace: Duration::from_millis(120),
        stall: slow.then_some(Duration::from_secs(60)),
    }
}

/// Regulatory filings and enforcement records
fn regulus(as_of: DateTime<Utc>) -> SimulatedWorker {
    SimulatedWorker {
        id: "regulus",
        domain: "compliance",
        claims: vec![
            Claim {
                category: Category::Compliance,
                polarity: Polarity::Weakness,
                severity: Severity::High,
                title: "Open notice of violation on a discharge permit",
                sources: vec![source(EvidenceKind::PublicRecord, "enforcement/nov-118", 0.95, 45)],
            },
            Claim {
                category: Category::Governance,
                polarity: Polarity::Strength,
                severity: Severity::Low,
                title: "Annual disclosures filed on schedule",
                sources: vec![source(EvidenceKind::LedgerRecord, "filings/annual", 0.9, 60)],
            },
        ],
        as_of,
        pace: Duration::from_millis(80),
        stall: None,
    }
}

/// The four simulated workers; `slow` makes pulse hang after its first claim
pub fn roster(as_of: DateTime<Utc>, slow: bool) -> Vec<Arc<dyn AnalysisWorker>> {
    vec![
        Arc::new(sentinel(as_of)),
        Arc::new(veritas(as_of)),
        Arc::new(pulse(as_of, slow)),
        Arc::new(regulus(as_of)),
    ]
}
