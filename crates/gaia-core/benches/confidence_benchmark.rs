//! Benchmarks for confidence calculation and audit sealing
//!
//! Run with: cargo bench -p gaia-core

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use gaia_core::{
    AttachedEvidence, AuditTrail, Category, ConfidenceModel, Evidence, EvidenceKind, Finding,
    FindingDraft, FindingId, Polarity, Severity,
};

fn generate_evidence(n: usize) -> Vec<Arc<Evidence>> {
    let now = Utc::now();
    (0..n)
        .map(|i| {
            Arc::new(Evidence::new(
                EvidenceKind::Document,
                format!("source-{}", i),
                0.5 + (i % 5) as f64 * 0.1,
                now - Duration::days(i as i64 * 7),
            ))
        })
        .collect()
}

fn generate_findings(n: usize, model: &ConfidenceModel) -> Vec<Finding> {
    (0..n)
        .map(|i| {
            let mut draft = FindingDraft::new(
                Category::Environmental,
                if i % 2 == 0 { Polarity::Risk } else { Polarity::Strength },
                Severity::Medium,
                format!("claim {}", i),
            );
            for item in generate_evidence(3) {
                draft = draft.with_evidence(item);
            }
            let worker = format!("worker-{}", i % 4);
            Finding::propose(FindingId::new(&worker, i as u32 + 1), &worker, "bench", draft, model)
                .expect("draft has evidence")
        })
        .collect()
}

fn bench_calculate(c: &mut Criterion) {
    let model = ConfidenceModel::default();
    let mut group = c.benchmark_group("ConfidenceModel::calculate");

    for size in [1, 10, 100, 1000].iter() {
        let entries: Vec<AttachedEvidence> = generate_evidence(*size)
            .into_iter()
            .map(AttachedEvidence::supporting)
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &entries, |b, entries| {
            b.iter(|| model.calculate(black_box(entries)))
        });
    }
    group.finish();
}

fn bench_seal(c: &mut Criterion) {
    let model = ConfidenceModel::default();
    let mut group = c.benchmark_group("AuditTrail::seal");

    for size in [10, 100, 500].iter() {
        let findings = generate_findings(*size, &model);
        group.bench_with_input(BenchmarkId::from_parameter(size), &findings, |b, findings| {
            b.iter(|| AuditTrail::seal(black_box(findings.clone()), Vec::new()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_calculate, bench_seal);
criterion_main!(benches);
