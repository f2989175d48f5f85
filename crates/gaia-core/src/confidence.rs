//! Confidence calculation
//!
//! Pure and deterministic: the same ordered evidence list always yields the
//! same value, so any finding's confidence can be replayed from its audit
//! trail. No wall clock is read; recency is measured against the newest
//! supporting item in the list.
//!
//! ```text
//! base  = min(1, recency_weighted_mean(reliability) + bonus(n))
//! bonus = volume_bonus_max * (1 - 0.5^(n - 1))
//! for each challenge, in attachment order:
//!     c = c * (1 - mean(counter reliability) * domain_weight)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::challenge::ChallengeId;
use crate::evidence::Evidence;
use crate::finding::{AttachedEvidence, EvidenceRole};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Parameters of the confidence calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceModel {
    /// Age (days) at which an item's weight halves; <= 0 disables decay
    pub recency_half_life_days: f64,
    /// Upper bound of the evidence-count bonus
    pub volume_bonus_max: f64,
    /// Scale applied to counter-evidence from a different domain
    pub cross_domain_weight: f64,
    /// Scale applied to counter-evidence from the producer's own domain
    pub same_domain_weight: f64,
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self {
            recency_half_life_days: 365.0,
            volume_bonus_max: 0.10,
            cross_domain_weight: 0.60,
            same_domain_weight: 0.40,
        }
    }
}

impl ConfidenceModel {
    /// Confidence for an ordered list of attached evidence
    pub fn calculate(&self, evidence: &[AttachedEvidence]) -> f64 {
        let supporting: Vec<&Evidence> = evidence
            .iter()
            .filter(|e| e.is_supporting())
            .map(|e| e.evidence.as_ref())
            .collect();

        let mut confidence = self.base_confidence(&supporting);

        // Counter entries of one challenge are appended together, so grouping
        // consecutive entries by challenge id recovers each challenge.
        let mut current: Option<(ChallengeId, bool)> = None;
        let mut group: Vec<f64> = Vec::new();

        for entry in evidence {
            if let EvidenceRole::Counter {
                challenge,
                cross_domain,
            } = entry.role
            {
                if let Some((id, cross)) = current {
                    if id != challenge {
                        confidence *= 1.0 - self.counter_weight(&group, cross);
                        group.clear();
                    }
                }
                current = Some((challenge, cross_domain));
                group.push(entry.evidence.reliability());
            }
        }
        if let Some((_, cross)) = current {
            confidence *= 1.0 - self.counter_weight(&group, cross);
        }

        confidence.clamp(0.0, 1.0)
    }

    /// Recency-weighted mean reliability plus a saturating volume bonus
    pub fn base_confidence(&self, supporting: &[&Evidence]) -> f64 {
        let Some(newest) = supporting.iter().map(|e| e.observed_at).max() else {
            return 0.0;
        };

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for item in supporting {
            let weight = self.recency_weight(item.observed_at, newest);
            weighted_sum += item.reliability() * weight;
            total_weight += weight;
        }

        let mean = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        };

        (mean + self.volume_bonus(supporting.len())).min(1.0)
    }

    /// Bonus for `n` independent supporting items: zero for one, approaches the max
    pub fn volume_bonus(&self, n: usize) -> f64 {
        if n <= 1 {
            return 0.0;
        }
        self.volume_bonus_max * (1.0 - 0.5_f64.powi(n as i32 - 1))
    }

    /// Fraction of confidence removed by one challenge
    pub fn counter_weight(&self, reliabilities: &[f64], cross_domain: bool) -> f64 {
        if reliabilities.is_empty() {
            return 0.0;
        }
        let mean = reliabilities.iter().sum::<f64>() / reliabilities.len() as f64;
        let scale = if cross_domain {
            self.cross_domain_weight
        } else {
            self.same_domain_weight
        };
        (mean * scale).clamp(0.0, 1.0)
    }

    fn recency_weight(&self, observed_at: DateTime<Utc>, newest: DateTime<Utc>) -> f64 {
        if self.recency_half_life_days <= 0.0 {
            return 1.0;
        }
        let age_days = (newest - observed_at).num_milliseconds() as f64 / MILLIS_PER_DAY;
        0.5_f64.powf(age_days.max(0.0) / self.recency_half_life_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceKind;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn at(days: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(days)
    }

    fn supporting(reliability: f64, day: i64) -> AttachedEvidence {
        AttachedEvidence::supporting(Arc::new(Evidence::new(
            EvidenceKind::Document,
            "src",
            reliability,
            at(day),
        )))
    }

    fn counter(reliability: f64, challenge: u32, cross_domain: bool) -> AttachedEvidence {
        AttachedEvidence {
            evidence: Arc::new(Evidence::new(
                EvidenceKind::MediaMention,
                "src",
                reliability,
                at(0),
            )),
            role: EvidenceRole::Counter {
                challenge: ChallengeId(challenge),
                cross_domain,
            },
        }
    }

    #[test]
    fn test_empty_evidence_is_zero() {
        assert_eq!(ConfidenceModel::default().calculate(&[]), 0.0);
    }

    #[test]
    fn test_single_item_equals_reliability() {
        let model = ConfidenceModel::default();
        assert!((model.calculate(&[supporting(0.9, 0)]) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_recent_evidence_weighs_more() {
        let model = ConfidenceModel::default();
        // Old low-reliability item, new high-reliability item
        let recent_strong = model.calculate(&[supporting(0.2, 0), supporting(0.8, 730)]);
        // Old high-reliability item, new low-reliability item
        let recent_weak = model.calculate(&[supporting(0.8, 0), supporting(0.2, 730)]);
        assert!(recent_strong > recent_weak);
    }

    #[test]
    fn test_volume_bonus_saturates() {
        let model = ConfidenceModel::default();
        assert_eq!(model.volume_bonus(1), 0.0);
        let four = model.volume_bonus(4);
        let forty = model.volume_bonus(40);
        assert!(four > 0.08);
        assert!(forty - four < 0.0126);
        assert!(forty <= model.volume_bonus_max);
    }

    #[test]
    fn test_cross_domain_counter_weighs_more() {
        let model = ConfidenceModel::default();
        let cross = model.calculate(&[supporting(0.9, 0), counter(0.8, 1, true)]);
        let same = model.calculate(&[supporting(0.9, 0), counter(0.8, 1, false)]);
        assert!(cross < same);
        // 0.9 * (1 - 0.8 * 0.6)
        assert!((cross - 0.468).abs() < 1e-9);
    }

    #[test]
    fn test_challenges_compound_in_order() {
        let model = ConfidenceModel::default();
        let c = model.calculate(&[
            supporting(0.8, 0),
            counter(0.7, 1, true),
            counter(0.7, 2, true),
        ]);
        // 0.8 * 0.58 * 0.58
        assert!((c - 0.26912).abs() < 1e-9);
    }

    #[test]
    fn test_counter_items_of_one_challenge_are_averaged() {
        let model = ConfidenceModel::default();
        let c = model.calculate(&[
            supporting(1.0, 0),
            counter(0.4, 1, false),
            counter(0.8, 1, false),
        ]);
        assert!((c - (1.0 - 0.6 * 0.4)).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_confidence_is_bounded_and_replayable(
            support in prop::collection::vec((0.0f64..=1.0, 0i64..2000), 1..8),
            counters in prop::collection::vec((0.0f64..=1.0, any::<bool>()), 0..6),
        ) {
            let model = ConfidenceModel::default();
            let mut list: Vec<AttachedEvidence> =
                support.iter().map(|(r, d)| supporting(*r, *d)).collect();
            for (i, (r, cross)) in counters.iter().enumerate() {
                list.push(counter(*r, i as u32 + 1, *cross));
            }

            let first = model.calculate(&list);
            let replay = model.calculate(&list.clone());
            prop_assert!((0.0..=1.0).contains(&first));
            prop_assert_eq!(first.to_bits(), replay.to_bits());
        }

        #[test]
        fn prop_counter_evidence_never_raises_confidence(
            base in 0.0f64..=1.0,
            counters in prop::collection::vec((0.0f64..=1.0, any::<bool>()), 1..6),
        ) {
            let model = ConfidenceModel::default();
            let mut list = vec![supporting(base, 0)];
            let mut previous = model.calculate(&list);
            for (i, (r, cross)) in counters.iter().enumerate() {
                list.push(counter(*r, i as u32 + 1, *cross));
                let next = model.calculate(&list);
                prop_assert!(next <= previous + 1e-12);
                previous = next;
            }
        }
    }
}
