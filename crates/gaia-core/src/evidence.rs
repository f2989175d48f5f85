//! Evidence types
//!
//! An [`Evidence`] item is created once by a worker and never mutated.
//! Findings hold it behind an `Arc`, so the same item can back several
//! findings (and challenges) within a run without being copied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an evidence item
pub type EvidenceId = Uuid;

/// Category of an observed fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Document,
    SensorReading,
    Certification,
    LedgerRecord,
    MediaMention,
    PublicRecord,
    SatelliteImage,
    NewsArticle,
    SocialMedia,
    ShippingManifest,
    ApiResponse,
}

impl EvidenceKind {
    /// Stable snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::SensorReading => "sensor_reading",
            Self::Certification => "certification",
            Self::LedgerRecord => "ledger_record",
            Self::MediaMention => "media_mention",
            Self::PublicRecord => "public_record",
            Self::SatelliteImage => "satellite_image",
            Self::NewsArticle => "news_article",
            Self::SocialMedia => "social_media",
            Self::ShippingManifest => "shipping_manifest",
            Self::ApiResponse => "api_response",
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed fact supporting or undermining a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Unique identifier within a run
    pub id: EvidenceId,
    /// What kind of fact this is
    pub kind: EvidenceKind,
    /// Provenance (URL, dataset, sensor id, ...)
    pub source: String,
    /// Short human-readable summary
    pub description: String,
    /// Reliability of the source (0.0 - 1.0)
    reliability: f64,
    /// When the fact was observed
    pub observed_at: DateTime<Utc>,
}

impl Evidence {
    /// Create a new evidence item. Reliability is clamped to [0, 1]; NaN becomes 0.
    pub fn new(
        kind: EvidenceKind,
        source: impl Into<String>,
        reliability: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let reliability = if reliability.is_nan() {
            0.0
        } else {
            reliability.clamp(0.0, 1.0)
        };

        Self {
            id: Uuid::new_v4(),
            kind,
            source: source.into(),
            description: String::new(),
            reliability,
            observed_at,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Reliability in [0, 1], fixed at creation
    pub fn reliability(&self) -> f64 {
        self.reliability
    }
}
