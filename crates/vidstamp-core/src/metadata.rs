use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which strategy produced the timestamp, in decreasing order of authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    AtomParse,
    FilenamePattern,
    SequenceInterpolation,
    ProviderFallback,
    None,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtomParse => write!(f, "atom-parse"),
            Self::FilenamePattern => write!(f, "filename-pattern"),
            Self::SequenceInterpolation => write!(f, "sequence-interpolation"),
            Self::ProviderFallback => write!(f, "provider-fallback"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Reliability tier of a recovered timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// The engine's sole output: best-effort capture metadata for one file.
/// Created fresh per extraction, immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResult {
    /// Original capture instant, UTC, second precision.
    pub original_timestamp: Option<DateTime<Utc>>,
    pub gps: Option<GpsCoordinates>,
    /// Free-text make/model/software identity.
    pub device_info: Option<String>,
    pub extraction_method: ExtractionMethod,
    /// `None` exactly when no timestamp was recovered.
    pub confidence: Option<Confidence>,
}

impl MetadataResult {
    /// Terminal "no date found" outcome. A reportable state, not an error.
    pub fn none() -> Self {
        Self {
            original_timestamp: None,
            gps: None,
            device_info: None,
            extraction_method: ExtractionMethod::None,
            confidence: None,
        }
    }

    pub fn dated(timestamp: DateTime<Utc>, method: ExtractionMethod, confidence: Confidence) -> Self {
        Self {
            original_timestamp: Some(timestamp),
            gps: None,
            device_info: None,
            extraction_method: method,
            confidence: Some(confidence),
        }
    }
}
