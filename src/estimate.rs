use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analyzers::severity::Severity;
use crate::analyzers::utility::round_to;
use crate::thresholds::Polarization;

/// Provenance and reliability tag on every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
    Realtime,
    Simulated,
    LowCoverage,
    NoData,
    ComputationError,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::Realtime => "REALTIME",
            QualityFlag::Simulated => "SIMULATED",
            QualityFlag::LowCoverage => "LOW_COVERAGE",
            QualityFlag::NoData => "NO_DATA",
            QualityFlag::ComputationError => "COMPUTATION_ERROR",
        }
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's output record. Built once per call and never mutated, so it
/// can be shared freely across threads and caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroughtEstimate {
    pub mean_db: f64,
    pub min_db: f64,
    pub max_db: f64,
    pub std_db: f64,
    pub median_db: f64,

    pub drought_percentage: f64,
    pub severity: Severity,
    pub soil_moisture_index: f64,

    pub area_km2: f64,
    pub valid_pixel_count: u64,

    pub anomaly_db: Option<f64>,
    pub baseline_db: f64,

    pub polarization: Polarization,
    pub confidence: f64,
    pub quality_flag: QualityFlag,
    pub scene_count: u32,
}

/// Unrounded values produced by an estimation path, before presentation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawEstimate {
    pub mean_db: f64,
    pub min_db: f64,
    pub max_db: f64,
    pub std_db: f64,
    pub median_db: f64,
    pub drought_percentage: f64,
    pub severity: Severity,
    pub soil_moisture_index: f64,
    pub area_km2: f64,
    pub valid_pixel_count: u64,
    pub anomaly_db: Option<f64>,
    pub baseline_db: f64,
    pub polarization: Polarization,
    pub confidence: f64,
    pub quality_flag: QualityFlag,
    pub scene_count: u32,
}

impl From<RawEstimate> for DroughtEstimate {
    /// dB values and area to two decimals, shares and SMI to one.
    fn from(raw: RawEstimate) -> Self {
        DroughtEstimate {
            mean_db: round_to(raw.mean_db, 2),
            min_db: round_to(raw.min_db, 2),
            max_db: round_to(raw.max_db, 2),
            std_db: round_to(raw.std_db, 2),
            median_db: round_to(raw.median_db, 2),
            drought_percentage: round_to(raw.drought_percentage, 1),
            severity: raw.severity,
            soil_moisture_index: round_to(raw.soil_moisture_index, 1),
            area_km2: round_to(raw.area_km2, 2),
            valid_pixel_count: raw.valid_pixel_count,
            anomaly_db: raw.anomaly_db.map(|a| round_to(a, 2)),
            baseline_db: round_to(raw.baseline_db, 2),
            polarization: raw.polarization,
            confidence: raw.confidence,
            quality_flag: raw.quality_flag,
            scene_count: raw.scene_count,
        }
    }
}

impl DroughtEstimate {
    pub fn is_realtime(&self) -> bool {
        self.quality_flag == QualityFlag::Realtime
    }

    /// Whether callers may present this as an observation rather than a model.
    pub fn is_observed(&self) -> bool {
        matches!(
            self.quality_flag,
            QualityFlag::Realtime | QualityFlag::LowCoverage
        )
    }
}
