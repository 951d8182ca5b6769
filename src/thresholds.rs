//! Backscatter calibration constants.
//!
//! Drought bands per polarization and the built-in monthly seasonal baseline.
//! Values are fixed empirical constants for bare/vegetated agricultural soil,
//! not computed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// VH returns sit uniformly this many dB below VV at every band.
pub const VH_OFFSET_DB: f64 = -6.0;

/// Baseline used when a month falls outside 1..=12.
pub const DEFAULT_BASELINE_DB: f64 = -10.0;

/// Radar transmit/receive polarization. Unknown strings fall back to `VV`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Polarization {
    #[default]
    VV,
    VH,
}

impl Polarization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarization::VV => "VV",
            Polarization::VH => "VH",
        }
    }

    /// Offset applied to VV-calibrated values to express them in this
    /// polarization's scale.
    pub fn offset_db(&self) -> f64 {
        match self {
            Polarization::VV => 0.0,
            Polarization::VH => VH_OFFSET_DB,
        }
    }
}

impl From<&str> for Polarization {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "VH" => Polarization::VH,
            _ => Polarization::VV,
        }
    }
}

impl From<String> for Polarization {
    fn from(value: String) -> Self {
        Polarization::from(value.as_str())
    }
}

impl From<Polarization> for String {
    fn from(value: Polarization) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of drought bands, in dB, driest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdRow {
    pub extreme_dry: f64,
    pub very_dry: f64,
    pub dry: f64,
    pub moderate: f64,
    pub wet: f64,
    pub very_wet: f64,
}

impl ThresholdRow {
    fn shifted(&self, offset: f64) -> Self {
        Self {
            extreme_dry: self.extreme_dry + offset,
            very_dry: self.very_dry + offset,
            dry: self.dry + offset,
            moderate: self.moderate + offset,
            wet: self.wet + offset,
            very_wet: self.very_wet + offset,
        }
    }
}

static VV_THRESHOLDS: ThresholdRow = ThresholdRow {
    extreme_dry: -18.0,
    very_dry: -15.0,
    dry: -12.0,
    moderate: -10.0,
    wet: -8.0,
    very_wet: -5.0,
};

/// Monthly seasonal baseline (dB) for Mediterranean agricultural land,
/// January first. Shared by both polarizations.
static SEASONAL_BASELINES: [f64; 12] = [
    -9.5, -9.0, -9.5, -10.0, -10.5, -11.5, -12.5, -13.0, -12.0, -11.0, -10.0, -9.5,
];

/// Threshold row for a polarization.
pub fn thresholds_for(polarization: Polarization) -> ThresholdRow {
    VV_THRESHOLDS.shifted(polarization.offset_db())
}

/// Built-in seasonal baseline for `month` (1..=12).
pub fn seasonal_baseline_db(month: u32) -> f64 {
    match month {
        1..=12 => SEASONAL_BASELINES[(month - 1) as usize],
        _ => DEFAULT_BASELINE_DB,
    }
}

/// All twelve monthly baselines, keyed by month number.
pub fn seasonal_baselines() -> Vec<(u32, f64)> {
    (1..=12).map(|m| (m, seasonal_baseline_db(m))).collect()
}
