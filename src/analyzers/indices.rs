//! Derived indices: soil moisture, anomaly and drought-area share.
//!
//! Two area-share estimators coexist. The synthetic path has no pixels, so it
//! infers the share below `dry` from a modeled normal distribution. The cloud
//! path only sees aggregate statistics and uses a fixed tier lookup. Callers
//! pick explicitly; the two are not interchangeable. The tier lookup can go
//! once the backend returns per-pixel histograms.

use crate::thresholds::ThresholdRow;

/// Soil Moisture Index on a 0..=100 scale by linear interpolation between
/// the dry (0) and wet (100) thresholds.
pub fn soil_moisture_index(mean_db: f64, dry_threshold: f64, wet_threshold: f64) -> f64 {
    let span = wet_threshold - dry_threshold;
    if span == 0.0 {
        return if mean_db >= wet_threshold { 100.0 } else { 0.0 };
    }

    let smi = (mean_db - dry_threshold) / span * 100.0;
    if smi.is_nan() {
        return 0.0;
    }
    smi.clamp(0.0, 100.0)
}

/// Deviation of the observed mean from a baseline, in dB. Negative means
/// drier than usual.
pub fn anomaly(mean_db: f64, baseline_db: f64) -> f64 {
    mean_db - baseline_db
}

/// Standard normal cumulative distribution function.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + libm::erf(z / std::f64::consts::SQRT_2))
}

/// Share (0..=100) of a normally distributed backscatter field falling
/// below `dry_threshold`.
pub fn drought_percentage_from_distribution(mean_db: f64, std_db: f64, dry_threshold: f64) -> f64 {
    if !(std_db > 0.0) || !std_db.is_finite() {
        return if mean_db < dry_threshold { 100.0 } else { 0.0 };
    }

    let z = (dry_threshold - mean_db) / std_db;
    normal_cdf(z) * 100.0
}

/// Fixed share assigned from the tier the mean falls into, for when only
/// aggregate statistics are available.
pub fn drought_percentage_from_tiers(mean_db: f64, row: &ThresholdRow) -> f64 {
    match mean_db {
        m if m < row.extreme_dry => 80.0,
        m if m < row.very_dry => 60.0,
        m if m < row.dry => 40.0,
        m if m < row.moderate => 20.0,
        _ => 5.0,
    }
}
