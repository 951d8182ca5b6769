//! Per-pixel analysis of calibrated backscatter grids.
//!
//! This is the path for imagery that is already on disk (GeoTIFF exports,
//! CSV grids). Unlike the cloud path, every pixel is seen, so the drought
//! share is counted rather than inferred.

use ndarray::Array2;
use tracing::debug;

use crate::analyzers::confidence::{self, MIN_VALID_PIXELS, ScoringProfile};
use crate::analyzers::indices::{anomaly, soil_moisture_index};
use crate::analyzers::severity::classify;
use crate::analyzers::speckle::{DEFAULT_WINDOW, lee_filter};
use crate::analyzers::utility::{mean, median, min_max, stddev};
use crate::error::{EstimationError, Result};
use crate::estimate::{DroughtEstimate, QualityFlag, RawEstimate};
use crate::thresholds::{DEFAULT_BASELINE_DB, Polarization, thresholds_for};

/// Sentinel-1 GRD calibration source: a per-pixel lookup table or a single
/// calibration constant.
#[derive(Debug, Clone)]
pub enum Calibration {
    Lut(Array2<f64>),
    Constant(f64),
}

/// Converts digital numbers to linear sigma-nought: `DN² / A²`.
/// Zero or NaN digital numbers are no-data and become NaN.
///
/// # Errors
///
/// Returns [`EstimationError::Input`] when a lookup table does not match the
/// grid's shape.
pub fn calibrate_dn(dn: &Array2<f64>, calibration: &Calibration) -> Result<Array2<f64>> {
    let to_sigma = |d: f64, a: f64| {
        if d == 0.0 || d.is_nan() || a == 0.0 {
            f64::NAN
        } else {
            d * d / (a * a)
        }
    };

    match calibration {
        Calibration::Constant(a) => Ok(dn.mapv(|d| to_sigma(d, *a))),
        Calibration::Lut(lut) => {
            if lut.dim() != dn.dim() {
                return Err(EstimationError::Input(format!(
                    "calibration LUT is {:?} but the grid is {:?}",
                    lut.dim(),
                    dn.dim()
                )));
            }
            let mut out = dn.clone();
            ndarray::Zip::from(&mut out)
                .and(lut)
                .for_each(|o, &a| *o = to_sigma(*o, a));
            Ok(out)
        }
    }
}

/// `10·log10(x)`; non-positive and NaN values become NaN.
pub fn linear_to_db(linear: &Array2<f64>) -> Array2<f64> {
    linear.mapv(|v| if v > 0.0 { 10.0 * v.log10() } else { f64::NAN })
}

/// Options for [`analyze_array`].
#[derive(Debug, Clone, Copy)]
pub struct ArrayAnalysis {
    pub pixel_size_m: f64,
    pub polarization: Polarization,
    pub apply_speckle_filter: bool,
    /// Baseline to compare against; `None` means comparison is inactive.
    pub baseline_db: Option<f64>,
}

impl Default for ArrayAnalysis {
    fn default() -> Self {
        Self {
            pixel_size_m: 10.0,
            polarization: Polarization::VV,
            apply_speckle_filter: true,
            baseline_db: None,
        }
    }
}

/// Builds a drought estimate from a grid of backscatter values in dB.
///
/// NaN pixels are excluded. The result is REALTIME when at least
/// [`MIN_VALID_PIXELS`] valid pixels remain, LOW_COVERAGE otherwise.
pub fn analyze_array(grid: &Array2<f64>, options: &ArrayAnalysis) -> DroughtEstimate {
    let filtered;
    let grid = if options.apply_speckle_filter {
        filtered = lee_filter(grid, DEFAULT_WINDOW);
        &filtered
    } else {
        grid
    };

    let valid: Vec<f64> = grid.iter().copied().filter(|v| v.is_finite()).collect();
    let valid_count = valid.len() as u64;
    let row = thresholds_for(options.polarization);

    let dry_pixels = valid.iter().filter(|&&v| v < row.dry).count();
    let drought_percentage = if valid.is_empty() {
        0.0
    } else {
        dry_pixels as f64 / valid.len() as f64 * 100.0
    };

    let mean_db = mean(&valid);
    let std_db = stddev(&valid, mean_db);
    let (min_db, max_db) = min_max(&valid);
    let median_db = median(&valid);

    let quality_flag = if valid_count >= MIN_VALID_PIXELS {
        QualityFlag::Realtime
    } else {
        QualityFlag::LowCoverage
    };

    debug!(
        valid_pixels = valid_count,
        dry_pixels,
        mean_db,
        "Array analysis"
    );

    RawEstimate {
        mean_db,
        min_db,
        max_db,
        std_db,
        median_db,
        drought_percentage,
        severity: classify(mean_db, drought_percentage, &row),
        soil_moisture_index: soil_moisture_index(mean_db, row.dry, row.wet),
        area_km2: valid_count as f64 * options.pixel_size_m.powi(2) / 1e6,
        valid_pixel_count: valid_count,
        anomaly_db: options.baseline_db.map(|b| anomaly(mean_db, b)),
        baseline_db: options.baseline_db.unwrap_or(DEFAULT_BASELINE_DB),
        polarization: options.polarization,
        confidence: confidence::score(
            ScoringProfile::PixelArray,
            valid_count,
            std_db,
            options.baseline_db.is_some(),
        ),
        quality_flag,
        scene_count: 1,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::severity::Severity;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn no_filter(polarization: Polarization) -> ArrayAnalysis {
        ArrayAnalysis {
            apply_speckle_filter: false,
            polarization,
            ..ArrayAnalysis::default()
        }
    }

    #[test]
    fn test_calibrate_constant() {
        let dn = array![[0.0, 100.0], [f64::NAN, 50.0]];
        let sigma = calibrate_dn(&dn, &Calibration::Constant(10.0)).unwrap();
        assert!(sigma[[0, 0]].is_nan());
        assert!(sigma[[1, 0]].is_nan());
        assert_relative_eq!(sigma[[0, 1]], 100.0);
        assert_relative_eq!(sigma[[1, 1]], 25.0);
    }

    #[test]
    fn test_calibrate_lut() {
        let dn = array![[10.0, 10.0]];
        let lut = array![[1.0, 10.0]];
        let sigma = calibrate_dn(&dn, &Calibration::Lut(lut)).unwrap();
        assert_relative_eq!(sigma[[0, 0]], 100.0);
        assert_relative_eq!(sigma[[0, 1]], 1.0);
    }

    #[test]
    fn test_calibrate_lut_shape_mismatch_is_input_error() {
        let dn = array![[10.0, 10.0], [20.0, 20.0]];
        let lut = array![[1.0, 10.0]];
        assert!(matches!(
            calibrate_dn(&dn, &Calibration::Lut(lut)),
            Err(EstimationError::Input(_))
        ));
    }

    #[test]
    fn test_linear_to_db_guards_non_positive() {
        let db = linear_to_db(&array![[0.1, 0.0, -1.0, 1.0]]);
        assert_relative_eq!(db[[0, 0]], -10.0);
        assert!(db[[0, 1]].is_nan());
        assert!(db[[0, 2]].is_nan());
        assert_relative_eq!(db[[0, 3]], 0.0);
    }

    #[test]
    fn test_counts_dry_pixels() {
        // 60 of 200 pixels below the VV dry threshold (-12 dB).
        let mut grid = Array2::from_elem((10, 20), -9.0);
        for (i, v) in grid.iter_mut().enumerate() {
            if i < 60 {
                *v = -14.0;
            }
        }
        let est = analyze_array(&grid, &no_filter(Polarization::VV));

        assert_eq!(est.valid_pixel_count, 200);
        assert_eq!(est.drought_percentage, 30.0);
        assert_eq!(est.severity, Severity::Moderate);
        assert_eq!(est.quality_flag, QualityFlag::Realtime);
        assert_eq!(est.area_km2, 0.02);
        assert_eq!(est.anomaly_db, None);
        assert_eq!(est.min_db, -14.0);
        assert_eq!(est.max_db, -9.0);
    }

    #[test]
    fn test_nan_pixels_excluded_and_low_coverage() {
        let mut grid = Array2::from_elem((5, 5), -11.0);
        grid[[0, 0]] = f64::NAN;
        let est = analyze_array(&grid, &no_filter(Polarization::VV));
        assert_eq!(est.valid_pixel_count, 24);
        assert_eq!(est.quality_flag, QualityFlag::LowCoverage);
        assert_eq!(est.mean_db, -11.0);
        assert_eq!(est.std_db, 0.0);
    }

    #[test]
    fn test_empty_grid() {
        let grid = Array2::<f64>::from_elem((0, 0), 0.0);
        let est = analyze_array(&grid, &ArrayAnalysis::default());
        assert_eq!(est.valid_pixel_count, 0);
        assert_eq!(est.mean_db, 0.0);
        assert_eq!(est.drought_percentage, 0.0);
        assert_eq!(est.quality_flag, QualityFlag::LowCoverage);
    }

    #[test]
    fn test_baseline_activates_anomaly_and_confidence() {
        let grid = Array2::from_elem((40, 40), -13.0);
        let options = ArrayAnalysis {
            baseline_db: Some(-12.5),
            ..no_filter(Polarization::VV)
        };
        let est = analyze_array(&grid, &options);
        assert_eq!(est.anomaly_db, Some(-0.5));
        assert_eq!(est.baseline_db, -12.5);
        // 1600 px -> 0.8, uniform -> 1.0, baseline -> 1.0
        assert_eq!(est.confidence, 0.8);

        let without = analyze_array(&grid, &no_filter(Polarization::VV));
        assert_eq!(without.confidence, 0.64);
    }

    #[test]
    fn test_vh_grid_uses_shifted_thresholds() {
        let grid = Array2::from_elem((20, 20), -16.0);
        let vv = analyze_array(&grid, &no_filter(Polarization::VV));
        let vh = analyze_array(&grid, &no_filter(Polarization::VH));
        assert!(vh.severity < vv.severity);
    }
}
