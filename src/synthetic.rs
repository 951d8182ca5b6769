//! Deterministic fallback estimator.
//!
//! Produces a plausible, reproducible estimate from location and season
//! alone. Every call seeds its own generator from the polygon centroid and
//! the start date, so the same request always yields the same record and
//! concurrent calls never share random state.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use std::sync::Arc;
use tracing::debug;

use crate::analyzers::confidence::{self, ScoringProfile};
use crate::analyzers::indices::{anomaly, drought_percentage_from_distribution, soil_moisture_index};
use crate::analyzers::severity::classify;
use crate::baselines::{BaselineProvider, resolve_baseline};
use crate::estimate::{DroughtEstimate, QualityFlag, RawEstimate};
use crate::geometry::{Polygon, area_km2, centroid};
use crate::parser::{AnalysisMode, DateWindow};
use crate::thresholds::{DEFAULT_BASELINE_DB, thresholds_for};

/// Nominal Sentinel-1 pixel footprint in square metres (10 m x 10 m).
const PIXEL_AREA_M2: f64 = 100.0;
const MIN_PIXELS: f64 = 1_000.0;
const MAX_PIXELS: f64 = 100_000.0;

/// Spread of the modeled scene, in standard deviations, for min/max.
const EXTREMES_SIGMA: f64 = 2.5;

/// Generator seed: `|lat·1000 + lon·100 + month·10 + year|`.
pub fn seed_for(lat: f64, lon: f64, month: u32, year: i32) -> u64 {
    (lat * 1000.0 + lon * 100.0 + f64::from(month) * 10.0 + f64::from(year)).abs() as u64
}

/// Hemisphere-aware seasonal moisture offset in dB.
pub fn seasonal_offset(lat: f64, month: u32) -> f64 {
    if lat > 0.0 {
        match month {
            6..=8 => -2.5,
            12 | 1 | 2 => 1.5,
            3..=5 => 0.5,
            _ => -1.0,
        }
    } else {
        match month {
            6..=8 => 1.5,
            12 | 1 | 2 => -2.5,
            _ => 0.0,
        }
    }
}

/// Climate-zone bias: drier in the tropics and subtropics, wetter in the
/// boreal belt.
pub fn regional_offset(lat: f64) -> f64 {
    match lat.abs() {
        a if a < 25.0 => -2.0,
        a if a > 55.0 => 1.0,
        _ => 0.0,
    }
}

/// Known drought years.
pub fn interannual_offset(year: i32) -> f64 {
    match year {
        2022 | 2023 => -1.5,
        2024 => -0.5,
        _ => 0.0,
    }
}

#[derive(Clone, Default)]
pub struct SyntheticEstimator {
    baselines: Option<Arc<dyn BaselineProvider>>,
}

impl SyntheticEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baselines(baselines: Arc<dyn BaselineProvider>) -> Self {
        Self {
            baselines: Some(baselines),
        }
    }

    /// Never fails: a degenerate polygon yields centroid `(0, 0)` and an
    /// unparseable start date falls back to June of the current year.
    pub fn estimate(
        &self,
        polygon: &Polygon,
        date_window: &DateWindow,
        mode: &AnalysisMode,
    ) -> DroughtEstimate {
        let (lon, lat) = centroid(polygon);
        let (month, year) = date_window.season_or_default();
        let seed = seed_for(lat, lon, month, year);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let seasonal = seasonal_offset(lat, month);
        let regional = regional_offset(lat);
        let interannual = interannual_offset(year);

        let noise: f64 = rng.sample(StandardNormal);
        let std_db = rng.gen_range(1.5..3.0);
        let median_jitter = 0.3 * rng.sample::<f64, _>(StandardNormal);

        let mean_db = DEFAULT_BASELINE_DB + seasonal + regional + interannual + noise;

        debug!(
            seed,
            lat,
            lon,
            month,
            year,
            seasonal,
            regional,
            interannual,
            "Synthetic draw"
        );

        let row = thresholds_for(mode.polarization);
        let drought_percentage = drought_percentage_from_distribution(mean_db, std_db, row.dry);
        let area = area_km2(polygon, lat);
        let pixels = (area * 1e6 / PIXEL_AREA_M2).clamp(MIN_PIXELS, MAX_PIXELS) as u64;

        let baseline = resolve_baseline(
            self.baselines.as_deref(),
            mode.use_historical_baseline,
            mode.baseline_year,
            month,
            mode.polarization,
        );

        RawEstimate {
            mean_db,
            min_db: mean_db - EXTREMES_SIGMA * std_db,
            max_db: mean_db + EXTREMES_SIGMA * std_db,
            std_db,
            median_db: mean_db + median_jitter,
            drought_percentage,
            severity: classify(mean_db, drought_percentage, &row),
            soil_moisture_index: soil_moisture_index(mean_db, row.dry, row.wet),
            area_km2: area,
            valid_pixel_count: pixels,
            anomaly_db: Some(anomaly(mean_db, baseline.baseline_db)),
            baseline_db: baseline.baseline_db,
            polarization: mode.polarization,
            confidence: confidence::score(
                ScoringProfile::Synthetic,
                pixels,
                std_db,
                baseline.historical,
            ),
            quality_flag: QualityFlag::Simulated,
            scene_count: 0,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::severity::Severity;
    use crate::baselines::HistoricalBaselines;
    use crate::thresholds::Polarization;

    fn spain() -> Polygon {
        Polygon::rectangle(-5.6, 37.9, -5.4, 38.1)
    }

    fn july_2023() -> DateWindow {
        DateWindow::new("2023-07-01", "2023-07-31")
    }

    #[test]
    fn test_offsets() {
        assert_eq!(seasonal_offset(38.0, 7), -2.5);
        assert_eq!(seasonal_offset(38.0, 1), 1.5);
        assert_eq!(seasonal_offset(38.0, 4), 0.5);
        assert_eq!(seasonal_offset(38.0, 10), -1.0);
        assert_eq!(seasonal_offset(-30.0, 7), 1.5);
        assert_eq!(seasonal_offset(-30.0, 12), -2.5);
        assert_eq!(seasonal_offset(-30.0, 4), 0.0);

        assert_eq!(regional_offset(38.0), 0.0);
        assert_eq!(regional_offset(-10.0), -2.0);
        assert_eq!(regional_offset(60.0), 1.0);

        assert_eq!(interannual_offset(2023), -1.5);
        assert_eq!(interannual_offset(2024), -0.5);
        assert_eq!(interannual_offset(2019), 0.0);
    }

    #[test]
    fn test_seed() {
        assert_eq!(seed_for(38.0, -5.5, 7, 2023), 39_543);
        assert_eq!(seed_for(-50.0, 0.0, 1, 0), 49_990);
    }

    #[test]
    fn test_deterministic() {
        let estimator = SyntheticEstimator::new();
        let mode = AnalysisMode::default();
        let a = estimator.estimate(&spain(), &july_2023(), &mode);
        let b = estimator.estimate(&spain(), &july_2023(), &mode);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_different_dates_differ() {
        let estimator = SyntheticEstimator::new();
        let mode = AnalysisMode::default();
        let a = estimator.estimate(&spain(), &july_2023(), &mode);
        let b = estimator.estimate(&spain(), &DateWindow::new("2021-01-10", "2021-01-20"), &mode);
        assert_ne!(a.mean_db, b.mean_db);
    }

    #[test]
    fn test_spain_summer_drought() {
        let est = SyntheticEstimator::new().estimate(&spain(), &july_2023(), &AnalysisMode::default());
        assert_eq!(est.quality_flag, QualityFlag::Simulated);
        assert_eq!(est.scene_count, 0);
        assert!(est.severity >= Severity::Moderate);
        assert!((1.5..=3.0).contains(&est.std_db));
        assert!((est.mean_db - -14.0).abs() < 5.0);
        assert_eq!(est.baseline_db, -12.5);
        assert!(est.anomaly_db.is_some());
        assert!((0.0..=1.0).contains(&est.confidence));
        assert!(est.min_db < est.mean_db && est.mean_db < est.max_db);
    }

    #[test]
    fn test_pixel_count_clamped() {
        let estimator = SyntheticEstimator::new();
        let mode = AnalysisMode::default();
        let tiny = Polygon::rectangle(0.0, 40.0, 0.0001, 40.0001);
        let huge = Polygon::rectangle(0.0, 40.0, 2.0, 42.0);
        assert_eq!(estimator.estimate(&tiny, &july_2023(), &mode).valid_pixel_count, 1_000);
        assert_eq!(estimator.estimate(&huge, &july_2023(), &mode).valid_pixel_count, 100_000);
    }

    #[test]
    fn test_malformed_input_still_answers() {
        let est = SyntheticEstimator::new().estimate(
            &Polygon::new(vec![]),
            &DateWindow::new("not a date", ""),
            &AnalysisMode::default(),
        );
        assert_eq!(est.quality_flag, QualityFlag::Simulated);
        assert_eq!(est.area_km2, 0.0);
        assert_eq!(est.valid_pixel_count, 1_000);
    }

    #[test]
    fn test_vh_shares_mean_but_reads_less_severe() {
        let estimator = SyntheticEstimator::new();
        let vv = estimator.estimate(&spain(), &july_2023(), &AnalysisMode::default());
        let vh = estimator.estimate(
            &spain(),
            &july_2023(),
            &AnalysisMode {
                polarization: Polarization::VH,
                ..AnalysisMode::default()
            },
        );
        assert_eq!(vh.mean_db, vv.mean_db);
        assert_eq!(vh.baseline_db, vv.baseline_db);
        assert_eq!(vh.baseline_db, -12.5);
        assert_eq!(vh.polarization, Polarization::VH);
        assert!(vh.severity < vv.severity);
        assert!(vh.drought_percentage < vv.drought_percentage);
    }

    #[test]
    fn test_historical_baseline_raises_confidence() {
        let mut store = HistoricalBaselines::default();
        store.insert(Polarization::VV, 2020, 7, -11.0);
        let estimator = SyntheticEstimator::with_baselines(Arc::new(store));

        let seasonal = estimator.estimate(&spain(), &july_2023(), &AnalysisMode::default());
        let historical = estimator.estimate(
            &spain(),
            &july_2023(),
            &AnalysisMode {
                use_historical_baseline: true,
                ..AnalysisMode::default()
            },
        );

        assert_eq!(historical.baseline_db, -11.0);
        assert!(historical.confidence > seasonal.confidence);
        assert_eq!(historical.mean_db, seasonal.mean_db);
    }
}
