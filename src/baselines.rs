//! Baseline backscatter sources for anomaly computation.
//!
//! [`SeasonalBaselines`] is the built-in monthly table.
//! [`HistoricalBaselines`] holds per-year values loaded from a CSV file:
//!
//! ```text
//! year,month,polarization,baseline_db
//! 2020,7,VV,-12.1
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{EstimationError, Result};
use crate::thresholds::{Polarization, seasonal_baseline_db};

/// Looks up a stored baseline for a given year and month.
pub trait BaselineProvider: Send + Sync {
    fn baseline_db(&self, polarization: Polarization, year: i32, month: u32) -> Option<f64>;
}

/// Year-independent monthly table, the same for both polarizations.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeasonalBaselines;

impl SeasonalBaselines {
    pub fn for_month(&self, month: u32) -> f64 {
        seasonal_baseline_db(month)
    }
}

impl BaselineProvider for SeasonalBaselines {
    fn baseline_db(&self, _polarization: Polarization, _year: i32, month: u32) -> Option<f64> {
        Some(self.for_month(month))
    }
}

#[derive(Debug, Deserialize)]
struct BaselineRow {
    year: i32,
    month: u32,
    polarization: Polarization,
    baseline_db: f64,
}

/// Per-year baselines. Read-only once loaded.
#[derive(Debug, Default, Clone)]
pub struct HistoricalBaselines {
    entries: HashMap<(Polarization, i32, u32), f64>,
}

impl HistoricalBaselines {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut rdr = csv::Reader::from_reader(file);

        let mut baselines = Self::default();
        for result in rdr.deserialize() {
            let row: BaselineRow = result?;
            if !(1..=12).contains(&row.month) {
                return Err(EstimationError::Input(format!(
                    "baseline month {} out of range in {}",
                    row.month,
                    path.display()
                )));
            }
            debug!(year = row.year, month = row.month, polarization = %row.polarization, "Baseline row");
            baselines.insert(row.polarization, row.year, row.month, row.baseline_db);
        }

        info!(path = %path.display(), entries = baselines.len(), "Historical baselines loaded");
        Ok(baselines)
    }

    pub fn insert(&mut self, polarization: Polarization, year: i32, month: u32, baseline_db: f64) {
        self.entries.insert((polarization, year, month), baseline_db);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BaselineProvider for HistoricalBaselines {
    fn baseline_db(&self, polarization: Polarization, year: i32, month: u32) -> Option<f64> {
        self.entries.get(&(polarization, year, month)).copied()
    }
}

/// The baseline an estimate is compared against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBaseline {
    pub baseline_db: f64,
    /// True when a stored historical baseline was found and used.
    pub historical: bool,
}

/// Picks the historical baseline for `baseline_year` when requested and
/// available, otherwise the built-in seasonal value for `month`.
pub fn resolve_baseline(
    historical: Option<&dyn BaselineProvider>,
    use_historical: bool,
    baseline_year: i32,
    month: u32,
    polarization: Polarization,
) -> ResolvedBaseline {
    if use_historical {
        if let Some(db) = historical.and_then(|p| p.baseline_db(polarization, baseline_year, month)) {
            return ResolvedBaseline {
                baseline_db: db,
                historical: true,
            };
        }
        debug!(baseline_year, month, "No historical baseline, using seasonal table");
    }

    ResolvedBaseline {
        baseline_db: SeasonalBaselines.for_month(month),
        historical: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_seasonal_provider_always_answers() {
        assert_eq!(SeasonalBaselines.baseline_db(Polarization::VV, 1999, 8), Some(-13.0));
        assert_eq!(SeasonalBaselines.baseline_db(Polarization::VH, 2020, 8), Some(-13.0));
    }

    #[test]
    fn test_load_csv() {
        let path = temp_path("sar_drought_test_baselines.csv");
        fs::write(
            &path,
            "year,month,polarization,baseline_db\n2020,7,VV,-12.1\n2020,7,VH,-18.4\n",
        )
        .unwrap();

        let baselines = HistoricalBaselines::load(&path).unwrap();
        assert_eq!(baselines.len(), 2);
        assert_eq!(baselines.baseline_db(Polarization::VV, 2020, 7), Some(-12.1));
        assert_eq!(baselines.baseline_db(Polarization::VH, 2020, 7), Some(-18.4));
        assert_eq!(baselines.baseline_db(Polarization::VV, 2021, 7), None);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_rejects_bad_month() {
        let path = temp_path("sar_drought_test_baselines_bad.csv");
        fs::write(&path, "year,month,polarization,baseline_db\n2020,13,VV,-12.1\n").unwrap();
        assert!(HistoricalBaselines::load(&path).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_resolve_prefers_historical_only_when_requested() {
        let mut store = HistoricalBaselines::default();
        store.insert(Polarization::VV, 2020, 7, -11.0);

        let used = resolve_baseline(Some(&store), true, 2020, 7, Polarization::VV);
        assert_eq!(used, ResolvedBaseline { baseline_db: -11.0, historical: true });

        let ignored = resolve_baseline(Some(&store), false, 2020, 7, Polarization::VV);
        assert_eq!(ignored, ResolvedBaseline { baseline_db: -12.5, historical: false });

        let missing = resolve_baseline(Some(&store), true, 2019, 7, Polarization::VV);
        assert!(!missing.historical);

        let no_store = resolve_baseline(None, true, 2020, 7, Polarization::VV);
        assert!(!no_store.historical);

        let vh = resolve_baseline(Some(&store), true, 2020, 7, Polarization::VH);
        assert_eq!(vh, ResolvedBaseline { baseline_db: -12.5, historical: false });
    }
}
