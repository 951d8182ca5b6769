//! Real-data estimator over Sentinel-1 GRD imagery.
//!
//! Sequence: authoritative area, then scene count, then a median composite
//! reduced over the polygon. Missing scenes and null statistics are reported
//! as [`RemoteOutcome::Unavailable`] with the matching quality flag; only
//! transport, auth and input problems are errors.

use chrono::Datelike;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyzers::confidence::{self, ScoringProfile};
use crate::analyzers::indices::{anomaly, drought_percentage_from_tiers, soil_moisture_index};
use crate::analyzers::severity::classify;
use crate::baselines::{BaselineProvider, resolve_baseline};
use crate::error::Result;
use crate::estimate::{DroughtEstimate, QualityFlag, RawEstimate};
use crate::geometry::Polygon;
use crate::parser::{AnalysisMode, DateWindow};
use crate::services::geospatial_api::{
    BandSpec, BandStatistics, CollectionQuery, GeospatialBackend, PropertyFilter, RegionReduction,
    ValueUnits,
};
use crate::thresholds::{Polarization, thresholds_for};

pub const RADAR_COLLECTION: &str = "COPERNICUS/S1_GRD";

/// Square metres per 10 m pixel.
const PIXEL_AREA_M2: f64 = 100.0;

/// Result of one real-data attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome<T = DroughtEstimate> {
    /// A REALTIME estimate.
    Complete(T),
    /// The backend answered but there was nothing usable: no numeric fields
    /// are fabricated.
    Unavailable {
        quality_flag: QualityFlag,
        scene_count: u32,
        reason: String,
    },
}

impl<T> RemoteOutcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

impl RemoteOutcome {
    pub fn quality_flag(&self) -> QualityFlag {
        match self {
            RemoteOutcome::Complete(est) => est.quality_flag,
            RemoteOutcome::Unavailable { quality_flag, .. } => *quality_flag,
        }
    }
}

/// Dual-pol IW-mode scenes carrying `polarization` over the window.
pub fn radar_query(
    geometry: geojson::Geometry,
    date_window: &DateWindow,
    polarization: Polarization,
) -> CollectionQuery {
    CollectionQuery {
        collection: RADAR_COLLECTION.to_string(),
        geometry,
        start: date_window.start.trim().to_string(),
        end: date_window.end.trim().to_string(),
        filters: vec![
            PropertyFilter::Eq {
                property: "instrumentMode".into(),
                value: json!("IW"),
            },
            PropertyFilter::ListContains {
                property: "transmitterReceiverPolarisation".into(),
                value: json!(polarization.as_str()),
            },
        ],
        band: BandSpec::Band {
            name: polarization.as_str().to_string(),
        },
    }
}

/// Region statistics in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecibelStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

fn linear_to_db(v: f64) -> Option<f64> {
    (v > 0.0).then(|| 10.0 * v.log10())
}

/// Converts backend statistics to dB. Returns `None` when the mean is
/// missing or, for linear values, non-positive.
///
/// For linear input the spread is approximated as
/// `10·log10(mean + std) − mean_db`. Missing or unconvertible min/max/median
/// fall back to the mean and a missing spread to zero, each with a warning.
pub fn to_decibels(stats: &BandStatistics) -> Option<DecibelStatistics> {
    let convert = |v: Option<f64>| match stats.units {
        ValueUnits::Decibel => v,
        ValueUnits::Linear => v.and_then(linear_to_db),
    };

    let mean = convert(stats.mean)?;
    let std = match (stats.units, stats.mean, stats.std_dev) {
        (ValueUnits::Decibel, _, Some(s)) => s.abs(),
        (ValueUnits::Linear, Some(m), Some(s)) => linear_to_db(m + s).map_or(0.0, |d| d - mean),
        _ => {
            warn!("Backend returned no spread, assuming homogeneous region");
            0.0
        }
    };

    let or_mean = |field: &'static str, v: Option<f64>| {
        convert(v).unwrap_or_else(|| {
            warn!(field, raw = ?v, mean_db = mean, "Unusable statistic, substituting the mean");
            mean
        })
    };

    Some(DecibelStatistics {
        mean,
        std,
        min: or_mean("min", stats.min),
        max: or_mean("max", stats.max),
        median: or_mean("median", stats.median),
    })
}

/// Builds a REALTIME estimate from dB statistics.
pub(crate) fn assemble_radar_estimate(
    db: &DecibelStatistics,
    area_km2: f64,
    scene_count: u32,
    mode: &AnalysisMode,
    baseline_db: f64,
    baseline_active: bool,
) -> DroughtEstimate {
    let row = thresholds_for(mode.polarization);
    let drought_percentage = drought_percentage_from_tiers(db.mean, &row);

    RawEstimate {
        mean_db: db.mean,
        min_db: db.min,
        max_db: db.max,
        std_db: db.std,
        median_db: db.median,
        drought_percentage,
        severity: classify(db.mean, drought_percentage, &row),
        soil_moisture_index: soil_moisture_index(db.mean, row.dry, row.wet),
        area_km2,
        valid_pixel_count: (area_km2 * 1e6 / PIXEL_AREA_M2) as u64,
        anomaly_db: Some(anomaly(db.mean, baseline_db)),
        baseline_db,
        polarization: mode.polarization,
        confidence: confidence::score(
            ScoringProfile::CloudScenes,
            u64::from(scene_count),
            db.std,
            baseline_active,
        ),
        quality_flag: QualityFlag::Realtime,
        scene_count,
    }
    .into()
}

#[derive(Clone)]
pub struct RemoteSensingEstimator {
    backend: Arc<dyn GeospatialBackend>,
    baselines: Option<Arc<dyn BaselineProvider>>,
}

impl RemoteSensingEstimator {
    pub fn new(backend: Arc<dyn GeospatialBackend>) -> Self {
        Self {
            backend,
            baselines: None,
        }
    }

    pub fn with_baselines(mut self, baselines: Arc<dyn BaselineProvider>) -> Self {
        self.baselines = Some(baselines);
        self
    }

    /// One real-data attempt. Input is validated strictly here: bad geometry
    /// or dates would only turn into opaque backend errors.
    #[tracing::instrument(skip_all, fields(polarization = %mode.polarization))]
    pub async fn estimate(
        &self,
        polygon: &Polygon,
        date_window: &DateWindow,
        mode: &AnalysisMode,
    ) -> Result<RemoteOutcome> {
        polygon.validate()?;
        let (start, _end) = date_window.parse()?;

        let geometry = polygon.to_geojson();
        let area_km2 = self.backend.geodesic_area_m2(&geometry).await? / 1e6;

        let query = radar_query(geometry, date_window, mode.polarization);
        let scenes = self.backend.collection_size(&query).await?;
        let scene_count = u32::try_from(scenes).unwrap_or(u32::MAX);
        if scene_count == 0 {
            info!("No Sentinel-1 scenes for window");
            return Ok(RemoteOutcome::Unavailable {
                quality_flag: QualityFlag::NoData,
                scene_count: 0,
                reason: "no Sentinel-1 scenes matched the polygon and date range".into(),
            });
        }

        let stats = self
            .backend
            .reduce_region(&query, &RegionReduction::default())
            .await?;
        let Some(db) = to_decibels(&stats) else {
            warn!(scene_count, "Reduction returned no usable mean");
            return Ok(RemoteOutcome::Unavailable {
                quality_flag: QualityFlag::ComputationError,
                scene_count,
                reason: "region reduction returned null statistics".into(),
            });
        };
        debug!(mean_db = db.mean, std_db = db.std, scene_count, "Composite statistics");

        let baseline = resolve_baseline(
            self.baselines.as_deref(),
            mode.use_historical_baseline,
            mode.baseline_year,
            start.month(),
            mode.polarization,
        );

        Ok(RemoteOutcome::Complete(assemble_radar_estimate(
            &db,
            area_km2,
            scene_count,
            mode,
            baseline.baseline_db,
            baseline.historical,
        )))
    }
}
