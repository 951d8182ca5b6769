//! Optical companion indices from Sentinel-2 surface reflectance.
//!
//! NDVI = (B8 − B4) / (B8 + B4) tracks vegetation vigour; NDWI =
//! (B3 − B8) / (B3 + B8) tracks surface water. Both follow the radar path's
//! composite-then-reduce pattern, with one cloud-filter widening when the
//! strict filter finds nothing, and a seeded synthetic fallback.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyzers::utility::round_to;
use crate::error::Result;
use crate::estimate::QualityFlag;
use crate::geometry::{Polygon, area_km2, centroid};
use crate::parser::DateWindow;
use crate::remote_sensing::RemoteOutcome;
use crate::services::geospatial_api::{
    BandSpec, CollectionQuery, GeospatialBackend, RegionReduction,
};

pub const OPTICAL_COLLECTION: &str = "COPERNICUS/S2_SR_HARMONIZED";
pub const CLOUD_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";
pub const STRICT_CLOUD_MAX: f64 = 20.0;
pub const WIDENED_CLOUD_MAX: f64 = 50.0;

/// NDWI above this is open water.
pub const WATER_NDWI: f64 = 0.3;

/// Location used when the polygon has no vertices.
const FALLBACK_CENTROID: (f64, f64) = (15.0, 49.0);
const FALLBACK_AREA_KM2: f64 = 100.0;

/// Typical Northern Hemisphere cropland NDVI by month, January first.
static MONTHLY_NDVI: [f64; 12] = [
    0.15, 0.18, 0.25, 0.40, 0.55, 0.65, 0.60, 0.55, 0.45, 0.30, 0.20, 0.15,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpticalIndex {
    Ndvi,
    Ndwi,
}

impl OpticalIndex {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpticalIndex::Ndvi => "NDVI",
            OpticalIndex::Ndwi => "NDWI",
        }
    }

    pub fn band(&self) -> BandSpec {
        let (a, b) = match self {
            OpticalIndex::Ndvi => ("B8", "B4"),
            OpticalIndex::Ndwi => ("B3", "B8"),
        };
        BandSpec::NormalizedDifference {
            a: a.into(),
            b: b.into(),
            name: self.as_str().into(),
        }
    }

    pub fn classify(&self, mean: f64) -> IndexClass {
        match self {
            OpticalIndex::Ndvi => match mean {
                m if m > 0.6 => IndexClass::Excellent,
                m if m > 0.4 => IndexClass::Good,
                m if m > 0.2 => IndexClass::Stressed,
                m if m > 0.1 => IndexClass::Poor,
                _ => IndexClass::Barren,
            },
            OpticalIndex::Ndwi => match mean {
                m if m > WATER_NDWI => IndexClass::Water,
                m if m > 0.1 => IndexClass::Wet,
                m if m > -0.1 => IndexClass::Moderate,
                _ => IndexClass::Dry,
            },
        }
    }
}

impl fmt::Display for OpticalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vegetation health (NDVI) or surface wetness (NDWI) class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexClass {
    Excellent,
    Good,
    Stressed,
    Poor,
    Barren,
    Water,
    Wet,
    Moderate,
    Dry,
}

impl IndexClass {
    pub fn description(&self) -> &'static str {
        match self {
            IndexClass::Excellent => "Dense, healthy vegetation",
            IndexClass::Good => "Moderate vegetation, generally healthy",
            IndexClass::Stressed => "Sparse or stressed vegetation",
            IndexClass::Poor => "Very sparse vegetation, mostly bare soil",
            IndexClass::Barren => "No significant vegetation, bare soil or water",
            IndexClass::Water => "Open water body detected",
            IndexClass::Wet => "Moist or wet conditions, possible wetland",
            IndexClass::Moderate => "Mixed conditions, some moisture present",
            IndexClass::Dry => "Dry land, no significant water",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationEstimate {
    pub index: OpticalIndex,
    pub mean_value: f64,
    pub std_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub median_value: f64,
    pub classification: IndexClass,
    /// Share of pixels classed as open water; NDWI only.
    pub water_percentage: Option<f64>,
    pub area_km2: f64,
    pub scene_count: u32,
    pub cloud_filter_pct: f64,
    pub quality_flag: QualityFlag,
}

struct RawVegetation {
    index: OpticalIndex,
    mean: f64,
    std: f64,
    min: f64,
    max: f64,
    median: f64,
    water_percentage: Option<f64>,
    area_km2: f64,
    scene_count: u32,
    cloud_filter_pct: f64,
    quality_flag: QualityFlag,
}

impl From<RawVegetation> for VegetationEstimate {
    fn from(raw: RawVegetation) -> Self {
        let mean_value = round_to(raw.mean, 4);
        VegetationEstimate {
            index: raw.index,
            mean_value,
            std_value: round_to(raw.std, 4),
            min_value: round_to(raw.min, 4),
            max_value: round_to(raw.max, 4),
            median_value: round_to(raw.median, 4),
            classification: raw.index.classify(mean_value),
            water_percentage: raw.water_percentage.map(|w| round_to(w, 1)),
            area_km2: round_to(raw.area_km2, 2),
            scene_count: raw.scene_count,
            cloud_filter_pct: raw.cloud_filter_pct,
            quality_flag: raw.quality_flag,
        }
    }
}

/// Cloud-filtered Sentinel-2 query for `index`.
pub fn optical_query(
    geometry: geojson::Geometry,
    date_window: &DateWindow,
    index: OpticalIndex,
    cloud_max: f64,
) -> CollectionQuery {
    CollectionQuery {
        collection: OPTICAL_COLLECTION.to_string(),
        geometry,
        start: date_window.start.trim().to_string(),
        end: date_window.end.trim().to_string(),
        filters: Vec::new(),
        band: index.band(),
    }
    .with_upper_bound(CLOUD_PROPERTY, cloud_max)
}

#[derive(Clone)]
pub struct OpticalEstimator {
    backend: Arc<dyn GeospatialBackend>,
}

impl OpticalEstimator {
    pub fn new(backend: Arc<dyn GeospatialBackend>) -> Self {
        Self { backend }
    }

    #[tracing::instrument(skip_all, fields(index = %index))]
    pub async fn estimate(
        &self,
        polygon: &Polygon,
        date_window: &DateWindow,
        index: OpticalIndex,
    ) -> Result<RemoteOutcome<VegetationEstimate>> {
        polygon.validate()?;
        date_window.parse()?;

        let geometry = polygon.to_geojson();
        let area_km2 = self.backend.geodesic_area_m2(&geometry).await? / 1e6;

        let mut cloud_max = STRICT_CLOUD_MAX;
        let mut query = optical_query(geometry, date_window, index, cloud_max);
        let mut scenes = self.backend.collection_size(&query).await?;
        if scenes == 0 {
            info!(cloud_max = WIDENED_CLOUD_MAX, "No clear scenes, widening cloud filter");
            cloud_max = WIDENED_CLOUD_MAX;
            query = query.with_upper_bound(CLOUD_PROPERTY, cloud_max);
            scenes = self.backend.collection_size(&query).await?;
        }
        if scenes == 0 {
            return Ok(RemoteOutcome::Unavailable {
                quality_flag: QualityFlag::NoData,
                scene_count: 0,
                reason: format!("no Sentinel-2 scenes under {cloud_max}% cloud"),
            });
        }
        let scene_count = u32::try_from(scenes).unwrap_or(u32::MAX);

        let reduction = RegionReduction {
            fraction_above: (index == OpticalIndex::Ndwi).then_some(WATER_NDWI),
            ..RegionReduction::default()
        };
        let stats = self.backend.reduce_region(&query, &reduction).await?;
        let Some(mean) = stats.mean else {
            warn!(scene_count, "Reduction returned no usable mean");
            return Ok(RemoteOutcome::Unavailable {
                quality_flag: QualityFlag::ComputationError,
                scene_count,
                reason: "region reduction returned null statistics".into(),
            });
        };
        debug!(mean, scene_count, cloud_max, "Optical composite statistics");

        Ok(RemoteOutcome::Complete(
            RawVegetation {
                index,
                mean,
                std: stats.std_dev.unwrap_or(0.0),
                min: stats.min.unwrap_or(mean),
                max: stats.max.unwrap_or(mean),
                median: stats.median.unwrap_or(mean),
                water_percentage: (index == OpticalIndex::Ndwi)
                    .then(|| stats.fraction_above.unwrap_or(0.0) * 100.0),
                area_km2,
                scene_count,
                cloud_filter_pct: cloud_max,
                quality_flag: QualityFlag::Realtime,
            }
            .into(),
        ))
    }
}

/// Seed: `|lat·1000 + lon·100 + month·10|`, plus 42 for NDWI.
pub fn optical_seed(lat: f64, lon: f64, month: u32, index: OpticalIndex) -> u64 {
    let salt = match index {
        OpticalIndex::Ndvi => 0.0,
        OpticalIndex::Ndwi => 42.0,
    };
    (lat * 1000.0 + lon * 100.0 + f64::from(month) * 10.0 + salt).abs() as u64
}

/// Deterministic optical estimate. Never fails.
pub fn synthetic_vegetation(
    polygon: &Polygon,
    date_window: &DateWindow,
    index: OpticalIndex,
) -> VegetationEstimate {
    let ((lon, lat), area) = if polygon.exterior().is_empty() {
        (FALLBACK_CENTROID, FALLBACK_AREA_KM2)
    } else {
        let (lon, lat) = centroid(polygon);
        ((lon, lat), area_km2(polygon, lat))
    };
    let (month, _) = date_window.season_or_default();

    let mut rng = ChaCha8Rng::seed_from_u64(optical_seed(lat, lon, month, index));

    let (mean, std, water_percentage) = match index {
        OpticalIndex::Ndvi => {
            let base = MONTHLY_NDVI[(month.clamp(1, 12) - 1) as usize];
            let mean = (base + 0.08 * rng.sample::<f64, _>(StandardNormal)).clamp(-0.1, 0.9);
            let std = rng.gen_range(0.05..0.15);
            (mean, std, None)
        }
        OpticalIndex::Ndwi => {
            let mean: f64 = rng.gen_range(-0.3..0.1);
            let std = rng.gen_range(0.05..0.15);
            let water = ((mean + 0.3) / 0.6 * 30.0).max(0.0);
            (mean, std, Some(water))
        }
    };
    let median = mean + 0.02 * rng.sample::<f64, _>(StandardNormal);

    RawVegetation {
        index,
        mean,
        std,
        min: mean - 2.0 * std,
        max: mean + 2.0 * std,
        median,
        water_percentage,
        area_km2: area,
        scene_count: 0,
        cloud_filter_pct: STRICT_CLOUD_MAX,
        quality_flag: QualityFlag::Simulated,
    }
    .into()
}
