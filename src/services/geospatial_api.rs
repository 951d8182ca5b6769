//! Trait and types for talking to a cloud earth-observation backend.
//!
//! The engine only needs three operations: an authoritative polygon area,
//! the number of scenes matching a query, and a median-composite reduction
//! over the polygon. Anything that can answer those can back the real-data
//! path.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Property filter applied to an image collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum PropertyFilter {
    #[serde(rename = "eq")]
    Eq {
        property: String,
        value: serde_json::Value,
    },
    /// List-valued property contains `value`.
    #[serde(rename = "listContains")]
    ListContains {
        property: String,
        value: serde_json::Value,
    },
    #[serde(rename = "lt")]
    LessThan { property: String, value: f64 },
}

/// Which band the reduction reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BandSpec {
    /// A band stored in the collection, e.g. `VV`.
    Band { name: String },
    /// `(a - b) / (a + b)` computed per image, published as `name`.
    NormalizedDifference { a: String, b: String, name: String },
}

impl BandSpec {
    /// Name the result statistics are keyed by.
    pub fn output_name(&self) -> &str {
        match self {
            BandSpec::Band { name } | BandSpec::NormalizedDifference { name, .. } => name,
        }
    }
}

/// Image collection query: everything intersecting `geometry` within
/// `[start, end]` and passing every filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub collection: String,
    pub geometry: geojson::Geometry,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<PropertyFilter>,
    pub band: BandSpec,
}

impl CollectionQuery {
    /// Replaces any `lt` filter on `property` with a new bound.
    pub fn with_upper_bound(mut self, property: &str, value: f64) -> Self {
        self.filters.retain(
            |f| !matches!(f, PropertyFilter::LessThan { property: p, .. } if p == property),
        );
        self.filters.push(PropertyFilter::LessThan {
            property: property.to_string(),
            value,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Composite {
    Median,
}

/// How to collapse the collection into region statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReduction {
    pub composite: Composite,
    pub scale_m: f64,
    pub max_pixels: f64,
    pub best_effort: bool,
    /// When set, also report the fraction of pixels above this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_above: Option<f64>,
}

impl Default for RegionReduction {
    /// Per-pixel median composite at 10 m with a 1e9 pixel budget.
    fn default() -> Self {
        Self {
            composite: Composite::Median,
            scale_m: 10.0,
            max_pixels: 1e9,
            best_effort: true,
            fraction_above: None,
        }
    }
}

/// Scale of the returned statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueUnits {
    /// Power ratio; needs `10·log10` before thresholding.
    #[default]
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "db")]
    Decibel,
}

/// Region statistics for one band. `None` means the backend returned null,
/// typically an empty or fully masked region.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandStatistics {
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub fraction_above: Option<f64>,
    pub units: ValueUnits,
}

impl BandStatistics {
    /// Reads `<BAND>_mean`, `<BAND>_stdDev`, ... out of a reducer result.
    /// The median is accepted as either `_median` or `_p50`.
    pub fn from_values(band: &str, values: &HashMap<String, Option<f64>>, units: ValueUnits) -> Self {
        let get = |suffix: &str| {
            values
                .get(&format!("{band}_{suffix}"))
                .copied()
                .flatten()
                .filter(|v| v.is_finite())
        };

        Self {
            mean: get("mean"),
            std_dev: get("stdDev"),
            min: get("min"),
            max: get("max"),
            median: get("median").or_else(|| get("p50")),
            fraction_above: get("fraction_above"),
            units,
        }
    }
}

/// Abstraction over a geospatial compute backend.
#[async_trait::async_trait]
pub trait GeospatialBackend: Send + Sync {
    /// Geodesic area of `geometry` in m².
    async fn geodesic_area_m2(&self, geometry: &geojson::Geometry) -> Result<f64>;

    /// Number of images matching `query`.
    async fn collection_size(&self, query: &CollectionQuery) -> Result<u64>;

    /// Composite the collection and reduce it over the query geometry.
    async fn reduce_region(
        &self,
        query: &CollectionQuery,
        reduction: &RegionReduction,
    ) -> Result<BandStatistics>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query() -> CollectionQuery {
        CollectionQuery {
            collection: "COPERNICUS/S2_SR_HARMONIZED".into(),
            geometry: geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]])),
            start: "2023-07-01".into(),
            end: "2023-07-31".into(),
            filters: vec![PropertyFilter::LessThan {
                property: "CLOUDY_PIXEL_PERCENTAGE".into(),
                value: 20.0,
            }],
            band: BandSpec::NormalizedDifference {
                a: "B8".into(),
                b: "B4".into(),
                name: "NDVI".into(),
            },
        }
    }

    #[test]
    fn test_filters_serialize_with_op_tags() {
        let eq = PropertyFilter::Eq {
            property: "instrumentMode".into(),
            value: json!("IW"),
        };
        assert_eq!(
            serde_json::to_value(&eq).unwrap(),
            json!({"op": "eq", "property": "instrumentMode", "value": "IW"})
        );
        let contains = PropertyFilter::ListContains {
            property: "transmitterReceiverPolarisation".into(),
            value: json!("VV"),
        };
        assert_eq!(serde_json::to_value(&contains).unwrap()["op"], "listContains");
    }

    #[test]
    fn test_band_spec_wire_shape() {
        let q = serde_json::to_value(query()).unwrap();
        assert_eq!(q["band"]["type"], "normalizedDifference");
        assert_eq!(q["band"]["name"], "NDVI");
        assert_eq!(q["filters"][0]["op"], "lt");
        assert_eq!(q["geometry"]["type"], "Polygon");
    }

    #[test]
    fn test_with_upper_bound_replaces_filter() {
        let widened = query().with_upper_bound("CLOUDY_PIXEL_PERCENTAGE", 50.0);
        assert_eq!(
            widened.filters,
            vec![PropertyFilter::LessThan {
                property: "CLOUDY_PIXEL_PERCENTAGE".into(),
                value: 50.0
            }]
        );
    }

    #[test]
    fn test_default_reduction() {
        let r = serde_json::to_value(RegionReduction::default()).unwrap();
        assert_eq!(r["composite"], "median");
        assert_eq!(r["scale_m"], 10.0);
        assert_eq!(r["max_pixels"], 1e9);
        assert_eq!(r["best_effort"], true);
        assert!(r.get("fraction_above").is_none());
    }

    #[test]
    fn test_statistics_from_values() {
        let values: HashMap<String, Option<f64>> = serde_json::from_value(json!({
            "VV_mean": 0.05,
            "VV_stdDev": 0.01,
            "VV_min": null,
            "VV_max": 0.2,
            "VV_p50": 0.045
        }))
        .unwrap();
        let stats = BandStatistics::from_values("VV", &values, ValueUnits::Linear);
        assert_eq!(stats.mean, Some(0.05));
        assert_eq!(stats.min, None);
        assert_eq!(stats.median, Some(0.045));
        assert_eq!(stats.fraction_above, None);
    }
}
