//! Planar polygon math used by the synthetic path and for pixel-count estimates.
//!
//! Area here is a spherical-earth flat approximation (111 km per degree,
//! scaled by `cos(lat)` on both axes). It is adequate for fields up to a few
//! hundred km² at moderate latitudes; the real-data path asks the backend for
//! a geodesic area instead.

use geojson::{Geometry, Value};
use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, Result};

/// Kilometres per degree of arc on the reference sphere.
pub const KM_PER_DEGREE: f64 = 111.0;

/// A polygon as ordered `(lon, lat)` rings. Only the first (exterior) ring is
/// used; holes are carried through untouched for map output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub rings: Vec<Vec<[f64; 2]>>,
}

impl Polygon {
    pub fn new(exterior: Vec<[f64; 2]>) -> Self {
        Self {
            rings: vec![exterior],
        }
    }

    /// Convenience constructor for an axis-aligned, closed rectangle.
    pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self::new(vec![
            [min_lon, min_lat],
            [max_lon, min_lat],
            [max_lon, max_lat],
            [min_lon, max_lat],
            [min_lon, min_lat],
        ])
    }

    pub fn exterior(&self) -> &[[f64; 2]] {
        self.rings.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reads a GeoJSON geometry. Anything other than a `Polygon` is rejected;
    /// ring validity is left to [`Polygon::validate`] so the synthetic path can
    /// still run on degenerate input.
    pub fn from_geojson(geometry: &Geometry) -> Result<Self> {
        let Value::Polygon(rings) = &geometry.value else {
            return Err(EstimationError::Input(format!(
                "expected a Polygon geometry, got {}",
                geometry_kind(&geometry.value)
            )));
        };

        let mut out = Vec::with_capacity(rings.len());
        for ring in rings {
            let mut vertices = Vec::with_capacity(ring.len());
            for position in ring {
                match position.as_slice() {
                    [lon, lat, ..] => vertices.push([*lon, *lat]),
                    _ => {
                        return Err(EstimationError::Input(
                            "polygon position needs at least two coordinates".to_string(),
                        ));
                    }
                }
            }
            out.push(vertices);
        }

        Ok(Self { rings: out })
    }

    pub fn to_geojson(&self) -> Geometry {
        let rings = self
            .rings
            .iter()
            .map(|ring| ring.iter().map(|[lon, lat]| vec![*lon, *lat]).collect())
            .collect();
        Geometry::new(Value::Polygon(rings))
    }

    /// Strict check applied before a polygon is sent to the backend: the
    /// exterior ring needs at least three distinct vertices.
    pub fn validate(&self) -> Result<()> {
        let ring = self.exterior();
        let mut distinct: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
        for vertex in ring {
            if !vertex.iter().all(|c| c.is_finite()) {
                return Err(EstimationError::Input(
                    "polygon contains a non-finite coordinate".to_string(),
                ));
            }
            if !distinct.contains(vertex) {
                distinct.push(*vertex);
            }
        }

        if distinct.len() < 3 {
            return Err(EstimationError::Input(format!(
                "exterior ring has {} distinct vertices, need at least 3",
                distinct.len()
            )));
        }

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        let ring = self.exterior();
        ring.len() > 1 && ring.first() == ring.last()
    }
}

fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Arithmetic mean of the exterior ring's vertices as `(lon, lat)`.
///
/// An empty ring yields `(0, 0)`; callers treat that as a sentinel, not a
/// real location.
pub fn centroid(polygon: &Polygon) -> (f64, f64) {
    let ring = polygon.exterior();
    if ring.is_empty() {
        return (0.0, 0.0);
    }

    let n = ring.len() as f64;
    let (sum_lon, sum_lat) = ring
        .iter()
        .fold((0.0, 0.0), |(x, y), [lon, lat]| (x + lon, y + lat));
    (sum_lon / n, sum_lat / n)
}

/// Shoelace area of the exterior ring in squared degrees. Tolerates unclosed
/// rings by wrapping the last vertex back to the first.
pub fn area_deg2(polygon: &Polygon) -> f64 {
    let ring = polygon.exterior();
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }

    let twice_area: f64 = (0..n)
        .map(|i| {
            let [x0, y0] = ring[i];
            let [x1, y1] = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum();

    0.5 * twice_area.abs()
}

/// Approximate area in km², converting both axes with
/// `111 · cos(center_lat)` km per degree.
pub fn area_km2(polygon: &Polygon, center_lat: f64) -> f64 {
    let km_per_degree = KM_PER_DEGREE * center_lat.to_radians().cos();
    area_deg2(polygon) * km_per_degree.powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centroid_of_empty_ring_is_origin() {
        assert_eq!(centroid(&Polygon::default()), (0.0, 0.0));
        assert_eq!(centroid(&Polygon::new(vec![])), (0.0, 0.0));
    }

    #[test]
    fn test_centroid_is_vertex_mean() {
        let poly = Polygon::new(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]);
        assert_eq!(centroid(&poly), (1.0, 1.0));
    }

    #[test]
    fn test_area_closed_and_unclosed_rings_match() {
        let closed = Polygon::rectangle(0.0, 0.0, 1.0, 1.0);
        let open = Polygon::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        assert_relative_eq!(area_deg2(&closed), 1.0);
        assert_relative_eq!(area_deg2(&open), 1.0);
    }

    #[test]
    fn test_area_at_equator() {
        let poly = Polygon::rectangle(0.0, 0.0, 0.1, 0.1);
        // 0.01 deg² · 111² km²
        assert_relative_eq!(area_km2(&poly, 0.0), 123.21, epsilon = 1e-9);
    }

    #[test]
    fn test_area_is_orientation_independent() {
        let ccw = Polygon::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        let cw = Polygon::new(vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]);
        assert_relative_eq!(area_km2(&ccw, 40.0), area_km2(&cw, 40.0));
        assert!(area_km2(&cw, 40.0) >= 0.0);
    }

    #[test]
    fn test_doubling_dimensions_quadruples_area() {
        let small = Polygon::rectangle(-1.0, 39.0, 1.0, 41.0);
        let large = Polygon::rectangle(-2.0, 38.0, 2.0, 42.0);
        assert_relative_eq!(
            area_km2(&large, 40.0),
            4.0 * area_km2(&small, 40.0),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_degenerate_rings_have_zero_area() {
        assert_eq!(area_km2(&Polygon::default(), 45.0), 0.0);
        let line = Polygon::new(vec![[0.0, 0.0], [1.0, 1.0]]);
        assert_eq!(area_km2(&line, 45.0), 0.0);
    }

    #[test]
    fn test_validate_rejects_too_few_distinct_vertices() {
        let poly = Polygon::new(vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);
        assert!(poly.validate().is_err());
        assert!(Polygon::default().validate().is_err());
        assert!(Polygon::rectangle(0.0, 0.0, 1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_geojson_roundtrip_keeps_rings() {
        let poly = Polygon::rectangle(-5.6, 37.9, -5.4, 38.1);
        let parsed = Polygon::from_geojson(&poly.to_geojson()).unwrap();
        assert_eq!(parsed, poly);
        assert!(parsed.is_closed());
    }

    #[test]
    fn test_from_geojson_rejects_points() {
        let point = Geometry::new(Value::Point(vec![1.0, 2.0]));
        assert!(Polygon::from_geojson(&point).is_err());
    }
}
