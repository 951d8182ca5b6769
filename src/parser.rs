//! Request decoding for the estimation engine.
//!
//! Accepts the JSON shape the web layer forwards:
//!
//! ```json
//! {
//!   "polygon": {"type": "Polygon", "coordinates": [[[-5.6, 37.9], ...]]},
//!   "date_range": {"start": "2023-07-01", "end": "2023-07-31"},
//!   "mode": {"polarization": "VV", "use_historical_baseline": false}
//! }
//! ```

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, Result};
use crate::geometry::Polygon;
use crate::thresholds::Polarization;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Month used when the start date cannot be parsed.
pub const FALLBACK_MONTH: u32 = 6;

/// `(start, end)` as ISO `YYYY-MM-DD` strings, kept raw so the synthetic
/// path can still run on malformed dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: String,
    pub end: String,
}

impl DateWindow {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parsed `(start, end)`; errors on malformed dates or `end < start`.
    pub fn parse(&self) -> Result<(NaiveDate, NaiveDate)> {
        let start = parse_date(&self.start)?;
        let end = parse_date(&self.end)?;
        if end < start {
            return Err(EstimationError::Input(format!(
                "date range ends ({end}) before it starts ({start})"
            )));
        }
        Ok((start, end))
    }

    /// `(month, year)` of the start date, or June of the current year when
    /// the start date is unparseable.
    pub fn season_or_default(&self) -> (u32, i32) {
        match parse_date(&self.start) {
            Ok(date) => (date.month(), date.year()),
            Err(_) => (FALLBACK_MONTH, Utc::now().year()),
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| EstimationError::Input(format!("invalid date '{raw}': {e}")))
}

fn default_baseline_year() -> i32 {
    2020
}

fn default_true() -> bool {
    true
}

/// Optional knobs on an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMode {
    #[serde(default)]
    pub use_historical_baseline: bool,
    #[serde(default = "default_baseline_year")]
    pub baseline_year: i32,
    #[serde(default)]
    pub polarization: Polarization,
    #[serde(default = "default_true")]
    pub apply_speckle_filter: bool,
}

impl Default for AnalysisMode {
    fn default() -> Self {
        Self {
            use_historical_baseline: false,
            baseline_year: default_baseline_year(),
            polarization: Polarization::VV,
            apply_speckle_filter: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    polygon: geojson::Geometry,
    date_range: DateWindow,
    #[serde(default)]
    mode: Option<AnalysisMode>,
}

/// A decoded analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub polygon: Polygon,
    pub date_window: DateWindow,
    pub mode: AnalysisMode,
}

/// Decodes a JSON request body.
///
/// # Errors
///
/// Returns [`EstimationError::Json`] for malformed JSON and
/// [`EstimationError::Input`] when the geometry is not a polygon.
pub fn parse_request(bytes: &[u8]) -> Result<AnalysisRequest> {
    let raw: RawRequest = serde_json::from_slice(bytes)?;
    Ok(AnalysisRequest {
        polygon: Polygon::from_geojson(&raw.polygon)?,
        date_window: raw.date_range,
        mode: raw.mode.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAIN: &str = r#"{
        "polygon": {"type": "Polygon", "coordinates": [[[-5.6, 37.9], [-5.4, 37.9], [-5.4, 38.1], [-5.6, 38.1], [-5.6, 37.9]]]},
        "date_range": {"start": "2023-07-01", "end": "2023-07-31"}
    }"#;

    #[test]
    fn test_parse_minimal_request_uses_default_mode() {
        let req = parse_request(SPAIN.as_bytes()).unwrap();
        assert_eq!(req.polygon.exterior().len(), 5);
        assert_eq!(req.date_window.start, "2023-07-01");
        assert_eq!(req.mode, AnalysisMode::default());
        assert!(req.mode.apply_speckle_filter);
        assert_eq!(req.mode.baseline_year, 2020);
    }

    #[test]
    fn test_parse_partial_mode() {
        let body = r#"{
            "polygon": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]},
            "date_range": {"start": "2022-01-01", "end": "2022-01-31"},
            "mode": {"polarization": "VH", "use_historical_baseline": true}
        }"#;
        let req = parse_request(body.as_bytes()).unwrap();
        assert_eq!(req.mode.polarization, Polarization::VH);
        assert!(req.mode.use_historical_baseline);
        assert_eq!(req.mode.baseline_year, 2020);
        assert!(req.mode.apply_speckle_filter);
    }

    #[test]
    fn test_non_polygon_geometry_is_rejected() {
        let body = r#"{
            "polygon": {"type": "Point", "coordinates": [0, 0]},
            "date_range": {"start": "2022-01-01", "end": "2022-01-31"}
        }"#;
        assert!(matches!(
            parse_request(body.as_bytes()),
            Err(EstimationError::Input(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_request(b"{not json"), Err(EstimationError::Json(_))));
    }

    #[test]
    fn test_date_window_parse() {
        assert!(DateWindow::new("2023-07-01", "2023-07-31").parse().is_ok());
        assert!(DateWindow::new("2023-07-31", "2023-07-01").parse().is_err());
        assert!(DateWindow::new("July", "2023-07-01").parse().is_err());
    }

    #[test]
    fn test_season_fallback() {
        assert_eq!(DateWindow::new("2023-07-01", "x").season_or_default(), (7, 2023));
        let (month, year) = DateWindow::new("garbage", "x").season_or_default();
        assert_eq!(month, FALLBACK_MONTH);
        assert_eq!(year, Utc::now().year());
    }
}
