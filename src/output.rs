//! Output formatting and persistence for estimates.
//!
//! Supports pretty-printing, JSON serialization, CSV append, and map-ready
//! GeoJSON.

use anyhow::Result;
use chrono::Utc;
use csv::WriterBuilder;
use geojson::{Feature, FeatureCollection, JsonObject, feature::Id};
use serde_json::{Value, json};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::severity::SEVERITY_LEGEND;
use crate::estimate::DroughtEstimate;
use crate::geometry::Polygon;
use crate::parser::DateWindow;

pub const GENERATED_BY: &str = "sar_drought";

/// Logs an estimate using Rust's debug pretty-print format.
pub fn print_pretty(estimate: &DroughtEstimate) {
    debug!("{:#?}", estimate);
}

/// Logs an estimate as pretty-printed JSON.
pub fn print_json(estimate: &DroughtEstimate) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(estimate)?);
    Ok(())
}

/// Appends a [`DroughtEstimate`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, estimate: &DroughtEstimate) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(estimate)?;
    writer.flush()?;

    Ok(())
}

pub fn data_source(estimate: &DroughtEstimate) -> &'static str {
    if estimate.is_observed() {
        "Sentinel-1 SAR"
    } else {
        "Sentinel-1 SAR (Simulated)"
    }
}

/// Wraps an estimate as a one-feature GeoJSON FeatureCollection with
/// simplestyle fill and stroke keyed off severity.
pub fn feature_collection(
    polygon: &Polygon,
    estimate: &DroughtEstimate,
    job_id: &str,
    date_window: &DateWindow,
) -> Result<FeatureCollection> {
    let mut properties = match serde_json::to_value(estimate)? {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    };

    let color = estimate.severity.color();
    properties.insert("job_id".into(), json!(job_id));
    properties.insert("analysis_type".into(), json!("drought_detection"));
    properties.insert("date_start".into(), json!(date_window.start));
    properties.insert("date_end".into(), json!(date_window.end));
    properties.insert("fill".into(), json!(color));
    properties.insert("fill-opacity".into(), json!(estimate.severity.opacity()));
    properties.insert("stroke".into(), json!(color));
    properties.insert("stroke-width".into(), json!(2));
    properties.insert("stroke-opacity".into(), json!(0.8));

    let feature = Feature {
        bbox: None,
        geometry: Some(polygon.to_geojson()),
        id: Some(Id::String(job_id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    };

    let mut metadata = JsonObject::new();
    metadata.insert(
        "metadata".into(),
        json!({
            "generated_by": GENERATED_BY,
            "version": env!("CARGO_PKG_VERSION"),
            "analysis_date": Utc::now().to_rfc3339(),
            "data_source": data_source(estimate),
        }),
    );

    Ok(FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: Some(metadata),
    })
}

/// Writes [`feature_collection`] output to `path` as pretty JSON.
pub fn write_geojson(path: &str, collection: &FeatureCollection) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(collection)?)?;
    info!(path, "GeoJSON written");
    Ok(())
}

/// The static severity legend as JSON.
pub fn legend_json() -> Result<Value> {
    Ok(serde_json::to_value(&SEVERITY_LEGEND[..])?)
}
