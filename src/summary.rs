//! Short natural-language summaries of an estimate.
//!
//! A text-generation service can sit behind [`SummaryGenerator`]; when it is
//! absent or fails, [`TemplateSummary`] produces deterministic wording keyed
//! only off severity.

use async_trait::async_trait;
use tracing::warn;

use crate::analyzers::severity::Severity;
use crate::estimate::DroughtEstimate;
use crate::geometry::{Polygon, centroid};
use crate::parser::DateWindow;

/// What the summary talks about, beyond the numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryContext {
    pub location: String,
    pub date_range: String,
}

impl SummaryContext {
    /// Location as the polygon centroid, e.g. `38.00°N, 5.50°W`.
    pub fn from_request(polygon: &Polygon, date_window: &DateWindow) -> Self {
        let (lon, lat) = centroid(polygon);
        let ns = if lat >= 0.0 { 'N' } else { 'S' };
        let ew = if lon >= 0.0 { 'E' } else { 'W' };
        Self {
            location: format!("{:.2}°{ns}, {:.2}°{ew}", lat.abs(), lon.abs()),
            date_range: format!("{} to {}", date_window.start, date_window.end),
        }
    }
}

#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn summarize(
        &self,
        estimate: &DroughtEstimate,
        context: &SummaryContext,
    ) -> anyhow::Result<String>;
}

fn condition(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => "within normal moisture parameters",
        Severity::Mild => "showing early signs of moisture deficit",
        Severity::Moderate => "experiencing moderate drought stress",
        Severity::Severe => "under severe drought conditions",
        Severity::Extreme => "facing a critical drought emergency",
    }
}

pub fn recommendation(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => "Continue standard monitoring.",
        Severity::Mild => "Increase monitoring frequency and prepare contingency measures.",
        Severity::Moderate => "Implement water conservation measures and adjust irrigation schedules.",
        Severity::Severe => "Activate drought response protocols and prioritize water allocation.",
        Severity::Extreme => "Immediate intervention required. Engage emergency agricultural support.",
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateSummary;

impl TemplateSummary {
    pub fn render(&self, estimate: &DroughtEstimate, context: &SummaryContext) -> String {
        format!(
            "Sentinel-1 radar analysis of {} for {} shows mean backscatter of {:.1} dB with \
             {:.0}% of the {:.1} km² area {}. Classification: {}. {}",
            context.location,
            context.date_range,
            estimate.mean_db,
            estimate.drought_percentage,
            estimate.area_km2,
            condition(estimate.severity),
            estimate.severity,
            recommendation(estimate.severity),
        )
    }
}

#[async_trait]
impl SummaryGenerator for TemplateSummary {
    async fn summarize(
        &self,
        estimate: &DroughtEstimate,
        context: &SummaryContext,
    ) -> anyhow::Result<String> {
        Ok(self.render(estimate, context))
    }
}

/// Uses `generator` when given, falling back to the template on error.
pub async fn summarize_or_template(
    generator: Option<&dyn SummaryGenerator>,
    estimate: &DroughtEstimate,
    context: &SummaryContext,
) -> String {
    if let Some(generator) = generator {
        match generator.summarize(estimate, context).await {
            Ok(text) => return text,
            Err(e) => warn!(error = %e, "Summary generator failed, using template"),
        }
    }
    TemplateSummary.render(estimate, context)
}
