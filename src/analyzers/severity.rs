use serde::{Deserialize, Serialize};
use std::fmt;

use crate::thresholds::ThresholdRow;

/// Drought severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    Severe,
    Extreme,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Normal,
        Severity::Mild,
        Severity::Moderate,
        Severity::Severe,
        Severity::Extreme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Mild => "MILD",
            Severity::Moderate => "MODERATE",
            Severity::Severe => "SEVERE",
            Severity::Extreme => "EXTREME",
        }
    }

    /// Map fill color.
    pub fn color(&self) -> &'static str {
        legend_entry(*self).color
    }

    /// Map fill opacity; more severe areas are drawn more opaque.
    pub fn opacity(&self) -> f64 {
        match self {
            Severity::Normal => 0.3,
            Severity::Mild => 0.4,
            Severity::Moderate => 0.5,
            Severity::Severe => 0.6,
            Severity::Extreme => 0.7,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a region from its mean backscatter and drought-area share.
///
/// Either trigger is enough at each level, evaluated driest first:
///
/// | Level    | Area share | or mean below |
/// |----------|------------|---------------|
/// | EXTREME  | >= 70%     | extreme_dry   |
/// | SEVERE   | >= 50%     | very_dry      |
/// | MODERATE | >= 30%     | dry           |
/// | MILD     | >= 10%     | -             |
/// | NORMAL   | otherwise  |               |
pub fn classify(mean_db: f64, drought_percentage: f64, row: &ThresholdRow) -> Severity {
    match (mean_db, drought_percentage) {
        (m, p) if p >= 70.0 || m < row.extreme_dry => Severity::Extreme,
        (m, p) if p >= 50.0 || m < row.very_dry => Severity::Severe,
        (m, p) if p >= 30.0 || m < row.dry => Severity::Moderate,
        (_, p) if p >= 10.0 => Severity::Mild,
        _ => Severity::Normal,
    }
}

/// One row of the static map legend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegendEntry {
    pub severity: Severity,
    pub color: &'static str,
    pub label: &'static str,
    pub range: &'static str,
    pub sigma0_range: &'static str,
}

pub static SEVERITY_LEGEND: [LegendEntry; 5] = [
    LegendEntry {
        severity: Severity::Normal,
        color: "#22c55e",
        label: "Normal",
        range: "< 10%",
        sigma0_range: "> -10 dB",
    },
    LegendEntry {
        severity: Severity::Mild,
        color: "#eab308",
        label: "Mild Drought",
        range: "10-30%",
        sigma0_range: "-10 to -12 dB",
    },
    LegendEntry {
        severity: Severity::Moderate,
        color: "#f97316",
        label: "Moderate",
        range: "30-50%",
        sigma0_range: "-12 to -15 dB",
    },
    LegendEntry {
        severity: Severity::Severe,
        color: "#ef4444",
        label: "Severe",
        range: "50-70%",
        sigma0_range: "-15 to -18 dB",
    },
    LegendEntry {
        severity: Severity::Extreme,
        color: "#7c2d12",
        label: "Extreme",
        range: "> 70%",
        sigma0_range: "< -18 dB",
    },
];

pub fn legend_entry(severity: Severity) -> &'static LegendEntry {
    &SEVERITY_LEGEND[severity as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::{Polarization, thresholds_for};

    fn vv() -> ThresholdRow {
        thresholds_for(Polarization::VV)
    }

    #[test]
    fn test_percentage_boundaries() {
        let row = vv();
        // mean well above every threshold so only the share decides
        assert_eq!(classify(-5.0, 70.0, &row), Severity::Extreme);
        assert_eq!(classify(-5.0, 69.9, &row), Severity::Severe);
        assert_eq!(classify(-5.0, 50.0, &row), Severity::Severe);
        assert_eq!(classify(-5.0, 49.9, &row), Severity::Moderate);
        assert_eq!(classify(-5.0, 30.0, &row), Severity::Moderate);
        assert_eq!(classify(-5.0, 29.9, &row), Severity::Mild);
        assert_eq!(classify(-5.0, 10.0, &row), Severity::Mild);
        assert_eq!(classify(-5.0, 9.9, &row), Severity::Normal);
    }

    #[test]
    fn test_mean_triggers_without_area_share() {
        let row = vv();
        assert_eq!(classify(-18.1, 0.0, &row), Severity::Extreme);
        assert_eq!(classify(-18.0, 0.0, &row), Severity::Severe);
        assert_eq!(classify(-15.1, 0.0, &row), Severity::Severe);
        assert_eq!(classify(-12.1, 0.0, &row), Severity::Moderate);
        assert_eq!(classify(-12.0, 0.0, &row), Severity::Normal);
    }

    #[test]
    fn test_vh_row_is_less_severe_for_same_raw_value() {
        let vv_sev = classify(-16.0, 0.0, &thresholds_for(Polarization::VV));
        let vh_sev = classify(-16.0, 0.0, &thresholds_for(Polarization::VH));
        assert_eq!(vv_sev, Severity::Severe);
        assert!(vh_sev < vv_sev);
    }

    #[test]
    fn test_ordering() {
        assert!(Severity::Normal < Severity::Mild);
        assert!(Severity::Mild < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
        assert!(Severity::Severe < Severity::Extreme);
    }

    #[test]
    fn test_legend_is_indexed_by_severity() {
        for severity in Severity::ALL {
            assert_eq!(legend_entry(severity).severity, severity);
        }
        assert_eq!(Severity::Extreme.color(), "#7c2d12");
        assert_eq!(
            serde_json::to_string(&Severity::Moderate).unwrap(),
            "\"MODERATE\""
        );
    }
}
