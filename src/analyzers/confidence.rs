//! Confidence scoring.
//!
//! Confidence is the product of three factors: sample adequacy, homogeneity
//! and baseline availability. The three estimation paths key the factors
//! off different things (pixels vs. scenes) and use different curves; they
//! are kept apart on purpose.

/// Which estimator is asking, and therefore which curves apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringProfile {
    /// Per-pixel statistics from a raster or array; `samples` counts pixels.
    PixelArray,
    /// Aggregate cloud statistics; `samples` counts contributing scenes.
    CloudScenes,
    /// Deterministic fallback; `samples` is the estimated pixel count.
    Synthetic,
}

/// Below this many valid pixels a result is flagged low-coverage.
pub const MIN_VALID_PIXELS: u64 = 100;

fn pixel_factor(pixels: u64) -> f64 {
    match pixels {
        p if p < MIN_VALID_PIXELS => 0.3,
        p if p < 1_000 => 0.6,
        p if p < 10_000 => 0.8,
        _ => 1.0,
    }
}

fn scene_factor(scenes: u64) -> f64 {
    (scenes as f64 / 10.0).min(1.0)
}

fn homogeneity_factor(profile: ScoringProfile, std_db: f64) -> f64 {
    if std_db.is_nan() {
        return 0.0;
    }
    let std_db = std_db.max(0.0);

    match profile {
        ScoringProfile::PixelArray => match std_db {
            s if s < 1.0 => 1.0,
            s if s < 2.0 => 0.9,
            s if s < 3.0 => 0.7,
            _ => 0.5,
        },
        ScoringProfile::CloudScenes => (1.0 - std_db / 5.0).max(0.0),
        ScoringProfile::Synthetic => 1.0 - (std_db / 6.0).min(0.5),
    }
}

fn baseline_factor(profile: ScoringProfile, baseline_active: bool) -> f64 {
    match (profile, baseline_active) {
        (_, false) => 0.8,
        (ScoringProfile::Synthetic, true) => 0.9,
        (_, true) => 1.0,
    }
}

/// Combined confidence in `[0, 1]`, rounded to two decimals.
pub fn score(profile: ScoringProfile, samples: u64, std_db: f64, baseline_active: bool) -> f64 {
    let sample = match profile {
        ScoringProfile::PixelArray | ScoringProfile::Synthetic => pixel_factor(samples),
        ScoringProfile::CloudScenes => scene_factor(samples),
    };

    let combined =
        sample * homogeneity_factor(profile, std_db) * baseline_factor(profile, baseline_active);
    ((combined * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: [ScoringProfile; 3] = [
        ScoringProfile::PixelArray,
        ScoringProfile::CloudScenes,
        ScoringProfile::Synthetic,
    ];

    #[test]
    fn test_pixel_array_curve() {
        assert_eq!(score(ScoringProfile::PixelArray, 50, 0.5, true), 0.3);
        assert_eq!(score(ScoringProfile::PixelArray, 500, 1.5, true), 0.54);
        assert_eq!(score(ScoringProfile::PixelArray, 5_000, 2.5, false), 0.45);
        assert_eq!(score(ScoringProfile::PixelArray, 50_000, 4.0, false), 0.4);
        assert_eq!(score(ScoringProfile::PixelArray, 50_000, 0.2, true), 1.0);
    }

    #[test]
    fn test_cloud_curve_uses_scene_count() {
        assert_eq!(score(ScoringProfile::CloudScenes, 5, 0.0, true), 0.5);
        assert_eq!(score(ScoringProfile::CloudScenes, 20, 2.5, true), 0.5);
        assert_eq!(score(ScoringProfile::CloudScenes, 10, 6.0, true), 0.0);
        assert_eq!(score(ScoringProfile::CloudScenes, 0, 1.0, true), 0.0);
    }

    #[test]
    fn test_synthetic_curve() {
        // 0.8 pixels · (1 - 3/6) · 0.8 baseline
        assert_eq!(score(ScoringProfile::Synthetic, 5_000, 3.0, false), 0.32);
        // 1.0 · (1 - 1.5/6) · 0.9
        assert_eq!(score(ScoringProfile::Synthetic, 100_000, 1.5, true), 0.68);
    }

    #[test]
    fn test_bounds_hold_for_any_input() {
        for profile in PROFILES {
            for samples in [0, 1, 99, 100, 999, 1_000, 9_999, 10_000, u64::MAX] {
                for std in [0.0, 0.5, 1.0, 2.9, 5.0, 100.0, f64::INFINITY] {
                    for baseline in [true, false] {
                        let c = score(profile, samples, std, baseline);
                        assert!((0.0..=1.0).contains(&c), "{profile:?} {samples} {std} -> {c}");
                    }
                }
            }
        }
    }
}
