//! Lee speckle filter.
//!
//! Smooths multiplicative radar noise while keeping edges: each pixel moves
//! toward its local mean by `1 - k`, where `k = var / (var + noise_var)` is
//! large on edges (high local variance) and small in flat areas.

use ndarray::Array2;

pub const DEFAULT_WINDOW: usize = 5;

/// Applies a Lee filter with a square `window` (forced odd, at least 3).
///
/// Windows are clipped at the image border and ignore NaN pixels; NaN input
/// pixels stay NaN. The global variance of valid pixels stands in for the
/// noise variance.
pub fn lee_filter(image: &Array2<f64>, window: usize) -> Array2<f64> {
    let window = window.max(3) | 1;
    let half = window / 2;
    let (rows, cols) = image.dim();

    let valid: Vec<f64> = image.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return image.clone();
    }
    let overall_mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let overall_var =
        valid.iter().map(|v| (v - overall_mean).powi(2)).sum::<f64>() / valid.len() as f64;

    let mut out = image.clone();
    for r in 0..rows {
        let r0 = r.saturating_sub(half);
        let r1 = (r + half).min(rows - 1);
        for c in 0..cols {
            let x = image[[r, c]];
            if x.is_nan() {
                continue;
            }
            let c0 = c.saturating_sub(half);
            let c1 = (c + half).min(cols - 1);

            let mut n = 0.0;
            let mut sum = 0.0;
            let mut sum_sq = 0.0;
            for rr in r0..=r1 {
                for cc in c0..=c1 {
                    let v = image[[rr, cc]];
                    if !v.is_nan() {
                        n += 1.0;
                        sum += v;
                        sum_sq += v * v;
                    }
                }
            }

            let local_mean = sum / n;
            let local_var = (sum_sq / n - local_mean * local_mean).max(0.0);
            let k = (local_var / (local_var + overall_var + 1e-10)).clamp(0.0, 1.0);
            out[[r, c]] = local_mean + k * (x - local_mean);
        }
    }

    out
}
