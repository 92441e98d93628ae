//! Score normalization helpers.

use std::cmp::Ordering;

/// Min–max normalize to [0, 1].
///
/// Empty input gives empty output; uniform scores all map to 1.0.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= f64::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Indices sorted by score, highest first. Ties keep input order.
pub fn argsort_desc(scores: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..scores.len()).collect();
    idx.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    idx
}

/// Replace NaN and negative entries with zero.
pub fn sanitize_weights(weights: &mut [f64]) {
    for w in weights.iter_mut() {
        if w.is_nan() || *w < 0.0 {
            *w = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_bounds() {
        let out = min_max_normalize(&[0.2, 0.8, 0.5]);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 1.0);
        assert!((out[2] - 0.5).abs() < 1e-12);
        assert!(out.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_min_max_uniform_and_empty() {
        assert_eq!(min_max_normalize(&[0.3, 0.3]), vec![1.0, 1.0]);
        assert_eq!(min_max_normalize(&[-0.4]), vec![1.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_argsort_desc_is_stable() {
        assert_eq!(argsort_desc(&[0.1, 0.9, 0.1, 0.5]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_sanitize_weights() {
        let mut w = vec![0.5, f64::NAN, -1.0, 0.0];
        sanitize_weights(&mut w);
        assert_eq!(w, vec![0.5, 0.0, 0.0, 0.0]);
    }
}
