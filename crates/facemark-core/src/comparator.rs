//! Multi-metric descriptor similarity.
//!
//! Four independent similarities, each in [0, 1], are combined with
//! [`MetricWeights`] into a single 0–100 score. Correlation carries the
//! largest default weight since it tolerates uniform exposure shifts
//! between captures; the trade-off is weaker discrimination between
//! different faces with similar relative shading.

use crate::config::MetricWeights;
use crate::types::{Descriptor, MAX_SIMILARITY};
use serde::Serialize;

/// Per-metric similarities for one descriptor pair, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricBreakdown {
    pub euclidean: f32,
    pub correlation: f32,
    pub cosine: f32,
    pub manhattan: f32,
}

impl MetricBreakdown {
    /// Weighted combination scaled to 0–100.
    ///
    /// Weights are relative: the sum is divided by the total weight, so the
    /// default set (which sums to 1) is applied as-is.
    pub fn combine(&self, weights: &MetricWeights) -> f32 {
        let total = weights.euclidean + weights.correlation + weights.cosine + weights.manhattan;
        if total <= 0.0 {
            return 0.0;
        }
        let weighted = self.euclidean * weights.euclidean
            + self.correlation * weights.correlation
            + self.cosine * weights.cosine
            + self.manhattan * weights.manhattan;
        (weighted / total * MAX_SIMILARITY).clamp(0.0, MAX_SIMILARITY)
    }

    fn identical() -> Self {
        Self {
            euclidean: 1.0,
            correlation: 1.0,
            cosine: 1.0,
            manhattan: 1.0,
        }
    }
}

/// Scores a pair of descriptors on the 0–100 scale.
pub trait Scorer {
    fn score(&self, a: &Descriptor, b: &Descriptor) -> f32;
}

/// Weighted Euclidean/correlation/cosine/Manhattan comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorComparator {
    pub weights: MetricWeights,
}

impl DescriptorComparator {
    pub fn new(weights: MetricWeights) -> Self {
        Self { weights }
    }

    /// Per-metric similarities, or `None` when the pair cannot be compared
    /// (length mismatch or empty input).
    pub fn breakdown(&self, a: &Descriptor, b: &Descriptor) -> Option<MetricBreakdown> {
        let (a, b) = (a.values(), b.values());
        if a.is_empty() || a.len() != b.len() {
            return None;
        }
        // Constant descriptors have undefined correlation/cosine; identical
        // inputs are maximal regardless.
        if a == b {
            return Some(MetricBreakdown::identical());
        }

        Some(MetricBreakdown {
            euclidean: euclidean_similarity(a, b),
            correlation: correlation_similarity(a, b),
            cosine: cosine_similarity(a, b),
            manhattan: manhattan_similarity(a, b),
        })
    }
}

impl Scorer for DescriptorComparator {
    fn score(&self, a: &Descriptor, b: &Descriptor) -> f32 {
        match self.breakdown(a, b) {
            Some(metrics) => {
                let score = metrics.combine(&self.weights);
                tracing::trace!(
                    euclidean = metrics.euclidean,
                    correlation = metrics.correlation,
                    cosine = metrics.cosine,
                    manhattan = metrics.manhattan,
                    score,
                    "descriptor comparison"
                );
                score
            }
            None => {
                tracing::debug!(
                    len_a = a.len(),
                    len_b = b.len(),
                    "descriptor shape mismatch; scoring 0"
                );
                0.0
            }
        }
    }
}

/// Compare two descriptors with the default weights. Returns 0–100.
pub fn compare(a: &Descriptor, b: &Descriptor) -> f32 {
    DescriptorComparator::default().score(a, b)
}

/// `1 - distance / sqrt(n)`, floored at 0.
fn euclidean_similarity(a: &[f32], b: &[f32]) -> f32 {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x as f64 - *y as f64).powi(2))
        .sum();
    let distance = sum.sqrt() / (a.len() as f64).sqrt();
    (1.0 - distance).max(0.0) as f32
}

/// Absolute Pearson correlation; 0 when either side has zero variance.
fn correlation_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len() as f64;
    let (mut sum_a, mut sum_b, mut sq_a, mut sq_b, mut prod) = (0.0f64, 0.0, 0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        sum_a += x;
        sum_b += y;
        sq_a += x * x;
        sq_b += y * y;
        prod += x * y;
    }

    let numerator = prod - sum_a * sum_b / n;
    let var_a = sq_a - sum_a * sum_a / n;
    let var_b = sq_b - sum_b * sum_b / n;
    let denom = (var_a * var_b).sqrt();
    if denom.is_nan() || denom <= 0.0 {
        return 0.0;
    }
    (numerator / denom).abs().min(1.0) as f32
}

/// Absolute cosine similarity; 0 when either vector is all zeros.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        (dot / denom).abs().min(1.0) as f32
    } else {
        0.0
    }
}

/// `1 - sum|Δ| / n`, floored at 0.
fn manhattan_similarity(a: &[f32], b: &[f32]) -> f32 {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x as f64 - *y as f64).abs())
        .sum();
    (1.0 - sum / a.len() as f64).max(0.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DESCRIPTOR_LEN;

    fn desc(values: Vec<f32>) -> Descriptor {
        Descriptor::new(values).unwrap()
    }

    /// Deterministic pseudo-random descriptor in [0, 1].
    fn noisy(seed: u32) -> Descriptor {
        let mut state = seed.wrapping_mul(2_654_435_761).max(1);
        let values = (0..DESCRIPTOR_LEN)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 10_000) as f32 / 10_000.0
            })
            .collect();
        desc(values)
    }

    #[test]
    fn test_identity_is_maximal() {
        for seed in 1..20 {
            let d = noisy(seed);
            assert_eq!(compare(&d, &d), 100.0);
        }
    }

    #[test]
    fn test_identity_for_constant_descriptor() {
        let zeros = desc(vec![0.0; DESCRIPTOR_LEN]);
        assert_eq!(compare(&zeros, &zeros.clone()), 100.0);
    }

    #[test]
    fn test_symmetry_and_bounds() {
        for seed in 1..30 {
            let a = noisy(seed);
            let b = noisy(seed + 100);
            let ab = compare(&a, &b);
            let ba = compare(&b, &a);
            assert_eq!(ab, ba, "seed {seed}");
            assert!((0.0..=100.0).contains(&ab), "seed {seed}: {ab}");
        }
    }

    #[test]
    fn test_length_mismatch_scores_zero() {
        let a = desc(vec![0.5; DESCRIPTOR_LEN]);
        let b = desc(vec![0.5; 64]);
        assert_eq!(compare(&a, &b), 0.0);
    }

    #[test]
    fn test_empty_scores_zero() {
        let empty = desc(Vec::new());
        assert_eq!(compare(&empty, &empty.clone()), 0.0);
    }

    #[test]
    fn test_black_vs_white_far_below_threshold() {
        let black = desc(vec![0.0; DESCRIPTOR_LEN]);
        let mut white_values = vec![1.0; 64];
        white_values.extend(vec![0.0; 64]);
        let white = desc(white_values);

        let m = DescriptorComparator::default().breakdown(&black, &white).unwrap();
        assert_eq!(m.correlation, 0.0);
        assert_eq!(m.cosine, 0.0);
        assert!((m.manhattan - 0.5).abs() < 1e-6);

        let score = compare(&black, &white);
        assert!(score < 20.0, "score {score}");
    }

    #[test]
    fn test_brightness_shift_keeps_correlation() {
        let a = noisy(7);
        let shifted = desc(a.values().iter().map(|v| v * 0.5 + 0.2).collect());
        let m = DescriptorComparator::default().breakdown(&a, &shifted).unwrap();
        assert!((m.correlation - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_combine_uses_weights() {
        let m = MetricBreakdown {
            euclidean: 1.0,
            correlation: 0.0,
            cosine: 0.0,
            manhattan: 0.0,
        };
        assert!((m.combine(&MetricWeights::default()) - 25.0).abs() < 1e-4);

        let heavy = MetricWeights {
            euclidean: 1.0,
            correlation: 0.0,
            cosine: 0.0,
            manhattan: 0.0,
        };
        assert!((m.combine(&heavy) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_combine_normalizes_relative_weights() {
        let even = MetricWeights {
            euclidean: 2.0,
            correlation: 2.0,
            cosine: 2.0,
            manhattan: 2.0,
        };
        assert_eq!(MetricBreakdown::identical().combine(&even), 100.0);

        let half = MetricBreakdown {
            euclidean: 1.0,
            correlation: 0.0,
            cosine: 1.0,
            manhattan: 0.0,
        };
        assert!((half.combine(&even) - 50.0).abs() < 1e-4);
    }
}
