use crate::models::{FeatureVector, MetricBreakdown, MetricWeights};

/// Combined similarity plus the per-metric values it was built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub similarity: f64,
    pub metrics: MetricBreakdown,
}

/// Vector similarity metrics. Inputs of different length are compared over
/// the shorter prefix.
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn align<'a>(a: &'a [f64], b: &'a [f64]) -> (&'a [f64], &'a [f64]) {
        let len = a.len().min(b.len());
        (&a[..len], &b[..len])
    }

    /// Dot product over the product of norms, 0 when either norm is 0.
    pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
        let (a, b) = Self::align(a, b);
        let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f64 = a.iter().map(|x| x * x).sum();
        let norm_b: f64 = b.iter().map(|x| x * x).sum();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0)
    }

    /// `1 - d / sqrt(2n)`, clamped to [0, 1]. Assumes unit-scale features.
    pub fn distance_similarity(a: &[f64], b: &[f64]) -> f64 {
        let (a, b) = Self::align(a, b);
        if a.is_empty() {
            return 0.0;
        }
        let distance = a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt();
        let max_distance = (2.0 * a.len() as f64).sqrt();
        (1.0 - distance / max_distance).clamp(0.0, 1.0)
    }

    // None when either side has zero variance
    fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
        let (a, b) = Self::align(a, b);
        if a.len() < 2 {
            return None;
        }
        let n = a.len() as f64;
        let mean_a = a.iter().sum::<f64>() / n;
        let mean_b = b.iter().sum::<f64>() / n;

        let mut cov = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for (x, y) in a.iter().zip(b) {
            let dx = x - mean_a;
            let dy = y - mean_b;
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }
        if var_a == 0.0 || var_b == 0.0 {
            return None;
        }
        Some((cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0))
    }

    /// Pearson correlation remapped from [-1, 1] to [0, 1]; a zero-variance
    /// input counts as correlation 0.
    pub fn correlation_similarity(a: &[f64], b: &[f64]) -> f64 {
        (Self::pearson(a, b).unwrap_or(0.0) + 1.0) / 2.0
    }

    /// Weighted average of the three metrics.
    ///
    /// A zero-norm vector on either side scores 0 outright. When correlation
    /// is undefined (zero variance) its weight is left out of the average
    /// instead of dragging identical constant vectors below 1.
    pub fn score(a: &FeatureVector, b: &FeatureVector, weights: &MetricWeights) -> Score {
        let (a, b) = Self::align(a.as_slice(), b.as_slice());

        let cosine = Self::cosine(a, b);
        let distance = Self::distance_similarity(a, b);
        let pearson = Self::pearson(a, b);
        let correlation = (pearson.unwrap_or(0.0) + 1.0) / 2.0;
        let metrics = MetricBreakdown {
            cosine,
            distance,
            correlation,
        };

        let zero_norm = a.iter().all(|x| *x == 0.0) || b.iter().all(|x| *x == 0.0);
        if zero_norm {
            return Score {
                similarity: 0.0,
                metrics,
            };
        }

        let mut weighted = weights.cosine * cosine + weights.distance * distance;
        let mut total = weights.cosine + weights.distance;
        if pearson.is_some() {
            weighted += weights.correlation * correlation;
            total += weights.correlation;
        }

        let similarity = if total > 0.0 {
            (weighted / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Score {
            similarity,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTS: MetricWeights = MetricWeights::new(0.5, 0.3, 0.2);

    #[test]
    fn test_cosine_similarity() {
        assert!((SimilarityScorer::cosine(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(SimilarityScorer::cosine(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 1e-12);
        assert!((SimilarityScorer::cosine(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let a = [3.0, 0.0, 4.0, 0.0];
        let b = [0.0, 2.0, 0.0, 7.0];
        assert_eq!(SimilarityScorer::cosine(&a, &b), 0.0);
    }

    #[test]
    fn test_zero_norm_guard() {
        let zero = FeatureVector::new(vec![0.0; 8]);
        let other = FeatureVector::new((0..8).map(|i| i as f64 * 0.1).collect());
        assert_eq!(SimilarityScorer::cosine(zero.as_slice(), other.as_slice()), 0.0);

        let score = SimilarityScorer::score(&zero, &other, &WEIGHTS);
        assert_eq!(score.similarity, 0.0);
        assert!(score.similarity.is_finite());
        assert_eq!(SimilarityScorer::score(&zero, &zero, &WEIGHTS).similarity, 0.0);
    }

    #[test]
    fn test_self_similarity() {
        let v = FeatureVector::new(vec![0.12, -0.4, 0.33, 0.9, 0.05, -0.71]);
        let score = SimilarityScorer::score(&v, &v, &WEIGHTS);
        assert!((score.similarity - 1.0).abs() < 1e-9);
        assert!((score.metrics.correlation - 1.0).abs() < 1e-9);
        assert_eq!(score.metrics.distance, 1.0);
    }

    #[test]
    fn test_constant_vector_self_similarity() {
        let v = FeatureVector::new(vec![0.5; 16]);
        let score = SimilarityScorer::score(&v, &v, &WEIGHTS);
        assert!((score.similarity - 1.0).abs() < 1e-9);
        assert_eq!(score.metrics.correlation, 0.5);
    }

    #[test]
    fn test_length_mismatch_truncates() {
        let short = FeatureVector::new(vec![1.0, 2.0, 3.0]);
        let long = FeatureVector::new(vec![1.0, 2.0, 3.0, 100.0, -50.0]);
        let score = SimilarityScorer::score(&short, &long, &WEIGHTS);
        assert!((score.similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_similarity_bounds() {
        assert_eq!(SimilarityScorer::distance_similarity(&[], &[]), 0.0);
        let far = SimilarityScorer::distance_similarity(&[10.0, -10.0], &[-10.0, 10.0]);
        assert_eq!(far, 0.0);
        let near = SimilarityScorer::distance_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((near - (1.0 - 2f64.sqrt() / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_remap() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [4.0, 3.0, 2.0, 1.0];
        assert!(SimilarityScorer::correlation_similarity(&a, &b).abs() < 1e-12);
        assert_eq!(SimilarityScorer::correlation_similarity(&a, &[2.0; 4]), 0.5);
    }

    #[test]
    fn test_cosine_only_weights() {
        let a = FeatureVector::new(vec![1.0, 0.0, 1.0, 0.0]);
        let b = FeatureVector::new(vec![1.0, 1.0, 0.0, 0.0]);
        let score = SimilarityScorer::score(&a, &b, &MetricWeights::cosine_only());
        assert!((score.similarity - 0.5).abs() < 1e-12);
    }
}
