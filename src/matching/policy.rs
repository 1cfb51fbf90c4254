use crate::matching::similarity::{Score, SimilarityScorer};
use crate::models::{validate_tolerance, FeatureVector, MatchResult, MetricWeights, ScoringConfig};
use crate::utils::Result;

/// Turns a combined similarity into a match decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    weights: MetricWeights,
    tolerance: f64,
}

impl DecisionPolicy {
    pub fn new(weights: MetricWeights, tolerance: f64) -> Result<Self> {
        validate_tolerance(tolerance)?;
        Ok(DecisionPolicy { weights, tolerance })
    }

    // Per-call tolerance wins over the configured one
    pub fn from_scoring(scoring: &ScoringConfig, tolerance_override: Option<f64>) -> Result<Self> {
        Self::new(
            scoring.weights,
            tolerance_override.unwrap_or(scoring.tolerance),
        )
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn threshold(&self) -> f64 {
        1.0 - self.tolerance
    }

    pub fn decide(&self, score: &Score) -> MatchResult {
        let threshold = self.threshold();
        MatchResult {
            success: score.similarity >= threshold,
            confidence: (score.similarity * 100.0).clamp(0.0, 100.0),
            similarity: score.similarity,
            threshold,
            metrics: Some(score.metrics),
        }
    }

    pub fn evaluate(&self, enrolled: &FeatureVector, probe: &FeatureVector) -> MatchResult {
        let score = SimilarityScorer::score(enrolled, probe, &self.weights);
        log::debug!(
            "Similarity metrics - cosine: {:.3}, distance: {:.3}, correlation: {:.3}, combined: {:.3}, threshold: {:.3}",
            score.metrics.cosine,
            score.metrics.distance,
            score.metrics.correlation,
            score.similarity,
            self.threshold()
        );
        self.decide(&score)
    }
}
