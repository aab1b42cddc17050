//! Confidence scoring from retrieval statistics.

use crate::index::DistanceMetric;
use crate::types::{Chunk, ConfidenceBreakdown};
use docqa_core::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\w+\b").unwrap_or_else(|err| panic!("invalid WORD_RE regex: {err}"))
});

/// Weights of the confidence factors.
///
/// The defaults are empirical tuning values; they are exposed per knowledge
/// base so they can be retuned without code changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub best_similarity: f32,
    pub avg_similarity: f32,
    pub consistency: f32,
    pub keyword: f32,

    /// Applied to the weighted sum; below 1 it lifts mid-range scores
    pub exponent: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            best_similarity: 0.5,
            avg_similarity: 0.3,
            consistency: 0.1,
            keyword: 0.1,
            exponent: 0.9,
        }
    }
}

impl ConfidenceWeights {
    /// Combine factor values into a final score in [0, 1].
    pub fn combine(&self, best: f32, avg: f32, consistency: f32, keyword: f32) -> f32 {
        let raw = self.best_similarity * best
            + self.avg_similarity * avg
            + self.consistency * consistency
            + self.keyword * keyword;

        raw.max(0.0).powf(self.exponent).clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> AppResult<()> {
        for (name, weight) in [
            ("confidence.best_similarity", self.best_similarity),
            ("confidence.avg_similarity", self.avg_similarity),
            ("confidence.consistency", self.consistency),
            ("confidence.keyword", self.keyword),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        if !self.exponent.is_finite() || self.exponent <= 0.0 {
            return Err(AppError::Config(format!(
                "confidence.exponent must be positive, got {}",
                self.exponent
            )));
        }

        Ok(())
    }
}

/// Scores how well a retrieval result supports an answer.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
    ceiling: f32,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights, metric: DistanceMetric) -> AppResult<Self> {
        weights.validate()?;
        let ceiling = metric.checked_ceiling()?;
        Ok(Self { weights, ceiling })
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    /// Compute the breakdown for `distances` and their `chunks`.
    ///
    /// Empty input scores zero on every factor.
    pub fn score(&self, distances: &[f32], chunks: &[Chunk], query: &str) -> ConfidenceBreakdown {
        if distances.is_empty() {
            return ConfidenceBreakdown::default();
        }

        let n = distances.len() as f32;
        let best_distance = distances.iter().copied().fold(f32::INFINITY, f32::min);
        let avg_distance = distances.iter().sum::<f32>() / n;

        let best_similarity = self.normalize(best_distance);
        let avg_similarity = self.normalize(avg_distance);

        let consistency = if distances.len() == 1 {
            1.0
        } else {
            let variance = distances
                .iter()
                .map(|d| (d - avg_distance).powi(2))
                .sum::<f32>()
                / n;
            1.0 / (1.0 + variance)
        };

        let keyword_match = keyword_coverage(query, chunks);
        let final_score =
            self.weights
                .combine(best_similarity, avg_similarity, consistency, keyword_match);

        ConfidenceBreakdown {
            best_similarity,
            avg_similarity,
            consistency,
            keyword_match,
            final_score,
        }
    }

    fn normalize(&self, distance: f32) -> f32 {
        (1.0 - distance / self.ceiling).clamp(0.0, 1.0)
    }
}

fn word_set(text: &str) -> HashSet<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Average fraction of query words found in each chunk, capped at 1.
pub fn keyword_coverage(query: &str, chunks: &[Chunk]) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }

    let query_words = word_set(query);
    if query_words.is_empty() {
        return 0.0;
    }

    let total: f32 = chunks
        .iter()
        .map(|chunk| {
            let chunk_words = word_set(&chunk.content);
            let found = query_words
                .iter()
                .filter(|word| chunk_words.contains(*word))
                .count();
            found as f32 / query_words.len() as f32
        })
        .sum();

    (total / chunks.len() as f32).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(ConfidenceWeights::default(), DistanceMetric::CosineDistance).unwrap()
    }

    #[test]
    fn test_strong_consistent_result() {
        let chunks = vec![
            Chunk::new("Paris is the capital of France."),
            Chunk::new("France: capital Paris."),
            Chunk::new("The capital of France is Paris"),
        ];

        let breakdown = scorer().score(&[0.2, 0.3, 0.4], &chunks, "capital France");

        assert!((breakdown.best_similarity - 0.9).abs() < 1e-6);
        assert!((breakdown.avg_similarity - 0.85).abs() < 1e-6);
        assert!((breakdown.keyword_match - 1.0).abs() < 1e-6);
        assert!((breakdown.consistency - 1.0 / (1.0 + 0.02 / 3.0)).abs() < 1e-5);
        assert!(breakdown.final_score > 0.85);
        assert!((breakdown.final_score - 0.9135).abs() < 1e-3);
    }

    #[test]
    fn test_empty_distances_score_zero() {
        let breakdown = scorer().score(&[], &[], "anything");
        assert_eq!(breakdown, ConfidenceBreakdown::default());
        assert_eq!(breakdown.final_score, 0.0);
    }

    #[test]
    fn test_single_chunk_at_max_distance() {
        let chunks = vec![Chunk::new("unrelated")];
        let breakdown = scorer().score(&[2.0], &chunks, "capital");

        assert_eq!(breakdown.best_similarity, 0.0);
        assert_eq!(breakdown.avg_similarity, 0.0);
        assert_eq!(breakdown.consistency, 1.0);
        assert_eq!(breakdown.keyword_match, 0.0);
        // Only the consistency factor contributes.
        assert!((breakdown.final_score - 0.1_f32.powf(0.9)).abs() < 1e-6);
    }

    #[test]
    fn test_single_chunk_consistency_is_exactly_one() {
        for d in [0.0, 0.37, 1.2, 2.0] {
            let breakdown = scorer().score(&[d], &[Chunk::new("x")], "x");
            assert_eq!(breakdown.consistency, 1.0);
        }
    }

    #[test]
    fn test_distances_beyond_ceiling_clamp() {
        let breakdown = scorer().score(&[3.0, 4.0], &[Chunk::new("a"), Chunk::new("b")], "q");
        assert_eq!(breakdown.best_similarity, 0.0);
        assert_eq!(breakdown.avg_similarity, 0.0);
        assert!((0.0..=1.0).contains(&breakdown.final_score));
    }

    #[test]
    fn test_keyword_coverage() {
        let chunks = vec![
            Chunk::new("refund policy for annual plans"),
            Chunk::new("nothing relevant"),
        ];
        // Query words: refund, policy -> 1.0 and 0.0, averaged.
        assert!((keyword_coverage("Refund policy", &chunks) - 0.5).abs() < 1e-6);
        assert_eq!(keyword_coverage("", &chunks), 0.0);
        assert_eq!(keyword_coverage("refund", &[]), 0.0);
    }

    #[test]
    fn test_keyword_coverage_matches_whole_words() {
        let chunks = vec![Chunk::new("capitalization")];
        assert_eq!(keyword_coverage("capital", &chunks), 0.0);
    }

    #[test]
    fn test_combine_uses_custom_weights() {
        let weights = ConfidenceWeights {
            exponent: 1.0,
            ..Default::default()
        };
        assert!((weights.combine(1.0, 1.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
        assert!((weights.combine(1.0, 0.0, 0.0, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_validate() {
        assert!(ConfidenceWeights::default().validate().is_ok());

        let negative = ConfidenceWeights {
            keyword: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero_exponent = ConfidenceWeights {
            exponent: 0.0,
            ..Default::default()
        };
        assert!(zero_exponent.validate().is_err());
    }

    #[test]
    fn test_scorer_rejects_unbounded_metric() {
        assert!(ConfidenceScorer::new(ConfidenceWeights::default(), DistanceMetric::InnerProduct)
            .is_err());
    }
}
