//! Nearest-neighbour index abstraction.
//!
//! The retriever only needs scored candidates and the metric that produced
//! the scores; storage is the implementation's business.

use crate::types::Chunk;
use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Distance metric reported by an index.
///
/// Similarity normalization divides by the metric's distance ceiling, so
/// only lower-is-better metrics with a known bound are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, range [0, 2]
    #[default]
    #[serde(alias = "cosine")]
    CosineDistance,

    /// Euclidean distance between unit vectors, range [0, 2]
    L2,

    /// Dot product, higher is better and unbounded
    InnerProduct,
}

impl DistanceMetric {
    /// Upper bound of the distance range, if the metric has one.
    pub fn distance_ceiling(&self) -> Option<f32> {
        match self {
            Self::CosineDistance | Self::L2 => Some(2.0),
            Self::InnerProduct => None,
        }
    }

    /// Distance ceiling, or a configuration error for unbounded metrics.
    pub fn checked_ceiling(&self) -> AppResult<f32> {
        self.distance_ceiling().ok_or_else(|| {
            AppError::Config(format!(
                "Distance metric '{}' has no bounded lower-is-better range",
                self.as_str()
            ))
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CosineDistance => "cosine_distance",
            Self::L2 => "l2",
            Self::InnerProduct => "inner_product",
        }
    }
}

/// A searchable collection of chunks.
///
/// Implementations are shared across concurrent queries.
#[async_trait]
pub trait ScoredChunkSource: Send + Sync {
    /// Return up to `k` chunks nearest to `query`, with raw distances,
    /// closest first.
    async fn similarity_search_with_score(&self, query: &str, k: usize)
        -> AppResult<Vec<(Chunk, f32)>>;

    /// Metric the returned distances are expressed in.
    fn metric(&self) -> DistanceMetric;
}
