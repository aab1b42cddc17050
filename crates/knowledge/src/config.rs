//! Knowledge base configuration management.

use crate::confidence::ConfidenceWeights;
use crate::embeddings::EmbeddingConfig;
use crate::index::DistanceMetric;
use docqa_core::config::STATE_DIR;
use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a knowledge base
/// (`.docqa/knowledge/<base>/config.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    #[serde(default)]
    pub name: String,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub confidence: ConfidenceWeights,

    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_chunk_overlap() -> u32 {
    200
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            embedding: EmbeddingConfig::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            retrieval: RetrievalConfig::default(),
            confidence: ConfidenceWeights::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Hybrid retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks returned per query
    pub top_k: usize,

    /// Weight of vector similarity in the combined score
    pub similarity_weight: f32,

    /// Weight of keyword overlap in the combined score
    pub keyword_weight: f32,

    /// Candidates fetched per requested chunk before re-ranking
    pub candidate_multiplier: usize,

    /// Upper bound on candidates fetched before re-ranking
    pub max_candidates: usize,

    /// Metric the index reports distances in
    pub distance_metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            similarity_weight: 0.7,
            keyword_weight: 0.3,
            candidate_multiplier: 3,
            max_candidates: 20,
            distance_metric: DistanceMetric::CosineDistance,
        }
    }
}

impl RetrievalConfig {
    /// Number of candidates to request for a final result of `k`.
    ///
    /// Never below `k`, so a large `k` is not starved by `max_candidates`.
    pub fn candidate_count(&self, k: usize) -> usize {
        k.saturating_mul(self.candidate_multiplier)
            .min(self.max_candidates)
            .max(k)
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

impl KnowledgeBaseConfig {
    /// Check value ranges.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be at least 1".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.top_k must be at least 1".to_string()));
        }

        if self.retrieval.candidate_multiplier == 0 {
            return Err(AppError::Config(
                "retrieval.candidate_multiplier must be at least 1".to_string(),
            ));
        }

        for (name, weight) in [
            ("retrieval.similarity_weight", self.retrieval.similarity_weight),
            ("retrieval.keyword_weight", self.retrieval.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        self.retrieval.distance_metric.checked_ceiling()?;
        self.confidence.validate()?;

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AppError::Config(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.generation.temperature
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load knowledge base configuration.
///
/// Loads from `.docqa/knowledge/<base>/config.yaml` if it exists,
/// otherwise returns defaults with the provided base name.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    let config_path = get_config_path(workspace, base_name);

    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        // Ensure name matches
        config.name = base_name.to_string();

        tracing::debug!("Loaded knowledge base config for '{}'", base_name);
        config
    } else {
        tracing::debug!(
            "Using default knowledge base config for '{}' (no config file found)",
            base_name
        );
        KnowledgeBaseConfig {
            name: base_name.to_string(),
            ..Default::default()
        }
    };

    config.validate()?;
    Ok(config)
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Knowledge(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Knowledge(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved knowledge base config for '{}'", config.name);
    Ok(())
}

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(STATE_DIR).join("knowledge").join(base_name)
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Get the SQLite index path for a base.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.sqlite")
}

/// Get the sources JSONL path for a base.
pub fn get_sources_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("sources.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), "test-base").unwrap();

        assert_eq!(config.name, "test-base");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.distance_metric, DistanceMetric::CosineDistance);
        assert_eq!(config.generation.max_tokens, 1000);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let mut config = KnowledgeBaseConfig {
            name: "my-base".to_string(),
            ..Default::default()
        };
        config.chunk_size = 800;
        config.retrieval.top_k = 8;
        config.confidence.exponent = 1.0;

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path(), "my-base").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "partial");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "retrieval:\n  top_k: 3\n  distance_metric: l2\n").unwrap();

        let config = load_config(temp.path(), "partial").unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.similarity_weight, 0.7);
        assert_eq!(config.retrieval.distance_metric, DistanceMetric::L2);
        assert_eq!(config.chunk_size, 1000);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let path = get_config_path(temp.path(), "bad");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "retrieval:\n  top_k: 0\n").unwrap();

        assert!(load_config(temp.path(), "bad").is_err());
    }

    #[test]
    fn test_validate_rejects_inner_product() {
        let mut config = KnowledgeBaseConfig::default();
        config.retrieval.distance_metric = DistanceMetric::InnerProduct;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = KnowledgeBaseConfig::default();
        config.retrieval.keyword_weight = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        let mut config = KnowledgeBaseConfig::default();
        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_candidate_count() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.candidate_count(1), 3);
        assert_eq!(retrieval.candidate_count(5), 15);
        assert_eq!(retrieval.candidate_count(7), 20);
        assert_eq!(retrieval.candidate_count(25), 25);
    }

    #[test]
    fn test_paths() {
        let ws = Path::new("/ws");
        assert_eq!(
            get_index_path(ws, "default"),
            PathBuf::from("/ws/.docqa/knowledge/default/index.sqlite")
        );
        assert_eq!(
            get_sources_path(ws, "default"),
            PathBuf::from("/ws/.docqa/knowledge/default/sources.jsonl")
        );
    }
}
