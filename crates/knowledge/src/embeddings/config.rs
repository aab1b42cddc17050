//! Embedding configuration types.

use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding configuration for a knowledge base (the `embedding` section of
/// its config.yaml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Provider endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn default_batch_size() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: default_batch_size(),
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Validate that another config is consistent with this one.
    ///
    /// Vectors from different models or sizes cannot share an index.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Knowledge(format!(
                "Provider mismatch: expected '{}', got '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Knowledge(format!(
                "Model mismatch: expected '{}', got '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Knowledge(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, 384);
        assert_eq!(config.batch_size, 100);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_yaml_batch_size_defaults() {
        let config: EmbeddingConfig = serde_yaml::from_str(
            "provider: ollama\nmodel: nomic-embed-text\ndimensions: 768\n",
        )
        .unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.dimensions, 768);
    }

    #[test]
    fn test_validate_consistency_success() {
        let config = EmbeddingConfig::default();
        assert!(config.validate_consistency(&config.clone()).is_ok());
    }

    #[test]
    fn test_validate_consistency_model_mismatch() {
        let config1 = EmbeddingConfig::default();
        let config2 = EmbeddingConfig {
            model: "trigram-v2".to_string(),
            ..config1.clone()
        };

        let err = config1.validate_consistency(&config2).unwrap_err();
        assert!(err.to_string().contains("Model mismatch"));
    }

    #[test]
    fn test_validate_consistency_dimension_mismatch() {
        let config1 = EmbeddingConfig::default();
        let config2 = EmbeddingConfig {
            dimensions: 768,
            ..config1.clone()
        };

        let err = config1.validate_consistency(&config2).unwrap_err();
        assert!(err.to_string().contains("Dimension mismatch"));
    }
}
