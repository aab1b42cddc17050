//! Embedding generation for knowledge bases.
//!
//! Provides provider-agnostic embedding generation with per-base configuration.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use docqa_core::{AppError, AppResult};

/// Embed texts in batches of at most `batch_size`.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.max(1);
    let mut embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::Knowledge(format!(
                "Provider '{}' returned {} embeddings for {} texts",
                provider.provider_name(),
                vectors.len(),
                batch.len()
            )));
        }
        embeddings.extend(vectors);
    }

    tracing::debug!(
        "Generated {} embeddings of dimension {} using '{}'",
        embeddings.len(),
        provider.dimensions(),
        provider.provider_name()
    );

    Ok(embeddings)
}
