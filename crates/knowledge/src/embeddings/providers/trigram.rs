//! Offline embedding provider built from hashed words and character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use crate::keywords::is_stop_word;
use docqa_core::AppResult;
use std::collections::BTreeMap;

const MODEL_NAME: &str = "trigram-v1";

/// Deterministic, content-dependent embeddings for local, offline use.
///
/// Each non-stop-word token contributes its whole-word hash and the hashes
/// of its boundary-padded character trigrams to a fixed number of buckets.
/// Texts sharing vocabulary end up close under cosine distance; there is no
/// semantic understanding beyond that.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        // Ordered so bucket sums are accumulated in the same order every run.
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for token in lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
            .filter(|t| t.chars().count() > 2 && !is_stop_word(t))
        {
            *counts.entry(token).or_insert(0) += 1;
        }

        for (token, count) in counts {
            let weight = count as f32;
            vector[self.bucket(token.as_bytes())] += weight;

            let padded: Vec<char> = std::iter::once('^')
                .chain(token.chars())
                .chain(std::iter::once('$'))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[self.bucket(trigram.as_bytes())] += weight.sqrt();
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }

        vector
    }

    /// FNV-1a, stable across platforms and releases.
    fn bucket(&self, bytes: &[u8]) -> usize {
        let hash = bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
        });
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_embedding_is_unit_length() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("refund policy for annual plans").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(384);
        let a = provider.embed("deterministic test").await.unwrap();
        let b = provider.embed("deterministic test").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_bitwise_stable_across_instances_and_word_order() {
        let text = "zebras migrate across the savanna every spring while herds of \
                    wildebeest follow rivers toward grasslands near mountains";
        let reordered = "mountains near grasslands toward rivers follow wildebeest of \
                         herds while spring every savanna the across migrate zebras";

        let expected = TrigramProvider::new(16).embed(text).await.unwrap();
        for _ in 0..8 {
            let provider = TrigramProvider::new(16);
            let again = provider.embed(text).await.unwrap();
            let shuffled = provider.embed(reordered).await.unwrap();

            let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(&again), bits(&expected));
            assert_eq!(bits(&shuffled), bits(&expected));
        }
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let provider = TrigramProvider::new(384);
        let query = provider.embed("capital of france").await.unwrap();
        let related = provider.embed("Paris is the capital of France.").await.unwrap();
        let unrelated = provider.embed("Bake the bread for forty minutes.").await.unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_stop_words_only_is_zero_vector() {
        let provider = TrigramProvider::new(64);
        let embedding = provider.embed("what is the").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_non_ascii_text() {
        let provider = TrigramProvider::new(128);
        let embedding = provider
            .embed("Gamedex é um aplicativo 🎮 brasileiro para gerenciar jogos!")
            .await
            .unwrap();

        assert_eq!(embedding.len(), 128);
        assert!((norm(&embedding) - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let provider = TrigramProvider::new(96);
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let batch = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], provider.embed("second text").await.unwrap());
    }
}
