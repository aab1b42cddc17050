//! LLM provider factory.
//!
//! Resolves a provider name from configuration into a concrete client.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use docqa_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `timeout_secs` - Optional request timeout
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, or
/// `AppError::Llm` if the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout_secs: Option<u64>,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or(crate::providers::ollama::DEFAULT_OLLAMA_URL);
            let timeout = timeout_secs.unwrap_or_else(OllamaClient::default_timeout_secs);
            let client = OllamaClient::with_timeout(base_url, timeout)?;
            tracing::debug!("Created Ollama client for {} (timeout {}s)", base_url, timeout);
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}
