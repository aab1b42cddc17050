//! Answer composition via the text generation service.

use crate::config::GenerationConfig;
use docqa_core::{AppError, AppResult};
use docqa_llm::{LlmClient, LlmRequest};
use docqa_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;

const ANSWER_MARKER: &str = "ANSWER:";
const SOURCES_MARKER: &str = "SOURCES:";

/// Turns a question and retrieved context into a grounded answer.
pub struct AnswerComposer {
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    generation: GenerationConfig,
}

impl AnswerComposer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        model: impl Into<String>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            llm,
            prompt,
            model: model.into(),
            generation,
        }
    }

    /// Generate an answer for `question` from `context`.
    ///
    /// `explain_mode` asks for a simplified explanation.
    pub async fn compose(
        &self,
        question: &str,
        context: &str,
        explain_mode: bool,
    ) -> AppResult<String> {
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert("context".to_string(), context.to_string());
        variables.insert(
            "explain_mode".to_string(),
            if explain_mode { "Yes" } else { "No" }.to_string(),
        );

        let built = build_prompt(&self.prompt, variables)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.generation.temperature)
            .with_max_tokens(self.generation.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            provider = self.llm.provider_name(),
            model = %self.model,
            explain_mode,
            "Generating answer"
        );

        let response = self.llm.complete(&request).await.map_err(|e| match e {
            AppError::Llm(msg) => AppError::Llm(msg),
            other => AppError::Llm(format!("Answer generation failed: {}", other)),
        })?;

        tracing::debug!(
            completion_tokens = response.usage.completion_tokens,
            "Answer generated"
        );

        Ok(parse_answer(&response.content))
    }
}

/// Extract the answer from a marker-formatted reply.
///
/// Takes the text after the first `ANSWER:` up to the next `SOURCES:` or
/// `ANSWER:`. Without `ANSWER:`, takes the text before `SOURCES:`; without
/// either, the whole reply.
pub fn parse_answer(reply: &str) -> String {
    let answer = match reply.find(ANSWER_MARKER) {
        Some(start) => {
            let rest = &reply[start + ANSWER_MARKER.len()..];
            let end = [rest.find(SOURCES_MARKER), rest.find(ANSWER_MARKER)]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(rest.len());
            &rest[..end]
        }
        None => match reply.find(SOURCES_MARKER) {
            Some(end) => &reply[..end],
            None => reply,
        },
    };

    answer.trim().to_string()
}
