//! Prompt loader for the built-in grounding prompt and YAML overrides.

use crate::types::PromptDefinition;
use docqa_core::config::STATE_DIR;
use docqa_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Identifier of the prompt used to compose grounded answers.
pub const GROUNDED_ANSWER_PROMPT_ID: &str = "qa.grounded";

const GROUNDED_SYSTEM: &str = "You are a knowledge base assistant that answers questions strictly from the provided document context.

Rules:
1. Use only information found in the document context.
2. Do not use outside knowledge or add assumptions.
3. If the answer is not in the context, say: \"I don't have information about this in the uploaded documents. Please upload relevant documents or rephrase your question.\"
4. Format the answer as bullet points.
5. If the context only partly answers the question, say what is covered and what is missing.

Reply in this format:
ANSWER: <bullet-point answer based only on the document context>

SOURCES: <sources used from the documents>";

const GROUNDED_TEMPLATE: &str = "User Question:
{{question}}

Document Context (from uploaded files only):
{{context}}

Additional Mode:
Explain like I'm 10: {{explain_mode}}

Instructions:
1. Work out what specific information the question asks for.
2. Find the relevant passages in the document context.
3. Combine them without changing their meaning.
4. Answer in bullet points.";

/// The built-in grounding prompt.
pub fn default_prompt() -> PromptDefinition {
    PromptDefinition {
        id: GROUNDED_ANSWER_PROMPT_ID.to_string(),
        title: "Grounded document answer".to_string(),
        api_version: "1.0".to_string(),
        system: Some(GROUNDED_SYSTEM.to_string()),
        template: GROUNDED_TEMPLATE.to_string(),
    }
}

fn prompt_path(workspace_path: &Path, prompt_id: &str) -> PathBuf {
    workspace_path
        .join(STATE_DIR)
        .join("prompts")
        .join(format!("{}.yml", prompt_id))
}

/// Load a prompt definition by ID from the workspace.
///
/// Looks for `<id>.yml` in `.docqa/prompts/`.
///
/// # Example
/// ```no_run
/// use docqa_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "qa.grounded")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_path(workspace_path, prompt_id);

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Resolve the grounding prompt: a workspace override when one exists,
/// otherwise the built-in default.
///
/// A present but invalid override is an error, not a silent fallback.
pub fn resolve_prompt(workspace_path: &Path) -> AppResult<PromptDefinition> {
    if prompt_path(workspace_path, GROUNDED_ANSWER_PROMPT_ID).exists() {
        load_prompt(workspace_path, GROUNDED_ANSWER_PROMPT_ID)
    } else {
        Ok(default_prompt())
    }
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, content: &str) {
        let prompts_dir = dir.join(".docqa/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), content).unwrap();
    }

    #[test]
    fn test_default_prompt_is_valid() {
        let def = default_prompt();
        assert!(validate_prompt(&def).is_ok());
        assert!(def.template.contains("{{question}}"));
        assert!(def.template.contains("{{context}}"));
        assert!(def.template.contains("{{explain_mode}}"));
        assert!(def.system.unwrap().contains("SOURCES:"));
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "custom",
            "id: custom\ntitle: Custom\napiVersion: \"1.0\"\ntemplate: \"Q: {{question}}\"\n",
        );

        let prompt = load_prompt(temp_dir.path(), "custom").unwrap();
        assert_eq!(prompt.id, "custom");
        assert_eq!(prompt.template, "Q: {{question}}");
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "invalid", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "invalid").is_err());
    }

    #[test]
    fn test_rejects_bad_api_version() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "old",
            "id: old\ntitle: Old\napiVersion: \"1\"\ntemplate: \"x\"\n",
        );
        assert!(load_prompt(temp_dir.path(), "old").is_err());
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = resolve_prompt(temp_dir.path()).unwrap();
        assert_eq!(prompt.id, GROUNDED_ANSWER_PROMPT_ID);
    }

    #[test]
    fn test_resolve_prefers_override() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            GROUNDED_ANSWER_PROMPT_ID,
            "id: qa.grounded\ntitle: Terse\napiVersion: \"1.0\"\ntemplate: \"{{question}}\"\n",
        );

        let prompt = resolve_prompt(temp_dir.path()).unwrap();
        assert_eq!(prompt.title, "Terse");
        assert!(prompt.system.is_none());
    }
}
