//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use docqa_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// # Arguments
/// * `definition` - Prompt definition (built in or loaded from YAML)
/// * `variables` - Template variables (e.g., "question" -> user input)
///
/// # Example
/// ```no_run
/// use docqa_prompt::{build_prompt, default_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "What is Rust?".to_string());
///
/// let built = build_prompt(&default_prompt(), vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let user = render_template(&definition.template, &variables)?;

    // The system instruction is a template too, so overrides can reference variables.
    let system = match definition.system.as_deref() {
        Some(system) => Some(render_template(system, &variables)?),
        None => None,
    };

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::default_prompt;

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Hello, world!".to_string());

        let result = render_template("Question: {{question}}", &vars);
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape() {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), "a < b && \"quoted\"".to_string());

        let result = render_template("{{context}}", &vars).unwrap();
        assert_eq!(result, "a < b && \"quoted\"");
    }

    #[test]
    fn test_render_template_missing_variable() {
        let vars = HashMap::new();
        // Handlebars renders missing variables as empty string
        assert_eq!(render_template("Q: {{missing}}", &vars).unwrap(), "Q: ");
    }

    #[test]
    fn test_render_rejects_malformed_template() {
        let vars = HashMap::new();
        assert!(render_template("{{#if}}", &vars).is_err());
    }

    #[test]
    fn test_build_default_prompt() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "What is the refund window?".to_string());
        vars.insert(
            "context".to_string(),
            "[Source: policy.md, Chunk 0]\nRefunds within 30 days.\n".to_string(),
        );
        vars.insert("explain_mode".to_string(), "No".to_string());

        let built = build_prompt(&default_prompt(), vars).unwrap();
        assert!(built.user.contains("What is the refund window?"));
        assert!(built.user.contains("Refunds within 30 days."));
        assert!(built.user.contains("Explain like I'm 10: No"));
        assert!(built.system.unwrap().contains("ANSWER:"));
        assert_eq!(built.metadata.source_prompt_id, "qa.grounded");
    }
}
