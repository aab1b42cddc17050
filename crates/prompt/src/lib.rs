//! Prompt system for docqa.
//!
//! This crate provides structured prompt management with:
//! - A built-in grounding prompt for document question answering
//! - Optional YAML overrides under `.docqa/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, render_template};
pub use loader::{default_prompt, load_prompt, resolve_prompt, GROUNDED_ANSWER_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
