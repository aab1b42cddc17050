//! Ask and search command handlers.
//!
//! Both run retrieval and confidence scoring through the knowledge base's
//! `QaService`; only `ask` calls the generation model.

use anyhow::Context;
use clap::Args;
use docqa_core::config::AppConfig;
use docqa_knowledge::{ConfidenceBreakdown, QaService, ServiceRegistry, SourceInfo};
use docqa_llm::create_client;
use std::path::PathBuf;
use std::sync::Arc;

/// Ask a question answered from the knowledge base
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Number of chunks to retrieve (default: the base's retrieval.top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Explain the answer in simple terms
    #[arg(long)]
    pub simple: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(
        &self,
        config: &AppConfig,
        registry: &ServiceRegistry,
        base: &str,
    ) -> anyhow::Result<()> {
        tracing::info!("Executing ask command");

        let question = self.get_question()?;
        let service = service_for(config, registry, base).await?;

        let response = service
            .answer(&question, self.simple, self.top_k)
            .await
            .context("Failed to generate an answer")?;

        tracing::debug!(
            "Answer ready: confidence={:.3}, sources={}",
            response.confidence_score,
            response.sources.len()
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            println!("{}", response.answer);
            println!();
            println!("Confidence: {:.1}%", response.confidence_score * 100.0);
            if let Some(breakdown) = &response.confidence_breakdown {
                print_breakdown(breakdown);
            }
            print_sources(&response.sources);
        }

        Ok(())
    }

    fn get_question(&self) -> anyhow::Result<String> {
        if let Some(question) = &self.question {
            return Ok(question.clone());
        }

        match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read question file {:?}", path)),
            None => anyhow::bail!("No question provided"),
        }
    }
}

/// Retrieve and score chunks without generating an answer
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search query
    pub query: String,

    /// Number of chunks to retrieve (default: the base's retrieval.top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(
        &self,
        config: &AppConfig,
        registry: &ServiceRegistry,
        base: &str,
    ) -> anyhow::Result<()> {
        tracing::info!("Executing search command");

        let service = service_for(config, registry, base).await?;
        let response = service.search(&self.query, self.top_k).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else if response.sources.is_empty() {
            println!("No matching chunks found.");
        } else {
            println!("Confidence: {:.1}%", response.confidence_score * 100.0);
            print_breakdown(&response.confidence_breakdown);
            print_sources(&response.sources);
        }

        Ok(())
    }
}

/// Get or build the base's service.
async fn service_for(
    config: &AppConfig,
    registry: &ServiceRegistry,
    base: &str,
) -> anyhow::Result<Arc<QaService>> {
    let endpoint = config.provider_endpoint();
    let timeout = config
        .get_provider_config(&config.provider)
        .and_then(|pc| pc.timeout);

    let service = registry
        .get_or_try_insert(base, move || async move {
            let llm = create_client(&config.provider, endpoint, timeout)?;
            docqa_knowledge::build_service(&config.workspace, base, llm, &config.model, endpoint)
        })
        .await
        .with_context(|| format!("Failed to open knowledge base '{}'", base))?;

    Ok(service)
}

fn print_breakdown(breakdown: &ConfidenceBreakdown) {
    println!(
        "  best match {:.2} | average {:.2} | consistency {:.2} | keywords {:.2}",
        breakdown.best_similarity,
        breakdown.avg_similarity,
        breakdown.consistency,
        breakdown.keyword_match
    );
}

fn print_sources(sources: &[SourceInfo]) {
    if sources.is_empty() {
        println!("Sources: (none)");
        return;
    }

    println!("Sources:");
    for source in sources {
        match source.similarity_score {
            Some(score) => println!(
                "- {} (chunk {}, similarity {:.2})",
                source.source, source.chunk_index, score
            ),
            None => println!("- {} (chunk {})", source.source, source.chunk_index),
        }
    }
}
