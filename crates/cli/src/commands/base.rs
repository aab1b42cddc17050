//! Knowledge base maintenance commands: sources, stats, remove and clean.

use anyhow::Context;
use clap::Args;
use docqa_core::config::AppConfig;
use docqa_knowledge::SourceRegistry;
use std::path::PathBuf;

/// List ingested documents
#[derive(Args, Debug)]
pub struct SourcesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SourcesCommand {
    pub fn execute(&self, config: &AppConfig, base: &str) -> anyhow::Result<()> {
        tracing::info!("Executing sources command for base '{}'", base);

        let sources = SourceRegistry::new(&config.workspace, base)
            .list()
            .with_context(|| format!("Failed to read sources of '{}'", base))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&sources)?);
        } else if sources.is_empty() {
            println!("No documents in knowledge base '{}'", base);
        } else {
            for source in &sources {
                println!(
                    "{}  {} chunks  {} bytes  {}",
                    source.path,
                    source.chunk_count,
                    source.byte_count,
                    source.indexed_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        Ok(())
    }
}

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig, base: &str) -> anyhow::Result<()> {
        tracing::info!("Executing stats command for base '{}'", base);

        let stats = docqa_knowledge::stats(&config.workspace, base)?;

        if self.json {
            let output = serde_json::json!({
                "base": stats.base_name,
                "documentsCount": stats.documents_count,
                "chunksCount": stats.chunks_count,
                "dbSizeBytes": stats.db_size_bytes,
                "lastIndexedAt": stats.last_indexed_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Documents: {}", stats.documents_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(last) = stats.last_indexed_at {
                println!("  Last indexed: {}", last);
            }
        }

        Ok(())
    }
}

/// Remove one document from the knowledge base
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Path the document was ingested under (as shown by `sources`)
    pub path: PathBuf,
}

impl RemoveCommand {
    pub fn execute(&self, config: &AppConfig, base: &str) -> anyhow::Result<()> {
        tracing::info!("Executing remove command for base '{}'", base);

        let removed = docqa_knowledge::remove(&config.workspace, base, &self.path)
            .with_context(|| format!("Failed to remove {:?} from '{}'", self.path, base))?;

        if removed == 0 {
            println!("No document stored under {}", self.path.display());
        } else {
            println!("Removed {} ({} chunks)", self.path.display(), removed);
        }

        Ok(())
    }
}

/// Remove all documents from the knowledge base
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub fn execute(&self, config: &AppConfig, base: &str) -> anyhow::Result<()> {
        tracing::info!("Executing clean command for base '{}'", base);

        docqa_knowledge::clean(&config.workspace, base)?;
        println!("Knowledge base '{}' cleaned", base);

        Ok(())
    }
}
