//! Ingest command handler.

use anyhow::Context;
use clap::Args;
use docqa_core::config::AppConfig;
use docqa_knowledge::IngestOptions;
use std::path::PathBuf;

/// Index files or directories into the knowledge base
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest (.txt, .md)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Reset the base before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> anyhow::Result<()> {
        tracing::info!("Executing ingest command for base '{}'", base);

        let options = IngestOptions {
            base_name: base.to_string(),
            paths: self.paths.clone(),
            reset: self.reset,
        };

        let stats = docqa_knowledge::ingest(&config.workspace, &options, config.provider_endpoint())
            .await
            .with_context(|| format!("Failed to ingest into knowledge base '{}'", base))?;

        if self.json {
            let output = serde_json::json!({
                "base": base,
                "documentsIndexed": stats.documents_indexed,
                "documentsSkipped": stats.documents_skipped,
                "documentsFailed": stats.documents_failed,
                "chunksIndexed": stats.chunks_indexed,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Indexed {} documents ({} chunks, {} bytes) in {:.2}s",
                stats.documents_indexed,
                stats.chunks_indexed,
                stats.bytes_processed,
                stats.duration_secs
            );
            if stats.documents_skipped > 0 {
                println!("Skipped {} unchanged or empty documents", stats.documents_skipped);
            }
            if stats.documents_failed > 0 {
                println!(
                    "Failed to ingest {} documents (see log for details)",
                    stats.documents_failed
                );
            }
        }

        Ok(())
    }
}
