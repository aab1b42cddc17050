//! Source tracking for knowledge bases.
//!
//! Keeps `sources.jsonl`, one [`KnowledgeSource`] per ingested document.

use crate::config::get_sources_path;
use crate::types::KnowledgeSource;
use docqa_core::{AppError, AppResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Record of the documents ingested into one knowledge base.
pub struct SourceRegistry {
    path: PathBuf,
}

impl SourceRegistry {
    pub fn new(workspace: &Path, base_name: &str) -> Self {
        Self {
            path: get_sources_path(workspace, base_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a source record.
    pub fn track(&self, source: &KnowledgeSource) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open sources.jsonl: {}", e)))?;

        let line = serde_json::to_string(source)?;
        writeln!(file, "{}", line).map_err(|e| {
            AppError::Knowledge(format!("Failed to write to sources.jsonl: {}", e))
        })?;

        file.sync_all()
            .map_err(|e| AppError::Knowledge(format!("Failed to sync sources.jsonl: {}", e)))?;

        tracing::debug!("Tracked source: {}", source.path);
        Ok(())
    }

    /// All tracked sources, oldest first.
    pub fn list(&self) -> AppResult<Vec<KnowledgeSource>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open sources.jsonl: {}", e)))?;

        let mut sources = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                AppError::Knowledge(format!("Failed to read line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let source: KnowledgeSource = serde_json::from_str(&line).map_err(|e| {
                AppError::Knowledge(format!(
                    "Failed to parse line {} in sources.jsonl: {}",
                    line_num + 1,
                    e
                ))
            })?;
            sources.push(source);
        }

        Ok(sources)
    }

    /// Drop every record for `path`. Returns how many were removed.
    pub fn remove_path(&self, path: &str) -> AppResult<usize> {
        let sources = self.list()?;
        let before = sources.len();
        let kept: Vec<_> = sources.into_iter().filter(|s| s.path != path).collect();
        let removed = before - kept.len();

        if removed > 0 {
            self.rewrite(&kept)?;
        }
        Ok(removed)
    }

    /// Delete the record file.
    pub fn clear(&self) -> AppResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                AppError::Knowledge(format!("Failed to delete sources.jsonl: {}", e))
            })?;
            tracing::debug!("Cleared sources.jsonl");
        }
        Ok(())
    }

    fn rewrite(&self, sources: &[KnowledgeSource]) -> AppResult<()> {
        let tmp = self.path.with_extension("jsonl.tmp");
        let mut content = String::new();
        for source in sources {
            content.push_str(&serde_json::to_string(source)?);
            content.push('\n');
        }

        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
