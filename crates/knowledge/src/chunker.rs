//! Fixed-size document chunking with overlap.

use crate::types::Chunk;
use docqa_core::{AppError, AppResult};
use std::path::Path;
use text_splitter::{ChunkConfig, TextSplitter};

/// Split a document's text into chunks of at most `chunk_size` characters,
/// with up to `chunk_overlap` characters shared between neighbours.
///
/// Chunks carry the document's file name and path and are numbered from 0
/// in document order. Blank chunks are dropped.
pub fn split_document(
    text: &str,
    path: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
) -> AppResult<Vec<Chunk>> {
    let config = ChunkConfig::new(chunk_size)
        .with_overlap(chunk_overlap)
        .map_err(|e| AppError::Config(format!("Invalid chunking settings: {}", e)))?;
    let splitter = TextSplitter::new(config);

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file_path = path.display().to_string();

    let chunks: Vec<Chunk> = splitter
        .chunks(text)
        .filter(|piece| !piece.trim().is_empty())
        .enumerate()
        .map(|(i, piece)| {
            Chunk::new(piece)
                .with_source(file_name.clone())
                .with_file_path(file_path.clone())
                .with_chunk_index(i as u32)
        })
        .collect();

    tracing::debug!(
        "Split {} into {} chunks (size: {}, overlap: {})",
        file_name,
        chunks.len(),
        chunk_size,
        chunk_overlap
    );

    Ok(chunks)
}
