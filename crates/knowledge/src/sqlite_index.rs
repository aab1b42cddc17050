//! SQLite-backed chunk store with brute-force cosine search.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use crate::index::{DistanceMetric, ScoredChunkSource};
use crate::types::{Chunk, KnowledgeSource};
use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        file_name TEXT NOT NULL,
        file_path TEXT NOT NULL UNIQUE,
        content_hash TEXT NOT NULL,
        chunk_count INTEGER NOT NULL,
        byte_count INTEGER NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER,
        content TEXT NOT NULL,
        source TEXT,
        file_path TEXT,
        embedding BLOB NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
    CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);
"#;

const EMBEDDING_META_KEY: &str = "embedding";

/// Chunk store for one knowledge base.
///
/// Queries are embedded with the same provider used at ingestion, then
/// ranked by cosine distance `1 - cos` over every stored chunk.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl SqliteIndex {
    /// Open (or create) the index at `db_path`.
    ///
    /// The first open records the embedding configuration; later opens must
    /// use a consistent one.
    pub fn open(
        db_path: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding: &EmbeddingConfig,
    ) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Index(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Self::with_connection(conn, embedder, embedding)
    }

    /// Open a throwaway in-memory index.
    pub fn open_in_memory(
        embedder: Arc<dyn EmbeddingProvider>,
        embedding: &EmbeddingConfig,
    ) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;
        Self::with_connection(conn, embedder, embedding)
    }

    fn with_connection(
        conn: Connection,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding: &EmbeddingConfig,
    ) -> AppResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.execute_batch(SCHEMA))
            .map_err(|e| AppError::Index(format!("Failed to create tables: {}", e)))?;

        check_embedding_meta(&conn, embedding)?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Index("SQLite connection lock poisoned".to_string()))
    }

    /// The provider used to embed queries and chunks.
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.embedder)
    }

    /// Store a document and its embedded chunks, replacing any earlier
    /// version stored under the same path.
    pub fn add_document(
        &self,
        document: &KnowledgeSource,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> AppResult<()> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Index(format!(
                "Got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Index(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM chunks WHERE document_id IN (SELECT id FROM documents WHERE file_path = ?1)",
            params![document.path],
        )
        .and_then(|_| {
            tx.execute(
                "DELETE FROM documents WHERE file_path = ?1",
                params![document.path],
            )
        })
        .map_err(|e| AppError::Index(format!("Failed to replace document: {}", e)))?;

        tx.execute(
            "INSERT INTO documents (id, file_name, file_path, content_hash, chunk_count, byte_count, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.source_id,
                document.file_name,
                document.path,
                document.content_hash,
                document.chunk_count as i64,
                document.byte_count as i64,
                document.indexed_at.to_rfc3339(),
            ],
        )
        .map_err(|e| AppError::Index(format!("Failed to insert document: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (id, document_id, chunk_index, content, source, file_path, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| AppError::Index(format!("Failed to prepare insert: {}", e)))?;

            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                stmt.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    document.source_id,
                    chunk.chunk_index.map(i64::from),
                    chunk.content,
                    chunk.source,
                    chunk.file_path,
                    embedding_to_bytes(embedding),
                ])
                .map_err(|e| AppError::Index(format!("Failed to insert chunk: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Index(format!("Failed to commit document: {}", e)))?;

        tracing::debug!(
            "Stored document {} with {} chunks",
            document.file_name,
            chunks.len()
        );
        Ok(())
    }

    /// Remove a document and its chunks. Returns the number of chunks removed.
    pub fn remove_source(&self, file_path: &str) -> AppResult<usize> {
        let conn = self.lock()?;

        let removed = conn
            .execute(
                "DELETE FROM chunks WHERE document_id IN (SELECT id FROM documents WHERE file_path = ?1)",
                params![file_path],
            )
            .map_err(|e| AppError::Index(format!("Failed to delete chunks: {}", e)))?;

        conn.execute("DELETE FROM documents WHERE file_path = ?1", params![file_path])
            .map_err(|e| AppError::Index(format!("Failed to delete document: {}", e)))?;

        Ok(removed)
    }

    /// Path of an already stored document with this content hash, if any.
    pub fn find_by_hash(&self, content_hash: &str) -> AppResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT file_path FROM documents WHERE content_hash = ?1 LIMIT 1",
            params![content_hash],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Index(format!("Failed to look up content hash: {}", e)))
    }

    /// Returns (documents_count, chunks_count).
    pub fn stats(&self) -> AppResult<(u32, u32)> {
        let conn = self.lock()?;

        let count = |sql: &str| -> AppResult<u32> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|v| v as u32)
                .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))
        };

        Ok((
            count("SELECT COUNT(*) FROM documents")?,
            count("SELECT COUNT(*) FROM chunks")?,
        ))
    }

    /// Delete all documents and chunks.
    pub fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM documents;")
            .map_err(|e| AppError::Index(format!("Failed to reset index: {}", e)))?;

        tracing::info!("Reset knowledge base index");
        Ok(())
    }

    /// Rank all stored chunks by cosine distance to `query_embedding`.
    pub fn search_by_embedding(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> AppResult<Vec<(Chunk, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT content, source, file_path, chunk_index, embedding FROM chunks")
            .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let chunk = Chunk {
                    content: row.get(0)?,
                    source: row.get(1)?,
                    file_path: row.get(2)?,
                    chunk_index: row.get::<_, Option<i64>>(3)?.map(|v| v as u32),
                };
                let bytes: Vec<u8> = row.get(4)?;
                Ok((chunk, bytes))
            })
            .map_err(|e| AppError::Index(format!("Failed to query chunks: {}", e)))?;

        let mut results = Vec::new();
        for row in rows {
            let (chunk, bytes) =
                row.map_err(|e| AppError::Index(format!("Failed to read chunk: {}", e)))?;
            let embedding = bytes_to_embedding(&bytes)?;
            let distance = cosine_distance(query_embedding, &embedding)?;
            results.push((chunk, distance));
        }

        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        tracing::debug!("Retrieved {} chunks (requested top-{})", results.len(), k);
        Ok(results)
    }
}

#[async_trait]
impl ScoredChunkSource for SqliteIndex {
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> AppResult<Vec<(Chunk, f32)>> {
        // Embed before taking the connection lock.
        let query_embedding = self.embedder.embed(query).await?;
        self.search_by_embedding(&query_embedding, k)
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::CosineDistance
    }
}

fn check_embedding_meta(conn: &Connection, embedding: &EmbeddingConfig) -> AppResult<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![EMBEDDING_META_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Index(format!("Failed to read index metadata: {}", e)))?;

    match stored {
        Some(json) => {
            let stored: EmbeddingConfig = serde_json::from_str(&json)?;
            stored.validate_consistency(embedding).map_err(|e| {
                AppError::Index(format!(
                    "{}. The index was built with a different embedding setup; re-ingest with --reset",
                    e
                ))
            })
        }
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![EMBEDDING_META_KEY, serde_json::to_string(embedding)?],
            )
            .map_err(|e| AppError::Index(format!("Failed to write index metadata: {}", e)))?;
            Ok(())
        }
    }
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index("Invalid embedding bytes length".to_string()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine distance `1 - cos(a, b)`, in [0, 2]. Zero vectors are treated as
/// orthogonal to everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> AppResult<f32> {
    if a.len() != b.len() {
        return Err(AppError::Index(format!(
            "Embedding dimension mismatch: query has {}, stored chunk has {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }

    Ok((1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0))
}
