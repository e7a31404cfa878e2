//! Knowledge base backends.

use std::sync::Arc;

use tracing::info;

use super::{chunk_text, rank_chunks, KnowledgeSource, CHUNK_OVERLAP, CHUNK_SIZE};
use crate::db::Database;
use crate::error::Result;
use crate::models::TextChunk;

/// Knowledge base persisted in the encrypted SQLite database.
#[derive(Clone)]
pub struct SqliteKnowledgeBase {
    db: Database,
}

impl SqliteKnowledgeBase {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Chunk a document and store it under `source`, replacing any
    /// chunks previously ingested from the same source. Returns the
    /// number of chunks written.
    pub fn ingest(&self, source: &str, content: &str) -> Result<usize> {
        let replaced = self.db.delete_chunks_by_source(source)?;
        let chunks = chunk_text(content, CHUNK_SIZE, CHUNK_OVERLAP);
        for chunk in &chunks {
            self.db.insert_chunk(source, chunk)?;
        }

        info!(
            source = source,
            chunks = chunks.len(),
            replaced = replaced,
            "Ingested document into knowledge base"
        );
        Ok(chunks.len())
    }
}

impl KnowledgeSource for SqliteKnowledgeBase {
    fn search(&self, query: &str, k: usize) -> Result<Vec<TextChunk>> {
        let chunks = self.db.list_chunks()?;
        Ok(rank_chunks(query, &chunks, k))
    }

    fn chunk_count(&self) -> Result<usize> {
        Ok(self.db.count_chunks()? as usize)
    }
}

/// In-memory knowledge base for tests and offline runs.
#[derive(Clone, Default)]
pub struct MemoryKnowledgeBase {
    chunks: Arc<Vec<TextChunk>>,
}

impl MemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend from (source, content) document pairs. Documents
    /// are chunked with the same windows as the SQLite store.
    pub fn with_documents(documents: &[(&str, &str)]) -> Self {
        let mut chunks = Vec::new();
        let mut next_id = 1;
        for (source, content) in documents {
            for piece in chunk_text(content, CHUNK_SIZE, CHUNK_OVERLAP) {
                chunks.push(TextChunk {
                    id: next_id,
                    source: source.to_string(),
                    content: piece,
                });
                next_id += 1;
            }
        }
        Self {
            chunks: Arc::new(chunks),
        }
    }
}

impl KnowledgeSource for MemoryKnowledgeBase {
    fn search(&self, query: &str, k: usize) -> Result<Vec<TextChunk>> {
        Ok(rank_chunks(query, &self.chunks, k))
    }

    fn chunk_count(&self) -> Result<usize> {
        Ok(self.chunks.len())
    }
}
