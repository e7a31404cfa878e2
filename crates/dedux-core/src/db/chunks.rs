//! Knowledge-base chunk operations

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::TextChunk;

impl Database {
    /// Insert a knowledge-base chunk, returning its id
    pub fn insert_chunk(&self, source: &str, content: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kb_chunks (source, content) VALUES (?, ?)",
            params![source, content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Load all chunks in insertion order
    pub fn list_chunks(&self) -> Result<Vec<TextChunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, source, content FROM kb_chunks ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(TextChunk {
                id: row.get(0)?,
                source: row.get(1)?,
                content: row.get(2)?,
            })
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }

    /// Remove all chunks ingested from a source, returning how many
    pub fn delete_chunks_by_source(&self, source: &str) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM kb_chunks WHERE source = ?", params![source])?;
        Ok(changed)
    }

    /// Count stored chunks
    pub fn count_chunks(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kb_chunks", [], |row| row.get(0))?;
        Ok(count)
    }
}
