//! Knowledge base storage and retrieval.
//!
//! Tax-law reference documents are split into overlapping character
//! windows and stored as plain-text chunks. Retrieval scores a chunk by
//! how many distinct query tokens appear in it, which works for both
//! English and Thai keywords without an embedding model.

mod retriever;
mod store;

pub use retriever::{context_text, Retriever};
pub use store::{MemoryKnowledgeBase, SqliteKnowledgeBase};

use crate::error::Result;
use crate::models::TextChunk;

/// Window size for document chunking, in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Overlap between consecutive windows, in characters.
pub const CHUNK_OVERLAP: usize = 200;

/// Common interface over knowledge base backends.
pub trait KnowledgeSource: Send + Sync {
    /// Return up to `k` chunks relevant to `query`, best first.
    fn search(&self, query: &str, k: usize) -> Result<Vec<TextChunk>>;

    /// Number of chunks held by the backend.
    fn chunk_count(&self) -> Result<usize>;
}

/// Knowledge base client that dispatches to a concrete backend.
#[derive(Clone)]
pub enum KnowledgeClient {
    Store(SqliteKnowledgeBase),
    Memory(MemoryKnowledgeBase),
}

impl KnowledgeClient {
    pub fn store(kb: SqliteKnowledgeBase) -> Self {
        Self::Store(kb)
    }

    pub fn memory(kb: MemoryKnowledgeBase) -> Self {
        Self::Memory(kb)
    }
}

impl KnowledgeSource for KnowledgeClient {
    fn search(&self, query: &str, k: usize) -> Result<Vec<TextChunk>> {
        match self {
            Self::Store(kb) => kb.search(query, k),
            Self::Memory(kb) => kb.search(query, k),
        }
    }

    fn chunk_count(&self) -> Result<usize> {
        match self {
            Self::Store(kb) => kb.chunk_count(),
            Self::Memory(kb) => kb.chunk_count(),
        }
    }
}

/// Split text into overlapping windows of `size` characters.
///
/// Windows advance by `size - overlap` so neighbouring chunks share
/// context. Boundaries are character-based because Thai source text is
/// multi-byte UTF-8.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Lowercased distinct tokens of a query, for scoring.
pub(crate) fn query_tokens(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Number of distinct query tokens found in the chunk content.
///
/// Substring matching rather than word matching: Thai text has no word
/// separators, so a keyword like "ประกัน" must hit inside a run.
pub(crate) fn score_chunk(tokens: &[String], content: &str) -> usize {
    let haystack = content.to_lowercase();
    tokens
        .iter()
        .filter(|t| haystack.contains(t.as_str()))
        .count()
}

/// Score, filter, and rank chunks for one query. Zero-score chunks are
/// dropped; ties break on the lower chunk id.
pub(crate) fn rank_chunks(query: &str, chunks: &[TextChunk], k: usize) -> Vec<TextChunk> {
    let tokens = query_tokens(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &TextChunk)> = chunks
        .iter()
        .map(|c| (score_chunk(&tokens, &c.content), c))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

    scored.into_iter().take(k).map(|(_, c)| c.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: i64, content: &str) -> TextChunk {
        TextChunk {
            id,
            source: "test.md".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_chunk_text_windows_overlap() {
        let text = "a".repeat(2500);
        let chunks = chunk_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);

        // Windows start at 0, 800, 1600; the last one reaches the end
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(chunks[2].len(), 900);
    }

    #[test]
    fn test_chunk_text_short_input_is_single_chunk() {
        let chunks = chunk_text("ค่าเบี้ยประกันสุขภาพ", CHUNK_SIZE, CHUNK_OVERLAP);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "ค่าเบี้ยประกันสุขภาพ");
    }

    #[test]
    fn test_chunk_text_empty_input() {
        assert!(chunk_text("", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
        assert!(chunk_text("   \n  ", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
    }

    #[test]
    fn test_score_counts_distinct_tokens() {
        let tokens = query_tokens("insurance premium deduction insurance");
        assert_eq!(tokens.len(), 3);

        let score = score_chunk(&tokens, "Health insurance premium paid in 2025");
        assert_eq!(score, 2);
    }

    #[test]
    fn test_score_matches_thai_substrings() {
        let tokens = query_tokens("ประกัน deduction");
        let score = score_chunk(&tokens, "เบี้ยประกันชีวิตหักลดหย่อนได้");
        assert_eq!(score, 1);
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let chunks = vec![
            chunk(1, "insurance"),
            chunk(2, "insurance premium deduction"),
            chunk(3, "insurance premium"),
            chunk(4, "nothing relevant"),
        ];

        let ranked = rank_chunks("insurance premium deduction", &chunks, 10);
        let ids: Vec<i64> = ranked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_rank_truncates_to_k() {
        let chunks = vec![
            chunk(1, "tax tax tax"),
            chunk(2, "tax"),
            chunk(3, "tax deduction"),
        ];
        let ranked = rank_chunks("tax", &chunks, 2);
        assert_eq!(ranked.len(), 2);
    }
}
