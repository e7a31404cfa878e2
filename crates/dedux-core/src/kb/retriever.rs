//! Query building and multi-query retrieval.

use tracing::{debug, warn};

use super::{KnowledgeClient, KnowledgeSource};
use crate::models::{ReceiptData, TextChunk};

/// Chunks fetched per query when combining several receipt queries.
pub const RECEIPT_TOP_K: usize = 3;
/// Chunks fetched for a single free-form question.
pub const QUESTION_TOP_K: usize = 5;

/// Characters of chunk content used as the dedup key when merging
/// result lists.
const DEDUP_KEY_CHARS: usize = 100;

/// A merchant-keyword bucket and the follow-up query it triggers.
struct KeywordBucket {
    keywords: &'static [&'static str],
    hint: &'static str,
}

const KEYWORD_BUCKETS: &[KeywordBucket] = &[
    KeywordBucket {
        keywords: &[
            "donation", "donate", "charity", "foundation", "temple", "school", "university",
            "บริจาค", "มูลนิธิ", "วัด",
        ],
        hint: "donation charity foundation temple e-donation tax deduction",
    },
    KeywordBucket {
        keywords: &["insurance", "assurance", "life", "health", "ประกัน"],
        hint: "insurance premium life health pension tax deduction",
    },
    KeywordBucket {
        keywords: &["fund", "asset management", "ssf", "rmf", "esg", "กองทุน"],
        hint: "investment fund SSF RMF Thai ESG provident tax deduction",
    },
    KeywordBucket {
        keywords: &["social security", "sso", "ประกันสังคม"],
        hint: "social security contribution tax deduction",
    },
];

/// Query issued when no merchant keyword matches a bucket.
const GENERIC_HINT: &str = "personal income tax deduction allowance Thailand";

/// Follow-up query for a merchant name. The first bucket with a keyword
/// hit wins; unknown merchants fall back to the generic allowance query.
fn hint_query(merchant: &str) -> &'static str {
    let needle = merchant.to_lowercase();
    for bucket in KEYWORD_BUCKETS {
        if bucket.keywords.iter().any(|kw| needle.contains(kw)) {
            return bucket.hint;
        }
    }
    GENERIC_HINT
}

/// Seed query describing the receipt itself.
fn seed_query(receipt: &ReceiptData) -> String {
    let date = receipt.date.map(|d| d.to_string()).unwrap_or_default();
    let amount = receipt.amount.unwrap_or_default();
    format!(
        "tax deduction {} {} {}",
        receipt.merchant_or_default(),
        amount,
        date
    )
}

/// Retrieves knowledge base context for receipts and questions.
#[derive(Clone)]
pub struct Retriever {
    kb: KnowledgeClient,
}

impl Retriever {
    pub fn new(kb: KnowledgeClient) -> Self {
        Self { kb }
    }

    /// Context chunks for classifying a receipt.
    ///
    /// Runs the seed query plus one keyword-bucket query and merges the
    /// results. A failing query degrades to its absence rather than
    /// failing the whole retrieval; an empty result list means the
    /// classifier will skip the model call.
    pub fn receipt_context(&self, receipt: &ReceiptData) -> Vec<TextChunk> {
        let queries = [
            seed_query(receipt),
            hint_query(receipt.merchant_or_default()).to_string(),
        ];
        self.gather(&queries, RECEIPT_TOP_K)
    }

    /// Context chunks for a free-form tax question.
    pub fn question_context(&self, question: &str) -> Vec<TextChunk> {
        self.gather(&[question.to_string()], QUESTION_TOP_K)
    }

    /// Run each query, merge results in first-seen order, and drop
    /// chunks whose leading content duplicates an earlier one.
    fn gather(&self, queries: &[String], k: usize) -> Vec<TextChunk> {
        let mut merged: Vec<TextChunk> = Vec::new();
        let mut seen_keys: Vec<String> = Vec::new();

        for query in queries {
            let hits = match self.kb.search(query, k) {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = query.as_str(), error = %e, "Knowledge base query failed");
                    continue;
                }
            };

            for chunk in hits {
                let key: String = chunk.content.chars().take(DEDUP_KEY_CHARS).collect();
                if seen_keys.contains(&key) {
                    continue;
                }
                seen_keys.push(key);
                merged.push(chunk);
            }
        }

        debug!(
            queries = queries.len(),
            chunks = merged.len(),
            "Gathered knowledge base context"
        );
        merged
    }
}

/// Join chunk contents into the context block given to the model.
pub fn context_text(chunks: &[TextChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::MemoryKnowledgeBase;
    use chrono::NaiveDate;

    fn receipt(merchant: &str) -> ReceiptData {
        ReceiptData {
            date: NaiveDate::from_ymd_opt(2025, 1, 15),
            amount: Some(18_000.0),
            tax_id: Some("0105536112014".to_string()),
            merchant_name: Some(merchant.to_string()),
            error: None,
        }
    }

    #[test]
    fn test_hint_query_buckets() {
        assert!(hint_query("Bangkok Insurance PCL").contains("insurance premium"));
        assert!(hint_query("มูลนิธิเด็ก").contains("donation"));
        assert!(hint_query("SSF Master Fund").contains("investment fund"));
        assert!(hint_query("Social Security Office").contains("social security"));
        assert_eq!(hint_query("7-Eleven"), GENERIC_HINT);
    }

    #[test]
    fn test_first_matching_bucket_wins() {
        // "Foundation Insurance" hits the donation bucket before insurance
        assert!(hint_query("Foundation Insurance Co").contains("donation"));
    }

    #[test]
    fn test_seed_query_shape() {
        let q = seed_query(&receipt("Bangkok Hospital"));
        assert_eq!(q, "tax deduction Bangkok Hospital 18000 2025-01-15");
    }

    #[test]
    fn test_receipt_context_merges_and_dedups() {
        let kb = MemoryKnowledgeBase::with_documents(&[
            (
                "insurance.md",
                "Health insurance premium deduction is capped at 25,000 THB per tax year.",
            ),
            (
                "life.md",
                "Life insurance premium deduction is capped at 100,000 THB per tax year.",
            ),
        ]);
        let retriever = Retriever::new(KnowledgeClient::memory(kb));

        // Both the seed query and the insurance hint match the same
        // chunks; dedup keeps one copy of each.
        let chunks = retriever.receipt_context(&receipt("AIA Insurance"));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.contains("Health insurance"));
    }

    #[test]
    fn test_dedup_keys_on_leading_content() {
        // Two chunks that agree on their first hundred characters but
        // diverge after; the later one is dropped as a duplicate.
        let prefix = format!("Insurance deduction notes {}", "n".repeat(90));
        let first = format!("{prefix} with the original tail");
        let second = format!("{prefix} with a differing tail");
        let kb = MemoryKnowledgeBase::with_documents(&[
            ("a.md", first.as_str()),
            ("b.md", second.as_str()),
        ]);
        let retriever = Retriever::new(KnowledgeClient::memory(kb));

        let chunks = retriever.question_context("insurance deduction");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.ends_with("original tail"));
    }

    #[test]
    fn test_question_context_caps_at_top_k() {
        let kb = MemoryKnowledgeBase::with_documents(&[
            ("a.md", "tax note alpha"),
            ("b.md", "tax note beta"),
            ("c.md", "tax note gamma"),
            ("d.md", "tax note delta"),
            ("e.md", "tax note epsilon"),
            ("f.md", "tax note zeta"),
            ("g.md", "tax note eta"),
        ]);
        let retriever = Retriever::new(KnowledgeClient::memory(kb));

        let chunks = retriever.question_context("tax");
        assert_eq!(chunks.len(), QUESTION_TOP_K);
    }

    #[test]
    fn test_empty_kb_yields_empty_context() {
        let retriever = Retriever::new(KnowledgeClient::memory(MemoryKnowledgeBase::new()));
        assert!(retriever.receipt_context(&receipt("Anything")).is_empty());
        assert!(retriever.question_context("what can I deduct?").is_empty());
    }

    #[test]
    fn test_context_text_joins_chunks() {
        let chunks = vec![
            TextChunk {
                id: 1,
                source: "a.md".to_string(),
                content: "first".to_string(),
            },
            TextChunk {
                id: 2,
                source: "b.md".to_string(),
                content: "second".to_string(),
            },
        ];
        assert_eq!(context_text(&chunks), "first\n\nsecond");
    }
}
