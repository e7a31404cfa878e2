//! Free-form tax question answering.
//!
//! Single-query retrieval over the knowledge base followed by one
//! generation call. Unlike classification there is no retry: a question
//! is interactive, so failures surface immediately as a fixed answer
//! string rather than a backoff.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::ai::{Reasoner, ReasonerClient};
use crate::error::{Error, Result};
use crate::kb::{context_text, Retriever};
use crate::prompts::{PromptId, PromptLibrary};

/// Answer returned when retrieval found nothing for the question.
pub const EMPTY_KB_ANSWER: &str = "No relevant information found in the knowledge base.";
/// Answer returned when generation failed.
pub const GENERATION_ERROR_ANSWER: &str = "An error occurred while generating the response.";

/// Answers tax questions against the knowledge base.
#[derive(Clone)]
pub struct Advisor {
    reasoner: ReasonerClient,
    retriever: Retriever,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl Advisor {
    pub fn new(
        reasoner: ReasonerClient,
        retriever: Retriever,
        prompts: Arc<RwLock<PromptLibrary>>,
    ) -> Self {
        Self {
            reasoner,
            retriever,
            prompts,
        }
    }

    /// Answer a question, degrading to a fixed string on any failure.
    pub async fn answer(&self, question: &str) -> String {
        let chunks = self.retriever.question_context(question);
        if chunks.is_empty() {
            debug!("No knowledge base context for question");
            return EMPTY_KB_ANSWER.to_string();
        }

        let prompt = match self.render_prompt(question, &context_text(&chunks)) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(error = %e, "Failed to render answer prompt");
                return GENERATION_ERROR_ANSWER.to_string();
            }
        };

        match self.reasoner.generate(&prompt).await {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                error!(error = %e, "Answer generation failed");
                GENERATION_ERROR_ANSWER.to_string()
            }
        }
    }

    fn render_prompt(&self, question: &str, context: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("context", context);
        vars.insert("question", question);

        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        let template = prompts.get(PromptId::AnswerQuestion)?;
        Ok(template.render(&vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockReasoner;
    use crate::kb::{KnowledgeClient, MemoryKnowledgeBase};

    fn advisor_with(mock: MockReasoner, kb: MemoryKnowledgeBase) -> Advisor {
        Advisor::new(
            ReasonerClient::Mock(mock),
            Retriever::new(KnowledgeClient::memory(kb)),
            Arc::new(RwLock::new(PromptLibrary::embedded_only())),
        )
    }

    #[tokio::test]
    async fn test_empty_kb_returns_fixed_answer() {
        let advisor = advisor_with(MockReasoner::new(), MemoryKnowledgeBase::new());
        let answer = advisor.answer("Can I deduct insurance premiums?").await;
        assert_eq!(answer, EMPTY_KB_ANSWER);
    }

    #[tokio::test]
    async fn test_answers_from_context() {
        let mock = MockReasoner::new();
        mock.push_generate(Ok(
            "Yes, health insurance premiums are deductible up to 25,000 THB.".to_string(),
        ));
        let kb = MemoryKnowledgeBase::with_documents(&[(
            "insurance.md",
            "Health insurance premiums are deductible up to 25,000 THB.",
        )]);

        let answer = advisor_with(mock, kb)
            .answer("Can I deduct insurance premiums?")
            .await;
        assert!(answer.contains("25,000"));
    }

    #[tokio::test]
    async fn test_generation_failure_returns_fixed_answer() {
        let mock = MockReasoner::new();
        mock.push_generate(Err(Error::InvalidData("model exploded".into())));
        let kb = MemoryKnowledgeBase::with_documents(&[(
            "insurance.md",
            "Health insurance premiums are deductible.",
        )]);

        let answer = advisor_with(mock, kb)
            .answer("Can I deduct insurance premiums?")
            .await;
        assert_eq!(answer, GENERATION_ERROR_ANSWER);
    }
}
