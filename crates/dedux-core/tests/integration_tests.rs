//! Integration tests for dedux-core
//!
//! These tests exercise the full ingest → extract → classify → record
//! workflow over the public API, with the knowledge base persisted in
//! SQLite the way production runs use it.

use std::sync::{Arc, RwLock};

use dedux_core::{
    Advisor, Classifier, Database, KnowledgeClient, MockReasoner, Pipeline, PipelineRequest,
    PromptLibrary, ReasonerClient, RecordOutcome, Retriever, RunStatus, SqliteKnowledgeBase,
    TransactionRecorder, TransactionStatus, TransactionUpdate,
};

const INSURANCE_DOC: &str = "Health insurance premiums paid to a licensed Thai insurer are \
    deductible up to 25,000 THB per tax year. Combined life and health premiums share the \
    100,000 THB life insurance ceiling.";

const DONATION_DOC: &str = "Donations to certified schools and educational institutions qualify \
    for a double deduction. General charitable donations to registered foundations are \
    deductible at the amount given.";

struct TestPipeline {
    pipeline: Pipeline,
    db: Database,
    recorder: TransactionRecorder,
}

/// Wire a pipeline the way production callers do, over a throwaway
/// database with the default 2025 rules and the given documents ingested.
fn pipeline_over_sqlite(mock: MockReasoner, documents: &[(&str, &str)]) -> TestPipeline {
    let db = Database::in_memory().expect("Failed to create test database");
    db.seed_default_rules(2025).expect("Failed to seed rules");

    let kb = SqliteKnowledgeBase::new(db.clone());
    for (source, content) in documents {
        kb.ingest(source, content).expect("Failed to ingest document");
    }

    let reasoner = ReasonerClient::Mock(mock);
    let prompts = Arc::new(RwLock::new(PromptLibrary::embedded_only()));
    let retriever = Retriever::new(KnowledgeClient::store(kb));
    let classifier = Classifier::new(reasoner.clone(), prompts.clone(), 2025);
    let recorder = TransactionRecorder::new(db.clone(), 2025);
    let advisor = Advisor::new(reasoner.clone(), retriever.clone(), prompts);

    TestPipeline {
        pipeline: Pipeline::new(
            reasoner,
            retriever,
            classifier,
            recorder.clone(),
            advisor,
            None,
        ),
        db,
        recorder,
    }
}

fn receipt_run() -> PipelineRequest {
    PipelineRequest {
        user_id: "somchai".to_string(),
        question: String::new(),
        image: Some(b"receipt-image-bytes".to_vec()),
    }
}

// =============================================================================
// Receipt Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_receipt_workflow_end_to_end() {
    // No script: the mock classifies hospital receipts as Health Insurance
    let mock = MockReasoner::new().with_receipt(MockReasoner::sample_receipt());
    let t = pipeline_over_sqlite(mock, &[("insurance.md", INSURANCE_DOC)]);

    let state = t.pipeline.run(receipt_run()).await;

    assert_eq!(state.status, RunStatus::Completed);
    let saved = match state.outcome {
        Some(RecordOutcome::Saved(saved)) => saved,
        other => panic!("expected saved outcome, got {other:?}"),
    };
    assert_eq!(saved.transaction.status, TransactionStatus::Verified);
    assert_eq!(saved.transaction.total_amount, 18_000.0);
    assert_eq!(saved.transaction.deductible_amount, 18_000.0);
    assert_eq!(saved.transaction.merchant_name, "Bangkok Hospital");
    assert!(saved.transaction.rule_id.is_some());

    let listed = t
        .db
        .list_transactions("somchai", None)
        .expect("Failed to list transactions");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, saved.transaction.id);
}

#[tokio::test]
async fn test_education_donation_doubles_through_pipeline() {
    let mut receipt = MockReasoner::sample_receipt();
    receipt.merchant_name = Some("Ruamrudee School Foundation".to_string());
    receipt.amount = Some(5_000.0);

    let mock = MockReasoner::new().with_receipt(receipt);
    mock.push_generate(Ok(
        r#"{"is_deductible": true, "category": "Donation (Education/Sports)", "reasoning": "Donation to a certified school."}"#
            .to_string(),
    ));
    let t = pipeline_over_sqlite(mock, &[("donations.md", DONATION_DOC)]);

    let state = t.pipeline.run(receipt_run()).await;

    let saved = match state.outcome {
        Some(RecordOutcome::Saved(saved)) => saved,
        other => panic!("expected saved outcome, got {other:?}"),
    };
    assert_eq!(saved.transaction.status, TransactionStatus::Verified);
    assert_eq!(saved.transaction.total_amount, 5_000.0);
    assert_eq!(saved.transaction.deductible_amount, 10_000.0);
    assert!(!saved.is_capped);
}

#[tokio::test]
async fn test_thai_merchant_survives_the_round_trip() {
    let mut receipt = MockReasoner::sample_receipt();
    receipt.merchant_name = Some("มูลนิธิรามาธิบดี".to_string());
    receipt.amount = Some(2_000.0);

    let mock = MockReasoner::new().with_receipt(receipt);
    mock.push_generate(Ok(
        r#"{"is_deductible": true, "category": "Donation (General)", "reasoning": "Donation to a registered foundation."}"#
            .to_string(),
    ));
    let t = pipeline_over_sqlite(mock, &[("donations.md", DONATION_DOC)]);

    let state = t.pipeline.run(receipt_run()).await;

    let saved = match state.outcome {
        Some(RecordOutcome::Saved(saved)) => saved,
        other => panic!("expected saved outcome, got {other:?}"),
    };
    assert_eq!(saved.transaction.deductible_amount, 2_000.0);

    let stored = t
        .db
        .get_transaction(saved.transaction.id)
        .expect("Failed to read transaction")
        .expect("Transaction missing");
    assert_eq!(stored.merchant_name, "มูลนิธิรามาธิบดี");
}

// =============================================================================
// Human Correction Tests
// =============================================================================

#[tokio::test]
async fn test_manual_correction_recomputes_against_rule() {
    let mock = MockReasoner::new().with_receipt(MockReasoner::sample_receipt());
    let t = pipeline_over_sqlite(mock, &[("insurance.md", INSURANCE_DOC)]);

    let state = t.pipeline.run(receipt_run()).await;
    let id = match state.outcome {
        Some(RecordOutcome::Saved(saved)) => saved.transaction.id,
        other => panic!("expected saved outcome, got {other:?}"),
    };

    // Raising the total past the 25,000 THB cap recomputes the deduction
    let updates = TransactionUpdate {
        total_amount: Some(60_000.0),
        ..Default::default()
    };
    let updated = t
        .recorder
        .update(id, &updates)
        .expect("Failed to update transaction");
    assert_eq!(updated.transaction.total_amount, 60_000.0);
    assert_eq!(updated.transaction.deductible_amount, 25_000.0);
    assert!(updated.is_capped);

    // A reviewer rejecting the transaction leaves the amounts alone
    let updates = TransactionUpdate {
        status: Some(TransactionStatus::Rejected),
        ..Default::default()
    };
    let updated = t
        .recorder
        .update(id, &updates)
        .expect("Failed to update status");
    assert_eq!(updated.transaction.status, TransactionStatus::Rejected);
    assert_eq!(updated.transaction.deductible_amount, 25_000.0);
}

#[tokio::test]
async fn test_status_filters_partition_the_ledger() {
    let mock = MockReasoner::new().with_receipt(MockReasoner::sample_receipt());
    mock.push_generate(Ok(
        r#"{"is_deductible": true, "category": "Health Insurance", "reasoning": "Insurance premium."}"#
            .to_string(),
    ));
    mock.push_generate(Ok(
        r#"{"is_deductible": true, "category": "Pet Grooming", "reasoning": "Looks deductible."}"#
            .to_string(),
    ));
    mock.push_generate(Ok(
        r#"{"is_deductible": false, "category": "None", "reasoning": "Groceries."}"#.to_string(),
    ));
    let t = pipeline_over_sqlite(mock, &[("insurance.md", INSURANCE_DOC)]);

    for _ in 0..3 {
        t.pipeline.run(receipt_run()).await;
    }

    let all = t
        .db
        .list_transactions("somchai", None)
        .expect("Failed to list transactions");
    assert_eq!(all.len(), 3);

    for (status, expected) in [
        (TransactionStatus::Verified, 1),
        (TransactionStatus::NeedsReview, 1),
        (TransactionStatus::NotDeductible, 1),
        (TransactionStatus::Rejected, 0),
    ] {
        let filtered = t
            .db
            .list_transactions("somchai", Some(status))
            .expect("Failed to filter transactions");
        assert_eq!(filtered.len(), expected, "{status} count");
    }
}

// =============================================================================
// Question Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_question_answer_over_ingested_knowledge() {
    let mock = MockReasoner::new();
    mock.push_generate(Ok(
        "You can deduct social security contributions up to 9,000 THB per year.".to_string(),
    ));
    let t = pipeline_over_sqlite(
        mock,
        &[(
            "social.md",
            "Social security contributions up to 9,000 THB per year are deductible from \
             personal income tax.",
        )],
    );

    let state = t
        .pipeline
        .run(PipelineRequest {
            user_id: "somchai".to_string(),
            question: "How much social security can I deduct?".to_string(),
            image: None,
        })
        .await;

    assert_eq!(state.status, RunStatus::Completed);
    assert!(state.reply.contains("9,000"));
    assert!(state.receipt.is_none());
    assert!(state.outcome.is_none());
    assert!(t
        .db
        .list_transactions("somchai", None)
        .expect("Failed to list transactions")
        .is_empty());
}
