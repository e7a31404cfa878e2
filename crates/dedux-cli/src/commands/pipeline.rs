//! Receipt processing and tax Q&A commands

use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use dedux_core::{
    Advisor, Classifier, Database, ImageStore, KnowledgeClient, Pipeline, PipelineRequest,
    PipelineState, PromptLibrary, RecordOutcome, Retriever, RunStatus, Settings,
    SqliteKnowledgeBase, TransactionRecorder, DEFAULT_USER_ID,
};

use super::require_reasoner;

/// Wire a pipeline over the database the same way the web server does
fn build_pipeline(db: &Database, settings: &Settings, model: Option<&str>) -> Result<Pipeline> {
    let mut reasoner = require_reasoner()?;
    if let Some(model) = model {
        reasoner = reasoner.with_model(model);
    }
    let prompts = Arc::new(RwLock::new(PromptLibrary::new()));
    let retriever = Retriever::new(KnowledgeClient::store(SqliteKnowledgeBase::new(db.clone())));
    let classifier = Classifier::new(reasoner.clone(), prompts.clone(), settings.tax_year);
    let recorder = TransactionRecorder::new(db.clone(), settings.tax_year);
    let advisor = Advisor::new(reasoner.clone(), retriever.clone(), prompts);
    let images = ImageStore::new(settings.images_dir())?;

    Ok(Pipeline::new(
        reasoner,
        retriever,
        classifier,
        recorder,
        advisor,
        Some(images),
    ))
}

pub async fn cmd_process(
    db: &Database,
    settings: &Settings,
    image_path: &Path,
    json: bool,
    model: Option<&str>,
) -> Result<()> {
    let image = std::fs::read(image_path)
        .with_context(|| format!("Failed to read {}", image_path.display()))?;

    if !json {
        println!("🧾 Processing {}...", image_path.display());
    }

    let pipeline = build_pipeline(db, settings, model)?;
    let state = pipeline
        .run(PipelineRequest {
            user_id: DEFAULT_USER_ID.to_string(),
            question: String::new(),
            image: Some(image),
        })
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_run(&state);
    }

    Ok(())
}

pub async fn cmd_ask(
    db: &Database,
    settings: &Settings,
    question: &str,
    model: Option<&str>,
) -> Result<()> {
    let pipeline = build_pipeline(db, settings, model)?;
    let state = pipeline
        .run(PipelineRequest {
            user_id: DEFAULT_USER_ID.to_string(),
            question: question.to_string(),
            image: None,
        })
        .await;

    println!();
    println!("{}", state.reply);

    Ok(())
}

/// Print the terminal pipeline state of a receipt run
fn print_run(state: &PipelineState) {
    println!();

    if let Some(receipt) = &state.receipt {
        println!("   Merchant: {}", receipt.merchant_or_default());
        if let Some(date) = receipt.date {
            println!("   Date: {}", date);
        }
        if let Some(amount) = receipt.amount {
            println!("   Amount: {:.2} THB", amount);
        }
        if let Some(tax_id) = &receipt.tax_id {
            println!("   Tax ID: {}", tax_id);
        }
    }

    if let Some(classification) = &state.classification {
        println!("   Category: {}", classification.category);
    }

    match &state.outcome {
        Some(RecordOutcome::Saved(saved)) => {
            let tx = &saved.transaction;
            let capped = if saved.is_capped { " (capped)" } else { "" };
            println!("   Deductible: {:.2} THB{}", tx.deductible_amount, capped);
            println!("   Status: {}", tx.status);
            println!("   Transaction ID: {}", tx.id);
        }
        Some(RecordOutcome::Failed { error }) => {
            println!("   ❌ Not recorded: {}", error);
        }
        None => {}
    }

    println!();
    match state.status {
        RunStatus::Completed => println!("{}", state.reply),
        RunStatus::AwaitingUserInput => println!("⚠️  {}", state.reply),
    }
}
