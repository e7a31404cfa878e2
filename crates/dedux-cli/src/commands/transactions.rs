//! Transaction command implementations

use anyhow::Result;
use dedux_core::{Database, TransactionStatus, DEFAULT_USER_ID};

use super::truncate;

pub fn cmd_transactions_list(db: &Database, status: Option<&str>) -> Result<()> {
    let status = status
        .map(|s| s.parse::<TransactionStatus>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let transactions = db.list_transactions(DEFAULT_USER_ID, status)?;

    if transactions.is_empty() {
        println!("No transactions found. Process a receipt with:");
        println!("  dedux process receipt.jpg");
        return Ok(());
    }

    println!();
    println!("📝 Recorded Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let status_str = color_status(tx.status);
        println!(
            "   [{}] {} │ {:>10.2} THB │ deduct {:>10.2} │ {} │ {}",
            tx.id,
            tx.transaction_date,
            tx.total_amount,
            tx.deductible_amount,
            status_str,
            truncate(&tx.merchant_name, 28)
        );
    }

    println!();
    println!("   Use 'dedux transactions show <id>' for full details.");

    Ok(())
}

pub fn cmd_transactions_show(db: &Database, id: i64) -> Result<()> {
    let tx = db
        .get_transaction(id)?
        .ok_or_else(|| anyhow::anyhow!("Transaction {} not found", id))?;

    println!();
    println!("🧾 Transaction {}", tx.id);
    println!("   ─────────────────────────────");
    println!("   User: {}", tx.user_id);
    println!("   Merchant: {}", tx.merchant_name);
    if !tx.merchant_tax_id.is_empty() {
        println!("   Tax ID: {}", tx.merchant_tax_id);
    }
    println!("   Date: {}", tx.transaction_date);
    println!("   Total: {:.2} THB", tx.total_amount);
    println!("   Deductible: {:.2} THB", tx.deductible_amount);
    println!("   Status: {}", tx.status);

    if let Some(rule_id) = tx.rule_id {
        if let Some(rule) = db.get_rule(rule_id)? {
            println!(
                "   Rule: {} (tax year {})",
                rule.category_name, rule.tax_year
            );
        }
    }
    if let Some(image) = &tx.receipt_image {
        println!("   Receipt image: {}", image);
    }
    if let Some(reasoning) = &tx.ai_reasoning {
        println!("   Reasoning: {}", reasoning);
    }
    println!("   Recorded: {}", tx.created_at.format("%Y-%m-%d %H:%M UTC"));

    Ok(())
}

pub fn cmd_transactions_delete(db: &Database, id: i64) -> Result<()> {
    let tx = db
        .get_transaction(id)?
        .ok_or_else(|| anyhow::anyhow!("Transaction {} not found", id))?;

    db.delete_transaction(id)?;

    println!("✅ Deleted transaction {}:", id);
    println!(
        "   {} │ {:.2} THB │ {}",
        tx.transaction_date,
        tx.total_amount,
        truncate(&tx.merchant_name, 40)
    );

    Ok(())
}

/// Pad the status to column width, then colorize it
fn color_status(status: TransactionStatus) -> String {
    let padded = format!("{:<14}", status.as_str());
    match status {
        TransactionStatus::Verified => format!("\x1b[32m{}\x1b[0m", padded), // Green
        TransactionStatus::NeedsReview => format!("\x1b[33m{}\x1b[0m", padded), // Yellow
        TransactionStatus::NotDeductible | TransactionStatus::Rejected => {
            format!("\x1b[90m{}\x1b[0m", padded) // Dim
        }
    }
}
