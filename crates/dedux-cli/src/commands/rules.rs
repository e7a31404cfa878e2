//! Deduction rule command implementations

use anyhow::Result;
use dedux_core::Database;

pub fn cmd_rules_list(db: &Database, tax_year: Option<i32>) -> Result<()> {
    let rules = db.list_rules(tax_year)?;

    if rules.is_empty() {
        println!("No deduction rules found. Seed the defaults with:");
        println!("  dedux init");
        return Ok(());
    }

    println!();
    println!("📋 Deduction Rules");
    println!("   ─────────────────────────────────────────────────────────────");

    for rule in rules {
        let cap = if rule.max_limit > 0.0 {
            format!("cap {:>12.2} THB", rule.max_limit)
        } else {
            "no fixed cap    ".to_string()
        };
        let active = if rule.is_active { "" } else { " (inactive)" };

        println!(
            "   [{}] {} │ {} │ {}{}",
            rule.id, rule.tax_year, cap, rule.category_name, active
        );
    }

    Ok(())
}
