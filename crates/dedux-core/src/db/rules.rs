//! Deduction rule operations

use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::DeductionRule;
use crate::rules::CATEGORY_CAPS;

impl Database {
    /// Insert a deduction rule, returning its id
    pub fn insert_rule(&self, category_name: &str, max_limit: f64, tax_year: i32) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tax_rules (category_name, max_limit, tax_year) VALUES (?, ?, ?)",
            params![category_name, max_limit, tax_year],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a rule by id
    pub fn get_rule(&self, id: i64) -> Result<Option<DeductionRule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, category_name, max_limit, tax_year, is_active, created_at
             FROM tax_rules WHERE id = ?",
        )?;
        let rule = stmt
            .query_row(params![id], |row| Self::row_to_rule(row))
            .optional()?;
        Ok(rule)
    }

    /// List rules, optionally scoped to one tax year
    pub fn list_rules(&self, tax_year: Option<i32>) -> Result<Vec<DeductionRule>> {
        let conn = self.conn()?;
        let mut rules = Vec::new();

        match tax_year {
            Some(year) => {
                let mut stmt = conn.prepare(
                    "SELECT id, category_name, max_limit, tax_year, is_active, created_at
                     FROM tax_rules WHERE tax_year = ? ORDER BY category_name",
                )?;
                let rows = stmt.query_map(params![year], |row| Self::row_to_rule(row))?;
                for row in rows {
                    rules.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, category_name, max_limit, tax_year, is_active, created_at
                     FROM tax_rules ORDER BY tax_year DESC, category_name",
                )?;
                let rows = stmt.query_map([], |row| Self::row_to_rule(row))?;
                for row in rows {
                    rules.push(row?);
                }
            }
        }

        Ok(rules)
    }

    /// Look up the active rule for a category and tax year
    ///
    /// Falls back to an active rule for the same category in any year when
    /// the exact year has none, so a stale rule still routes the receipt to
    /// review rather than dropping it.
    pub fn lookup_rule(&self, category_name: &str, tax_year: i32) -> Result<Option<DeductionRule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, category_name, max_limit, tax_year, is_active, created_at
             FROM tax_rules
             WHERE category_name = ? AND tax_year = ? AND is_active = 1
             ORDER BY id LIMIT 1",
        )?;
        let exact = stmt
            .query_row(params![category_name, tax_year], |row| Self::row_to_rule(row))
            .optional()?;

        if exact.is_some() {
            return Ok(exact);
        }

        let mut stmt = conn.prepare(
            "SELECT id, category_name, max_limit, tax_year, is_active, created_at
             FROM tax_rules
             WHERE category_name = ? AND is_active = 1
             ORDER BY tax_year DESC, id LIMIT 1",
        )?;
        let fallback = stmt
            .query_row(params![category_name], |row| Self::row_to_rule(row))
            .optional()?;

        if let Some(ref rule) = fallback {
            warn!(
                category = category_name,
                requested_year = tax_year,
                rule_year = rule.tax_year,
                "No rule for requested tax year, using fallback year"
            );
        }

        Ok(fallback)
    }

    /// Seed the default category rules for a tax year
    ///
    /// Skips categories that already have a rule for that year, so re-running
    /// init is safe. Returns the number of rules inserted.
    pub fn seed_default_rules(&self, tax_year: i32) -> Result<usize> {
        let conn = self.conn()?;
        let mut inserted = 0;

        for (category_name, max_limit) in CATEGORY_CAPS {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM tax_rules WHERE category_name = ? AND tax_year = ?",
                    params![category_name, tax_year],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_none() {
                conn.execute(
                    "INSERT INTO tax_rules (category_name, max_limit, tax_year) VALUES (?, ?, ?)",
                    params![category_name, max_limit, tax_year],
                )?;
                inserted += 1;
            }
        }

        if inserted > 0 {
            info!(tax_year, inserted, "Seeded default deduction rules");
        }
        Ok(inserted)
    }

    /// Deactivate a rule (kept for history; lookups skip it)
    pub fn deactivate_rule(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("UPDATE tax_rules SET is_active = 0 WHERE id = ?", params![id])?;
        Ok(changed > 0)
    }

    /// Helper to convert a row to DeductionRule
    /// Column order: id, category_name, max_limit, tax_year, is_active, created_at
    pub(crate) fn row_to_rule(row: &rusqlite::Row) -> rusqlite::Result<DeductionRule> {
        let is_active_int: i64 = row.get(4)?;
        let created_at_str: String = row.get(5)?;
        Ok(DeductionRule {
            id: row.get(0)?,
            category_name: row.get(1)?,
            max_limit: row.get(2)?,
            tax_year: row.get(3)?,
            is_active: is_active_int != 0,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
