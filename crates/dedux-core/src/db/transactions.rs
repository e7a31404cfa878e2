//! Recorded transaction operations

use rusqlite::{params, OptionalExtension, ToSql};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction, TransactionStatus, TransactionUpdate};

impl Database {
    /// Insert a transaction and return the stored row
    ///
    /// Reads the row back after insert; the insert succeeding but the row
    /// not being readable is reported as a persistence error rather than
    /// a panic or a silent None.
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, rule_id, receipt_image, merchant_name,
                                      merchant_tax_id, transaction_date, total_amount,
                                      deductible_amount, status, ai_reasoning)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.rule_id,
                tx.receipt_image,
                tx.merchant_name,
                tx.merchant_tax_id,
                tx.transaction_date.to_string(),
                tx.total_amount,
                tx.deductible_amount,
                tx.status.as_str(),
                tx.ai_reasoning,
            ],
        )?;

        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_transaction(id)?.ok_or_else(|| {
            Error::Persistence(format!("No data returned after inserting transaction {}", id))
        })
    }

    /// Get a single transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, rule_id, receipt_image, merchant_name, merchant_tax_id,
                    transaction_date, total_amount, deductible_amount, status, ai_reasoning,
                    created_at
             FROM transactions WHERE id = ?",
        )?;

        let transaction = stmt
            .query_row(params![id], |row| Self::row_to_transaction(row))
            .optional()?;

        Ok(transaction)
    }

    /// List a user's transactions, newest first, optionally filtered by status
    pub fn list_transactions(
        &self,
        user_id: &str,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut transactions = Vec::new();

        match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, rule_id, receipt_image, merchant_name, merchant_tax_id,
                            transaction_date, total_amount, deductible_amount, status, ai_reasoning,
                            created_at
                     FROM transactions WHERE user_id = ? AND status = ?
                     ORDER BY transaction_date DESC, id DESC",
                )?;
                let rows = stmt.query_map(params![user_id, status.as_str()], |row| {
                    Self::row_to_transaction(row)
                })?;
                for row in rows {
                    transactions.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, rule_id, receipt_image, merchant_name, merchant_tax_id,
                            transaction_date, total_amount, deductible_amount, status, ai_reasoning,
                            created_at
                     FROM transactions WHERE user_id = ?
                     ORDER BY transaction_date DESC, id DESC",
                )?;
                let rows =
                    stmt.query_map(params![user_id], |row| Self::row_to_transaction(row))?;
                for row in rows {
                    transactions.push(row?);
                }
            }
        }

        Ok(transactions)
    }

    /// Apply a partial update and return the stored row
    ///
    /// `deductible_amount` is set only when the caller passes a recomputed
    /// value; the update path in the recorder decides that, this method
    /// just writes. Unknown ids are a NotFound error.
    pub fn update_transaction_fields(
        &self,
        id: i64,
        updates: &TransactionUpdate,
        deductible_amount: Option<f64>,
    ) -> Result<Transaction> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref merchant_name) = updates.merchant_name {
            sets.push("merchant_name = ?");
            values.push(Box::new(merchant_name.clone()));
        }
        if let Some(ref merchant_tax_id) = updates.merchant_tax_id {
            sets.push("merchant_tax_id = ?");
            values.push(Box::new(merchant_tax_id.clone()));
        }
        if let Some(date) = updates.transaction_date {
            sets.push("transaction_date = ?");
            values.push(Box::new(date.to_string()));
        }
        if let Some(total_amount) = updates.total_amount {
            sets.push("total_amount = ?");
            values.push(Box::new(total_amount));
        }
        if let Some(status) = updates.status {
            sets.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(deductible) = deductible_amount {
            sets.push("deductible_amount = ?");
            values.push(Box::new(deductible));
        }

        if !sets.is_empty() {
            let sql = format!("UPDATE transactions SET {} WHERE id = ?", sets.join(", "));
            values.push(Box::new(id));

            let conn = self.conn()?;
            let params_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let changed = conn.execute(&sql, params_refs.as_slice())?;
            if changed == 0 {
                return Err(Error::NotFound(format!("Transaction {} not found", id)));
            }
        }

        self.get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {} not found", id)))
    }

    /// Delete a transaction, returning whether a row was removed
    pub fn delete_transaction(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        Ok(changed > 0)
    }

    /// Count all transactions
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Helper to convert a row to Transaction
    /// Column order: id, user_id, rule_id, receipt_image, merchant_name, merchant_tax_id,
    ///               transaction_date, total_amount, deductible_amount, status, ai_reasoning,
    ///               created_at
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(6)?;
        let status_str: String = row.get(9)?;
        let created_at_str: String = row.get(11)?;
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            rule_id: row.get(2)?,
            receipt_image: row.get(3)?,
            merchant_name: row.get(4)?,
            merchant_tax_id: row.get(5)?,
            transaction_date: chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .unwrap_or_default(),
            total_amount: row.get(7)?,
            deductible_amount: row.get(8)?,
            status: status_str.parse().unwrap_or_default(),
            ai_reasoning: row.get(10)?,
            created_at: super::parse_datetime(&created_at_str),
        })
    }
}
