use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::models::ProgressLedger;

/// Progress ledger repository: highest completed stage per unit code.
pub struct LedgerRepo;

impl LedgerRepo {
    /// Load the whole ledger into memory for evaluation.
    pub fn load(conn: &Connection) -> Result<ProgressLedger> {
        let mut stmt = conn.prepare("SELECT code, stage FROM progress")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
        })?;

        let mut ledger = ProgressLedger::new();
        for row in rows {
            let (code, stage) = row?;
            ledger.insert(code, stage);
        }
        Ok(ledger)
    }

    /// Record a completed stage for a code. Never lowers an entry.
    pub fn record(conn: &Connection, code: &str, stage: u32) -> Result<()> {
        conn.execute(
            "INSERT INTO progress (code, stage) VALUES (?1, ?2)
             ON CONFLICT(code) DO UPDATE SET stage = MAX(stage, excluded.stage)",
            rusqlite::params![code, stage],
        )
        .with_context(|| format!("Failed to record progress for '{}'", code))?;
        Ok(())
    }

    /// Clear scan history and progress in one transaction.
    /// Stage configuration, employee bindings, models and settings all
    /// survive: rules persist, data does not.
    pub fn reset_session(conn: &Connection) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM scan_values", [])?;
        tx.execute("DELETE FROM scans", [])?;
        tx.execute("DELETE FROM progress", [])?;
        tx.commit().context("Failed to reset session data")?;
        log::info!("session data cleared");
        Ok(())
    }
}
