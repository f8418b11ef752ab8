use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::models::{ScanRecord, ScanStatus, FIELD_SLOTS};

/// Scan history repository. Append-only: records are never updated or
/// deleted individually, only cleared wholesale by a session reset.
pub struct ScanRepo;

impl ScanRepo {
    /// Number of records in history (also the next seq - 1).
    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Append one record. The caller assigns seq; non-empty auxiliary
    /// values are stored sparsely by slot.
    ///
    /// Runs inside whatever transactional scope the caller provides:
    /// the scan command wraps this and the progress upsert in one
    /// transaction so history and ledger never diverge.
    pub fn append(conn: &Connection, record: &ScanRecord) -> Result<i64> {
        conn.execute(
            "INSERT INTO scans (uuid, seq, code, model_name, employee_id, stage_id,
                                status, note, measurement, created_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                record.uuid,
                record.seq,
                record.code,
                record.model_name,
                record.employee_id,
                record.stage_id,
                record.status.as_str(),
                record.note,
                record.measurement,
                record.created_ts,
            ],
        )
        .context("Failed to append scan record")?;
        let scan_id = conn.last_insert_rowid();

        if let Some(values) = &record.aux_values {
            for (slot, value) in values.iter().enumerate() {
                if value.trim().is_empty() {
                    continue;
                }
                conn.execute(
                    "INSERT INTO scan_values (scan_id, slot, value) VALUES (?1, ?2, ?3)",
                    rusqlite::params![scan_id, slot as i64, value],
                )?;
            }
        }

        Ok(scan_id)
    }

    /// List records newest first, optionally filtered by stage and
    /// capped at `limit`.
    pub fn list(
        conn: &Connection,
        stage: Option<u32>,
        limit: Option<usize>,
    ) -> Result<Vec<ScanRecord>> {
        let mut sql = String::from(
            "SELECT id, uuid, seq, code, model_name, employee_id, stage_id,
                    status, note, measurement, created_ts
             FROM scans",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(stage) = stage {
            sql.push_str(" WHERE stage_id = ?1");
            params.push(Box::new(stage));
        }
        sql.push_str(" ORDER BY seq DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), Self::map_row)?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row?;
            record.aux_values = Self::load_values(conn, record.id.unwrap_or(0))?;
            records.push(record);
        }
        Ok(records)
    }

    /// All records oldest first, for export.
    pub fn list_for_export(conn: &Connection) -> Result<Vec<ScanRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, uuid, seq, code, model_name, employee_id, stage_id,
                    status, note, measurement, created_ts
             FROM scans ORDER BY seq",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row?;
            record.aux_values = Self::load_values(conn, record.id.unwrap_or(0))?;
            records.push(record);
        }
        Ok(records)
    }

    /// (valid, defect, error) counts for one stage.
    pub fn counts_for_stage(conn: &Connection, stage: u32) -> Result<(i64, i64, i64)> {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM scans WHERE stage_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map([stage], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let (mut valid, mut defect, mut error) = (0, 0, 0);
        for row in rows {
            let (status, count) = row?;
            match ScanStatus::from_str(&status) {
                Some(ScanStatus::Valid) => valid = count,
                Some(ScanStatus::Defect) => defect = count,
                Some(ScanStatus::Error) => error = count,
                None => {}
            }
        }
        Ok((valid, defect, error))
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanRecord> {
        let status_str: String = row.get(7)?;
        Ok(ScanRecord {
            id: row.get(0)?,
            uuid: row.get(1)?,
            seq: row.get(2)?,
            code: row.get(3)?,
            model_name: row.get(4)?,
            employee_id: row.get(5)?,
            stage_id: row.get(6)?,
            status: ScanStatus::from_str(&status_str).unwrap_or(ScanStatus::Error),
            note: row.get(8)?,
            measurement: row.get(9)?,
            aux_values: None,
            created_ts: row.get(10)?,
        })
    }

    fn load_values(
        conn: &Connection,
        scan_id: i64,
    ) -> Result<Option<[String; FIELD_SLOTS]>> {
        let mut stmt =
            conn.prepare("SELECT slot, value FROM scan_values WHERE scan_id = ?1")?;
        let rows = stmt.query_map([scan_id], |row| {
            Ok((row.get::<_, i64>(0)? as usize, row.get::<_, String>(1)?))
        })?;

        let mut values: [String; FIELD_SLOTS] = Default::default();
        let mut any = false;
        for row in rows {
            let (slot, value) = row?;
            if slot < FIELD_SLOTS {
                values[slot] = value;
                any = true;
            }
        }
        Ok(if any { Some(values) } else { None })
    }
}
