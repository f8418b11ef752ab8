use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::StationState;

/// Station cursor repository: active stage, per-stage employee
/// bindings, selected model and the available model list.
/// Everything here survives a session reset.
pub struct StationRepo;

impl StationRepo {
    /// Load the full station state for evaluation.
    pub fn load_state(conn: &Connection) -> Result<StationState> {
        let mut state = StationState {
            active_stage: Self::get_setting(conn, "active_stage")?
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            current_model: Self::get_setting(conn, "current_model")?.unwrap_or_default(),
            ..Default::default()
        };

        let mut stmt = conn.prepare("SELECT stage_id, employee_id FROM bindings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)? as u32, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (stage, employee) = row?;
            state.bindings.insert(stage, employee);
        }

        Ok(state)
    }

    pub fn set_active_stage(conn: &Connection, stage: u32) -> Result<()> {
        Self::put_setting(conn, "active_stage", &stage.to_string())
    }

    /// Bind an employee to a stage. Retained until explicitly changed.
    pub fn bind_employee(conn: &Connection, stage: u32, employee: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO bindings (stage_id, employee_id) VALUES (?1, ?2)
             ON CONFLICT(stage_id) DO UPDATE SET employee_id = excluded.employee_id",
            rusqlite::params![stage, employee],
        )
        .with_context(|| format!("Failed to bind employee for stage {}", stage))?;
        Ok(())
    }

    pub fn list_models(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM models ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut models = Vec::new();
        for row in rows {
            models.push(row?);
        }
        Ok(models)
    }

    pub fn add_model(conn: &Connection, name: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO models (name) VALUES (?1)",
            [name],
        )?;
        Ok(())
    }

    pub fn remove_model(conn: &Connection, name: &str) -> Result<bool> {
        let removed = conn.execute("DELETE FROM models WHERE name = ?1", [name])?;
        // Deselect if the removed model was current
        if removed > 0 && Self::get_setting(conn, "current_model")?.as_deref() == Some(name) {
            conn.execute("DELETE FROM settings WHERE key = 'current_model'", [])?;
        }
        Ok(removed > 0)
    }

    pub fn set_current_model(conn: &Connection, name: &str) -> Result<()> {
        Self::put_setting(conn, "current_model", name)
    }

    fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )
        .with_context(|| format!("Failed to store setting '{}'", key))?;
        Ok(())
    }
}
