use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{FieldRule, Measurement, StageConfig, StatusLabels, FIELD_SLOTS};

/// Stage configuration repository
pub struct StageRepo;

impl StageRepo {
    /// List all stages ordered by id, each with its 8 field slots.
    pub fn list_all(conn: &Connection) -> Result<Vec<StageConfig>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, measure_enabled, measure_label, measure_standard,
                    label_valid, label_defect, label_error
             FROM stages ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StageConfig {
                id: row.get(0)?,
                name: row.get(1)?,
                measurement: Measurement {
                    enabled: row.get::<_, i64>(2)? != 0,
                    label: row.get(3)?,
                    standard: row.get(4)?,
                },
                fields: Default::default(),
                status_labels: StatusLabels {
                    valid: row.get(5)?,
                    defect: row.get(6)?,
                    error: row.get(7)?,
                },
            })
        })?;

        let mut stages = Vec::new();
        for row in rows {
            let mut stage = row?;
            stage.fields = Self::load_fields(conn, stage.id)?;
            stages.push(stage);
        }
        Ok(stages)
    }

    /// Get one stage by id.
    pub fn get(conn: &Connection, id: u32) -> Result<Option<StageConfig>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, measure_enabled, measure_label, measure_standard,
                    label_valid, label_defect, label_error
             FROM stages WHERE id = ?1",
        )?;

        let stage = stmt
            .query_row([id], |row| {
                Ok(StageConfig {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    measurement: Measurement {
                        enabled: row.get::<_, i64>(2)? != 0,
                        label: row.get(3)?,
                        standard: row.get(4)?,
                    },
                    fields: Default::default(),
                    status_labels: StatusLabels {
                        valid: row.get(5)?,
                        defect: row.get(6)?,
                        error: row.get(7)?,
                    },
                })
            })
            .optional()?;

        match stage {
            Some(mut stage) => {
                stage.fields = Self::load_fields(conn, stage.id)?;
                Ok(Some(stage))
            }
            None => Ok(None),
        }
    }

    /// Load a stage's field slots, normalized to exactly 8 entries.
    /// Missing slot rows come back as disabled slots, so the engine
    /// always sees a full array.
    fn load_fields(conn: &Connection, stage_id: u32) -> Result<[FieldRule; FIELD_SLOTS]> {
        let mut stmt = conn.prepare(
            "SELECT slot, label, default_value, whitelist, min_value, max_value
             FROM stage_fields WHERE stage_id = ?1 ORDER BY slot",
        )?;

        let mut fields: [FieldRule; FIELD_SLOTS] = Default::default();
        let rows = stmt.query_map([stage_id], |row| {
            Ok((
                row.get::<_, i64>(0)? as usize,
                FieldRule {
                    label: row.get(1)?,
                    default: row.get(2)?,
                    whitelist: row.get(3)?,
                    min: row.get(4)?,
                    max: row.get(5)?,
                },
            ))
        })?;
        for row in rows {
            let (slot, rule) = row?;
            if slot < FIELD_SLOTS {
                fields[slot] = rule;
            }
        }
        Ok(fields)
    }

    /// Insert or update a stage and all 8 of its field slots.
    pub fn save(conn: &Connection, stage: &StageConfig) -> Result<()> {
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO stages (id, name, measure_enabled, measure_label, measure_standard,
                                 label_valid, label_defect, label_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 measure_enabled = excluded.measure_enabled,
                 measure_label = excluded.measure_label,
                 measure_standard = excluded.measure_standard,
                 label_valid = excluded.label_valid,
                 label_defect = excluded.label_defect,
                 label_error = excluded.label_error",
            rusqlite::params![
                stage.id,
                stage.name,
                stage.measurement.enabled as i64,
                stage.measurement.label,
                stage.measurement.standard,
                stage.status_labels.valid,
                stage.status_labels.defect,
                stage.status_labels.error,
            ],
        )
        .with_context(|| format!("Failed to save stage {}", stage.id))?;

        tx.execute(
            "DELETE FROM stage_fields WHERE stage_id = ?1",
            [stage.id],
        )?;
        for (slot, rule) in stage.fields.iter().enumerate() {
            tx.execute(
                "INSERT INTO stage_fields
                     (stage_id, slot, label, default_value, whitelist, min_value, max_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    stage.id,
                    slot as i64,
                    rule.label,
                    rule.default,
                    rule.whitelist,
                    rule.min,
                    rule.max,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Next free stage id (stages are ordered by numeric id).
    pub fn next_id(conn: &Connection) -> Result<u32> {
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(id), 0) FROM stages",
            [],
            |row| row.get(0),
        )?;
        Ok(max as u32 + 1)
    }
}
