use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 2;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version: u32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> {
    let mut migrations: HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> =
        HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: core schema plus the default two-stage repair flow
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute("PRAGMA foreign_keys=ON", [])?;

    // Stage configuration. Survives session resets.
    tx.execute(
        "CREATE TABLE stages (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            measure_enabled INTEGER NOT NULL DEFAULT 0,
            measure_label TEXT NOT NULL DEFAULT '',
            measure_standard TEXT NOT NULL DEFAULT '',
            label_valid TEXT NOT NULL DEFAULT 'PASS',
            label_defect TEXT NOT NULL DEFAULT 'NG',
            label_error TEXT NOT NULL DEFAULT 'PROCESS ERROR'
        )",
        [],
    )?;

    // Exactly 8 slot rows per stage, slot 0..7
    tx.execute(
        "CREATE TABLE stage_fields (
            stage_id INTEGER NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
            slot INTEGER NOT NULL CHECK(slot BETWEEN 0 AND 7),
            label TEXT NOT NULL DEFAULT '',
            default_value TEXT NOT NULL DEFAULT '',
            whitelist TEXT NOT NULL DEFAULT '',
            min_value TEXT NOT NULL DEFAULT '',
            max_value TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (stage_id, slot)
        )",
        [],
    )?;

    // Append-only scan history
    tx.execute(
        "CREATE TABLE scans (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            seq INTEGER NOT NULL,
            code TEXT NOT NULL,
            model_name TEXT NOT NULL DEFAULT '',
            employee_id TEXT NOT NULL DEFAULT '',
            stage_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('valid','defect','error')),
            note TEXT NOT NULL DEFAULT '',
            measurement TEXT NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute("CREATE INDEX idx_scans_stage ON scans(stage_id)", [])?;
    tx.execute("CREATE INDEX idx_scans_code ON scans(code)", [])?;

    // Sparse auxiliary values, positionally aligned with stage_fields
    tx.execute(
        "CREATE TABLE scan_values (
            scan_id INTEGER NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
            slot INTEGER NOT NULL CHECK(slot BETWEEN 0 AND 7),
            value TEXT NOT NULL,
            PRIMARY KEY (scan_id, slot)
        )",
        [],
    )?;

    // Highest completed stage per unit code
    tx.execute(
        "CREATE TABLE progress (
            code TEXT PRIMARY KEY,
            stage INTEGER NOT NULL
        )",
        [],
    )?;

    // Per-stage employee bindings. Survive session resets.
    tx.execute(
        "CREATE TABLE bindings (
            stage_id INTEGER PRIMARY KEY,
            employee_id TEXT NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    seed_default_stages(tx)?;

    Ok(())
}

/// Migration v2: selectable model/lot names
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE models (
            name TEXT PRIMARY KEY
        )",
        [],
    )?;
    Ok(())
}

/// Seed the default repair flow: intake, then measured repair output.
fn seed_default_stages(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO stages (id, name, measure_enabled, measure_label, measure_standard,
                             label_valid, label_defect, label_error)
         VALUES (1, 'Intake', 0, '', '', 'REPAIRED', 'RETURNED', 'PROCESS ERROR')",
        [],
    )?;
    tx.execute(
        "INSERT INTO stages (id, name, measure_enabled, measure_label, measure_standard,
                             label_valid, label_defect, label_error)
         VALUES (2, 'Repair output', 1, 'Repair result', 'OK',
                 'PASS', 'FAILED AGAIN', 'PROCESS ERROR')",
        [],
    )?;

    let stage1_labels = ["Reported defect", "", "", "", "", "", "", ""];
    let stage2_labels = [
        "Defect cause 1",
        "Defect cause 2",
        "Defect cause 3",
        "Replaced part",
        "",
        "",
        "",
        "",
    ];
    for (stage_id, labels) in [(1, &stage1_labels), (2, &stage2_labels)] {
        for (slot, label) in labels.iter().enumerate() {
            tx.execute(
                "INSERT INTO stage_fields (stage_id, slot, label) VALUES (?1, ?2, ?3)",
                rusqlite::params![stage_id, slot as i64, label],
            )?;
        }
    }

    tx.execute(
        "INSERT INTO settings (key, value) VALUES ('active_stage', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_initialize_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        assert_eq!(MigrationManager::get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        MigrationManager::initialize(&conn).unwrap();
        assert_eq!(MigrationManager::get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_default_stages_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM stages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        // Every stage carries exactly 8 slot rows
        let slots: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM stage_fields WHERE stage_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(slots, 8);
    }
}
