// Output formatting for the station terminal

use chrono::{Local, TimeZone};
use std::collections::HashMap;

use crate::models::{ScanRecord, StageConfig};

/// Detect terminal width with a sensible fallback for pipes.
fn terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        return w as usize;
    }
    100
}

/// Truncate a cell value to `max` characters with an ellipsis.
fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let cut: String = value.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

/// Local wall-clock rendering of a record timestamp.
pub fn format_ts(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => ts.to_string(),
    }
}

/// Render the measurement and auxiliary values of a record using the
/// labels of the stage the record was scanned at - not the currently
/// active stage.
pub fn details_cell(record: &ScanRecord, stage: Option<&StageConfig>) -> String {
    let mut parts = Vec::new();

    if let Some(measured) = &record.measurement {
        if !measured.is_empty() {
            let label = stage
                .filter(|s| !s.measurement.label.trim().is_empty())
                .map(|s| s.measurement.label.trim().to_string())
                .unwrap_or_else(|| "measured".to_string());
            parts.push(format!("{}: {}", label, measured));
        }
    }

    if let Some(values) = &record.aux_values {
        for (slot, value) in values.iter().enumerate() {
            if value.trim().is_empty() {
                continue;
            }
            match stage.and_then(|s| s.fields.get(slot)).filter(|f| f.is_active()) {
                Some(rule) => parts.push(format!("{}: {}", rule.label.trim(), value)),
                None => parts.push(value.clone()),
            }
        }
    }

    parts.join("; ")
}

/// Print the scan history table, newest first.
pub fn print_history(records: &[ScanRecord], stages: &[StageConfig]) {
    if records.is_empty() {
        println!("No scans recorded.");
        return;
    }

    let by_id: HashMap<u32, &StageConfig> = stages.iter().map(|s| (s.id, s)).collect();
    let details_width = terminal_width().saturating_sub(78).max(20);

    println!(
        "{:>5}  {:<19}  {:<16}  {:<16}  {:<10}  {:<14}  {}",
        "Seq", "Time", "Stage", "Code", "Employee", "Status", "Details"
    );
    for record in records {
        let stage = by_id.get(&record.stage_id).copied();
        let stage_name = stage
            .map(|s| s.name.as_str())
            .unwrap_or("(removed stage)");
        let status = match stage {
            Some(s) => s.status_label(record.status).to_string(),
            None => record.status.as_str().to_string(),
        };
        let details = if record.status == crate::models::ScanStatus::Valid {
            details_cell(record, stage)
        } else {
            record.note.clone()
        };
        println!(
            "{:>5}  {:<19}  {:<16}  {:<16}  {:<10}  {:<14}  {}",
            record.seq,
            format_ts(record.created_ts),
            truncate(stage_name, 16),
            truncate(&record.code, 16),
            truncate(&record.employee_id, 10),
            truncate(&status, 14),
            truncate(&details, details_width),
        );
    }
}

/// Print one stage's configuration.
pub fn print_stage(stage: &StageConfig, active: bool) {
    let marker = if active { " (active)" } else { "" };
    println!("Stage {}: {}{}", stage.id, stage.name, marker);
    if stage.measurement.enabled {
        let label = if stage.measurement.label.trim().is_empty() {
            "measurement"
        } else {
            stage.measurement.label.trim()
        };
        if stage.measurement.standard.trim().is_empty() {
            println!("  Measurement: {} (no standard)", label);
        } else {
            println!(
                "  Measurement: {} (standard: {})",
                label,
                stage.measurement.standard.trim()
            );
        }
    } else {
        println!("  Measurement: disabled");
    }
    println!(
        "  Status labels: {} / {} / {}",
        stage.status_labels.valid, stage.status_labels.defect, stage.status_labels.error
    );
    for (slot, rule) in stage.active_slots() {
        let mut extras = Vec::new();
        if !rule.default.is_empty() {
            extras.push(format!("default: {}", rule.default));
        }
        if !rule.whitelist.trim().is_empty() {
            extras.push(format!("whitelist: {}", rule.whitelist.trim()));
        }
        if !rule.min.trim().is_empty() {
            extras.push(format!("min: {}", rule.min.trim()));
        }
        if !rule.max.trim().is_empty() {
            extras.push(format!("max: {}", rule.max.trim()));
        }
        if extras.is_empty() {
            println!("  Field {}: {}", slot + 1, rule.label.trim());
        } else {
            println!(
                "  Field {}: {} ({})",
                slot + 1,
                rule.label.trim(),
                extras.join(", ")
            );
        }
    }
}

/// Print the per-stage counters, with the waiting queue for stages > 1.
pub fn print_stats(
    stage: &StageConfig,
    counts: (i64, i64, i64),
    pending: Option<usize>,
) {
    let (valid, defect, error) = counts;
    println!("Stage {}: {}", stage.id, stage.name);
    println!("  {:<20} {}", stage.status_labels.valid, valid);
    println!("  {:<20} {}", stage.status_labels.defect, defect);
    println!("  {:<20} {}", stage.status_labels.error, error);
    if let Some(pending) = pending {
        println!("  {:<20} {}", "Waiting", pending);
    }
}
