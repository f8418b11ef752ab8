// CSV report generation
//
// Columns are dynamic: each stage contributes its measurement label and
// active field labels, in stage order, deduplicated. A record only
// fills the columns that belong to its own stage's configuration - the
// join key is the record's stage, never the currently active one.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::cli::output::format_ts;
use crate::models::{ScanRecord, ScanStatus, StageConfig};

/// UTF-8 byte order mark so spreadsheet tools detect the encoding.
const BOM: &str = "\u{FEFF}";

/// Collect the dynamic column headers, stage by stage in id order:
/// measurement label first, then field slots 1..8, deduplicated.
pub fn dynamic_headers(stages: &[StageConfig]) -> Vec<String> {
    let mut headers = Vec::new();
    let mut seen = HashSet::new();

    for stage in stages {
        if stage.measurement.enabled {
            let label = stage.measurement.label.trim();
            if !label.is_empty() && seen.insert(label.to_string()) {
                headers.push(label.to_string());
            }
        }
        for (_, rule) in stage.active_slots() {
            let label = rule.label.trim();
            if seen.insert(label.to_string()) {
                headers.push(label.to_string());
            }
        }
    }
    headers
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| csv_escape(c))
        .collect::<Vec<_>>()
        .join(",")
}

/// Resolve one dynamic column for a record against its own stage.
fn column_value(record: &ScanRecord, stage: Option<&StageConfig>, header: &str) -> String {
    let Some(stage) = stage else {
        return String::new();
    };

    if stage.measurement.enabled && stage.measurement.label.trim() == header {
        return record.measurement.clone().unwrap_or_default();
    }

    if let Some((slot, _)) = stage
        .active_slots()
        .find(|(_, rule)| rule.label.trim() == header)
    {
        if let Some(values) = &record.aux_values {
            return values[slot].clone();
        }
    }
    String::new()
}

/// Write the detail report: one row per scan record, newest first.
pub fn write_detail_csv(
    path: &Path,
    records: &[ScanRecord],
    stages: &[StageConfig],
) -> Result<()> {
    let by_id: HashMap<u32, &StageConfig> = stages.iter().map(|s| (s.id, s)).collect();
    let dynamic = dynamic_headers(stages);

    let mut header_cells: Vec<String> = vec![
        "Seq".to_string(),
        "Time".to_string(),
        "Stage".to_string(),
        "Code".to_string(),
        "Model".to_string(),
    ];
    header_cells.extend(dynamic.iter().cloned());
    header_cells.extend([
        "Employee".to_string(),
        "Status".to_string(),
        "Note".to_string(),
    ]);

    let mut lines = vec![csv_line(&header_cells)];

    // Newest first, like the on-screen history
    let mut sorted: Vec<&ScanRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.seq.cmp(&a.seq));

    for record in sorted {
        let stage = by_id.get(&record.stage_id).copied();
        let stage_name = stage
            .map(|s| s.name.clone())
            .unwrap_or_else(|| format!("Stage {}", record.stage_id));
        let status_text = match stage {
            Some(s) => s.status_label(record.status).to_string(),
            None => record.status.as_str().to_string(),
        };

        let mut cells = vec![
            record.seq.to_string(),
            format_ts(record.created_ts),
            stage_name,
            record.code.clone(),
            record.model_name.clone(),
        ];
        for header in &dynamic {
            cells.push(column_value(record, stage, header));
        }
        cells.push(record.employee_id.clone());
        cells.push(status_text);
        cells.push(record.note.clone());

        lines.push(csv_line(&cells));
    }

    let content = format!("{}{}\n", BOM, lines.join("\n"));
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

/// Per-model intake/output tallies over accepted scans.
#[derive(Debug, Default, PartialEq)]
pub struct ModelTally {
    pub intake: HashSet<String>,
    pub output: HashSet<String>,
}

/// Count distinct codes per model: stage 1 acceptances are intake,
/// stage 2 acceptances are output.
pub fn tally_models(records: &[ScanRecord]) -> BTreeMap<String, ModelTally> {
    let mut tallies: BTreeMap<String, ModelTally> = BTreeMap::new();

    for record in records {
        if record.status != ScanStatus::Valid {
            continue;
        }
        let model = record.model_name.trim().to_uppercase();
        let model = if model.is_empty() {
            "N/A".to_string()
        } else {
            model
        };
        let tally = tallies.entry(model).or_default();
        match record.stage_id {
            1 => {
                tally.intake.insert(record.code.clone());
            }
            2 => {
                tally.output.insert(record.code.clone());
            }
            _ => {}
        }
    }
    tallies
}

/// Write the per-model inventory summary: intake vs output counts and
/// what is still on the bench.
pub fn write_summary_csv(path: &Path, records: &[ScanRecord]) -> Result<()> {
    let tallies = tally_models(records);

    let mut lines = vec![csv_line(&[
        "Model".to_string(),
        "Intake (stage 1)".to_string(),
        "Output (stage 2)".to_string(),
        "Remaining".to_string(),
    ])];

    for (model, tally) in &tallies {
        let intake = tally.intake.len();
        let output = tally.output.len();
        lines.push(csv_line(&[
            model.clone(),
            intake.to_string(),
            output.to_string(),
            intake.saturating_sub(output).to_string(),
        ]));
    }

    let content = format!("{}{}\n", BOM, lines.join("\n"));
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldRule, FIELD_SLOTS};

    fn stages() -> Vec<StageConfig> {
        let mut s1 = StageConfig::new(1, "Intake");
        s1.fields[0] = FieldRule {
            label: "Reported defect".to_string(),
            ..Default::default()
        };
        let mut s2 = StageConfig::new(2, "Repair output");
        s2.measurement.enabled = true;
        s2.measurement.label = "Repair result".to_string();
        s2.fields[0] = FieldRule {
            label: "Defect cause".to_string(),
            ..Default::default()
        };
        // Shared label with stage 1: must not duplicate the column
        s2.fields[1] = FieldRule {
            label: "Reported defect".to_string(),
            ..Default::default()
        };
        vec![s1, s2]
    }

    fn record(seq: i64, code: &str, stage: u32, status: ScanStatus) -> ScanRecord {
        ScanRecord {
            id: None,
            uuid: String::new(),
            seq,
            code: code.to_string(),
            model_name: "MODEL-X".to_string(),
            employee_id: "EMP-01".to_string(),
            stage_id: stage,
            status,
            note: "accepted".to_string(),
            measurement: None,
            aux_values: None,
            created_ts: 0,
        }
    }

    #[test]
    fn test_headers_stage_order_deduplicated() {
        assert_eq!(
            dynamic_headers(&stages()),
            vec!["Reported defect", "Repair result", "Defect cause"]
        );
    }

    #[test]
    fn test_column_joins_on_record_stage() {
        let stages = stages();
        let mut rec = record(1, "A1", 2, ScanStatus::Valid);
        rec.measurement = Some("OK".to_string());
        let mut values: [String; FIELD_SLOTS] = Default::default();
        values[0] = "water".to_string();
        rec.aux_values = Some(values);

        // Stage 2 owns "Repair result" and "Defect cause"
        assert_eq!(column_value(&rec, Some(&stages[1]), "Repair result"), "OK");
        assert_eq!(column_value(&rec, Some(&stages[1]), "Defect cause"), "water");
        // "Reported defect" resolves to stage 2's slot 1, which is empty
        assert_eq!(column_value(&rec, Some(&stages[1]), "Reported defect"), "");
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_tally_counts_distinct_codes() {
        let mut records = vec![
            record(1, "A1", 1, ScanStatus::Valid),
            record(2, "A2", 1, ScanStatus::Valid),
            record(3, "A1", 2, ScanStatus::Valid),
            // Rejected scans never count
            record(4, "A3", 1, ScanStatus::Error),
        ];
        // Same code accepted again at stage 1 is still one unit
        records.push(record(5, "A1", 1, ScanStatus::Valid));

        let tallies = tally_models(&records);
        let tally = &tallies["MODEL-X"];
        assert_eq!(tally.intake.len(), 2);
        assert_eq!(tally.output.len(), 1);
    }

    #[test]
    fn test_detail_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut rec = record(1, "A1", 2, ScanStatus::Valid);
        rec.measurement = Some("OK".to_string());

        write_detail_csv(&path, &[rec], &stages()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(BOM));
        assert!(content.contains("Repair result"));
        assert!(content.contains("A1"));
        assert!(content.contains("PASS"));
    }
}
