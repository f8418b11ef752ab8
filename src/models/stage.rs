use serde::{Deserialize, Serialize};

/// Number of auxiliary field slots every stage carries.
/// Slots are fixed at the type level; a slot is simply inactive when
/// its label is blank.
pub const FIELD_SLOTS: usize = 8;

/// Rule configuration for one auxiliary field slot.
///
/// All rule inputs are kept as raw strings the way the operator typed
/// them into the configuration; the engine interprets them at scan
/// time (whitelist tokenization, numeric bounds).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub label: String,
    pub default: String,
    /// Space-separated set of acceptable values. Empty = no whitelist.
    pub whitelist: String,
    /// Lower numeric bound. Empty = no bound.
    pub min: String,
    /// Upper numeric bound. Empty = no bound.
    pub max: String,
}

impl FieldRule {
    /// A slot participates in validation iff it has a label.
    pub fn is_active(&self) -> bool {
        !self.label.trim().is_empty()
    }

    /// Uppercased whitelist tokens, or empty when no whitelist is set.
    pub fn whitelist_tokens(&self) -> Vec<String> {
        self.whitelist
            .split_whitespace()
            .map(|t| t.to_uppercase())
            .collect()
    }

    /// Whether a min or max bound is configured for this slot.
    pub fn has_bounds(&self) -> bool {
        !self.min.trim().is_empty() || !self.max.trim().is_empty()
    }
}

/// Measurement requirement for a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub enabled: bool,
    pub label: String,
    /// Expected value. Parsed as a number when possible (strict
    /// less-than comparison), otherwise compared case-insensitively.
    pub standard: String,
}

/// Display strings for the three scan statuses.
/// Cosmetic only: carried into history/export, never used for control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLabels {
    pub valid: String,
    pub defect: String,
    pub error: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            valid: "PASS".to_string(),
            defect: "NG".to_string(),
            error: "PROCESS ERROR".to_string(),
        }
    }
}

/// Configuration for one production stage.
///
/// Stage order is numeric order of ids. The `fields` array always has
/// exactly [`FIELD_SLOTS`] entries; the repository layer normalizes on
/// load so the engine never has to defend against short arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub id: u32,
    pub name: String,
    pub measurement: Measurement,
    pub fields: [FieldRule; FIELD_SLOTS],
    pub status_labels: StatusLabels,
}

impl StageConfig {
    /// Create a stage with all slots disabled and no measurement.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            measurement: Measurement::default(),
            fields: Default::default(),
            status_labels: StatusLabels::default(),
        }
    }

    /// Active slots in ascending order, as (slot index, rule) pairs.
    pub fn active_slots(&self) -> impl Iterator<Item = (usize, &FieldRule)> {
        self.fields.iter().enumerate().filter(|(_, f)| f.is_active())
    }

    /// Index of the first active slot, if any. Only this slot is
    /// mandatory at scan time.
    pub fn first_active_slot(&self) -> Option<usize> {
        self.active_slots().next().map(|(i, _)| i)
    }

    /// Configured defaults for all 8 slots, used to prefill an attempt.
    pub fn default_values(&self) -> [String; FIELD_SLOTS] {
        let mut values: [String; FIELD_SLOTS] = Default::default();
        for (i, field) in self.fields.iter().enumerate() {
            values[i] = field.default.clone();
        }
        values
    }

    /// Display label for a record status at this stage.
    pub fn status_label(&self, status: crate::models::ScanStatus) -> &str {
        match status {
            crate::models::ScanStatus::Valid => &self.status_labels.valid,
            crate::models::ScanStatus::Defect => &self.status_labels.defect,
            crate::models::ScanStatus::Error => &self.status_labels.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_active_only_with_label() {
        let mut rule = FieldRule::default();
        assert!(!rule.is_active());
        rule.label = "   ".to_string();
        assert!(!rule.is_active());
        rule.label = "Defect cause".to_string();
        assert!(rule.is_active());
    }

    #[test]
    fn test_whitelist_tokens_uppercased() {
        let rule = FieldRule {
            label: "Part".to_string(),
            whitelist: "lcd  battery Camera".to_string(),
            ..Default::default()
        };
        assert_eq!(rule.whitelist_tokens(), vec!["LCD", "BATTERY", "CAMERA"]);
    }

    #[test]
    fn test_first_active_slot_skips_disabled() {
        let mut stage = StageConfig::new(1, "Intake");
        assert_eq!(stage.first_active_slot(), None);
        stage.fields[3].label = "Cause".to_string();
        stage.fields[5].label = "Part".to_string();
        assert_eq!(stage.first_active_slot(), Some(3));
        let active: Vec<usize> = stage.active_slots().map(|(i, _)| i).collect();
        assert_eq!(active, vec![3, 5]);
    }

    #[test]
    fn test_default_values_follow_slots() {
        let mut stage = StageConfig::new(2, "Output");
        stage.fields[0].label = "Cause".to_string();
        stage.fields[0].default = "none".to_string();
        let values = stage.default_values();
        assert_eq!(values[0], "none");
        assert_eq!(values[1], "");
    }
}
