use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-unit progress: maps a unit code to the highest stage it has
/// successfully completed. Codes are case-sensitive, exact match.
/// Entries are only ever raised by accepted scans and cleared together
/// with history on reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressLedger {
    entries: HashMap<String, u32>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest completed stage for a code; 0 means "not yet started".
    pub fn highest_stage(&self, code: &str) -> u32 {
        self.entries.get(code).copied().unwrap_or(0)
    }

    /// Record a completed stage. Never lowers an existing entry.
    pub fn record(&mut self, code: &str, stage: u32) {
        let entry = self.entries.entry(code.to_string()).or_insert(0);
        if stage > *entry {
            *entry = stage;
        }
    }

    pub fn insert(&mut self, code: String, stage: u32) {
        self.entries.insert(code, stage);
    }

    /// Codes that finished `stage - 1` but not yet `stage`: the queue
    /// waiting at a stage's door.
    pub fn pending_for(&self, stage: u32) -> usize {
        if stage <= 1 {
            return 0;
        }
        self.entries.values().filter(|&&s| s == stage - 1).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.entries.iter()
    }
}

/// Station-level cursor state: which stage is active, which employee
/// is bound to each stage, and the currently selected model/lot.
///
/// The active stage is a single global selection. Switching it changes
/// which rules and employee binding subsequent scans are checked
/// against, but never touches the ledger or history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationState {
    pub active_stage: u32,
    /// Empty string = no model selected yet.
    pub current_model: String,
    /// Each stage remembers its own operator until explicitly changed.
    pub bindings: HashMap<u32, String>,
}

impl StationState {
    pub fn employee_for(&self, stage: u32) -> Option<&str> {
        self.bindings.get(&stage).map(|s| s.as_str())
    }

    pub fn bind_employee(&mut self, stage: u32, employee: impl Into<String>) {
        self.bindings.insert(stage, employee.into());
    }
}
