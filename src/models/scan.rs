use serde::{Deserialize, Serialize};

use crate::models::stage::FIELD_SLOTS;

/// Recorded status of a scan attempt.
///
/// - Valid: accepted by every check
/// - Defect: rejected because the unit failed a quality rule (NG)
/// - Error: rejected because of a process/usage problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Valid,
    Defect,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Valid => "valid",
            ScanStatus::Defect => "defect",
            ScanStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "valid" => Some(ScanStatus::Valid),
            "defect" => Some(ScanStatus::Defect),
            "error" => Some(ScanStatus::Error),
            _ => None,
        }
    }
}

/// One recorded scan attempt, immutable once appended.
///
/// Sequence numbers are assigned at append time in creation order;
/// history is displayed newest first but `seq` always increases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Option<i64>,
    pub uuid: String,
    pub seq: i64,
    pub code: String,
    pub model_name: String,
    pub employee_id: String,
    pub stage_id: u32,
    pub status: ScanStatus,
    pub note: String,
    pub measurement: Option<String>,
    /// Positionally aligned with the stage's field slots.
    /// None for rejected attempts (no values were committed).
    pub aux_values: Option<[String; FIELD_SLOTS]>,
    pub created_ts: i64,
}

/// Transient input for one evaluation: what the operator scanned/typed.
/// Stage, model and employee come from the station context, not the
/// attempt itself.
#[derive(Debug, Clone, Default)]
pub struct ScanAttempt {
    pub code: String,
    pub measurement: String,
    pub aux_values: [String; FIELD_SLOTS],
}

impl ScanAttempt {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }
}
