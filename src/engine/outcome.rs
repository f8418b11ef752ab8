use serde::{Deserialize, Serialize};

use crate::models::{ScanStatus, FIELD_SLOTS};

/// Machine-checkable rejection category.
///
/// The category is the only thing downstream logic (and tests) should
/// ever branch on; the human-readable reason string that travels next
/// to it is display material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectKind {
    NoModel,
    NoEmployee,
    SequenceViolation,
    MeasurementMissing,
    MeasurementNotNumeric,
    MeasurementOutOfStandard,
    FieldMissing,
    FieldNotNumeric,
    FieldNotWhitelisted,
    FieldOutOfRange,
    Duplicate,
}

impl RejectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectKind::NoModel => "no_model",
            RejectKind::NoEmployee => "no_employee",
            RejectKind::SequenceViolation => "sequence_violation",
            RejectKind::MeasurementMissing => "measurement_missing",
            RejectKind::MeasurementNotNumeric => "measurement_not_numeric",
            RejectKind::MeasurementOutOfStandard => "measurement_out_of_standard",
            RejectKind::FieldMissing => "field_missing",
            RejectKind::FieldNotNumeric => "field_not_numeric",
            RejectKind::FieldNotWhitelisted => "field_not_whitelisted",
            RejectKind::FieldOutOfRange => "field_out_of_range",
            RejectKind::Duplicate => "duplicate",
        }
    }

    /// How a rejection of this kind is recorded in history.
    ///
    /// Quality failures (the unit measured or reported bad) record as
    /// defect; process/usage failures record as error.
    pub fn record_status(&self) -> ScanStatus {
        match self {
            RejectKind::MeasurementOutOfStandard
            | RejectKind::FieldNotWhitelisted
            | RejectKind::FieldOutOfRange => ScanStatus::Defect,
            _ => ScanStatus::Error,
        }
    }
}

/// Result of evaluating one scan attempt.
///
/// Every attempt yields exactly one outcome; a rejection is a value,
/// never an `Err` - the attempt must still be recorded for audit.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted {
        /// Trimmed measurement value, when the stage requires one.
        measurement: Option<String>,
        /// The committed auxiliary values, positionally aligned.
        aux_values: Box<[String; FIELD_SLOTS]>,
    },
    Rejected {
        kind: RejectKind,
        reason: String,
    },
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    pub fn reject_kind(&self) -> Option<RejectKind> {
        match self {
            Outcome::Accepted { .. } => None,
            Outcome::Rejected { kind, .. } => Some(*kind),
        }
    }
}
