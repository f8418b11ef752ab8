//! The scan validation engine.
//!
//! [`evaluate`] is a total, pure function: every attempt yields exactly
//! one [`Outcome`], nothing is mutated, no I/O happens. The pipeline is
//! an ordered list of independent checks that short-circuits on the
//! first failure - the ordering is a contract, because it decides which
//! message an operator sees for a malformed scan.
//!
//! [`apply`] turns an outcome into the record/ledger mutation the
//! caller must commit as one step. The engine itself never writes.

pub mod outcome;
pub mod rules;

pub use outcome::{Outcome, RejectKind};

use crate::models::{
    ProgressLedger, ScanAttempt, ScanRecord, ScanStatus, StageConfig, FIELD_SLOTS,
};

/// Everything a single evaluation reads. Borrowed, never mutated.
pub struct ScanContext<'a> {
    pub stage: &'a StageConfig,
    /// Name of the stage with id `stage.id - 1`, for sequence messages.
    pub prior_stage_name: Option<&'a str>,
    /// Currently selected model/lot. Empty = none selected.
    pub model_name: &'a str,
    /// Employee bound to the active stage, if any.
    pub employee_id: Option<&'a str>,
    pub ledger: &'a ProgressLedger,
}

type CheckResult = Result<(), (RejectKind, String)>;
type Check = fn(&ScanAttempt, &ScanContext) -> CheckResult;

/// The evaluation order from the process contract:
/// identity preconditions, sequencing, measurement, auxiliary fields,
/// then the duplicate check last.
const PIPELINE: &[Check] = &[
    check_model,
    check_employee,
    check_sequence,
    check_measurement,
    check_fields,
    check_duplicate,
];

/// Evaluate one scan attempt against the station context.
pub fn evaluate(attempt: &ScanAttempt, ctx: &ScanContext) -> Outcome {
    for check in PIPELINE {
        if let Err((kind, reason)) = check(attempt, ctx) {
            log::debug!(
                "scan '{}' rejected at stage {}: {}",
                attempt.code,
                ctx.stage.id,
                kind.as_str()
            );
            return Outcome::Rejected { kind, reason };
        }
    }

    let measurement = if ctx.stage.measurement.enabled {
        Some(attempt.measurement.trim().to_string())
    } else {
        None
    };
    Outcome::Accepted {
        measurement,
        aux_values: Box::new(attempt.aux_values.clone()),
    }
}

fn check_model(_attempt: &ScanAttempt, ctx: &ScanContext) -> CheckResult {
    if ctx.model_name.trim().is_empty() {
        return Err((
            RejectKind::NoModel,
            "no model selected for this station".to_string(),
        ));
    }
    Ok(())
}

fn check_employee(_attempt: &ScanAttempt, ctx: &ScanContext) -> CheckResult {
    match ctx.employee_id {
        Some(id) if !id.trim().is_empty() => Ok(()),
        _ => Err((
            RejectKind::NoEmployee,
            format!("no employee bound to stage {}", ctx.stage.id),
        )),
    }
}

/// A unit may only enter stage N once it has completed stage N-1.
fn check_sequence(attempt: &ScanAttempt, ctx: &ScanContext) -> CheckResult {
    if ctx.stage.id <= 1 {
        return Ok(());
    }
    let required = ctx.stage.id - 1;
    if ctx.ledger.highest_stage(&attempt.code) >= required {
        return Ok(());
    }
    let prior = match ctx.prior_stage_name {
        Some(name) => name.to_string(),
        None => format!("stage {}", required),
    };
    Err((
        RejectKind::SequenceViolation,
        format!("unit has not completed \"{}\"", prior),
    ))
}

fn check_measurement(attempt: &ScanAttempt, ctx: &ScanContext) -> CheckResult {
    let measurement = &ctx.stage.measurement;
    if !measurement.enabled {
        return Ok(());
    }

    let value = attempt.measurement.trim();
    let label = if measurement.label.trim().is_empty() {
        "measurement"
    } else {
        measurement.label.trim()
    };
    if value.is_empty() {
        return Err((
            RejectKind::MeasurementMissing,
            format!("this stage requires a value for \"{}\"", label),
        ));
    }

    let standard = measurement.standard.trim();
    if let Err(kind) = rules::check_standard(value, standard) {
        let reason = match kind {
            RejectKind::MeasurementNotNumeric => format!(
                "standard is numeric ({}), \"{}\" must be entered as a number",
                standard, label
            ),
            _ => format!(
                "\"{}\" out of standard: expected {}, measured {}",
                label,
                if rules::parse_decimal(standard).is_some() {
                    format!("< {}", standard)
                } else {
                    standard.to_string()
                },
                value
            ),
        };
        return Err((kind, reason));
    }
    Ok(())
}

/// Auxiliary field checks in ascending slot order over active slots.
///
/// Only the first active slot is mandatory by position; later active
/// slots may be left empty. Non-empty values are checked against the
/// slot's whitelist and bounds.
fn check_fields(attempt: &ScanAttempt, ctx: &ScanContext) -> CheckResult {
    let first_active = ctx.stage.first_active_slot();

    for (slot, rule) in ctx.stage.active_slots() {
        let value = attempt.aux_values[slot].trim();

        if value.is_empty() {
            if Some(slot) == first_active {
                return Err((
                    RejectKind::FieldMissing,
                    format!("\"{}\" is required", rule.label.trim()),
                ));
            }
            continue;
        }

        if !rules::matches_whitelist(value, rule) {
            return Err((
                RejectKind::FieldNotWhitelisted,
                format!(
                    "value \"{}\" is not in the allowed list for \"{}\"",
                    value,
                    rule.label.trim()
                ),
            ));
        }

        if let Err(kind) = rules::check_bounds(value, rule) {
            let reason = match kind {
                RejectKind::FieldNotNumeric => {
                    format!("\"{}\" requires a numeric value", rule.label.trim())
                }
                _ => format!(
                    "value \"{}\" is outside the allowed range for \"{}\"",
                    value,
                    rule.label.trim()
                ),
            };
            return Err((kind, reason));
        }
    }
    Ok(())
}

/// Runs last so a bad field value on a re-scan still reports the field
/// problem rather than the duplicate.
fn check_duplicate(attempt: &ScanAttempt, ctx: &ScanContext) -> CheckResult {
    if ctx.ledger.highest_stage(&attempt.code) >= ctx.stage.id {
        return Err((
            RejectKind::Duplicate,
            format!("unit already completed stage {}", ctx.stage.id),
        ));
    }
    Ok(())
}

/// The mutation an outcome implies. Produced by [`apply`], committed by
/// the caller as a single atomic step.
#[derive(Debug, Clone)]
pub struct AppliedScan {
    pub record: ScanRecord,
    /// (code, new highest stage) - only present for accepted scans.
    pub ledger_update: Option<(String, u32)>,
}

/// Build the history record and ledger update for an outcome.
///
/// Sequence numbers are assigned as `history_len + 1` regardless of
/// outcome kind: rejected attempts consume a sequence number too.
pub fn apply(
    attempt: &ScanAttempt,
    ctx: &ScanContext,
    outcome: &Outcome,
    history_len: usize,
) -> AppliedScan {
    let (status, note, measurement, aux_values) = match outcome {
        Outcome::Accepted {
            measurement,
            aux_values,
        } => (
            ScanStatus::Valid,
            "accepted".to_string(),
            measurement.clone(),
            Some(*aux_values.clone()),
        ),
        Outcome::Rejected { kind, reason } => {
            (kind.record_status(), reason.clone(), None, None)
        }
    };

    let record = ScanRecord {
        id: None,
        uuid: uuid::Uuid::new_v4().to_string(),
        seq: history_len as i64 + 1,
        code: attempt.code.trim().to_string(),
        model_name: ctx.model_name.trim().to_string(),
        employee_id: ctx.employee_id.unwrap_or("-").to_string(),
        stage_id: ctx.stage.id,
        status,
        note,
        measurement,
        aux_values,
        created_ts: chrono::Utc::now().timestamp(),
    };

    let ledger_update = if outcome.is_accepted() {
        let current = ctx.ledger.highest_stage(&record.code);
        Some((record.code.clone(), current.max(ctx.stage.id)))
    } else {
        None
    };

    AppliedScan {
        record,
        ledger_update,
    }
}

/// Commit an applied scan to an in-memory session. The sqlite-backed
/// caller mirrors these exact semantics through the repositories.
pub fn commit(applied: AppliedScan, ledger: &mut ProgressLedger, history: &mut Vec<ScanRecord>) {
    if let Some((code, stage)) = &applied.ledger_update {
        ledger.insert(code.clone(), *stage);
    }
    history.push(applied.record);
}

/// Prefill an attempt's auxiliary values with the stage defaults, then
/// overlay explicitly provided (slot, value) pairs.
pub fn attempt_with_defaults(
    code: &str,
    measurement: &str,
    stage: &StageConfig,
    overrides: &[(usize, String)],
) -> ScanAttempt {
    let mut aux_values = stage.default_values();
    for (slot, value) in overrides {
        if *slot < FIELD_SLOTS {
            aux_values[*slot] = value.clone();
        }
    }
    ScanAttempt {
        code: code.trim().to_string(),
        measurement: measurement.to_string(),
        aux_values,
    }
}
