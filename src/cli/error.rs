// Input parsing for operator-typed command arguments

use thiserror::Error;

use crate::models::FIELD_SLOTS;

/// Malformed `--field` argument.
#[derive(Debug, Error, PartialEq)]
pub enum FieldArgError {
    #[error("Invalid field argument '{0}'. Expected SLOT=VALUE, e.g. --field 1=battery")]
    BadSyntax(String),
    #[error("Invalid field slot '{0}'. Slot must be a number between 1 and {FIELD_SLOTS}")]
    BadSlot(String),
}

/// Parse a `SLOT=VALUE` pair. Slots are 1-based on the command line,
/// 0-based internally.
pub fn parse_field_arg(raw: &str) -> Result<(usize, String), FieldArgError> {
    let (slot_str, value) = raw
        .split_once('=')
        .ok_or_else(|| FieldArgError::BadSyntax(raw.to_string()))?;

    let slot: usize = slot_str
        .trim()
        .parse()
        .map_err(|_| FieldArgError::BadSlot(slot_str.trim().to_string()))?;
    if slot < 1 || slot > FIELD_SLOTS {
        return Err(FieldArgError::BadSlot(slot_str.trim().to_string()));
    }

    Ok((slot - 1, value.to_string()))
}
