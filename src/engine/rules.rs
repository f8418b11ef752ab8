// Field and measurement rule evaluation: the leaf predicates the
// validation pipeline is built from. All pure functions over strings.

use crate::engine::outcome::RejectKind;
use crate::models::FieldRule;

/// Parse operator-entered decimal text. Trims, then accepts one comma
/// as the decimal separator (scales and meters in the field emit both
/// `4.9` and `4,9`). Non-finite spellings (`nan`, `inf`) that f64's
/// parser would accept are not measurements and parse as None.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Compare a measurement value against the configured standard.
///
/// A numeric standard is a strict upper bound: the value must parse
/// and satisfy value < standard (equality fails). A non-numeric
/// standard requires a case-insensitive exact match of the trimmed
/// value.
pub fn check_standard(value: &str, standard: &str) -> Result<(), RejectKind> {
    let standard = standard.trim();
    if standard.is_empty() {
        return Ok(());
    }

    match parse_decimal(standard) {
        Some(std_num) => match parse_decimal(value) {
            None => Err(RejectKind::MeasurementNotNumeric),
            Some(val_num) if val_num >= std_num => Err(RejectKind::MeasurementOutOfStandard),
            Some(_) => Ok(()),
        },
        None => {
            if value.trim().to_uppercase() == standard.to_uppercase() {
                Ok(())
            } else {
                Err(RejectKind::MeasurementOutOfStandard)
            }
        }
    }
}

/// Case-insensitive exact-token whitelist match.
pub fn matches_whitelist(value: &str, rule: &FieldRule) -> bool {
    let tokens = rule.whitelist_tokens();
    if tokens.is_empty() {
        return true;
    }
    tokens.contains(&value.trim().to_uppercase())
}

/// Check a field value against its configured min/max bounds.
///
/// A bound that itself fails to parse is ignored, but once any bound
/// is configured the value must be numeric.
pub fn check_bounds(value: &str, rule: &FieldRule) -> Result<(), RejectKind> {
    if !rule.has_bounds() {
        return Ok(());
    }

    let val_num = parse_decimal(value).ok_or(RejectKind::FieldNotNumeric)?;

    if let Some(min) = parse_decimal(&rule.min) {
        if val_num < min {
            return Err(RejectKind::FieldOutOfRange);
        }
    }
    if let Some(max) = parse_decimal(&rule.max) {
        if val_num > max {
            return Err(RejectKind::FieldOutOfRange);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_with(whitelist: &str, min: &str, max: &str) -> FieldRule {
        FieldRule {
            label: "Field".to_string(),
            default: String::new(),
            whitelist: whitelist.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    #[test]
    fn test_parse_decimal_accepts_comma() {
        assert_eq!(parse_decimal("4,9"), Some(4.9));
        assert_eq!(parse_decimal(" 5.0 "), Some(5.0));
        assert_eq!(parse_decimal("12"), Some(12.0));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("  "), None);
        assert_eq!(parse_decimal("PASS"), None);
    }

    #[test]
    fn test_non_finite_input_is_not_a_number() {
        assert_eq!(parse_decimal("nan"), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("inf"), None);
        assert_eq!(parse_decimal("-infinity"), None);

        // NaN compares false against any standard; it must be caught
        // as a format error, never slip through as accepted
        assert_eq!(
            check_standard("nan", "5.0"),
            Err(RejectKind::MeasurementNotNumeric)
        );
        assert_eq!(
            check_standard("inf", "5.0"),
            Err(RejectKind::MeasurementNotNumeric)
        );

        let rule = rule_with("", "0.5", "2.0");
        assert_eq!(check_bounds("NaN", &rule), Err(RejectKind::FieldNotNumeric));
        assert_eq!(check_bounds("inf", &rule), Err(RejectKind::FieldNotNumeric));
    }

    #[test]
    fn test_numeric_standard_is_strict_upper_bound() {
        assert!(check_standard("4,9", "5.0").is_ok());
        assert_eq!(
            check_standard("5,0", "5.0"),
            Err(RejectKind::MeasurementOutOfStandard)
        );
        assert_eq!(
            check_standard("5.1", "5.0"),
            Err(RejectKind::MeasurementOutOfStandard)
        );
        assert_eq!(
            check_standard("high", "5.0"),
            Err(RejectKind::MeasurementNotNumeric)
        );
    }

    #[test]
    fn test_lexical_standard_matches_case_insensitively() {
        assert!(check_standard(" ok ", "OK").is_ok());
        assert!(check_standard("Pass", "PASS").is_ok());
        assert_eq!(
            check_standard("NG", "OK"),
            Err(RejectKind::MeasurementOutOfStandard)
        );
    }

    #[test]
    fn test_empty_standard_always_passes() {
        assert!(check_standard("anything", "").is_ok());
        assert!(check_standard("anything", "   ").is_ok());
    }

    #[test]
    fn test_whitelist_exact_token_casing() {
        let rule = rule_with("LCD BATTERY", "", "");
        assert!(matches_whitelist("lcd", &rule));
        assert!(matches_whitelist(" Battery ", &rule));
        // Substring of a token is not a match
        assert!(!matches_whitelist("BAT", &rule));
        assert!(!matches_whitelist("LCD BATTERY", &rule));
    }

    #[test]
    fn test_no_whitelist_accepts_anything() {
        let rule = rule_with("", "", "");
        assert!(matches_whitelist("whatever", &rule));
    }

    #[test]
    fn test_bounds_inclusive_at_edges() {
        let rule = rule_with("", "1.0", "2.0");
        assert!(check_bounds("1.0", &rule).is_ok());
        assert!(check_bounds("2,0", &rule).is_ok());
        assert_eq!(check_bounds("0.9", &rule), Err(RejectKind::FieldOutOfRange));
        assert_eq!(check_bounds("2.1", &rule), Err(RejectKind::FieldOutOfRange));
    }

    #[test]
    fn test_bounds_require_numeric_value() {
        let rule = rule_with("", "1", "");
        assert_eq!(check_bounds("abc", &rule), Err(RejectKind::FieldNotNumeric));
    }

    #[test]
    fn test_unparseable_bound_is_ignored() {
        let rule = rule_with("", "low", "2.0");
        // min "low" is ignored, max still applies
        assert!(check_bounds("0.5", &rule).is_ok());
        assert_eq!(check_bounds("2.5", &rule), Err(RejectKind::FieldOutOfRange));
        // value must still be numeric because bounds are configured
        assert_eq!(check_bounds("abc", &rule), Err(RejectKind::FieldNotNumeric));
    }

    #[test]
    fn test_no_bounds_accepts_non_numeric() {
        let rule = rule_with("", "", "");
        assert!(check_bounds("abc", &rule).is_ok());
    }
}
