//! Compliance comparison
//!
//! Decides per parameter whether the live system value satisfies the
//! profile's operator/value constraint. `=` compares field-wise after
//! whitespace normalisation; the inequality operators compare
//! numerically. A handful of sentinel values mark parameters the
//! system cannot express, which report as not applicable.

use crate::parser::Operator;
use serde::Serialize;
use tracing::warn;

/// Values reporting a parameter as not applicable on this system
pub const SENTINELS: [&str; 3] = ["all:none", "NA", "PNA"];

/// Compliance verdict of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compliance {
    /// Live value satisfies the constraint
    Yes,
    /// Live value violates the constraint
    No,
    /// The system cannot express the parameter
    NotApplicable,
    /// An override disabled the parameter
    Untouched,
}

impl Compliance {
    /// Column text used by the verify table
    pub fn as_str(&self) -> &'static str {
        match self {
            Compliance::Yes => "yes",
            Compliance::No => "no ",
            Compliance::NotApplicable => " - ",
            Compliance::Untouched => " - ",
        }
    }
}

/// Comparison result of a single parameter
#[derive(Debug, Clone, Serialize)]
pub struct FieldComparison {
    /// Parameter key
    pub parameter: String,
    /// Live system value
    pub actual: String,
    /// Target value after override resolution
    pub expected: String,
    /// Raw override value for display, empty without an override
    pub override_value: String,
    /// Operator the constraint uses
    pub operator: Operator,
    /// Verdict
    pub compliant: Compliance,
}

impl FieldComparison {
    /// Whether this row counts against the note's overall compliance
    pub fn counts_as_failure(&self) -> bool {
        self.compliant == Compliance::No
    }
}

/// Whether a value is one of the not-applicable sentinels
pub fn is_sentinel(value: &str) -> bool {
    SENTINELS.contains(&value)
}

/// A missing live value can never satisfy an inequality: the synthetic
/// stand-in sits one unit beyond the bound in the failing direction.
pub fn boundary_for_missing(operator: Operator, bound: i64) -> i64 {
    match operator {
        Operator::LessThan | Operator::LessThanEqual => bound + 1,
        Operator::MoreThan | Operator::MoreThanEqual => bound - 1,
        Operator::Equal => bound + 1,
    }
}

fn satisfies(operator: Operator, actual: i64, bound: i64) -> bool {
    match operator {
        Operator::Equal => actual == bound,
        Operator::LessThan => actual < bound,
        Operator::LessThanEqual => actual <= bound,
        Operator::MoreThan => actual > bound,
        Operator::MoreThanEqual => actual >= bound,
    }
}

/// Compare a live value against a target under an operator.
///
/// Multi-value parameters are compared field by field. When the field
/// counts differ under an inequality, the bound constrains the first
/// field for `<`/`<=` and the last field for `>`/`>=`, mirroring how
/// targets are merged.
pub fn compare_values(operator: Operator, actual: &str, expected: &str) -> bool {
    let act: Vec<&str> = actual.split_whitespace().collect();
    let exp: Vec<&str> = expected.split_whitespace().collect();

    if operator == Operator::Equal {
        return act == exp;
    }

    if act.is_empty() {
        // synthesise the failing boundary; reported for the log only
        if let Some(bound) = exp.first().and_then(|f| f.parse::<i64>().ok()) {
            let stand_in = boundary_for_missing(operator, bound);
            return satisfies(operator, stand_in, bound);
        }
        return false;
    }

    if act.len() == exp.len() {
        return act.iter().zip(exp.iter()).all(|(a, e)| {
            match (a.parse::<i64>(), e.parse::<i64>()) {
                (Ok(a), Ok(e)) => satisfies(operator, a, e),
                _ => {
                    warn!("cannot compare non-integer fields '{}' and '{}'", a, e);
                    false
                }
            }
        });
    }

    let (a_field, e_field) = match operator {
        Operator::LessThan | Operator::LessThanEqual => (act.first(), exp.first()),
        _ => (act.last(), exp.first()),
    };
    match (
        a_field.and_then(|f| f.parse::<i64>().ok()),
        e_field.and_then(|f| f.parse::<i64>().ok()),
    ) {
        (Some(a), Some(e)) => satisfies(operator, a, e),
        _ => false,
    }
}

/// Build the comparison row for one parameter
pub fn compare_entry(
    parameter: &str,
    operator: Operator,
    actual: &str,
    expected: &str,
    override_value: &str,
) -> FieldComparison {
    let compliant = if override_value == "untouched" {
        Compliance::Untouched
    } else if is_sentinel(actual) || is_sentinel(expected) {
        Compliance::NotApplicable
    } else if compare_values(operator, actual, expected) {
        Compliance::Yes
    } else {
        Compliance::No
    };
    FieldComparison {
        parameter: parameter.to_string(),
        actual: actual.to_string(),
        expected: expected.to_string(),
        override_value: override_value.to_string(),
        operator,
        compliant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_is_field_wise_after_normalisation() {
        assert!(compare_values(Operator::Equal, "32768\t60999", "32768 60999"));
        assert!(compare_values(Operator::Equal, "  never  ", "never"));
        assert!(!compare_values(Operator::Equal, "1024 65535", "32768 60999"));
        assert!(!compare_values(Operator::Equal, "32768", "32768 60999"));
    }

    #[test]
    fn test_numeric_inequalities() {
        assert!(compare_values(Operator::LessThanEqual, "100", "100"));
        assert!(compare_values(Operator::LessThanEqual, "99", "100"));
        assert!(!compare_values(Operator::LessThanEqual, "101", "100"));

        assert!(compare_values(Operator::MoreThanEqual, "100", "100"));
        assert!(compare_values(Operator::MoreThanEqual, "101", "100"));
        assert!(!compare_values(Operator::MoreThanEqual, "99", "100"));

        assert!(compare_values(Operator::LessThan, "99", "100"));
        assert!(!compare_values(Operator::LessThan, "100", "100"));
        assert!(compare_values(Operator::MoreThan, "101", "100"));
        assert!(!compare_values(Operator::MoreThan, "100", "100"));
    }

    #[test]
    fn test_empty_current_value_is_never_compliant() {
        for op in [
            Operator::LessThan,
            Operator::LessThanEqual,
            Operator::MoreThan,
            Operator::MoreThanEqual,
        ] {
            assert!(!compare_values(op, "", "100"), "operator {}", op);
        }
    }

    #[test]
    fn test_boundary_synthesis_direction() {
        assert_eq!(boundary_for_missing(Operator::LessThanEqual, 100), 101);
        assert_eq!(boundary_for_missing(Operator::LessThan, 100), 101);
        assert_eq!(boundary_for_missing(Operator::MoreThanEqual, 100), 99);
        assert_eq!(boundary_for_missing(Operator::MoreThan, 100), 99);
    }

    #[test]
    fn test_mismatched_field_counts_use_edge_field() {
        // the bound constrains the last field for >=
        assert!(compare_values(Operator::MoreThanEqual, "1024 4096", "2048"));
        assert!(!compare_values(Operator::MoreThanEqual, "4096 1024", "2048"));
        // and the first field for <=
        assert!(compare_values(Operator::LessThanEqual, "1024 9999", "2048"));
        assert!(!compare_values(Operator::LessThanEqual, "9999 1024", "2048"));
    }

    #[test]
    fn test_non_integer_fields_fail_inequalities() {
        assert!(!compare_values(Operator::LessThanEqual, "abc", "100"));
        assert!(!compare_values(Operator::MoreThanEqual, "100", "abc"));
    }

    #[test]
    fn test_sentinels_report_not_applicable() {
        let cmp = compare_entry("energy_perf_bias", Operator::Equal, "all:none", "all:0", "");
        assert_eq!(cmp.compliant, Compliance::NotApplicable);

        let cmp = compare_entry("rpm:systemd", Operator::Equal, "PNA", "234-24.102", "");
        assert_eq!(cmp.compliant, Compliance::NotApplicable);
    }

    #[test]
    fn test_untouched_override_wins() {
        let cmp = compare_entry("vm.swappiness", Operator::Equal, "60", "10", "untouched");
        assert_eq!(cmp.compliant, Compliance::Untouched);
        assert!(!cmp.counts_as_failure());
    }

    #[test]
    fn test_port_range_scenario() {
        let cmp = compare_entry(
            "net.ipv4.ip_local_port_range",
            Operator::Equal,
            "32768\t60999",
            "32768\t60999",
            "",
        );
        assert_eq!(cmp.compliant, Compliance::Yes);

        let cmp = compare_entry(
            "net.ipv4.ip_local_port_range",
            Operator::Equal,
            "1024\t65535",
            "32768\t60999",
            "",
        );
        assert_eq!(cmp.compliant, Compliance::No);
        assert_eq!(cmp.actual, "1024\t65535");
        assert_eq!(cmp.expected, "32768\t60999");
    }
}
