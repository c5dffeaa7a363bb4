//! Machine-readable report output
//!
//! Mirrors the verify and simulate tables as a JSON document for
//! monitoring integrations.

use crate::app::NoteComparison;
use crate::profile::Compliance;
use serde::Serialize;

/// One parameter row of the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct JsonNoteLine {
    /// Note ID, empty for simulate rows
    pub note_id: String,
    /// Profile version from the note header
    pub note_version: String,
    /// Parameter key
    pub parameter: String,
    /// Target value after override resolution
    pub expected_value: String,
    /// Raw override value, empty without an override
    pub override_value: String,
    /// Live system value; absent for not-applicable parameters
    pub actual_value: Option<String>,
    /// Compliance verdict; absent for not-applicable parameters
    pub compliant: Option<bool>,
}

/// Reminder text of one note
#[derive(Debug, Clone, Serialize)]
pub struct JsonReminder {
    /// Note ID
    pub note_id: String,
    /// Verbatim reminder text
    pub reminder: String,
}

/// The complete report document
#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonReport {
    /// Rows of a verify run
    pub verifications: Vec<JsonNoteLine>,
    /// Rows of a simulate run
    pub simulations: Vec<JsonNoteLine>,
    /// Reminder sections
    pub attentions: Vec<JsonReminder>,
}

fn display(value: &str) -> String {
    value.replace('\t', " ")
}

fn note_lines(note: &NoteComparison, with_note_id: bool) -> Vec<JsonNoteLine> {
    note.comparisons
        .iter()
        .map(|comparison| {
            let not_applicable = matches!(
                comparison.compliant,
                Compliance::NotApplicable | Compliance::Untouched
            );
            JsonNoteLine {
                note_id: if with_note_id {
                    note.id.clone()
                } else {
                    String::new()
                },
                note_version: note.version.clone(),
                parameter: comparison.parameter.clone(),
                expected_value: display(&comparison.expected),
                override_value: display(&comparison.override_value),
                actual_value: if not_applicable {
                    None
                } else {
                    Some(display(&comparison.actual))
                },
                compliant: match comparison.compliant {
                    Compliance::Yes => Some(true),
                    Compliance::No => Some(false),
                    _ => None,
                },
            }
        })
        .collect()
}

fn attentions(comparisons: &[NoteComparison]) -> Vec<JsonReminder> {
    comparisons
        .iter()
        .filter_map(|note| {
            note.reminder.as_ref().map(|text| JsonReminder {
                note_id: note.id.clone(),
                reminder: text.clone(),
            })
        })
        .collect()
}

/// Build the report for a verify run
pub fn verify_report(comparisons: &[NoteComparison]) -> JsonReport {
    JsonReport {
        verifications: comparisons
            .iter()
            .flat_map(|n| note_lines(n, true))
            .collect(),
        simulations: Vec::new(),
        attentions: attentions(comparisons),
    }
}

/// Build the report for a simulate run
pub fn simulate_report(comparison: &NoteComparison) -> JsonReport {
    JsonReport {
        verifications: Vec::new(),
        simulations: note_lines(comparison, false),
        attentions: attentions(std::slice::from_ref(comparison)),
    }
}
