//! Table rendering for verify and simulate
//!
//! Column widths follow the content up to a cap; longer values wrap
//! onto continuation rows. Rows needing explanation carry `[N]`
//! footnote marks resolved below the table.

use crate::app::NoteComparison;
use crate::profile::{compare, Compliance, FieldComparison};
use console::style;
use std::io::{self, Write};

/// Longest column before values wrap onto continuation rows
const MAX_COL_WIDTH: usize = 30;

const FOOTNOTES: [(usize, &str); 5] = [
    (1, "setting is not supported by the system"),
    (2, "setting is not available on the system"),
    (3, "value is only checked, but NOT set"),
    (4, "cpu idle state settings differ"),
    (7, "parameter value is untouched by default"),
];

/// Footnote marks applying to one comparison row
fn footnote_marks(comparison: &FieldComparison) -> Vec<usize> {
    let mut marks = Vec::new();
    if comparison.compliant == Compliance::Untouched {
        marks.push(7);
    }
    if compare::is_sentinel(&comparison.actual) {
        marks.push(1);
    } else if comparison.actual.is_empty() {
        marks.push(2);
    }
    if comparison.parameter.starts_with("rpm:") || comparison.parameter.starts_with("grub:") {
        marks.push(3);
    }
    marks
}

fn display(value: &str) -> String {
    value.replace('\t', " ")
}

/// Wrap a value at word boundaries into lines of at most `width`
pub fn wrap_text(value: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in value.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

struct Row {
    note: String,
    parameter: String,
    expected: String,
    override_value: String,
    actual: String,
    compliant: String,
    compliant_ok: Option<bool>,
    marks: Vec<usize>,
}

fn build_rows(comparisons: &[NoteComparison]) -> Vec<Row> {
    let mut rows = Vec::new();
    for note in comparisons {
        let note_field = if note.version.is_empty() {
            note.id.clone()
        } else {
            format!("{}, {}", note.id, note.version)
        };
        let mut sorted: Vec<&FieldComparison> = note.comparisons.iter().collect();
        sorted.sort_by(|a, b| a.parameter.cmp(&b.parameter));
        for comparison in sorted {
            let marks = footnote_marks(comparison);
            let mark_text: String = marks.iter().map(|m| format!(" [{}]", m)).collect();
            rows.push(Row {
                note: note_field.clone(),
                parameter: comparison.parameter.clone(),
                expected: display(&comparison.expected),
                override_value: display(&comparison.override_value),
                actual: display(&comparison.actual),
                compliant: format!("{}{}", comparison.compliant.as_str(), mark_text),
                compliant_ok: match comparison.compliant {
                    Compliance::Yes => Some(true),
                    Compliance::No => Some(false),
                    _ => None,
                },
                marks,
            });
        }
    }
    rows
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, minimum: usize) -> usize {
    values
        .map(|v| v.len().min(MAX_COL_WIDTH))
        .chain(std::iter::once(minimum))
        .max()
        .unwrap_or(minimum)
}

/// Print the verify table: one row per parameter with the compliance
/// verdict, followed by the footnotes in use and any reminder text.
pub fn print_verify_table(
    out: &mut impl Write,
    comparisons: &[NoteComparison],
    colored: bool,
) -> io::Result<()> {
    let rows = build_rows(comparisons);
    if rows.is_empty() {
        return writeln!(out, "no parameters to report");
    }

    let w_note = column_width(rows.iter().map(|r| r.note.as_str()), 16);
    let w_param = column_width(rows.iter().map(|r| r.parameter.as_str()), 12);
    let w_exp = column_width(rows.iter().map(|r| r.expected.as_str()), 9);
    let w_over = column_width(rows.iter().map(|r| r.override_value.as_str()), 9);
    let w_act = column_width(rows.iter().map(|r| r.actual.as_str()), 7);

    writeln!(
        out,
        "   {:<w_note$} | {:<w_param$} | {:<w_exp$} | {:<w_over$} | {:<w_act$} | Compliant",
        "Note, Version", "Parameter", "Expected", "Override", "Actual",
    )?;
    writeln!(
        out,
        "   {}-+-{}-+-{}-+-{}-+-{}-+----------",
        "-".repeat(w_note),
        "-".repeat(w_param),
        "-".repeat(w_exp),
        "-".repeat(w_over),
        "-".repeat(w_act),
    )?;

    let mut used_marks: Vec<usize> = Vec::new();
    for row in &rows {
        for mark in &row.marks {
            if !used_marks.contains(mark) {
                used_marks.push(*mark);
            }
        }
        let compliant = if colored {
            match row.compliant_ok {
                Some(true) => style(row.compliant.clone()).green().to_string(),
                Some(false) => style(row.compliant.clone()).red().to_string(),
                None => row.compliant.clone(),
            }
        } else {
            row.compliant.clone()
        };

        let exp_lines = wrap_text(&row.expected, w_exp);
        let over_lines = wrap_text(&row.override_value, w_over);
        let act_lines = wrap_text(&row.actual, w_act);
        let line_count = exp_lines.len().max(over_lines.len()).max(act_lines.len());
        for i in 0..line_count {
            let cell = |lines: &[String], i: usize| -> String {
                lines.get(i).cloned().unwrap_or_default()
            };
            if i == 0 {
                writeln!(
                    out,
                    "   {:<w_note$} | {:<w_param$} | {:<w_exp$} | {:<w_over$} | {:<w_act$} | {}",
                    row.note,
                    row.parameter,
                    cell(&exp_lines, i),
                    cell(&over_lines, i),
                    cell(&act_lines, i),
                    compliant,
                )?;
            } else {
                writeln!(
                    out,
                    "   {:<w_note$} | {:<w_param$} | {:<w_exp$} | {:<w_over$} | {:<w_act$} |",
                    "",
                    "",
                    cell(&exp_lines, i),
                    cell(&over_lines, i),
                    cell(&act_lines, i),
                )?;
            }
        }
    }

    used_marks.sort_unstable();
    if !used_marks.is_empty() {
        writeln!(out)?;
        for (number, text) in FOOTNOTES {
            if used_marks.contains(&number) {
                writeln!(out, " [{}] {}", number, text)?;
            }
        }
    }

    print_reminders(out, comparisons, colored)?;
    Ok(())
}

/// Print the simulate table: what an apply would change
pub fn print_simulate_table(out: &mut impl Write, comparison: &NoteComparison) -> io::Result<()> {
    let rows = build_rows(std::slice::from_ref(comparison));
    if rows.is_empty() {
        return writeln!(out, "no parameters to report");
    }

    let w_param = column_width(rows.iter().map(|r| r.parameter.as_str()), 12);
    let w_act = column_width(rows.iter().map(|r| r.actual.as_str()), 10);
    let w_exp = column_width(rows.iter().map(|r| r.expected.as_str()), 15);
    let w_over = column_width(rows.iter().map(|r| r.override_value.as_str()), 9);

    writeln!(
        out,
        "   {:<w_param$} | {:<w_act$} | {:<w_exp$} | {:<w_over$} | Comment",
        "Parameter", "Value set", "Value expected", "Override",
    )?;
    writeln!(
        out,
        "   {}-+-{}-+-{}-+-{}-+--------",
        "-".repeat(w_param),
        "-".repeat(w_act),
        "-".repeat(w_exp),
        "-".repeat(w_over),
    )?;
    for row in &rows {
        let comment: String = row.marks.iter().map(|m| format!(" [{}]", m)).collect();
        writeln!(
            out,
            "   {:<w_param$} | {:<w_act$} | {:<w_exp$} | {:<w_over$} |{}",
            row.parameter, row.actual, row.expected, row.override_value, comment,
        )?;
    }

    let used: Vec<usize> = rows.iter().flat_map(|r| r.marks.clone()).collect();
    if !used.is_empty() {
        writeln!(out)?;
        for (number, text) in FOOTNOTES {
            if used.contains(&number) {
                writeln!(out, " [{}] {}", number, text)?;
            }
        }
    }
    Ok(())
}

/// Reminder sections are operator-facing text the tool does not handle
/// itself; they close the report.
fn print_reminders(
    out: &mut impl Write,
    comparisons: &[NoteComparison],
    colored: bool,
) -> io::Result<()> {
    for note in comparisons {
        let Some(reminder) = &note.reminder else {
            continue;
        };
        if reminder.trim().is_empty() {
            continue;
        }
        let head = format!(
            "Attention for note {}:\nHints or values not yet handled by hosttune. Please read carefully, check and set manually, if needed:",
            note.id
        );
        let body = format!("{}\n{}", head, reminder.trim_end());
        if colored {
            writeln!(out, "\n{}", style(body).red())?;
        } else {
            writeln!(out, "\n{}", body)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Operator;
    use crate::profile::compare::compare_entry;

    fn comparison() -> NoteComparison {
        NoteComparison {
            id: "1410736".to_string(),
            name: "TCP keepalive".to_string(),
            version: "7".to_string(),
            comparisons: vec![
                compare_entry(
                    "net.ipv4.tcp_keepalive_time",
                    Operator::Equal,
                    "7200",
                    "300",
                    "",
                ),
                compare_entry(
                    "net.ipv4.tcp_keepalive_intvl",
                    Operator::Equal,
                    "75",
                    "75",
                    "",
                ),
            ],
            reminder: None,
        }
    }

    #[test]
    fn test_verify_table_contains_all_columns() {
        let mut out = Vec::new();
        print_verify_table(&mut out, &[comparison()], false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Note, Version"));
        assert!(text.contains("1410736, 7"));
        assert!(text.contains("net.ipv4.tcp_keepalive_time"));
        assert!(text.contains("7200"));
        assert!(text.contains("300"));
        assert!(text.contains("no "));
        assert!(text.contains("yes"));
    }

    #[test]
    fn test_verify_table_footnotes() {
        let mut note = comparison();
        note.comparisons.push(compare_entry(
            "grub:numa_balancing",
            Operator::Equal,
            "",
            "disable",
            "",
        ));
        note.comparisons.push(compare_entry(
            "energy_perf_bias",
            Operator::Equal,
            "all:none",
            "all:0",
            "",
        ));

        let mut out = Vec::new();
        print_verify_table(&mut out, &[note], false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("[1] setting is not supported by the system"));
        assert!(text.contains("[2] setting is not available on the system"));
        assert!(text.contains("[3] value is only checked, but NOT set"));
    }

    #[test]
    fn test_long_values_wrap() {
        let mut note = comparison();
        note.comparisons.push(compare_entry(
            "kernel.sem",
            Operator::Equal,
            "1250\t256000\t100\t8192",
            "32000\t1024000000\t500\t32000",
            "",
        ));
        let mut out = Vec::new();
        print_verify_table(&mut out, &[note], false).unwrap();
        let text = String::from_utf8(out).unwrap();
        // no printed line exceeds the cap by a full column
        for line in text.lines() {
            assert!(line.len() < 160, "line too long: {}", line);
        }
    }

    #[test]
    fn test_reminder_is_printed() {
        let mut note = comparison();
        note.reminder = Some("# check the storage layout\n".to_string());
        let mut out = Vec::new();
        print_verify_table(&mut out, &[note], false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Attention for note 1410736"));
        assert!(text.contains("# check the storage layout"));
    }

    #[test]
    fn test_simulate_table() {
        let mut out = Vec::new();
        print_simulate_table(&mut out, &comparison()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Value set"));
        assert!(text.contains("Value expected"));
        assert!(text.contains("net.ipv4.tcp_keepalive_time"));
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("short", 30), vec!["short"]);
        assert_eq!(
            wrap_text("1250 256000 100 8192", 11),
            vec!["1250 256000", "100 8192"]
        );
        assert_eq!(wrap_text("", 30), vec![""]);
    }
}
