//! INI dialect parser for tuning profiles
//!
//! Note files are INI-style: `[section]` headers followed by
//! `key operator value` lines. Some sections expand into synthetic keys
//! (limits tuples, per-block-device attributes) and the `[reminder]`
//! section collects verbatim comment text for the operator to read.

use crate::error::{HostTuneError, IoResultExt, Result};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Breaks a line apart into key, operator and value.
static KEY_OPERATOR_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\w.+_-]+)\s*([<=>]+)\s*["']*(.*?)["']*$"#).unwrap());

/// Extracts the descriptive name from a note header comment.
static HEADER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"# .*NOTE=.*VERSION=(\d*)\s*DATE=(\S*)\s*NAME="([^"]*)""#).unwrap());

/// Extracts the version field from a note header comment.
static HEADER_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"# .*NOTE=.*VERSION=(\d*)\s*DATE=.*""#).unwrap());

/// Extracts the category field from a note header comment.
static HEADER_CATEGORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"# .*NOTE=.*CATEGORY=(\w*)\s*VERSION=.*""#).unwrap());

/// Comparison or assignment operator used in a profile entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `=` exact assignment / equality
    Equal,
    /// `<` current value must stay below the bound
    LessThan,
    /// `<=` current value must not exceed the bound
    LessThanEqual,
    /// `>` current value must stay above the bound
    MoreThan,
    /// `>=` current value must not fall below the bound
    MoreThanEqual,
}

impl Operator {
    /// Parse the operator token of a profile line
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Operator::Equal),
            "<" => Some(Operator::LessThan),
            "<=" => Some(Operator::LessThanEqual),
            ">" => Some(Operator::MoreThan),
            ">=" => Some(Operator::MoreThanEqual),
            _ => None,
        }
    }

    /// The operator as written in profile files
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::MoreThan => ">",
            Operator::MoreThanEqual => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single key/operator/value triple parsed from a profile section.
/// Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningEntry {
    /// Section the entry was found in
    pub section: String,
    /// Parameter key, possibly synthesised (limits tuples, block devices)
    pub key: String,
    /// Comparison operator
    pub operator: Operator,
    /// Configured value, internal whitespace normalised to tabs
    pub value: String,
}

/// All key-value pairs of one parsed profile file.
#[derive(Debug, Clone, Default)]
pub struct ProfileFile {
    /// Entries in file order
    pub all_values: Vec<TuningEntry>,
    /// Lookup by section and key; the last occurrence of a key wins
    pub key_value: IndexMap<String, IndexMap<String, TuningEntry>>,
}

impl ProfileFile {
    /// Look up an entry by section and key
    pub fn get(&self, section: &str, key: &str) -> Option<&TuningEntry> {
        self.key_value.get(section)?.get(key)
    }

    /// All keys of one section, in parse order
    pub fn section_keys(&self, section: &str) -> Vec<&str> {
        self.key_value
            .get(section)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Environment facts the parser needs for section expansion.
///
/// `[block]` entries expand per block device and `[rpm]` entries are
/// filtered by OS version; injecting both keeps parsing deterministic
/// and testable.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Running OS version, e.g. "15.4"
    pub os_version: String,
    /// Tunable block devices of the system
    pub block_devices: Vec<String>,
}

impl ParseContext {
    /// Collect the context from the running system
    pub fn from_system() -> Self {
        ParseContext {
            os_version: crate::system::os_version(),
            block_devices: crate::system::block::candidate_devices(),
        }
    }
}

/// Parse a profile file from disk
pub fn parse_profile_file(path: &Path, ctx: &ParseContext) -> Result<ProfileFile> {
    if !path.exists() {
        return Err(HostTuneError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).with_path(path)?;
    Ok(parse_profile(&content, ctx))
}

/// Parse profile text.
///
/// Re-parsing identical text with an identical context yields an
/// identical `all_values` ordering.
pub fn parse_profile(input: &str, ctx: &ParseContext) -> ProfileFile {
    let mut ret = ProfileFile::default();
    let mut reminder = String::new();
    let mut current_section = String::new();
    let mut entries: Vec<TuningEntry> = Vec::new();

    let flush = |ret: &mut ProfileFile, section: &str, entries: &mut Vec<TuningEntry>| {
        if section.is_empty() {
            entries.clear();
            return;
        }
        let map = ret.key_value.entry(section.to_string()).or_default();
        for entry in entries.iter() {
            map.insert(entry.key.clone(), entry.clone());
        }
        ret.all_values.append(entries);
    };

    for raw_line in input.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            flush(&mut ret, &current_section, &mut entries);
            current_section = line.trim_matches(|c| c == '[' || c == ']').to_string();
            continue;
        }
        if line.starts_with('#') {
            // Comments are dropped everywhere except the reminder section,
            // where they accumulate verbatim for the report footer.
            if current_section == "reminder" {
                reminder.push_str(line);
                reminder.push('\n');
            }
            continue;
        }

        match current_section.as_str() {
            "rpm" => {
                entries.extend(parse_rpm_line(line, &ctx.os_version));
            }
            "limits" => {
                if let Some(caps) = KEY_OPERATOR_VALUE.captures(line) {
                    let operator = match Operator::parse(&caps[2]) {
                        Some(op) => op,
                        None => continue,
                    };
                    entries.extend(parse_limits_value(&caps[1], operator, &caps[3]));
                }
            }
            "block" => {
                if let Some(caps) = KEY_OPERATOR_VALUE.captures(line) {
                    let operator = match Operator::parse(&caps[2]) {
                        Some(op) => op,
                        None => continue,
                    };
                    for bdev in &ctx.block_devices {
                        entries.push(TuningEntry {
                            section: current_section.clone(),
                            key: format!("{}_{}", &caps[1], bdev),
                            operator,
                            value: normalise_value(&caps[3]),
                        });
                    }
                }
            }
            "grub" => {
                let (key, operator, value) = match KEY_OPERATOR_VALUE.captures(line) {
                    Some(caps) => match Operator::parse(&caps[2]) {
                        Some(op) => (format!("grub:{}", &caps[1]), op, caps[3].to_string()),
                        None => continue,
                    },
                    // a single boot option rather than a key=value pair
                    None => (format!("grub:{}", line), Operator::Equal, line.to_string()),
                };
                entries.push(TuningEntry {
                    section: current_section.clone(),
                    key,
                    operator,
                    value: normalise_value(&value),
                });
            }
            _ => {
                if let Some(caps) = KEY_OPERATOR_VALUE.captures(line) {
                    let operator = match Operator::parse(&caps[2]) {
                        Some(op) => op,
                        None => continue,
                    };
                    entries.push(TuningEntry {
                        section: current_section.clone(),
                        key: caps[1].to_string(),
                        operator,
                        value: normalise_value(&caps[3]),
                    });
                }
            }
        }
    }
    flush(&mut ret, &current_section, &mut entries);

    if !reminder.is_empty() {
        let entry = TuningEntry {
            section: "reminder".to_string(),
            key: "reminder".to_string(),
            operator: Operator::Equal,
            value: reminder,
        };
        entries.push(entry);
        flush(&mut ret, "reminder", &mut entries);
    }
    ret
}

/// Multi-value parameters carry their fields tab-separated internally
fn normalise_value(value: &str) -> String {
    value.replace(' ', "\t")
}

/// `[rpm]` lines are `package osversion version`; entries for another
/// OS version are dropped.
fn parse_rpm_line(line: &str, os_version: &str) -> Option<TuningEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    if fields[1] != "all" && fields[1] != os_version {
        return None;
    }
    Some(TuningEntry {
        section: "rpm".to_string(),
        key: format!("rpm:{}", fields[0]),
        operator: Operator::Equal,
        value: fields[2].to_string(),
    })
}

/// `[limits]` values are comma-separated `domain type item value` tuples,
/// each becoming its own synthetic key. An empty tuple marks all limits
/// of the line as untouched (override files) and keeps the raw key.
fn parse_limits_value(key: &str, operator: Operator, value: &str) -> Vec<TuningEntry> {
    let mut out = Vec::new();
    for tuple in value.split(',') {
        let tuple = tuple.trim();
        let fields: Vec<&str> = tuple.split_whitespace().collect();
        let (entry_key, entry_value) = if fields.len() < 3 {
            (format!("{}_NA", key), "NA".to_string())
        } else {
            (
                format!("LIMIT_{}_{}_{}", fields[0], fields[1], fields[2]),
                fields.join(" "),
            )
        };
        out.push(TuningEntry {
            section: "limits".to_string(),
            key: entry_key,
            operator,
            value: entry_value,
        });
    }
    out
}

/// Return the descriptive name of a note from its header comment,
/// formatted with version and date, or an empty string.
pub fn profile_descriptive_name(path: &Path) -> String {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return String::new(),
    };
    match HEADER_NAME.captures(&content) {
        Some(caps) => format!("{}\n\t\t\tVersion {} from {}", &caps[3], &caps[1], &caps[2]),
        None => String::new(),
    }
}

/// Return one field (`version` or `category`) from the header comment
/// of a note file, or an empty string.
pub fn profile_header_entry(path: &Path, entry_name: &str) -> String {
    let re: &Regex = match entry_name {
        "version" => &HEADER_VERSION,
        "category" => &HEADER_CATEGORY,
        _ => return String::new(),
    };
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return String::new(),
    };
    match re.captures(&content) {
        Some(caps) => caps[1].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ctx() -> ParseContext {
        ParseContext {
            os_version: "15.4".to_string(),
            block_devices: vec!["sda".to_string(), "sdb".to_string()],
        }
    }

    const SAMPLE: &str = r#"# comment
[sysctl]
net.ipv4.ip_local_port_range = 32768 60999
vm.swappiness = 10
net.core.somaxconn > 4096

[vm]
THP = never
"#;

    #[test]
    fn test_parse_sections_and_operators() {
        let profile = parse_profile(SAMPLE, &ctx());
        assert_eq!(profile.all_values.len(), 4);

        let entry = profile.get("sysctl", "net.ipv4.ip_local_port_range").unwrap();
        assert_eq!(entry.operator, Operator::Equal);
        assert_eq!(entry.value, "32768\t60999");

        let entry = profile.get("sysctl", "net.core.somaxconn").unwrap();
        assert_eq!(entry.operator, Operator::MoreThan);
        assert_eq!(entry.value, "4096");

        assert_eq!(profile.get("vm", "THP").unwrap().value, "never");
    }

    #[test]
    fn test_last_occurrence_wins_in_lookup() {
        let text = "[sysctl]\nvm.swappiness = 10\nvm.swappiness = 60\n";
        let profile = parse_profile(text, &ctx());
        // both occurrences stay in file order, the lookup sees the last
        assert_eq!(profile.all_values.len(), 2);
        assert_eq!(profile.get("sysctl", "vm.swappiness").unwrap().value, "60");
    }

    #[test]
    fn test_parse_determinism() {
        let first = parse_profile(SAMPLE, &ctx());
        let second = parse_profile(SAMPLE, &ctx());
        assert_eq!(first.all_values, second.all_values);
    }

    #[test]
    fn test_block_section_expands_per_device() {
        let text = "[block]\nIO_SCHEDULER = noop\n";
        let profile = parse_profile(text, &ctx());
        let keys: Vec<&str> = profile.all_values.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["IO_SCHEDULER_sda", "IO_SCHEDULER_sdb"]);
    }

    #[test]
    fn test_limits_tuples_become_synthetic_keys() {
        let text = "[limits]\nLIMITS = @sapsys soft memlock 2097152, @sapsys hard memlock 2097152\n";
        let profile = parse_profile(text, &ctx());
        assert_eq!(profile.all_values.len(), 2);
        assert_eq!(profile.all_values[0].key, "LIMIT_@sapsys_soft_memlock");
        assert_eq!(profile.all_values[0].value, "@sapsys soft memlock 2097152");
        assert_eq!(profile.all_values[1].key, "LIMIT_@sapsys_hard_memlock");
    }

    #[test]
    fn test_empty_limits_tuple_is_untouched_marker() {
        let text = "[limits]\nLIMITS =\n";
        let profile = parse_profile(text, &ctx());
        assert_eq!(profile.all_values.len(), 1);
        assert_eq!(profile.all_values[0].key, "LIMITS_NA");
        assert_eq!(profile.all_values[0].value, "NA");
    }

    #[test]
    fn test_grub_bare_option() {
        let text = "[grub]\nintel_idle.max_cstate=1\nnuma_balancing=disable\ntransparent_hugepage\n";
        let profile = parse_profile(text, &ctx());
        let keys: Vec<&str> = profile.all_values.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "grub:intel_idle.max_cstate",
                "grub:numa_balancing",
                "grub:transparent_hugepage"
            ]
        );
        assert_eq!(profile.all_values[2].value, "transparent_hugepage");
    }

    #[test]
    fn test_rpm_filters_by_os_version() {
        let text = "[rpm]\nsystemd 15.4 234-24.102\nuuidd 12.5 2.33.1\nutil-linux all 2.33.2\n";
        let profile = parse_profile(text, &ctx());
        let keys: Vec<&str> = profile.all_values.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["rpm:systemd", "rpm:util-linux"]);
    }

    #[test]
    fn test_reminder_collects_comments() {
        let text = "[sysctl]\nvm.swappiness = 10\n[reminder]\n# check the storage layout\n# and the HA setup\n";
        let profile = parse_profile(text, &ctx());
        let reminder = profile.get("reminder", "reminder").unwrap();
        assert_eq!(reminder.value, "# check the storage layout\n# and the HA setup\n");
    }

    #[test]
    fn test_quoted_values_are_unquoted() {
        let text = "[sysctl]\nkernel.sem = \"1250 256000 100 8192\"\n";
        let profile = parse_profile(text, &ctx());
        let entry = profile.get("sysctl", "kernel.sem").unwrap();
        assert_eq!(entry.value, "1250\t256000\t100\t8192");
    }

    #[test]
    fn test_descriptive_name_extraction() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "# 2578899 - NOTE=2578899 CATEGORY=LINUX VERSION=45 DATE=06.03.2023 NAME=\"Installation notes\""
        )
        .unwrap();
        let name = profile_descriptive_name(file.path());
        assert!(name.starts_with("Installation notes"));
        assert!(name.contains("Version 45 from 06.03.2023"));
        assert_eq!(profile_header_entry(file.path(), "version"), "45");
        assert_eq!(profile_header_entry(file.path(), "category"), "LINUX");
    }
}
