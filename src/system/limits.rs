//! Security limits file handling
//!
//! Parses and edits files in `security/limits` format: one
//! `domain type item value` entry per line, comments and unknown lines
//! preserved on a get/set/apply round trip.

use crate::error::{IoResultExt, Result};
use std::path::{Path, PathBuf};

/// Default limits file modified by the `[limits]` section
pub const SEC_LIMITS_FILE: &str = "/etc/security/limits.conf";

#[derive(Debug, Clone)]
enum Line {
    Verbatim(String),
    Entry {
        domain: String,
        kind: String,
        item: String,
        value: String,
    },
}

/// A parsed security limits file
#[derive(Debug, Clone)]
pub struct SecLimits {
    path: PathBuf,
    lines: Vec<Line>,
}

impl SecLimits {
    /// Parse a limits file. A missing file yields an empty set so that
    /// the first apply creates it.
    pub fn parse(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            std::fs::read_to_string(path).with_path(path)?
        } else {
            String::new()
        };
        Ok(SecLimits {
            path: path.to_path_buf(),
            lines: content.lines().map(parse_line).collect(),
        })
    }

    /// Current value of one limit, if set
    pub fn get(&self, domain: &str, kind: &str, item: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|l| match l {
            Line::Entry {
                domain: d,
                kind: k,
                item: i,
                value,
            } if d == domain && k == kind && i == item => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set one limit, replacing an existing entry or appending
    pub fn set(&mut self, domain: &str, kind: &str, item: &str, value: &str) {
        for line in self.lines.iter_mut() {
            if let Line::Entry {
                domain: d,
                kind: k,
                item: i,
                value: v,
            } = line
            {
                if d == domain && k == kind && i == item {
                    *v = value.to_string();
                    return;
                }
            }
        }
        self.lines.push(Line::Entry {
            domain: domain.to_string(),
            kind: kind.to_string(),
            item: item.to_string(),
            value: value.to_string(),
        });
    }

    /// Remove one limit entry; returns whether an entry was removed
    pub fn remove(&mut self, domain: &str, kind: &str, item: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| {
            !matches!(l, Line::Entry { domain: d, kind: k, item: i, .. }
                if d == domain && k == kind && i == item)
        });
        before != self.lines.len()
    }

    /// Write the limits file back
    pub fn apply(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Verbatim(text) => out.push_str(text),
                Line::Entry {
                    domain,
                    kind,
                    item,
                    value,
                } => out.push_str(&format!("{} {} {} {}", domain, kind, item, value)),
            }
            out.push('\n');
        }
        std::fs::write(&self.path, out).with_path(&self.path)
    }
}

fn parse_line(raw: &str) -> Line {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Verbatim(raw.to_string());
    }
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() != 4 {
        return Line::Verbatim(raw.to_string());
    }
    Line::Entry {
        domain: fields[0].to_string(),
        kind: fields[1].to_string(),
        item: fields[2].to_string(),
        value: fields[3].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_get_set_apply_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("limits.conf");
        std::fs::write(
            &path,
            "# /etc/security/limits.conf\n@dba soft memlock 524288\n@dba hard memlock 524288\n",
        )
        .unwrap();

        let mut limits = SecLimits::parse(&path).unwrap();
        assert_eq!(limits.get("@dba", "soft", "memlock"), Some("524288"));
        assert_eq!(limits.get("@dba", "hard", "nofile"), None);

        limits.set("@dba", "soft", "memlock", "2097152");
        limits.set("@sapsys", "hard", "nofile", "65536");
        limits.apply().unwrap();

        let reread = SecLimits::parse(&path).unwrap();
        assert_eq!(reread.get("@dba", "soft", "memlock"), Some("2097152"));
        assert_eq!(reread.get("@sapsys", "hard", "nofile"), Some("65536"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# /etc/security/limits.conf\n"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");
        let limits = SecLimits::parse(&path).unwrap();
        assert_eq!(limits.get("*", "soft", "nofile"), None);
    }

    #[test]
    fn test_remove_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("limits.conf");
        std::fs::write(&path, "@dba soft memlock 524288\n").unwrap();

        let mut limits = SecLimits::parse(&path).unwrap();
        assert!(limits.remove("@dba", "soft", "memlock"));
        assert!(!limits.remove("@dba", "soft", "memlock"));
        assert_eq!(limits.get("@dba", "soft", "memlock"), None);
    }
}
