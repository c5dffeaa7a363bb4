//! Sysconfig-style key=value files
//!
//! The runtime configuration (enabled notes, enabled solutions, apply
//! order) lives in a shell-sourceable `KEY="value"` file. Comments and
//! line order are preserved across a load/modify/save round trip.

use crate::error::{HostTuneError, IoResultExt, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Line {
    Verbatim(String),
    Entry { key: String, value: String },
}

/// A parsed sysconfig file
#[derive(Debug, Clone)]
pub struct Sysconfig {
    path: PathBuf,
    lines: Vec<Line>,
}

impl Sysconfig {
    /// Parse a sysconfig file. With `auto_create`, a missing file yields
    /// an empty configuration instead of an error.
    pub fn parse_file(path: &Path, auto_create: bool) -> Result<Self> {
        if !path.exists() {
            if auto_create {
                return Ok(Sysconfig {
                    path: path.to_path_buf(),
                    lines: Vec::new(),
                });
            }
            return Err(HostTuneError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).with_path(path)?;
        Ok(Sysconfig {
            path: path.to_path_buf(),
            lines: content.lines().map(parse_line).collect(),
        })
    }

    /// Get a value, falling back to a default when the key is absent
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.lines
            .iter()
            .rev()
            .find_map(|l| match l {
                Line::Entry { key: k, value } if k == key => Some(value.clone()),
                _ => None,
            })
            .unwrap_or_else(|| default.to_string())
    }

    /// Get a whitespace-separated list value
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get_string(key, "")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Set a value, replacing an existing entry or appending a new one
    pub fn set_string(&mut self, key: &str, value: &str) {
        for line in self.lines.iter_mut() {
            if let Line::Entry { key: k, value: v } = line {
                if k == key {
                    *v = value.to_string();
                    return;
                }
            }
        }
        self.lines.push(Line::Entry {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Set a list value, joined by single spaces
    pub fn set_string_list(&mut self, key: &str, values: &[String]) {
        self.set_string(key, &values.join(" "));
    }

    /// Write the file back, preserving comments and order
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Verbatim(text) => out.push_str(text),
                Line::Entry { key, value } => {
                    out.push_str(&format!("{}=\"{}\"", key, value));
                }
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
    match trimmed.split_once('=') {
        Some((key, value)) => Line::Entry {
            key: key.trim().to_string(),
            value: value.trim().trim_matches('"').to_string(),
        },
        None => Line::Verbatim(raw.to_string()),
    }
}
