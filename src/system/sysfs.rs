//! Attribute access below /sys
//!
//! String, integer and multiple-choice attributes. Choice files list
//! all supported values on one line with the active one in brackets,
//! e.g. `always madvise [never]`.

use crate::error::{HostTuneError, IoResultExt, Result};
use std::path::{Path, PathBuf};

const SYS_ROOT: &str = "/sys";

fn sys_path(relative: &str) -> PathBuf {
    PathBuf::from(SYS_ROOT).join(relative)
}

/// Read a /sys attribute as a trimmed string
pub fn get_string(relative: &str) -> Result<String> {
    read_string(&sys_path(relative))
}

/// Read a /sys attribute as an integer
pub fn get_int(relative: &str) -> Result<i64> {
    let value = get_string(relative)?;
    value.parse().map_err(|_| HostTuneError::NotAnInteger {
        key: relative.to_string(),
        value,
    })
}

/// Read a multiple-choice /sys attribute, returning the active choice
pub fn get_choice(relative: &str) -> Result<String> {
    let line = get_string(relative)?;
    Ok(active_choice(&line))
}

/// Write a /sys attribute
pub fn set_string(relative: &str, value: &str) -> Result<()> {
    let path = sys_path(relative);
    std::fs::write(&path, value)
        .map_err(|e| HostTuneError::set_param(relative, value, e.to_string()))
}

/// Write an integer /sys attribute
pub fn set_int(relative: &str, value: i64) -> Result<()> {
    set_string(relative, &value.to_string())
}

pub(crate) fn read_string(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).with_path(path)?;
    Ok(content.trim().to_string())
}

/// Extract the bracketed entry of a choice line; a line without
/// brackets is returned whole.
pub(crate) fn active_choice(line: &str) -> String {
    for token in line.split_whitespace() {
        if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return inner.to_string();
        }
    }
    line.trim().to_string()
}
