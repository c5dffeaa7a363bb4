//! Kernel parameter access via /proc/sys
//!
//! Dotted sysctl keys map onto /proc/sys paths. Multi-value parameters
//! are read with their fields tab-separated, matching the normalised
//! form the profile parser produces.

use crate::error::{HostTuneError, IoResultExt, Result};
use std::path::PathBuf;

const PROC_SYS: &str = "/proc/sys";

/// Path of a dotted sysctl key below /proc/sys
pub fn key_path(key: &str) -> PathBuf {
    PathBuf::from(PROC_SYS).join(key.replace('.', "/"))
}

/// Read a sysctl value, fields tab-separated
pub fn get(key: &str) -> Result<String> {
    let path = key_path(key);
    let content = std::fs::read_to_string(&path).with_path(&path)?;
    Ok(content.split_whitespace().collect::<Vec<_>>().join("\t"))
}

/// Write a sysctl value; tab-separated fields are written space-separated
pub fn set(key: &str, value: &str) -> Result<()> {
    let path = key_path(key);
    std::fs::write(&path, value.replace('\t', " "))
        .map_err(|e| HostTuneError::set_param(key, value, e.to_string()))
}
