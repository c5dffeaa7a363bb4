//! Persisted apply state
//!
//! The state directory is the sole source of truth for reverting: per
//! parameter it records the live value captured immediately before the
//! first apply plus the target value of every note that touched the
//! parameter since. A serialised copy of each applied note's entries is
//! kept as well, so notes removed from disk still revert cleanly.

use crate::error::{HostTuneError, IoResultExt, Result};
use crate::parser::TuningEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Target value one note recorded for a parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteValue {
    /// ID of the note
    pub note_id: String,
    /// Target value the note applied
    pub value: String,
}

/// Saved state of a single parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterState {
    /// Parameter key (also encoded in the file name, lossily)
    pub key: String,
    /// Live value captured before the first apply
    pub start_value: String,
    /// Note targets in apply order
    pub note_values: Vec<NoteValue>,
    /// When the start value was captured
    pub saved_at: DateTime<Utc>,
}

/// Durable store below the state directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open a store rooted at `dir`; the directory is created lazily
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StateStore { dir: dir.into() }
    }

    fn parameter_path(&self, key: &str) -> PathBuf {
        self.dir.join("parameters").join(format!("{}.json", safe_name(key)))
    }

    fn note_path(&self, note_id: &str) -> PathBuf {
        self.dir.join("notes").join(format!("{}.json", safe_name(note_id)))
    }

    fn order_path(&self) -> PathBuf {
        self.dir.join("order.json")
    }

    fn load_parameter(&self, key: &str) -> Result<Option<ParameterState>> {
        let path = self.parameter_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).with_path(&path)?;
        let state = serde_json::from_str(&content)
            .map_err(|e| HostTuneError::state(format!("corrupt state file '{}': {}", path.display(), e)))?;
        Ok(Some(state))
    }

    fn store_parameter(&self, state: &ParameterState) -> Result<()> {
        let path = self.parameter_path(&state.key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&path, json).with_path(&path)
    }

    /// Record the pre-apply live value of a parameter. Only the first
    /// apply of a key captures it; later applies never overwrite.
    pub fn create_start_value(&self, key: &str, value: &str) -> Result<()> {
        if self.load_parameter(key)?.is_some() {
            return Ok(());
        }
        self.store_parameter(&ParameterState {
            key: key.to_string(),
            start_value: value.to_string(),
            note_values: Vec::new(),
            saved_at: Utc::now(),
        })
    }

    /// Record or replace the target value a note applied for a key
    pub fn add_note_value(&self, key: &str, value: &str, note_id: &str) -> Result<()> {
        let mut state = match self.load_parameter(key)? {
            Some(s) => s,
            None => ParameterState {
                key: key.to_string(),
                start_value: String::new(),
                note_values: Vec::new(),
                saved_at: Utc::now(),
            },
        };
        state.note_values.retain(|nv| nv.note_id != note_id);
        state.note_values.push(NoteValue {
            note_id: note_id.to_string(),
            value: value.to_string(),
        });
        self.store_parameter(&state)
    }

    /// Pre-apply start value of a key, if recorded
    pub fn start_value(&self, key: &str) -> Option<String> {
        self.load_parameter(key).ok().flatten().map(|s| s.start_value)
    }

    /// Drop a note's target for a key and return the value to restore:
    /// the most recent remaining note target, or the recorded start
    /// value once no note is left (the state file is removed then).
    /// The second field names the note the restored value belongs to,
    /// empty for a start value.
    pub fn revert_parameter(&self, key: &str, note_id: &str) -> Result<(String, String)> {
        let Some(mut state) = self.load_parameter(key)? else {
            return Ok((String::new(), String::new()));
        };
        state.note_values.retain(|nv| nv.note_id != note_id);
        match state.note_values.last() {
            Some(remaining) => {
                let result = (remaining.value.clone(), remaining.note_id.clone());
                self.store_parameter(&state)?;
                Ok(result)
            }
            None => {
                let path = self.parameter_path(key);
                std::fs::remove_file(&path).with_path(&path)?;
                Ok((state.start_value, String::new()))
            }
        }
    }

    /// Persist a parsed copy of a note's entries so the note can be
    /// reverted after its profile file disappeared from disk.
    pub fn save_note_entries(&self, note_id: &str, entries: &[TuningEntry]) -> Result<()> {
        let path = self.note_path(note_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&path, json).with_path(&path)
    }

    /// Load the persisted entries of a note, if any
    pub fn load_note_entries(&self, note_id: &str) -> Result<Option<Vec<TuningEntry>>> {
        let path = self.note_path(note_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).with_path(&path)?;
        let entries = serde_json::from_str(&content)
            .map_err(|e| HostTuneError::state(format!("corrupt note state '{}': {}", path.display(), e)))?;
        Ok(Some(entries))
    }

    /// Remove the persisted entries of a note
    pub fn remove_note_entries(&self, note_id: &str) -> Result<()> {
        let path = self.note_path(note_id);
        if path.exists() {
            std::fs::remove_file(&path).with_path(&path)?;
        }
        Ok(())
    }

    /// The ordered list of currently applied note IDs
    pub fn apply_order(&self) -> Vec<String> {
        let path = self.order_path();
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|c| serde_json::from_str(&c).ok())
            .unwrap_or_default()
    }

    fn store_order(&self, order: &[String]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_path(&self.dir)?;
        let path = self.order_path();
        let json = serde_json::to_string_pretty(order)?;
        std::fs::write(&path, json).with_path(&path)
    }

    /// Append a note to the apply order (no duplicates)
    pub fn push_apply_order(&self, note_id: &str) -> Result<()> {
        let mut order = self.apply_order();
        if !order.iter().any(|id| id == note_id) {
            order.push(note_id.to_string());
            self.store_order(&order)?;
        }
        Ok(())
    }

    /// Remove a note from the apply order
    pub fn remove_apply_order(&self, note_id: &str) -> Result<()> {
        let mut order = self.apply_order();
        let before = order.len();
        order.retain(|id| id != note_id);
        if order.len() != before {
            self.store_order(&order)?;
        }
        Ok(())
    }
}

/// Turn a parameter key into a file name; the real key lives inside
/// the JSON payload.
fn safe_name(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
