//! Tuning profiles and their resolution against the live system
//!
//! A note is an INI-style tuning profile; this module resolves its
//! entries against live system state, honours per-note override files
//! and computes apply/revert targets.

pub mod compare;
pub mod sections;
mod settings;

pub use compare::{Compliance, FieldComparison};
pub use settings::{dirty_counterpart, ProfileSettings, UNTOUCHED};

use crate::parser::ParseContext;
use crate::state::StateStore;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Everything the resolution engine needs besides the profile itself.
/// All paths are injectable; production values come from `TunePaths`.
#[derive(Debug, Clone)]
pub struct TuneContext {
    /// Environment facts for section expansion during parsing
    pub parse: ParseContext,
    /// Durable apply state
    pub state: StateStore,
    /// Directory holding per-note override files
    pub override_dir: PathBuf,
    /// Security limits file the `[limits]` section edits
    pub limits_path: PathBuf,
    /// logind drop-in the `[login]` section writes
    pub logind_dropin: PathBuf,
    /// Boot command line the `[grub]` section checks
    pub cmdline_path: PathBuf,
    /// Total system memory in MB for `[mem]` and memlock sizing
    pub total_mem_mb: u64,
}

/// Catalogue of available notes, keyed by ID
#[derive(Debug, Clone, Default)]
pub struct TuningOptions {
    notes: IndexMap<String, ProfileSettings>,
}

impl TuningOptions {
    /// Collect notes from the working directory and, on conflicts, let
    /// extra (vendor-supplied) files shadow shipped ones.
    pub fn collect(note_dir: &Path, extra_dir: &Path) -> Self {
        let mut notes = IndexMap::new();
        for dir in [note_dir, extra_dir] {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let walker = walkdir::WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();
            for entry in walker.into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                let id = name
                    .strip_suffix(".conf")
                    .unwrap_or(name.as_str())
                    .to_string();
                notes.insert(id.clone(), ProfileSettings::new(id, entry.path()));
            }
        }
        TuningOptions { notes }
    }

    /// Note by ID
    pub fn get(&self, id: &str) -> Option<&ProfileSettings> {
        self.notes.get(id)
    }

    /// Sorted note IDs
    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.notes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of known notes
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Whether the catalogue is empty
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_notes_with_extra_shadowing() {
        let dir = TempDir::new().unwrap();
        let note_dir = dir.path().join("notes");
        let extra_dir = dir.path().join("extra");
        std::fs::create_dir_all(&note_dir).unwrap();
        std::fs::create_dir_all(&extra_dir).unwrap();
        std::fs::write(note_dir.join("1410736"), "[sysctl]\n").unwrap();
        std::fs::write(note_dir.join("2578899"), "[sysctl]\n").unwrap();
        std::fs::write(extra_dir.join("2578899.conf"), "[sysctl]\n").unwrap();

        let options = TuningOptions::collect(&note_dir, &extra_dir);
        assert_eq!(options.len(), 2);
        assert_eq!(options.sorted_ids(), vec!["1410736", "2578899"]);
        // the extra file shadows the shipped one
        let shadowed = options.get("2578899").unwrap();
        assert!(shadowed.conf_file_path.starts_with(&extra_dir));
    }
}
