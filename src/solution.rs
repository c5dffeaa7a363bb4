//! Solution catalogue
//!
//! A solution bundles the notes of one workload under a name. The
//! definition file is the same INI dialect, one section per
//! architecture, each line mapping a solution name to a space-separated
//! list of note IDs.

use crate::error::Result;
use crate::parser::{parse_profile_file, ParseContext};
use indexmap::IndexMap;
use std::path::Path;

/// Solutions available for one architecture
#[derive(Debug, Clone, Default)]
pub struct SolutionCatalogue {
    solutions: IndexMap<String, Vec<String>>,
}

impl SolutionCatalogue {
    /// Parse the definition file and keep the section matching `arch`
    /// (e.g. `ArchX86` or `ArchPPC64LE`). A missing file yields an
    /// empty catalogue.
    pub fn collect(path: &Path, arch: &str, ctx: &ParseContext) -> Result<Self> {
        let mut solutions = IndexMap::new();
        if path.exists() {
            let profile = parse_profile_file(path, ctx)?;
            if let Some(section) = profile.key_value.get(arch) {
                for (name, entry) in section {
                    let notes: Vec<String> = entry
                        .value
                        .split_whitespace()
                        .map(str::to_string)
                        .collect();
                    solutions.insert(name.clone(), notes);
                }
            }
        }
        Ok(SolutionCatalogue { solutions })
    }

    /// Note IDs of a solution
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.solutions.get(name).map(Vec::as_slice)
    }

    /// Sorted solution names
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.solutions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether the catalogue has no solutions
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
}

/// The architecture section name for the running machine
pub fn current_arch() -> String {
    format!("Arch{}", std::env::consts::ARCH.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_solutions_for_arch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("solutions");
        std::fs::write(
            &path,
            "[ArchX86_64]\nHANA = 941735 1771258 2578899\nNETWEAVER = 941735 1771258\n\n[ArchPPC64LE]\nHANA = 941735\n",
        )
        .unwrap();

        let ctx = ParseContext::default();
        let catalogue = SolutionCatalogue::collect(&path, "ArchX86_64", &ctx).unwrap();
        assert_eq!(catalogue.sorted_names(), vec!["HANA", "NETWEAVER"]);
        assert_eq!(
            catalogue.get("HANA").unwrap(),
            &["941735".to_string(), "1771258".to_string(), "2578899".to_string()]
        );

        let ppc = SolutionCatalogue::collect(&path, "ArchPPC64LE", &ctx).unwrap();
        assert_eq!(ppc.get("HANA").unwrap().len(), 1);
        assert!(ppc.get("NETWEAVER").is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let ctx = ParseContext::default();
        let catalogue =
            SolutionCatalogue::collect(Path::new("/no/such/file"), "ArchX86_64", &ctx).unwrap();
        assert!(catalogue.is_empty());
    }
}
