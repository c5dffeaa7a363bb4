//! Application layer
//!
//! `TuneApp` owns the note and solution catalogues, the runtime
//! configuration and the saved state, and drives the
//! initialise/optimise/apply cycle for every CLI action.

use crate::config::TunePaths;
use crate::error::{HostTuneError, Result};
use crate::parser::{self, ParseContext, Sysconfig};
use crate::profile::{FieldComparison, ProfileSettings, TuneContext, TuningOptions};
use crate::solution::{current_arch, SolutionCatalogue};
use crate::state::StateStore;
use tracing::info;

const CONF_NOTES: &str = "TUNE_FOR_NOTES";
const CONF_SOLUTIONS: &str = "TUNE_FOR_SOLUTIONS";

/// Comparison result of one note against the live system
#[derive(Debug, Clone)]
pub struct NoteComparison {
    /// Note ID
    pub id: String,
    /// Descriptive name from the profile header
    pub name: String,
    /// Profile version from the header
    pub version: String,
    /// Per-parameter rows
    pub comparisons: Vec<FieldComparison>,
    /// Reminder text for the operator, if the note carries one
    pub reminder: Option<String>,
}

impl NoteComparison {
    /// A note is satisfied when no parameter row reports `no`
    pub fn is_compliant(&self) -> bool {
        !self.comparisons.iter().any(|c| c.counts_as_failure())
    }
}

/// The tuning application
pub struct TuneApp {
    /// File system locations
    pub paths: TunePaths,
    ctx: TuneContext,
    /// Available notes
    pub all_notes: TuningOptions,
    /// Available solutions for this architecture
    pub all_solutions: SolutionCatalogue,
    /// Notes enabled in the configuration
    pub tune_for_notes: Vec<String>,
    /// Solutions enabled in the configuration
    pub tune_for_solutions: Vec<String>,
}

impl TuneApp {
    /// Launch against the production paths, collecting environment
    /// facts from the running system.
    pub fn launch(paths: TunePaths) -> Result<Self> {
        let ctx = TuneContext {
            parse: ParseContext::from_system(),
            state: StateStore::new(&paths.state_dir),
            override_dir: paths.override_dir.clone(),
            limits_path: paths.limits_file.clone(),
            logind_dropin: paths.logind_dropin.clone(),
            cmdline_path: paths.cmdline_file.clone(),
            total_mem_mb: crate::system::mounts::total_mem_mb(),
        };
        Self::launch_with_context(paths, ctx)
    }

    /// Launch with an explicit context (tests inject temp paths here)
    pub fn launch_with_context(paths: TunePaths, ctx: TuneContext) -> Result<Self> {
        let all_notes = TuningOptions::collect(&paths.note_dir, &paths.extra_dir);
        let all_solutions =
            SolutionCatalogue::collect(&paths.solution_file, &current_arch(), &ctx.parse)?;
        let conf = Sysconfig::parse_file(&paths.config_file, true)?;
        Ok(TuneApp {
            tune_for_notes: conf.get_string_list(CONF_NOTES),
            tune_for_solutions: conf.get_string_list(CONF_SOLUTIONS),
            paths,
            ctx,
            all_notes,
            all_solutions,
        })
    }

    /// The resolution context in use
    pub fn context(&self) -> &TuneContext {
        &self.ctx
    }

    fn save_config(&self) -> Result<()> {
        let mut conf = Sysconfig::parse_file(&self.paths.config_file, true)?;
        conf.set_string_list(CONF_NOTES, &self.tune_for_notes);
        conf.set_string_list(CONF_SOLUTIONS, &self.tune_for_solutions);
        conf.save()
    }

    /// Note by ID. Notes no longer present in any catalogue still
    /// resolve when the state store holds their entries, so they can
    /// be reverted.
    pub fn note_by_id(&self, id: &str) -> Result<ProfileSettings> {
        if let Some(settings) = self.all_notes.get(id) {
            return Ok(settings.clone());
        }
        if self.ctx.state.load_note_entries(id)?.is_some() {
            return Ok(ProfileSettings::new(id, self.paths.note_dir.join(id)));
        }
        Err(HostTuneError::UnknownNote(id.to_string()))
    }

    /// Currently applied note IDs, in apply order
    pub fn applied_notes(&self) -> Vec<String> {
        self.ctx.state.apply_order()
    }

    fn resolve(&self, id: &str, record_state: bool) -> Result<(ProfileSettings, ProfileSettings)> {
        let settings = self.note_by_id(id)?;
        let initial = settings.initialise(&self.ctx, record_state)?;
        let optimised = initial.clone().optimise(&self.ctx, record_state)?;
        Ok((initial, optimised))
    }

    fn build_comparison(
        &self,
        id: &str,
        initial: &ProfileSettings,
        optimised: &ProfileSettings,
    ) -> NoteComparison {
        NoteComparison {
            id: id.to_string(),
            name: optimised.name(),
            version: parser::profile_header_entry(&optimised.conf_file_path, "version"),
            comparisons: initial.compare_to(optimised),
            reminder: optimised.reminder().map(str::to_string),
        }
    }

    /// Verify one note without touching the system or the state store
    pub fn verify_note(&self, id: &str) -> Result<NoteComparison> {
        let (initial, optimised) = self.resolve(id, false)?;
        Ok(self.build_comparison(id, &initial, &optimised))
    }

    /// Verify every applied note; returns the IDs of unsatisfied notes
    /// alongside all comparison rows.
    pub fn verify_all(&self) -> Result<(Vec<String>, Vec<NoteComparison>)> {
        let mut unsatisfied = Vec::new();
        let mut comparisons = Vec::new();
        for id in self.applied_notes() {
            let comparison = self.verify_note(&id)?;
            if !comparison.is_compliant() {
                unsatisfied.push(id);
            }
            comparisons.push(comparison);
        }
        Ok((unsatisfied, comparisons))
    }

    /// Show the expected changes of a note without applying anything
    pub fn simulate_note(&self, id: &str) -> Result<NoteComparison> {
        let (initial, optimised) = self.resolve(id, false)?;
        Ok(self.build_comparison(id, &initial, &optimised))
    }

    /// Apply a note: read current values, compute targets and write
    /// every non-compliant parameter. The pre-apply values land in the
    /// state store first.
    pub fn tune_note(&mut self, id: &str) -> Result<()> {
        let (initial, optimised) = self.resolve(id, true)?;

        // keep a copy of the entries so the note reverts even after
        // its profile file disappears from disk
        if optimised.conf_file_path.exists() {
            let entries =
                parser::parse_profile_file(&optimised.conf_file_path, &self.ctx.parse)?.all_values;
            self.ctx.state.save_note_entries(id, &entries)?;
        }

        let to_apply: Vec<String> = initial
            .compare_to(&optimised)
            .into_iter()
            .filter(|c| c.counts_as_failure())
            .map(|c| c.parameter)
            .collect();
        if to_apply.is_empty() {
            info!("note {} is already compliant, nothing to apply", id);
        } else {
            optimised.set_values_to_apply(to_apply).apply(&self.ctx)?;
        }

        self.ctx.state.push_apply_order(id)?;
        if !self.tune_for_notes.iter().any(|n| n == id) {
            self.tune_for_notes.push(id.to_string());
        }
        self.save_config()
    }

    /// Revert a note, restoring the values recorded before its apply
    pub fn revert_note(&mut self, id: &str) -> Result<()> {
        let (_, optimised) = self.resolve(id, false)?;
        optimised
            .set_values_to_apply(["revert".to_string()])
            .apply(&self.ctx)?;

        self.ctx.state.remove_note_entries(id)?;
        self.ctx.state.remove_apply_order(id)?;
        self.tune_for_notes.retain(|n| n != id);
        self.save_config()
    }

    /// Note IDs a solution consists of
    pub fn solution_notes(&self, name: &str) -> Result<Vec<String>> {
        self.all_solutions
            .get(name)
            .map(<[String]>::to_vec)
            .ok_or_else(|| HostTuneError::UnknownSolution(name.to_string()))
    }

    /// Apply every note of a solution in definition order, skipping
    /// notes that are already applied.
    pub fn tune_solution(&mut self, name: &str) -> Result<Vec<String>> {
        let notes = self.solution_notes(name)?;
        let applied = self.applied_notes();
        let mut newly_applied = Vec::new();
        for id in &notes {
            if applied.iter().any(|a| a == id) {
                continue;
            }
            self.tune_note(id)?;
            newly_applied.push(id.clone());
        }
        if !self.tune_for_solutions.iter().any(|s| s == name) {
            self.tune_for_solutions.push(name.to_string());
            self.save_config()?;
        }
        Ok(newly_applied)
    }

    /// Revert every note of a solution, last applied first
    pub fn revert_solution(&mut self, name: &str) -> Result<()> {
        let notes = self.solution_notes(name)?;
        for id in notes.iter().rev() {
            if self.applied_notes().iter().any(|a| a == id) {
                self.revert_note(id)?;
            }
        }
        self.tune_for_solutions.retain(|s| s != name);
        self.save_config()
    }

    /// Revert everything, newest apply first. Driven purely by the
    /// state store, so notes whose profile files are gone revert too.
    pub fn revert_all(&mut self) -> Result<()> {
        let mut order = self.applied_notes();
        order.reverse();
        for id in order {
            self.revert_note(&id)?;
        }
        self.tune_for_solutions.clear();
        self.save_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_app(root: &TempDir) -> TuneApp {
        let paths = TunePaths::with_root(root.path());
        std::fs::create_dir_all(&paths.note_dir).unwrap();
        std::fs::create_dir_all(&paths.extra_dir).unwrap();
        std::fs::create_dir_all(&paths.override_dir).unwrap();
        std::fs::create_dir_all(paths.cmdline_file.parent().unwrap()).unwrap();
        std::fs::write(&paths.cmdline_file, "root=/dev/sda2 quiet\n").unwrap();

        let ctx = TuneContext {
            parse: ParseContext {
                os_version: "15.4".to_string(),
                block_devices: Vec::new(),
            },
            state: StateStore::new(&paths.state_dir),
            override_dir: paths.override_dir.clone(),
            limits_path: paths.limits_file.clone(),
            logind_dropin: paths.logind_dropin.clone(),
            cmdline_path: paths.cmdline_file.clone(),
            total_mem_mb: 4096,
        };
        TuneApp::launch_with_context(paths, ctx).unwrap()
    }

    fn write_note(app: &TuneApp, id: &str, content: &str) {
        std::fs::write(app.paths.note_dir.join(id), content).unwrap();
    }

    fn reload(app: TuneApp) -> TuneApp {
        let paths = app.paths.clone();
        let ctx = app.ctx.clone();
        TuneApp::launch_with_context(paths, ctx).unwrap()
    }

    #[test]
    fn test_tune_and_revert_note_round_trip() {
        let root = TempDir::new().unwrap();
        let mut app = test_app(&root);
        std::fs::create_dir_all(app.paths.limits_file.parent().unwrap()).unwrap();
        std::fs::write(&app.paths.limits_file, "@sapsys soft memlock 524288\n").unwrap();
        write_note(&app, "900929", "[limits]\nLIMITS = @sapsys soft memlock 2097152\n");
        let mut app = reload(app);

        app.tune_note("900929").unwrap();
        assert_eq!(app.applied_notes(), vec!["900929"]);
        assert_eq!(app.tune_for_notes, vec!["900929"]);
        let content = std::fs::read_to_string(&app.paths.limits_file).unwrap();
        assert!(content.contains("2097152"));

        app.revert_note("900929").unwrap();
        assert!(app.applied_notes().is_empty());
        assert!(app.tune_for_notes.is_empty());
        let content = std::fs::read_to_string(&app.paths.limits_file).unwrap();
        assert!(content.contains("524288"));
    }

    #[test]
    fn test_verify_reports_unsatisfied_note() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);
        write_note(&app, "grubnote", "[grub]\nnuma_balancing=disable\n");
        let app = reload(app);

        let comparison = app.verify_note("grubnote").unwrap();
        assert!(!comparison.is_compliant());
        assert_eq!(comparison.comparisons.len(), 1);
        assert_eq!(comparison.comparisons[0].expected, "disable");
    }

    #[test]
    fn test_unknown_note_is_an_error() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);
        match app.verify_note("nope") {
            Err(HostTuneError::UnknownNote(id)) => assert_eq!(id, "nope"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_solution_apply_and_revert() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);
        std::fs::create_dir_all(app.paths.limits_file.parent().unwrap()).unwrap();
        std::fs::write(&app.paths.limits_file, "@sapsys soft memlock 524288\n").unwrap();
        write_note(&app, "900929", "[limits]\nLIMITS = @sapsys soft memlock 2097152\n");
        write_note(&app, "910930", "[limits]\nLIMITS = @sapsys hard memlock 2097152\n");
        std::fs::create_dir_all(app.paths.solution_file.parent().unwrap()).unwrap();
        std::fs::write(
            &app.paths.solution_file,
            format!("[{}]\nTEST = 900929 910930\n", current_arch()),
        )
        .unwrap();
        let mut app = reload(app);

        let applied = app.tune_solution("TEST").unwrap();
        assert_eq!(applied, vec!["900929", "910930"]);
        assert_eq!(app.applied_notes(), vec!["900929", "910930"]);
        assert_eq!(app.tune_for_solutions, vec!["TEST"]);

        app.revert_solution("TEST").unwrap();
        assert!(app.applied_notes().is_empty());
        assert!(app.tune_for_solutions.is_empty());
    }

    #[test]
    fn test_revert_all_handles_deleted_note_files() {
        let root = TempDir::new().unwrap();
        let app = test_app(&root);
        std::fs::create_dir_all(app.paths.limits_file.parent().unwrap()).unwrap();
        std::fs::write(&app.paths.limits_file, "@sapsys soft memlock 524288\n").unwrap();
        write_note(&app, "900929", "[limits]\nLIMITS = @sapsys soft memlock 2097152\n");
        let mut app = reload(app);

        app.tune_note("900929").unwrap();
        std::fs::remove_file(app.paths.note_dir.join("900929")).unwrap();
        let mut app = reload(app);

        app.revert_all().unwrap();
        assert!(app.applied_notes().is_empty());
        let content = std::fs::read_to_string(&app.paths.limits_file).unwrap();
        assert!(content.contains("524288"));
    }
}
