//! Profile resolution engine
//!
//! `ProfileSettings` carries one note through its lifecycle: read the
//! live system values (`initialise`), resolve overrides and compute
//! target values (`optimise`), then write targets or restore saved
//! values (`apply`). The three steps mirror the on-disk profile every
//! time; nothing is cached across CLI invocations.

use super::compare::FieldComparison;
use super::sections::{self, Section};
use super::{compare, TuneContext};
use crate::error::{collect_errors, HostTuneError, Result};
use crate::parser::{self, Operator, ProfileFile, TuningEntry};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::warn;

/// Note whose limits entries carry no domain; an override may supply
/// one, re-keying the parameter.
const NOTE_MEMLOCK_DOMAIN: &str = "1805750";

static LIMIT_SOFT_MEMLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"LIMIT_.*_soft_memlock").unwrap());
static LIMIT_HARD_MEMLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"LIMIT_.*_hard_memlock").unwrap());

/// Marker stored for parameters an override disabled
pub const UNTOUCHED: &str = "untouched";

/// State key recording the cpu idle-state flags next to force_latency
const FL_STATES_KEY: &str = "fl_states";

/// Tuning options of one note, resolved against the live system
#[derive(Debug, Clone, Default)]
pub struct ProfileSettings {
    /// Full path to the note's profile file
    pub conf_file_path: PathBuf,
    /// Note ID
    pub id: String,
    /// Descriptive name from the profile header
    pub descriptive_name: String,
    /// Parameter values: live values after `initialise`, targets after
    /// `optimise`
    pub system_params: IndexMap<String, String>,
    /// Effective operator per parameter (override may replace it)
    pub operators: HashMap<String, Operator>,
    /// Raw override values, `untouched` for disabled parameters
    pub override_params: HashMap<String, String>,
    /// Display hints per parameter (e.g. differing cpu idle states)
    pub inform: HashMap<String, String>,
    /// Parameter keys `apply` is allowed to write; the `revert` marker
    /// switches apply into restore mode
    pub values_to_apply: HashSet<String>,
    /// Serialised cpu idle-state disable flags for force_latency
    idle_flags: String,
}

impl ProfileSettings {
    /// A note rooted at its profile file
    pub fn new(id: impl Into<String>, conf_file_path: impl Into<PathBuf>) -> Self {
        ProfileSettings {
            id: id.into(),
            conf_file_path: conf_file_path.into(),
            ..Default::default()
        }
    }

    /// Descriptive name from the profile header, resolved lazily
    pub fn name(&self) -> String {
        if self.descriptive_name.is_empty() {
            parser::profile_descriptive_name(&self.conf_file_path)
        } else {
            self.descriptive_name.clone()
        }
    }

    /// Select the parameters a following `apply` may write. The single
    /// marker `revert` switches apply into restore mode for all keys.
    pub fn set_values_to_apply(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.values_to_apply = values.into_iter().collect();
        self
    }

    /// The reminder text of the note, if any
    pub fn reminder(&self) -> Option<&str> {
        self.system_params.get("reminder").map(String::as_str)
    }

    /// Profile entries, from disk or, for notes deleted after apply,
    /// from the persisted copy in the state store.
    fn load_entries(&self, ctx: &TuneContext) -> Result<Vec<TuningEntry>> {
        if self.conf_file_path.exists() {
            return Ok(parser::parse_profile_file(&self.conf_file_path, &ctx.parse)?.all_values);
        }
        match ctx.state.load_note_entries(&self.id)? {
            Some(entries) => Ok(entries),
            None => Err(HostTuneError::NotFound(self.conf_file_path.clone())),
        }
    }

    fn load_override(&self, ctx: &TuneContext) -> Option<ProfileFile> {
        let path = ctx.override_dir.join(&self.id);
        if !path.exists() {
            return None;
        }
        parser::parse_profile_file(&path, &ctx.parse).ok()
    }

    /// The note ships memlock limits without a domain; when an override
    /// provides one, the parameter is re-keyed to the override's key
    /// and value at every stage.
    fn rekey_memlock<'a>(
        &self,
        entry: &TuningEntry,
        overrides: impl Iterator<Item = (&'a String, &'a String)>,
    ) -> Option<(String, String)> {
        if self.id != NOTE_MEMLOCK_DOMAIN {
            return None;
        }
        for (owkey, owval) in overrides {
            let soft = LIMIT_SOFT_MEMLOCK.is_match(&entry.key) && LIMIT_SOFT_MEMLOCK.is_match(owkey);
            let hard = LIMIT_HARD_MEMLOCK.is_match(&entry.key) && LIMIT_HARD_MEMLOCK.is_match(owkey);
            if soft || hard {
                return Some((owkey.clone(), owval.clone()));
            }
        }
        None
    }

    /// Read the current parameter values from the system.
    ///
    /// With `record_state` the pre-apply values are captured into the
    /// state store; a pure verify or simulate run passes `false`.
    pub fn initialise(mut self, ctx: &TuneContext, record_state: bool) -> Result<Self> {
        let entries = self.load_entries(ctx)?;
        let override_file = self.load_override(ctx);

        self.system_params.clear();
        self.override_params.clear();
        self.operators.clear();
        self.inform.clear();

        for entry in entries {
            let mut key = entry.key.clone();
            let mut value = entry.value.clone();
            let mut operator = entry.operator;

            if let Some(ow) = &override_file {
                if let Some(section_map) = ow.key_value.get(&entry.section) {
                    if let Some((owkey, owval)) = self.rekey_memlock(
                        &entry,
                        section_map.iter().map(|(k, e)| (k, &e.value)),
                    ) {
                        key = owkey;
                        value = owval;
                    }
                    // service overrides may omit the .service suffix
                    let chk_key = if entry.section == "service" {
                        let short = key.trim_end_matches(".service");
                        if section_map.contains_key(short) {
                            short.to_string()
                        } else {
                            key.clone()
                        }
                    } else {
                        key.clone()
                    };
                    match section_map.get(&chk_key) {
                        Some(ow_entry) if ow_entry.value.is_empty() => {
                            if entry.section != "pagecache" {
                                self.override_params.insert(key.clone(), UNTOUCHED.to_string());
                            }
                        }
                        Some(ow_entry) => {
                            self.override_params.insert(key.clone(), ow_entry.value.clone());
                            if ow_entry.operator != operator {
                                operator = ow_entry.operator;
                            }
                        }
                        None if entry.section == "limits" => {
                            // an override limits section without this key
                            // disables the whole line
                            self.override_params.insert(key.clone(), UNTOUCHED.to_string());
                        }
                        None => {}
                    }
                }
            }

            let Some(section) = Section::parse(&entry.section) else {
                warn!(
                    "tuning option '{}': skip unknown section '{}'",
                    self.conf_file_path.display(),
                    entry.section
                );
                continue;
            };

            let current = match section {
                Section::Sysctl => crate::system::sysctl::get(&key).unwrap_or_default(),
                Section::Vm => sections::get_vm_val(&key),
                Section::Block => sections::get_blk_val(&key).unwrap_or_default(),
                Section::Limits => {
                    sections::get_limits_val(&value, &ctx.limits_path).unwrap_or_default()
                }
                Section::Service => sections::get_service_val(&key),
                Section::Login => {
                    sections::get_login_val(&key, &ctx.logind_dropin).unwrap_or_default()
                }
                Section::Mem => sections::get_mem_val(&key),
                Section::Cpu => {
                    let (val, flags, inform) = sections::get_cpu_val(&key);
                    self.idle_flags = flags;
                    if !inform.is_empty() {
                        self.inform.insert(key.clone(), inform);
                    }
                    val
                }
                Section::Pagecache => sections::get_pagecache_val(&key),
                Section::Rpm => sections::get_rpm_val(&key),
                Section::Grub => sections::get_grub_val(&key, &ctx.cmdline_path),
                Section::Reminder => value.clone(),
            };

            self.operators.insert(key.clone(), operator);
            self.system_params.insert(key.clone(), current.clone());

            if section.is_verify_only() {
                continue;
            }
            if record_state && !current.is_empty() {
                ctx.state.create_start_value(&key, &current)?;
                if key == "force_latency" {
                    ctx.state.create_start_value(FL_STATES_KEY, &self.idle_flags)?;
                }
            }
        }
        Ok(self)
    }

    /// Compute the target value for every parameter from the profile,
    /// with overrides resolved. Must run on an initialised settings
    /// value: targets merge into the live field layout.
    pub fn optimise(mut self, ctx: &TuneContext, record_state: bool) -> Result<Self> {
        let entries = self.load_entries(ctx)?;

        // effective [mem] percentage and pagecache enablement feed
        // sibling keys of their sections
        let tmpfs_percent = self.effective_value(&entries, "VSZ_TMPFS_PERCENT");
        let pagecache_enabled = self
            .effective_value(&entries, "ENABLE_PAGECACHE_LIMIT")
            .to_lowercase()
            == "yes";

        for entry in entries {
            let mut key = entry.key.clone();
            let mut value = entry.value.clone();

            if let Some((owkey, owval)) =
                self.rekey_memlock(&entry, self.override_params.iter())
            {
                key = owkey;
                value = owval;
            }
            match self.override_params.get(&key).map(String::as_str) {
                Some(UNTOUCHED) => continue,
                Some(ow_value) => value = ow_value.to_string(),
                None => {}
            }

            let Some(section) = Section::parse(&entry.section) else {
                continue;
            };
            let operator = *self.operators.get(&key).unwrap_or(&entry.operator);
            let current = self.system_params.get(&key).cloned().unwrap_or_default();

            let target = match section {
                Section::Sysctl => sections::opt_sysctl_val(operator, &key, &current, &value),
                Section::Vm => sections::opt_vm_val(&key, &value),
                Section::Block => sections::opt_blk_val(&key, &value),
                Section::Limits => {
                    sections::opt_limits_val(&current, &value, ctx.total_mem_mb * 1024)
                }
                Section::Service => sections::opt_service_val(&key, &value),
                Section::Login => sections::opt_login_val(&value),
                Section::Mem => sections::opt_mem_val(
                    &key,
                    &current,
                    &value,
                    &tmpfs_percent,
                    ctx.total_mem_mb,
                ),
                Section::Cpu => sections::opt_cpu_val(&key, &current, &value),
                Section::Pagecache => {
                    sections::opt_pagecache_val(&key, &value, pagecache_enabled)
                }
                Section::Rpm | Section::Grub => value.clone(),
                Section::Reminder => value.clone(),
            };

            self.system_params.insert(key.clone(), target.clone());

            if section.is_verify_only() {
                continue;
            }
            if record_state && !target.is_empty() {
                ctx.state.add_note_value(&key, &target, &self.id)?;
            }
        }
        Ok(self)
    }

    /// The configured value of a key with its override applied, for
    /// keys whose value feeds the optimisation of sibling keys.
    fn effective_value(&self, entries: &[TuningEntry], key: &str) -> String {
        match self.override_params.get(key).map(String::as_str) {
            Some(UNTOUCHED) | None => entries
                .iter()
                .find(|e| e.key == key)
                .map(|e| e.value.clone())
                .unwrap_or_default(),
            Some(ow) => ow.to_string(),
        }
    }

    /// Write target values to the system, or restore saved values when
    /// the `revert` marker is set. Every parameter is attempted; all
    /// failures are surfaced jointly.
    pub fn apply(mut self, ctx: &TuneContext) -> Result<()> {
        if self.values_to_apply.is_empty() {
            return Ok(());
        }
        let revert = self.values_to_apply.contains("revert");
        let entries = self.load_entries(ctx)?;
        let mut results: Vec<Result<()>> = Vec::new();

        for entry in entries {
            let mut key = entry.key.clone();

            if let Some((owkey, _)) = self.rekey_memlock(&entry, self.override_params.iter()) {
                key = owkey;
            }

            let Some(section) = Section::parse(&entry.section) else {
                continue;
            };
            // rpm, grub and reminder values are only checked, never set
            if section.is_verify_only() {
                continue;
            }
            if !revert && !self.values_to_apply.contains(&key) {
                continue;
            }
            if self.override_params.get(&key).map(String::as_str) == Some(UNTOUCHED) {
                continue;
            }

            if revert && !self.system_params.get(&key).map(String::is_empty).unwrap_or(true) {
                let (saved, _owner) = ctx.state.revert_parameter(&key, &self.id)?;
                if !saved.is_empty() {
                    self.system_params.insert(key.clone(), saved);
                }
                if key == "force_latency" {
                    let (flags, _) = ctx.state.revert_parameter(FL_STATES_KEY, &self.id)?;
                    self.idle_flags = flags;
                }
            }

            let value = self.system_params.get(&key).cloned().unwrap_or_default();
            let result = match section {
                Section::Sysctl => {
                    let (write_key, write_value) =
                        revert_sysctl_choice(&key, &value, &self.system_params, revert);
                    crate::system::sysctl::set(&write_key, &write_value)
                }
                Section::Vm => sections::set_vm_val(&key, &value),
                Section::Block => sections::set_blk_val(&key, &value),
                Section::Limits => sections::set_limits_val(&key, &value, &ctx.limits_path, revert),
                Section::Service => sections::set_service_val(&key, &value),
                Section::Login => {
                    sections::set_login_val(&key, &value, &ctx.logind_dropin, revert)
                }
                Section::Mem => sections::set_mem_val(&key, &value),
                Section::Cpu => sections::set_cpu_val(&key, &value, &self.idle_flags, revert),
                Section::Pagecache => sections::set_pagecache_val(&key, &value),
                Section::Rpm | Section::Grub | Section::Reminder => Ok(()),
            };
            results.push(result);
        }
        collect_errors(results)
    }

    /// Compare the live values of an initialised settings value against
    /// the targets of an optimised one, key by key in parse order.
    pub fn compare_to(&self, optimised: &ProfileSettings) -> Vec<FieldComparison> {
        let mut comparisons = Vec::new();
        for (key, expected) in &optimised.system_params {
            if key == "reminder" {
                continue;
            }
            let actual = self.system_params.get(key).cloned().unwrap_or_default();
            let operator = *optimised.operators.get(key).unwrap_or(&Operator::Equal);
            let override_value = optimised
                .override_params
                .get(key)
                .cloned()
                .unwrap_or_default();
            comparisons.push(compare::compare_entry(
                key,
                operator,
                &actual,
                expected,
                &override_value,
            ));
        }
        comparisons
    }
}

/// For the mutually exclusive `vm.dirty_*` byte/ratio pairs the kernel
/// zeroes the counterpart on write. On revert, when the counterpart's
/// saved value is nonzero, the counterpart is restored instead of the
/// primary key.
pub fn dirty_counterpart(key: &str) -> Option<&'static str> {
    match key {
        "vm.dirty_background_bytes" => Some("vm.dirty_background_ratio"),
        "vm.dirty_bytes" => Some("vm.dirty_ratio"),
        "vm.dirty_background_ratio" => Some("vm.dirty_background_bytes"),
        "vm.dirty_ratio" => Some("vm.dirty_bytes"),
        _ => None,
    }
}

/// Decide which sysctl key/value pair a write should target, honouring
/// the dirty counterpart swap on revert.
fn revert_sysctl_choice(
    key: &str,
    value: &str,
    params: &IndexMap<String, String>,
    revert: bool,
) -> (String, String) {
    if revert {
        if let Some(cpart) = dirty_counterpart(key) {
            if let Some(cpart_value) = params.get(cpart) {
                if cpart_value != "0" && !cpart_value.is_empty() {
                    return (cpart.to_string(), cpart_value.clone());
                }
            }
        }
    }
    (key.to_string(), value.to_string())
}
