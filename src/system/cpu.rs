//! CPU frequency and idle state settings
//!
//! Scaling governor per cpu, Intel energy/perf bias via cpupower and
//! latency-bounded cpuidle state control. Systems without the
//! respective interface report the `all:none` sentinel, which the
//! comparison layer treats as not applicable.

use super::{run_command, sysfs};
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

static CPU_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cpu\d+$").unwrap());

const CPU_BASE: &str = "/sys/devices/system/cpu";

/// Value reported when an interface is absent on this system
pub const NOT_SUPPORTED: &str = "all:none";

/// Sorted list of cpu names (cpu0, cpu1, ...)
fn cpus() -> Vec<String> {
    let mut names: Vec<String> = super::list_dir(Path::new(CPU_BASE), "cpu devices")
        .into_iter()
        .filter(|n| CPU_DIR.is_match(n))
        .collect();
    names.sort_by_key(|n| n[3..].parse::<u64>().unwrap_or(u64::MAX));
    names
}

// --- scaling governor ---

/// Current scaling governor per cpu, collapsed to a single `all` entry
/// when every cpu agrees.
pub fn get_governor() -> BTreeMap<String, String> {
    let mut govs = BTreeMap::new();
    for cpu in cpus() {
        if let Ok(gov) = sysfs::get_string(&format!(
            "devices/system/cpu/{}/cpufreq/scaling_governor",
            cpu
        )) {
            govs.insert(cpu, gov);
        }
    }
    collapse_uniform(govs)
}

fn is_valid_governor(cpu: &str, governor: &str) -> bool {
    sysfs::get_string(&format!(
        "devices/system/cpu/{}/cpufreq/scaling_available_governors",
        cpu
    ))
    .map(|line| line.split_whitespace().any(|g| g == governor))
    .unwrap_or(false)
}

/// Set scaling governors from `cpuN:governor` fields; `all:<governor>`
/// addresses every cpu. Unsupported governors are logged and skipped.
pub fn set_governor(value: &str) -> Result<()> {
    for field in value.split_whitespace() {
        let Some((target, governor)) = field.split_once(':') else {
            continue;
        };
        let targets = if target == "all" {
            cpus()
        } else {
            vec![target.to_string()]
        };
        for cpu in targets {
            if !is_valid_governor(&cpu, governor) {
                warn!("governor '{}' not supported on '{}', skipping", governor, cpu);
                continue;
            }
            sysfs::set_string(
                &format!("devices/system/cpu/{}/cpufreq/scaling_governor", cpu),
                governor,
            )?;
        }
    }
    Ok(())
}

// --- energy/perf bias ---

/// Whether the system exposes Intel's performance bias setting
pub fn supports_perf_bias() -> bool {
    match run_command("cpupower", &["info", "-b"]) {
        Ok(out) => !out.contains("not supported"),
        Err(_) => false,
    }
}

/// Current perf-bias per cpu (`cpu0:6 cpu1:6` or `all:6` when uniform),
/// or the `all:none` sentinel when unsupported.
pub fn get_perf_bias() -> String {
    let out = match run_command("cpupower", &["-c", "all", "info", "-b"]) {
        Ok(out) if !out.contains("not supported") => out,
        _ => return NOT_SUPPORTED.to_string(),
    };
    let mut values = BTreeMap::new();
    let mut current_cpu = String::new();
    for line in out.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("analyzing CPU ") {
            current_cpu = format!("cpu{}", rest.trim_end_matches(':').trim());
        } else if let Some(rest) = line.strip_prefix("perf-bias:") {
            if !current_cpu.is_empty() {
                values.insert(current_cpu.clone(), rest.trim().to_string());
            }
        }
    }
    if values.is_empty() {
        return NOT_SUPPORTED.to_string();
    }
    format_cpu_fields(&collapse_uniform(values))
}

/// Set perf-bias from `cpuN:value` fields; `all:<value>` addresses
/// every cpu in one call.
pub fn set_perf_bias(value: &str) -> Result<()> {
    for field in value.split_whitespace() {
        let Some((target, bias)) = field.split_once(':') else {
            continue;
        };
        if bias == "none" {
            continue;
        }
        if target == "all" {
            run_command("cpupower", &["set", "-b", bias])?;
        } else {
            let cpu_index = target.trim_start_matches("cpu");
            run_command("cpupower", &["-c", cpu_index, "set", "-b", bias])?;
        }
    }
    Ok(())
}

// --- force latency / cpuidle states ---

/// One cpuidle state of one cpu
#[derive(Debug, Clone)]
pub struct IdleState {
    /// State index below cpuidle/
    pub index: u32,
    /// Wakeup latency in microseconds
    pub latency: i64,
    /// Whether the state is currently disabled
    pub disabled: bool,
}

/// cpuidle states per cpu; empty when the interface is absent
pub fn idle_states() -> BTreeMap<String, Vec<IdleState>> {
    let mut map = BTreeMap::new();
    for cpu in cpus() {
        let state_dir = format!("{}/{}/cpuidle", CPU_BASE, cpu);
        let mut states = Vec::new();
        for name in super::list_dir(Path::new(&state_dir), "") {
            let Some(index) = name
                .strip_prefix("state")
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            let rel = format!("devices/system/cpu/{}/cpuidle/{}", cpu, name);
            let latency = match sysfs::get_int(&format!("{}/latency", rel)) {
                Ok(l) => l,
                Err(_) => continue,
            };
            let disabled = sysfs::get_int(&format!("{}/disable", rel))
                .map(|d| d != 0)
                .unwrap_or(false);
            states.push(IdleState {
                index,
                latency,
                disabled,
            });
        }
        states.sort_by_key(|s| s.index);
        if !states.is_empty() {
            map.insert(cpu, states);
        }
    }
    map
}

/// Current effective latency bound: the maximum wakeup latency among
/// still-enabled idle states. Returns the sentinel when the system has
/// no cpuidle interface, plus the per-cpu disable flags and a hint when
/// the flags differ between cpus.
pub fn get_force_latency() -> (String, String, String) {
    let states = idle_states();
    if states.is_empty() {
        return (NOT_SUPPORTED.to_string(), String::new(), String::new());
    }
    let max_enabled = states
        .values()
        .flatten()
        .filter(|s| !s.disabled)
        .map(|s| s.latency)
        .max();
    let value = match max_enabled {
        Some(latency) => latency.to_string(),
        None => NOT_SUPPORTED.to_string(),
    };
    let flags = format_idle_flags(&states);
    let inform = if idle_flags_differ(&states) {
        "hasDiffs".to_string()
    } else {
        String::new()
    };
    (value, flags, inform)
}

/// Serialise per-cpu disable flags as `cpu0:0-0-1 cpu1:0-0-1`
pub fn format_idle_flags(states: &BTreeMap<String, Vec<IdleState>>) -> String {
    let mut fields = Vec::new();
    for (cpu, list) in states {
        let flags: Vec<String> = list
            .iter()
            .map(|s| if s.disabled { "1".into() } else { "0".into() })
            .collect();
        fields.push(format!("{}:{}", cpu, flags.join("-")));
    }
    fields.join(" ")
}

/// Whether cpus carry different idle state disable flags
pub fn idle_flags_differ(states: &BTreeMap<String, Vec<IdleState>>) -> bool {
    let mut first: Option<Vec<bool>> = None;
    for list in states.values() {
        let flags: Vec<bool> = list.iter().map(|s| s.disabled).collect();
        match &first {
            None => first = Some(flags),
            Some(reference) => {
                if *reference != flags {
                    return true;
                }
            }
        }
    }
    false
}

/// Apply a latency bound by disabling every idle state whose wakeup
/// latency exceeds it. On revert the saved per-cpu flags are restored
/// instead; absent saved flags re-enable everything.
pub fn set_force_latency(value: &str, saved_flags: &str, revert: bool) -> Result<()> {
    let states = idle_states();
    if states.is_empty() {
        return Ok(());
    }
    if revert {
        let saved = parse_idle_flags(saved_flags);
        for (cpu, list) in &states {
            for state in list {
                let disable = saved
                    .get(cpu.as_str())
                    .and_then(|flags| flags.get(state.index as usize))
                    .copied()
                    .unwrap_or(false);
                write_disable(cpu, state.index, disable)?;
            }
        }
        return Ok(());
    }
    let bound: i64 = match value.parse() {
        Ok(b) => b,
        Err(_) => {
            warn!("force latency value '{}' is not an integer, skipping", value);
            return Ok(());
        }
    };
    for (cpu, list) in &states {
        for state in list {
            write_disable(cpu, state.index, state.latency > bound)?;
        }
    }
    Ok(())
}

fn write_disable(cpu: &str, state: u32, disable: bool) -> Result<()> {
    sysfs::set_int(
        &format!("devices/system/cpu/{}/cpuidle/state{}/disable", cpu, state),
        i64::from(disable),
    )
}

fn parse_idle_flags(flags: &str) -> BTreeMap<String, Vec<bool>> {
    let mut map = BTreeMap::new();
    for field in flags.split_whitespace() {
        if let Some((cpu, list)) = field.split_once(':') {
            map.insert(
                cpu.to_string(),
                list.split('-').map(|f| f == "1").collect(),
            );
        }
    }
    map
}

// --- helpers ---

/// Collapse a per-cpu map to `{all: value}` when every cpu agrees
fn collapse_uniform(values: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut distinct: Vec<&String> = values.values().collect();
    distinct.dedup();
    if values.len() > 1 && distinct.len() == 1 {
        let value = distinct[0].clone();
        let mut all = BTreeMap::new();
        all.insert("all".to_string(), value);
        return all;
    }
    values
}

/// Render a per-cpu map as space-separated `cpu:value` fields
pub fn format_cpu_fields(values: &BTreeMap<String, String>) -> String {
    values
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(index: u32, latency: i64, disabled: bool) -> IdleState {
        IdleState {
            index,
            latency,
            disabled,
        }
    }

    #[test]
    fn test_idle_flags_round_trip() {
        let mut states = BTreeMap::new();
        states.insert(
            "cpu0".to_string(),
            vec![state(0, 0, false), state(1, 2, false), state(2, 70, true)],
        );
        states.insert(
            "cpu1".to_string(),
            vec![state(0, 0, false), state(1, 2, false), state(2, 70, true)],
        );

        let flags = format_idle_flags(&states);
        assert_eq!(flags, "cpu0:0-0-1 cpu1:0-0-1");

        let parsed = parse_idle_flags(&flags);
        assert_eq!(parsed["cpu0"], vec![false, false, true]);
        assert!(!idle_flags_differ(&states));
    }

    #[test]
    fn test_idle_flags_differ_detection() {
        let mut states = BTreeMap::new();
        states.insert("cpu0".to_string(), vec![state(0, 0, false), state(1, 2, false)]);
        states.insert("cpu1".to_string(), vec![state(0, 0, false), state(1, 2, true)]);
        assert!(idle_flags_differ(&states));
    }

    #[test]
    fn test_collapse_uniform_values() {
        let mut values = BTreeMap::new();
        values.insert("cpu0".to_string(), "performance".to_string());
        values.insert("cpu1".to_string(), "performance".to_string());
        let collapsed = collapse_uniform(values);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed["all"], "performance");
    }

    #[test]
    fn test_mixed_values_stay_per_cpu() {
        let mut values = BTreeMap::new();
        values.insert("cpu0".to_string(), "performance".to_string());
        values.insert("cpu1".to_string(), "powersave".to_string());
        let kept = collapse_uniform(values);
        assert_eq!(kept.len(), 2);
        assert_eq!(format_cpu_fields(&kept), "cpu0:performance cpu1:powersave");
    }
}
