//! Per-section parameter handling
//!
//! Each profile section maps its keys onto a fixed getter, optimiser
//! and setter over the OS accessors in `crate::system`. The optimisers
//! are pure: environment facts (total memory, current values) come in
//! as arguments.

use crate::error::Result;
use crate::system::{self, block, cpu, limits::SecLimits, mounts, service, sysctl, sysfs};
use std::path::Path;
use tracing::warn;

/// Profile sections the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Sysctl,
    Vm,
    Block,
    Limits,
    Service,
    Login,
    Mem,
    Cpu,
    Pagecache,
    Rpm,
    Grub,
    Reminder,
}

impl Section {
    /// Parse a section header name; unknown names yield `None` and are
    /// logged and skipped by the caller.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sysctl" => Some(Section::Sysctl),
            "vm" => Some(Section::Vm),
            "block" => Some(Section::Block),
            "limits" => Some(Section::Limits),
            "service" => Some(Section::Service),
            "login" => Some(Section::Login),
            "mem" => Some(Section::Mem),
            "cpu" => Some(Section::Cpu),
            "pagecache" => Some(Section::Pagecache),
            "rpm" => Some(Section::Rpm),
            "grub" => Some(Section::Grub),
            "reminder" => Some(Section::Reminder),
            _ => None,
        }
    }

    /// Sections that are only checked, never written or reverted
    pub fn is_verify_only(&self) -> bool {
        matches!(self, Section::Rpm | Section::Grub | Section::Reminder)
    }
}

// --- [sysctl] target merging ---

/// Merge a configured sysctl value into the live field layout.
///
/// With equal field counts every field is replaced by its configured
/// counterpart. A single configured bound under an inequality replaces
/// only the first live field (`<`/`<=`) or the last (`>`/`>=`). A
/// field count mismatch under `=` or with a multi-field config is a
/// profile mistake and yields an empty target.
pub fn opt_sysctl_val(operator: crate::parser::Operator, key: &str, actval: &str, cfgval: &str) -> String {
    use crate::parser::Operator;

    let act: Vec<&str> = actval.split_whitespace().collect();
    let cfg: Vec<&str> = cfgval.split_whitespace().collect();

    if cfg.is_empty() {
        return String::new();
    }
    if act.len() != cfg.len() && (operator == Operator::Equal || cfg.len() > 1) {
        warn!("wrong number of fields given in the config file for parameter '{}'", key);
        return String::new();
    }

    let mut target = Vec::with_capacity(act.len());
    for (k, field_act) in act.iter().enumerate() {
        let field = if act.len() != cfg.len() {
            let replace_first = matches!(operator, Operator::LessThan | Operator::LessThanEqual) && k == 0;
            let replace_last = matches!(operator, Operator::MoreThan | Operator::MoreThanEqual)
                && k == act.len() - 1;
            if replace_first || replace_last {
                cfg[0]
            } else {
                field_act
            }
        } else {
            cfg[k]
        };
        target.push(field);
    }
    if target.is_empty() {
        // no live value yet, the configured bound becomes the target
        return cfg.join("\t");
    }
    target.join("\t")
}

// --- [vm] /sys/kernel/mm switches ---

const SYS_THP: &str = "kernel/mm/transparent_hugepage/enabled";
const SYS_KSM: &str = "kernel/mm/ksm/run";

/// Current value of a kernel/mm switch
pub fn get_vm_val(key: &str) -> String {
    match key {
        "THP" => sysfs::get_choice(SYS_THP).unwrap_or_default(),
        "KSM" => sysfs::get_int(SYS_KSM)
            .map(|v| v.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Validated target for a kernel/mm switch
pub fn opt_vm_val(key: &str, cfgval: &str) -> String {
    let val = cfgval.to_lowercase();
    match key {
        "THP" => {
            if val != "always" && val != "madvise" && val != "never" {
                warn!("wrong selection for THP, setting 'never' to disable transparent huge pages");
                return "never".to_string();
            }
            val
        }
        "KSM" => {
            if val != "0" && val != "1" {
                warn!("wrong selection for KSM, setting default '0'");
                return "0".to_string();
            }
            val
        }
        _ => val,
    }
}

/// Write a kernel/mm switch
pub fn set_vm_val(key: &str, value: &str) -> Result<()> {
    match key {
        "THP" => sysfs::set_string(SYS_THP, value),
        "KSM" => sysfs::set_int(SYS_KSM, value.parse().unwrap_or(0)),
        _ => Ok(()),
    }
}

// --- [block] per-device queue attributes ---

/// Split a synthetic block key into attribute and device name
fn split_block_key(key: &str) -> Option<(&str, &str)> {
    for attr in ["IO_SCHEDULER", "NRREQ"] {
        if let Some(rest) = key.strip_prefix(attr) {
            if let Some(bdev) = rest.strip_prefix('_') {
                return Some((attr, bdev));
            }
        }
    }
    None
}

/// Current queue attribute of one block device
pub fn get_blk_val(key: &str) -> Result<String> {
    let Some((attr, bdev)) = split_block_key(key) else {
        return Ok(String::new());
    };
    match attr {
        "IO_SCHEDULER" => block::get_scheduler(bdev),
        "NRREQ" => block::get_nr_requests(bdev).map(|v| v.to_string()),
        _ => Ok(String::new()),
    }
}

/// Target queue attribute; a nr_requests of 0 selects the default
pub fn opt_blk_val(key: &str, cfgval: &str) -> String {
    let Some((attr, _)) = split_block_key(key) else {
        return cfgval.to_string();
    };
    match attr {
        "IO_SCHEDULER" => cfgval.to_lowercase(),
        "NRREQ" => {
            if cfgval == "0" {
                "1024".to_string()
            } else {
                cfgval.to_string()
            }
        }
        _ => cfgval.to_string(),
    }
}

/// Write a queue attribute, skipping unsupported schedulers
pub fn set_blk_val(key: &str, value: &str) -> Result<()> {
    let Some((attr, bdev)) = split_block_key(key) else {
        return Ok(());
    };
    match attr {
        "IO_SCHEDULER" => {
            if block::is_valid_scheduler(bdev, value) {
                block::set_scheduler(bdev, value)?;
            }
            Ok(())
        }
        "NRREQ" => block::set_nr_requests(bdev, value.parse().unwrap_or(0)),
        _ => Ok(()),
    }
}

// --- [limits] security limits tuples ---

/// Current limit for a configured `domain type item value` tuple,
/// rendered as the same tuple with the live value (empty when unset).
pub fn get_limits_val(cfgval: &str, limits_path: &Path) -> Result<String> {
    let fields: Vec<&str> = cfgval.split_whitespace().collect();
    if fields.len() < 3 {
        return Ok("NA".to_string());
    }
    let sec_limits = SecLimits::parse(limits_path)?;
    let current = sec_limits.get(fields[0], fields[1], fields[2]).unwrap_or("");
    Ok(format!("{} {} {} {}", fields[0], fields[1], fields[2], current).trim_end().to_string())
}

/// Target limit tuple. An already-unlimited live value is kept; a
/// configured memlock of 0 means "RAM minus 10%", never lowering an
/// already higher live bound.
pub fn opt_limits_val(actval: &str, cfgval: &str, ram_kb: u64) -> String {
    let cfg: Vec<&str> = cfgval.split_whitespace().collect();
    if cfg.len() < 4 {
        return cfgval.to_string();
    }
    let (domain, kind, item, cfg_value) = (cfg[0], cfg[1], cfg[2], cfg[3]);
    let current = actval.split_whitespace().nth(3).unwrap_or("");

    let target = match current {
        "unlimited" | "infinity" | "-1" => current.to_string(),
        _ if item == "memlock" && cfg_value == "0" => {
            let current_kb = current.parse::<u64>().unwrap_or(0);
            let memlock = ram_kb - ram_kb / 10;
            current_kb.max(memlock).to_string()
        }
        _ => cfg_value.to_string(),
    };
    format!("{} {} {} {}", domain, kind, item, target)
}

pub fn set_limits_val(key: &str, value: &str, limits_path: &Path, revert: bool) -> Result<()> {
    if key.ends_with("_NA") || value == "NA" {
        return Ok(());
    }
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 3 {
        return Ok(());
    }
    let mut sec_limits = SecLimits::parse(limits_path)?;
    if revert && fields.len() < 4 {
        // nothing was set before the apply, drop the entry again
        sec_limits.remove(fields[0], fields[1], fields[2]);
    } else if fields.len() >= 4 {
        sec_limits.set(fields[0], fields[1], fields[2], fields[3]);
    }
    sec_limits.apply()
}

// --- [service] systemd units ---

/// Running state of a managed unit as start/stop
pub fn get_service_val(key: &str) -> String {
    let Some(unit) = service::service_name(key) else {
        return String::new();
    };
    if service::is_running(unit) {
        "start".to_string()
    } else {
        "stop".to_string()
    }
}

/// Validated target state for a managed unit
pub fn opt_service_val(key: &str, cfgval: &str) -> String {
    let val = cfgval.to_lowercase();
    match key.trim_end_matches(".service") {
        "UuiddSocket" | "uuidd.socket" => {
            if val != "start" {
                warn!("wrong selection for '{}', setting 'start' to run the service", key);
                return "start".to_string();
            }
            val
        }
        "Sysstat" | "sysstat" => {
            if val != "start" && val != "stop" {
                warn!("wrong selection for '{}', setting 'start' to run the service", key);
                return "start".to_string();
            }
            val
        }
        _ => String::new(),
    }
}

/// Enable or disable a managed unit to match the target state
pub fn set_service_val(key: &str, value: &str) -> Result<()> {
    let Some(unit) = service::service_name(key) else {
        return Ok(());
    };
    match value {
        "start" if !service::is_running(unit) => service::enable_start(unit),
        "stop" if service::is_running(unit) => service::disable_stop(unit),
        _ => Ok(()),
    }
}

// --- [login] systemd-logind drop-in ---

/// Drop-in written below the logind configuration directory
pub const LOGIND_DROPIN: &str = "hosttune-tasksmax.conf";

/// Current value carried by the logind drop-in, if present
pub fn get_login_val(key: &str, dropin_path: &Path) -> Result<String> {
    match key {
        "UserTasksMax" => {
            let content = match std::fs::read_to_string(dropin_path) {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
                Err(e) => return Err(crate::error::HostTuneError::io(dropin_path, e)),
            };
            for line in content.lines() {
                if let Some(value) = line.trim().strip_prefix("UserTasksMax=") {
                    return Ok(value.to_string());
                }
            }
            Ok(String::new())
        }
        _ => Ok(String::new()),
    }
}

/// Target value for the logind drop-in
pub fn opt_login_val(cfgval: &str) -> String {
    cfgval.to_lowercase()
}

/// Write or remove the logind drop-in
pub fn set_login_val(key: &str, value: &str, dropin_path: &Path, revert: bool) -> Result<()> {
    if key != "UserTasksMax" {
        return Ok(());
    }
    if revert && value.is_empty() {
        if dropin_path.exists() {
            std::fs::remove_file(dropin_path)
                .map_err(|e| crate::error::HostTuneError::io(dropin_path, e))?;
        }
        return Ok(());
    }
    if let Some(parent) = dropin_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::error::HostTuneError::io(parent, e))?;
    }
    std::fs::write(dropin_path, format!("[Login]\nUserTasksMax={}\n", value))
        .map_err(|e| crate::error::HostTuneError::io(dropin_path, e))?;
    if !revert {
        warn!(
            "system-wide UserTasksMax is now set to {}; a reboot is needed for login sessions to pick this up",
            value
        );
    }
    Ok(())
}

// --- [mem] /dev/shm sizing ---

/// Current /dev/shm sizing values
pub fn get_mem_val(key: &str) -> String {
    match key {
        "ShmFileSystemSizeMB" | "VSZ_TMPFS_PERCENT" => match mounts::shm_size_mb() {
            Some(size_mb) => {
                if key == "VSZ_TMPFS_PERCENT" {
                    let total = mounts::total_mem_mb();
                    let percent = ((size_mb as f64) * 100.0 / (total as f64) + 0.5).floor();
                    format!("{}", percent as u64)
                } else {
                    size_mb.to_string()
                }
            }
            None => {
                warn!("failed to find /dev/shm mount point");
                "-1".to_string()
            }
        },
        _ => String::new(),
    }
}

/// Target for the `[mem]` keys. A configured size of 0 derives the
/// size from `VSZ_TMPFS_PERCENT` (default 75% of RAM).
pub fn opt_mem_val(key: &str, actval: &str, cfgval: &str, tmpfs_percent: &str, total_mem_mb: u64) -> String {
    let size = if actval == "-1" {
        warn!("/dev/shm is not a valid mount point, will not calculate its optimal size");
        0
    } else if cfgval == "0" {
        let percent: u64 = match tmpfs_percent.parse() {
            Ok(0) | Err(_) => 75,
            Ok(p) => p,
        };
        total_mem_mb * percent / 100
    } else {
        cfgval.parse().unwrap_or(0)
    };
    match key {
        "VSZ_TMPFS_PERCENT" => cfgval.to_string(),
        "ShmFileSystemSizeMB" => {
            if size == 0 {
                "-1".to_string()
            } else {
                size.to_string()
            }
        }
        _ => cfgval.to_string(),
    }
}

/// Remount /dev/shm with the target size
pub fn set_mem_val(key: &str, value: &str) -> Result<()> {
    if key != "ShmFileSystemSizeMB" {
        return Ok(());
    }
    match value.parse::<u64>() {
        Ok(size_mb) if size_mb > 0 => mounts::remount_shm(size_mb),
        _ => {
            warn!("/dev/shm is not a valid mount point, will not adjust its size");
            Ok(())
        }
    }
}

// --- [cpu] governor, perf bias, force latency ---

/// Current value plus the idle-state flags and a difference hint for
/// `force_latency`
pub fn get_cpu_val(key: &str) -> (String, String, String) {
    match key {
        "force_latency" => cpu::get_force_latency(),
        "energy_perf_bias" => (cpu::get_perf_bias(), String::new(), String::new()),
        "governor" => (
            cpu::format_cpu_fields(&cpu::get_governor()),
            String::new(),
            String::new(),
        ),
        _ => (String::new(), String::new(), String::new()),
    }
}

/// Target cpu setting, rebuilt over the live per-cpu layout
pub fn opt_cpu_val(key: &str, actval: &str, cfgval: &str) -> String {
    let sval = cfgval.to_lowercase();
    match key {
        "force_latency" => sval,
        "energy_perf_bias" => {
            let bias = match sval.as_str() {
                "performance" => "0",
                "normal" => "6",
                "powersave" => "15",
                other if other.parse::<i64>().is_ok() => other,
                _ => {
                    warn!("wrong selection for energy_perf_bias, setting 'performance'");
                    "0"
                }
            };
            rebuild_per_cpu(actval, bias)
        }
        "governor" => rebuild_per_cpu(actval, &sval),
        _ => sval,
    }
}

/// Rebuild `cpu:value` fields from the live per-cpu layout with a new
/// uniform value
fn rebuild_per_cpu(actval: &str, value: &str) -> String {
    let fields: Vec<String> = actval
        .split_whitespace()
        .filter_map(|entry| entry.split(':').next())
        .map(|cpu| format!("{}:{}", cpu, value))
        .collect();
    fields.join(" ")
}

/// Write a cpu setting
pub fn set_cpu_val(key: &str, value: &str, idle_flags: &str, revert: bool) -> Result<()> {
    match key {
        "force_latency" => cpu::set_force_latency(value, idle_flags, revert),
        "energy_perf_bias" => cpu::set_perf_bias(value),
        "governor" => cpu::set_governor(value),
        _ => Ok(()),
    }
}

// --- [pagecache] kernel pagecache limit ---

const SYSCTL_PAGECACHE_LIMIT: &str = "vm.pagecache_limit_mb";
const SYSCTL_PAGECACHE_IGNORE_DIRTY: &str = "vm.pagecache_limit_ignore_dirty";

/// Current pagecache limit values, NA on kernels without support
pub fn get_pagecache_val(key: &str) -> String {
    match key {
        "ENABLE_PAGECACHE_LIMIT" => match sysctl::get(SYSCTL_PAGECACHE_LIMIT) {
            Ok(v) if v != "0" => "yes".to_string(),
            Ok(_) => "no".to_string(),
            // kernel without pagecache limit support
            Err(_) => "NA".to_string(),
        },
        "PAGECACHE_LIMIT_IGNORE_DIRTY" => {
            sysctl::get(SYSCTL_PAGECACHE_IGNORE_DIRTY).unwrap_or_else(|_| "NA".to_string())
        }
        "OVERRIDE_PAGECACHE_LIMIT_MB" => match sysctl::get(SYSCTL_PAGECACHE_LIMIT) {
            Ok(v) if v != "0" => v,
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// Validated pagecache limit target
pub fn opt_pagecache_val(key: &str, cfgval: &str, enabled: bool) -> String {
    let val = cfgval.to_lowercase();
    match key {
        "ENABLE_PAGECACHE_LIMIT" => {
            if val != "yes" && val != "no" {
                warn!("wrong selection for ENABLE_PAGECACHE_LIMIT, setting default 'no'");
                return "no".to_string();
            }
            val
        }
        "PAGECACHE_LIMIT_IGNORE_DIRTY" => {
            if val != "0" && val != "1" && val != "2" {
                warn!("wrong selection for PAGECACHE_LIMIT_IGNORE_DIRTY, setting default '1'");
                return "1".to_string();
            }
            val
        }
        "OVERRIDE_PAGECACHE_LIMIT_MB" => {
            if enabled {
                cfgval.to_string()
            } else {
                String::new()
            }
        }
        _ => val,
    }
}

/// Write the pagecache limit sysctls
pub fn set_pagecache_val(key: &str, value: &str) -> Result<()> {
    match key {
        "PAGECACHE_LIMIT_IGNORE_DIRTY" => sysctl::set(SYSCTL_PAGECACHE_IGNORE_DIRTY, value),
        "OVERRIDE_PAGECACHE_LIMIT_MB" => {
            let limit = if value.is_empty() { "0" } else { value };
            sysctl::set(SYSCTL_PAGECACHE_LIMIT, limit)
        }
        // the enable switch materialises through the limit value
        _ => Ok(()),
    }
}

// --- [rpm] and [grub] are verify-only ---

/// Installed package version, NA when not installed
pub fn get_rpm_val(key: &str) -> String {
    let package = key.strip_prefix("rpm:").unwrap_or(key);
    let version = system::rpm_version(package);
    if version.is_empty() {
        "NA".to_string()
    } else {
        version
    }
}

/// Boot command line value of a grub token
pub fn get_grub_val(key: &str, cmdline_path: &Path) -> String {
    let token = key.strip_prefix("grub:").unwrap_or(key);
    system::parse_cmdline(cmdline_path, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_section_parse_and_verify_only() {
        assert_eq!(Section::parse("sysctl"), Some(Section::Sysctl));
        assert_eq!(Section::parse("pagecache"), Some(Section::Pagecache));
        assert_eq!(Section::parse("bogus"), None);
        assert!(Section::Rpm.is_verify_only());
        assert!(Section::Grub.is_verify_only());
        assert!(!Section::Sysctl.is_verify_only());
    }

    #[test]
    fn test_opt_sysctl_val_equal_counts() {
        use crate::parser::Operator;
        assert_eq!(
            opt_sysctl_val(Operator::Equal, "net.ipv4.ip_local_port_range", "1024\t65535", "32768\t60999"),
            "32768\t60999"
        );
    }

    #[test]
    fn test_opt_sysctl_val_single_bound_replaces_edge_field() {
        use crate::parser::Operator;
        // >= replaces the last field
        assert_eq!(
            opt_sysctl_val(Operator::MoreThanEqual, "kernel.sem", "250\t256000\t32\t128", "1024"),
            "250\t256000\t32\t1024"
        );
        // <= replaces the first field
        assert_eq!(
            opt_sysctl_val(Operator::LessThanEqual, "kernel.sem", "250\t256000\t32\t128", "100"),
            "100\t256000\t32\t128"
        );
    }

    #[test]
    fn test_opt_sysctl_val_count_mismatch_is_rejected() {
        use crate::parser::Operator;
        assert_eq!(
            opt_sysctl_val(Operator::Equal, "kernel.sem", "250\t256000\t32\t128", "250\t256000"),
            ""
        );
    }

    #[test]
    fn test_opt_sysctl_val_empty_current_takes_bound() {
        use crate::parser::Operator;
        assert_eq!(opt_sysctl_val(Operator::MoreThanEqual, "net.core.somaxconn", "", "4096"), "4096");
    }

    #[test]
    fn test_opt_vm_val_validation() {
        assert_eq!(opt_vm_val("THP", "NEVER"), "never");
        assert_eq!(opt_vm_val("THP", "enabled"), "never");
        assert_eq!(opt_vm_val("KSM", "1"), "1");
        assert_eq!(opt_vm_val("KSM", "yes"), "0");
    }

    #[test]
    fn test_split_block_key() {
        assert_eq!(split_block_key("IO_SCHEDULER_sda"), Some(("IO_SCHEDULER", "sda")));
        assert_eq!(split_block_key("NRREQ_nvme0n1"), Some(("NRREQ", "nvme0n1")));
        assert_eq!(split_block_key("vm.swappiness"), None);
    }

    #[test]
    fn test_opt_blk_val() {
        assert_eq!(opt_blk_val("IO_SCHEDULER_sda", "NOOP"), "noop");
        assert_eq!(opt_blk_val("NRREQ_sda", "0"), "1024");
        assert_eq!(opt_blk_val("NRREQ_sda", "512"), "512");
    }

    #[test]
    fn test_limits_get_and_opt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("limits.conf");
        std::fs::write(&path, "@sapsys soft memlock 524288\n").unwrap();

        let current = get_limits_val("@sapsys soft memlock 2097152", &path).unwrap();
        assert_eq!(current, "@sapsys soft memlock 524288");

        let target = opt_limits_val(&current, "@sapsys soft memlock 2097152", 8 * 1024 * 1024);
        assert_eq!(target, "@sapsys soft memlock 2097152");

        // an unlimited live value is kept
        let target = opt_limits_val("@sapsys soft memlock unlimited", "@sapsys soft memlock 2097152", 8 * 1024 * 1024);
        assert_eq!(target, "@sapsys soft memlock unlimited");
    }

    #[test]
    fn test_memlock_zero_means_ram_minus_ten_percent() {
        let ram_kb = 1_000_000;
        let target = opt_limits_val("@sapsys soft memlock 100", "@sapsys soft memlock 0", ram_kb);
        assert_eq!(target, "@sapsys soft memlock 900000");

        // a live bound above the calculated one is kept
        let target = opt_limits_val("@sapsys soft memlock 950000", "@sapsys soft memlock 0", ram_kb);
        assert_eq!(target, "@sapsys soft memlock 950000");
    }

    #[test]
    fn test_set_limits_val_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("limits.conf");

        set_limits_val(
            "LIMIT_@sapsys_soft_memlock",
            "@sapsys soft memlock 2097152",
            &path,
            false,
        )
        .unwrap();
        let current = get_limits_val("@sapsys soft memlock 0", &path).unwrap();
        assert_eq!(current, "@sapsys soft memlock 2097152");

        // reverting an entry that did not exist before removes it again
        set_limits_val("LIMIT_@sapsys_soft_memlock", "@sapsys soft memlock", &path, true).unwrap();
        let current = get_limits_val("@sapsys soft memlock 0", &path).unwrap();
        assert_eq!(current, "@sapsys soft memlock");
    }

    #[test]
    fn test_untouched_limits_key_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("limits.conf");
        set_limits_val("LIMITS_NA", "NA", &path, false).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_opt_service_val() {
        assert_eq!(opt_service_val("UuiddSocket", "stop"), "start");
        assert_eq!(opt_service_val("Sysstat", "STOP"), "stop");
        assert_eq!(opt_service_val("Sysstat", "enabled"), "start");
        assert_eq!(opt_service_val("nscd", "start"), "");
    }

    #[test]
    fn test_login_dropin_round_trip() {
        let dir = TempDir::new().unwrap();
        let dropin = dir.path().join("logind.conf.d").join(LOGIND_DROPIN);

        assert_eq!(get_login_val("UserTasksMax", &dropin).unwrap(), "");
        set_login_val("UserTasksMax", "infinity", &dropin, false).unwrap();
        assert_eq!(get_login_val("UserTasksMax", &dropin).unwrap(), "infinity");

        // revert with no recorded value removes the drop-in
        set_login_val("UserTasksMax", "", &dropin, true).unwrap();
        assert!(!dropin.exists());
    }

    #[test]
    fn test_opt_mem_val_sizing() {
        // explicit size wins
        assert_eq!(opt_mem_val("ShmFileSystemSizeMB", "16384", "32768", "0", 65536), "32768");
        // size 0 falls back to 75% of RAM
        assert_eq!(opt_mem_val("ShmFileSystemSizeMB", "16384", "0", "0", 65536), "49152");
        // size 0 with an explicit percentage
        assert_eq!(opt_mem_val("ShmFileSystemSizeMB", "16384", "0", "50", 65536), "32768");
        // invalid mount point never calculates
        assert_eq!(opt_mem_val("ShmFileSystemSizeMB", "-1", "0", "0", 65536), "-1");
        // the percentage key itself passes through
        assert_eq!(opt_mem_val("VSZ_TMPFS_PERCENT", "25", "75", "75", 65536), "75");
    }

    #[test]
    fn test_opt_cpu_val_rebuilds_per_cpu() {
        assert_eq!(
            opt_cpu_val("governor", "cpu0:powersave cpu1:powersave", "Performance"),
            "cpu0:performance cpu1:performance"
        );
        assert_eq!(opt_cpu_val("energy_perf_bias", "all:6", "performance"), "all:0");
        assert_eq!(opt_cpu_val("energy_perf_bias", "all:6", "powersave"), "all:15");
        assert_eq!(opt_cpu_val("energy_perf_bias", "cpu0:6 cpu1:0", "normal"), "cpu0:6 cpu1:6");
        assert_eq!(opt_cpu_val("force_latency", "70", "70"), "70");
    }

    #[test]
    fn test_opt_pagecache_val() {
        assert_eq!(opt_pagecache_val("ENABLE_PAGECACHE_LIMIT", "YES", true), "yes");
        assert_eq!(opt_pagecache_val("ENABLE_PAGECACHE_LIMIT", "maybe", true), "no");
        assert_eq!(opt_pagecache_val("PAGECACHE_LIMIT_IGNORE_DIRTY", "3", true), "1");
        assert_eq!(opt_pagecache_val("OVERRIDE_PAGECACHE_LIMIT_MB", "4096", true), "4096");
        assert_eq!(opt_pagecache_val("OVERRIDE_PAGECACHE_LIMIT_MB", "4096", false), "");
    }

    #[test]
    fn test_get_grub_val_from_cmdline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "root=/dev/sda2 numa_balancing=disable quiet").unwrap();
        assert_eq!(get_grub_val("grub:numa_balancing", file.path()), "disable");
        assert_eq!(get_grub_val("grub:quiet", file.path()), "quiet");
        // an option missing from the command line is simply not set
        assert_eq!(get_grub_val("grub:intel_idle.max_cstate", file.path()), "");
    }
}
