//! OS-facing accessors
//!
//! Thin getter/setter shims over the kernel and system surfaces the
//! tuning sections touch: /proc/sys, /sys, systemd units, security
//! limits files, CPU frequency/idle interfaces and the mount table.
//! Every accessor is a single-shot, idempotent read or write.

pub mod block;
pub mod cpu;
pub mod limits;
pub mod mounts;
pub mod service;
pub mod sysctl;
pub mod sysfs;

use crate::error::{HostTuneError, Result};
use std::path::Path;
use std::process::Command;
use tracing::warn;

/// Run an external command and capture its stdout.
pub fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| HostTuneError::command(program, e.to_string()))?;
    if !output.status.success() {
        return Err(HostTuneError::command(
            format!("{} {}", program, args.join(" ")),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// List the entry names of a directory, sorted. Errors are logged and
/// yield an empty list; callers treat a missing directory as "nothing
/// to do".
pub fn list_dir(path: &Path, description: &str) -> Vec<String> {
    let mut names = Vec::new();
    match std::fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries.flatten() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Err(e) => {
            if !description.is_empty() {
                warn!("failed to read {} at '{}': {}", description, path.display(), e);
            }
        }
    }
    names.sort();
    names
}

/// Effective-uid root check; apply and revert refuse to run without it.
#[cfg(unix)]
pub fn is_user_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
pub fn is_user_root() -> bool {
    false
}

/// Running OS version from /etc/os-release (VERSION_ID), used to filter
/// `[rpm]` profile entries.
pub fn os_version() -> String {
    os_version_from(Path::new("/etc/os-release"))
}

fn os_version_from(path: &Path) -> String {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VERSION_ID=") {
            return rest.trim_matches('"').to_string();
        }
    }
    String::new()
}

/// Look up a boot command line token. For `key=value` tokens the value
/// is returned, for bare flags the flag itself; absent tokens yield an
/// empty string.
pub fn parse_cmdline(path: &Path, key: &str) -> String {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    for token in content.split_whitespace() {
        match token.split_once('=') {
            Some((k, v)) if k == key => return v.to_string(),
            None if token == key => return token.to_string(),
            _ => {}
        }
    }
    String::new()
}

/// Installed version of an RPM package, or an empty string when the
/// package is not installed or rpm is unavailable.
pub fn rpm_version(package: &str) -> String {
    match run_command(
        "rpm",
        &["-q", "--queryformat", "%{VERSION}-%{RELEASE}", package],
    ) {
        Ok(out) => out.trim().to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_cmdline_key_value_and_flag() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "BOOT_IMAGE=/boot/vmlinuz root=/dev/sda2 quiet numa_balancing=disable transparent_hugepage"
        )
        .unwrap();

        assert_eq!(parse_cmdline(file.path(), "numa_balancing"), "disable");
        assert_eq!(
            parse_cmdline(file.path(), "transparent_hugepage"),
            "transparent_hugepage"
        );
        assert_eq!(parse_cmdline(file.path(), "intel_idle.max_cstate"), "");
    }

    #[test]
    fn test_os_version_from_release_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "NAME=\"SLES\"\nVERSION_ID=\"15.4\"\n").unwrap();
        assert_eq!(os_version_from(file.path()), "15.4");
    }

    #[test]
    fn test_list_dir_missing_is_empty() {
        assert!(list_dir(Path::new("/no/such/dir"), "").is_empty());
    }
}
