//! Mount table and memory sizing
//!
//! Backs the `[mem]` section: size of the /dev/shm tmpfs, total system
//! memory and the remount needed to change the tmpfs size.

use super::run_command;
use crate::error::Result;
use std::path::Path;
use sysinfo::System;

/// One line of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Device or filesystem source
    pub device: String,
    /// Mount point path
    pub mount_point: String,
    /// Filesystem type
    pub fs_type: String,
    /// Mount options
    pub options: String,
}

/// Parse a mount table in /proc/mounts format
pub fn parse_mounts(path: &Path) -> Vec<MountEntry> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(MountEntry {
                device: fields[0].to_string(),
                mount_point: fields[1].to_string(),
                fs_type: fields[2].to_string(),
                options: fields[3].to_string(),
            })
        })
        .collect()
}

/// Find a mount entry by mount point
pub fn find_mount(path: &Path, mount_point: &str) -> Option<MountEntry> {
    parse_mounts(path)
        .into_iter()
        .find(|m| m.mount_point == mount_point)
}

/// Filesystem size of a mounted path in MB
#[cfg(unix)]
pub fn filesystem_size_mb(mount_point: &str) -> Option<u64> {
    let stat = nix::sys::statfs::statfs(mount_point).ok()?;
    let block_size = stat.block_size() as u64;
    Some(stat.blocks() * block_size / 1024 / 1024)
}

#[cfg(not(unix))]
pub fn filesystem_size_mb(_mount_point: &str) -> Option<u64> {
    None
}

/// Size of the /dev/shm tmpfs in MB, when mounted
pub fn shm_size_mb() -> Option<u64> {
    find_mount(Path::new("/proc/mounts"), "/dev/shm")?;
    filesystem_size_mb("/dev/shm")
}

/// Total physical memory in MB
pub fn total_mem_mb() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory() / 1024 / 1024
}

/// Remount /dev/shm with a new size
pub fn remount_shm(size_mb: u64) -> Result<()> {
    run_command(
        "mount",
        &["-o", &format!("remount,size={}M", size_mb), "/dev/shm"],
    )
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_mounts_and_lookup() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "/dev/sda2 / ext4 rw,relatime 0 0\ntmpfs /dev/shm tmpfs rw,nosuid,nodev 0 0\n"
        )
        .unwrap();

        let mounts = parse_mounts(file.path());
        assert_eq!(mounts.len(), 2);

        let shm = find_mount(file.path(), "/dev/shm").unwrap();
        assert_eq!(shm.fs_type, "tmpfs");
        assert_eq!(shm.device, "tmpfs");
        assert!(find_mount(file.path(), "/boot").is_none());
    }
}
