//! Block device queue settings
//!
//! Enumerates tunable block devices under /sys/block and reads/writes
//! their I/O scheduler and nr_requests queue attributes.

use super::sysfs;
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::warn;

static VIRTIO_DEV: Lazy<Regex> = Lazy::new(|| Regex::new(r"^vd\w+$").unwrap());

/// Block devices the tuning applies to: real disks (sysfs device type 0)
/// plus virtio devices, which carry no device/type attribute.
pub fn candidate_devices() -> Vec<String> {
    let mut devices = Vec::new();
    for bdev in super::list_dir(Path::new("/sys/block"), "the available block devices") {
        let type_path = format!("/sys/block/{}/device/type", bdev);
        let is_disk = std::fs::read_to_string(&type_path)
            .map(|t| t.trim() == "0")
            .unwrap_or(false);
        if is_disk || VIRTIO_DEV.is_match(&bdev) {
            devices.push(bdev);
        }
    }
    devices
}

/// Current I/O scheduler of a device
pub fn get_scheduler(bdev: &str) -> Result<String> {
    sysfs::get_choice(&format!("block/{}/queue/scheduler", bdev))
}

/// Schedulers the device supports
pub fn valid_schedulers(bdev: &str) -> Vec<String> {
    sysfs::get_string(&format!("block/{}/queue/scheduler", bdev))
        .map(|line| {
            line.split_whitespace()
                .map(|t| t.trim_matches(|c| c == '[' || c == ']').to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Check a scheduler name against the device's supported list.
/// A scheduler can only change across a reboot (single-queued to
/// multi-queued), so the check is valid for the whole invocation.
pub fn is_valid_scheduler(bdev: &str, scheduler: &str) -> bool {
    if valid_schedulers(bdev).iter().any(|s| s == scheduler) {
        return true;
    }
    warn!(
        "'{}' is not a valid scheduler for device '{}', skipping",
        scheduler, bdev
    );
    false
}

/// Set the I/O scheduler of a device
pub fn set_scheduler(bdev: &str, scheduler: &str) -> Result<()> {
    sysfs::set_string(&format!("block/{}/queue/scheduler", bdev), scheduler)
}

/// Current nr_requests of a device
pub fn get_nr_requests(bdev: &str) -> Result<i64> {
    sysfs::get_int(&format!("block/{}/queue/nr_requests", bdev))
}

/// Set nr_requests. Some devices reject values their driver cannot
/// honour; that is reported as a skip, not a failure.
pub fn set_nr_requests(bdev: &str, nrreq: i64) -> Result<()> {
    if let Err(e) = sysfs::set_int(&format!("block/{}/queue/nr_requests", bdev), nrreq) {
        warn!(
            "skipping device '{}', not valid for setting number of requests to '{}': {}",
            bdev, nrreq, e
        );
    }
    Ok(())
}
