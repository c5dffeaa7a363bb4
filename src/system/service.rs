//! systemd service control
//!
//! Wrappers around systemctl for the units the `[service]` section may
//! manage. Unknown service keys are logged and skipped rather than
//! treated as errors.

use super::run_command;
use crate::error::{HostTuneError, Result};
use tracing::warn;

/// Map a profile service key to its systemd unit name
pub fn service_name(key: &str) -> Option<&'static str> {
    match key.trim_end_matches(".service") {
        "UuiddSocket" | "uuidd.socket" => Some("uuidd.socket"),
        "Sysstat" | "sysstat" => Some("sysstat"),
        other => {
            warn!("skipping unknown service '{}'", other);
            None
        }
    }
}

/// Whether a unit is currently active
pub fn is_running(unit: &str) -> bool {
    run_command("systemctl", &["is-active", "--quiet", unit]).is_ok()
}

/// Enable a unit and start it now
pub fn enable_start(unit: &str) -> Result<()> {
    run_command("systemctl", &["enable", "--now", unit])
        .map(|_| ())
        .map_err(|e| HostTuneError::ServiceError {
            unit: unit.to_string(),
            message: e.to_string(),
        })
}

/// Disable a unit and stop it now
pub fn disable_stop(unit: &str) -> Result<()> {
    run_command("systemctl", &["disable", "--now", unit])
        .map(|_| ())
        .map_err(|e| HostTuneError::ServiceError {
            unit: unit.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_mapping() {
        assert_eq!(service_name("UuiddSocket"), Some("uuidd.socket"));
        assert_eq!(service_name("Sysstat"), Some("sysstat"));
        assert_eq!(service_name("sysstat.service"), Some("sysstat"));
        assert_eq!(service_name("nscd"), None);
    }
}
