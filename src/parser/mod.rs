//! Tuning-profile text parsing
//!
//! Provides the INI dialect used by note files, override files and
//! solution definitions, plus the key=value sysconfig format used for
//! the runtime configuration.

mod ini;
mod sysconfig;

pub use ini::*;
pub use sysconfig::*;
