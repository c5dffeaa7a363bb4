//! # HostTune - Host Tuning Profile Management
//!
//! HostTune applies vendor-provided tuning profiles ("notes") to a
//! running Linux host. It parses INI-style tuning-parameter files,
//! compares them against live kernel and system state (sysctl values,
//! block-device queue settings, CPU governor and idle states, resource
//! limits, service states), honours per-note override files and applies
//! or reverts the resulting target values.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hosttune::app::TuneApp;
//! use hosttune::config::TunePaths;
//!
//! let mut app = TuneApp::launch(TunePaths::default()).unwrap();
//!
//! // compliance report for one note
//! let comparison = app.verify_note("1410736").unwrap();
//! println!("compliant: {}", comparison.is_compliant());
//!
//! // tune the system (requires root)
//! app.tune_note("1410736").unwrap();
//! ```
//!
//! ## Override Files
//!
//! An administrator narrows or disables individual parameters of a
//! shipped note by placing a file of the same ID into the override
//! directory. An empty value marks the parameter untouched; a
//! different operator or value replaces the note's.
//!
//! ## Saved State
//!
//! The pre-apply value of every parameter is captured into the state
//! directory on first apply and restored on revert, including for
//! notes whose profile files have since been removed from disk.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod config;
pub mod error;
pub mod parser;
pub mod profile;
pub mod report;
pub mod solution;
pub mod state;
pub mod system;

// Re-export commonly used types
pub use app::{NoteComparison, TuneApp};
pub use config::TunePaths;
pub use error::{HostTuneError, Result};
pub use parser::{Operator, ProfileFile, TuningEntry};
pub use profile::{Compliance, FieldComparison, ProfileSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use hosttune::prelude::*;
    //! ```

    pub use crate::app::{NoteComparison, TuneApp};
    pub use crate::config::{CliArgs, Commands, OutputFormat, TunePaths};
    pub use crate::error::{HostTuneError, Result};
    pub use crate::parser::{parse_profile, Operator, ParseContext, ProfileFile, TuningEntry};
    pub use crate::profile::{Compliance, FieldComparison, ProfileSettings, TuneContext};
    pub use crate::solution::SolutionCatalogue;
    pub use crate::state::StateStore;
}
