//! Configuration module for HostTune
//!
//! Provides CLI arguments, the subcommand tree and the runtime path
//! set.

mod settings;

pub use settings::*;
