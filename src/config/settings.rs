//! Configuration settings for HostTune
//!
//! Defines all CLI arguments, the subcommand tree and the runtime
//! path set the application works against.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// HostTune - apply vendor-provided tuning profiles to a running host
#[derive(Parser, Debug, Clone)]
#[command(name = "hosttune")]
#[command(author = "HostTune Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Comprehensive system optimisation management")]
#[command(long_about = r#"
HostTune reads INI-style tuning profiles ("notes"), compares them
against the live kernel and system state and applies or reverts the
resulting target values. Notes can be bundled into named solutions.

Examples:
  hosttune note list                 # available notes
  hosttune note verify 1410736      # compliance report for one note
  hosttune note apply 1410736       # tune the system (requires root)
  hosttune solution apply HANA      # apply a note bundle
  hosttune revert all               # restore all saved values
"#)]
pub struct CliArgs {
    /// Output format for reports
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    Text,
    /// Machine-readable JSON
    Json,
}

/// Top-level subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage single tuning notes
    Note {
        #[command(subcommand)]
        action: NoteCommand,
    },
    /// Manage note bundles
    Solution {
        #[command(subcommand)]
        action: SolutionCommand,
    },
    /// Revert tuned parameters
    Revert {
        /// Only `all` is supported
        #[arg(value_name = "TARGET")]
        target: String,
    },
}

/// Note subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum NoteCommand {
    /// List all available notes
    List,
    /// Show which notes are currently applied
    Applied,
    /// Show which notes are enabled in the configuration
    Enabled,
    /// Verify system compliance against one note or all enabled notes
    Verify {
        /// Note ID; all enabled notes when omitted
        #[arg(value_name = "NOTE_ID")]
        id: Option<String>,
    },
    /// Show the expected changes without applying anything
    Simulate {
        #[arg(value_name = "NOTE_ID")]
        id: String,
    },
    /// Apply a note to the running system (requires root)
    Apply {
        #[arg(value_name = "NOTE_ID")]
        id: String,
    },
    /// Revert a previously applied note (requires root)
    Revert {
        #[arg(value_name = "NOTE_ID")]
        id: String,
    },
    /// Print the profile file of a note
    Show {
        #[arg(value_name = "NOTE_ID")]
        id: String,
    },
}

/// Solution subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SolutionCommand {
    /// List all solutions defined for this architecture
    List,
    /// Show which solutions are enabled in the configuration
    Enabled,
    /// Verify system compliance against a solution's notes
    Verify {
        /// Solution name; all enabled solutions when omitted
        #[arg(value_name = "NAME")]
        name: Option<String>,
    },
    /// Apply all notes of a solution (requires root)
    Apply {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Revert all notes of a solution (requires root)
    Revert {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

/// The file system locations the application works against.
///
/// `with_root` rebases everything below one directory, used by the
/// test suites.
#[derive(Debug, Clone)]
pub struct TunePaths {
    /// Shipped notes
    pub note_dir: PathBuf,
    /// Vendor/customer notes
    pub extra_dir: PathBuf,
    /// Per-note override files
    pub override_dir: PathBuf,
    /// Solution definition file
    pub solution_file: PathBuf,
    /// Saved apply state
    pub state_dir: PathBuf,
    /// Runtime configuration (enabled notes/solutions)
    pub config_file: PathBuf,
    /// Security limits file
    pub limits_file: PathBuf,
    /// logind drop-in for UserTasksMax
    pub logind_dropin: PathBuf,
    /// Boot command line
    pub cmdline_file: PathBuf,
}

impl Default for TunePaths {
    fn default() -> Self {
        TunePaths {
            note_dir: PathBuf::from("/usr/share/hosttune/notes"),
            extra_dir: PathBuf::from("/etc/hosttune/extra"),
            override_dir: PathBuf::from("/etc/hosttune/override"),
            solution_file: PathBuf::from("/usr/share/hosttune/solutions"),
            state_dir: PathBuf::from("/var/lib/hosttune/state"),
            config_file: PathBuf::from("/etc/sysconfig/hosttune"),
            limits_file: PathBuf::from(crate::system::limits::SEC_LIMITS_FILE),
            logind_dropin: PathBuf::from("/etc/systemd/logind.conf.d")
                .join(crate::profile::sections::LOGIND_DROPIN),
            cmdline_file: PathBuf::from("/proc/cmdline"),
        }
    }
}

impl TunePaths {
    /// Rebase every path below one root directory
    pub fn with_root(root: &std::path::Path) -> Self {
        TunePaths {
            note_dir: root.join("usr/share/hosttune/notes"),
            extra_dir: root.join("etc/hosttune/extra"),
            override_dir: root.join("etc/hosttune/override"),
            solution_file: root.join("usr/share/hosttune/solutions"),
            state_dir: root.join("var/lib/hosttune/state"),
            config_file: root.join("etc/sysconfig/hosttune"),
            limits_file: root.join("etc/security/limits.conf"),
            logind_dropin: root
                .join("etc/systemd/logind.conf.d")
                .join(crate::profile::sections::LOGIND_DROPIN),
            cmdline_file: root.join("proc/cmdline"),
        }
    }
}
