//! Error types for HostTune
//!
//! This module defines all error types used throughout the application,
//! providing detailed error information for debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for HostTune operations
#[derive(Error, Debug)]
pub enum HostTuneError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Tuning profile could not be parsed
    #[error("Failed to parse profile '{path}': {message}")]
    ProfileParse { path: PathBuf, message: String },

    /// Note ID is not known in any search directory
    #[error("Note {0} not found in the working or extra directories")]
    UnknownNote(String),

    /// Solution name is not known in the solution catalogue
    #[error("Solution {0} not defined for this architecture")]
    UnknownSolution(String),

    /// A parameter value that must be an integer is not
    #[error("Value '{value}' for parameter '{key}' is not an integer")]
    NotAnInteger { key: String, value: String },

    /// External command failed
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Writing a kernel or sysfs parameter failed
    #[error("Failed to set parameter '{key}' to '{value}': {message}")]
    SetParameter {
        key: String,
        value: String,
        message: String,
    },

    /// Saved state store error
    #[error("State store error: {0}")]
    StateError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Service management error
    #[error("Service '{unit}' operation failed: {message}")]
    ServiceError { unit: String, message: String },

    /// Apply or revert was attempted without root privileges
    #[error("Operation requires root privileges")]
    NotRoot,

    /// Verify found parameters deviating from the recommendations
    #[error("The parameters of {0} have deviated from the configured recommendations")]
    NotCompliant(String),

    /// Multiple errors occurred
    #[error("Multiple errors occurred ({count} errors)")]
    MultipleErrors {
        count: usize,
        errors: Vec<HostTuneError>,
    },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<HostTuneError>,
    },
}

impl HostTuneError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a profile parse error
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProfileParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a command failure error
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a parameter-set error
    pub fn set_param(
        key: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SetParameter {
            key: key.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a state store error
    pub fn state(message: impl Into<String>) -> Self {
        Self::StateError(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error is a permission issue
    pub fn is_permission_error(&self) -> bool {
        match self {
            Self::NotRoot => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } | Self::NotFound(path) | Self::ProfileParse { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

/// Result type alias for HostTune operations
pub type Result<T> = std::result::Result<T, HostTuneError>;

impl From<std::io::Error> for HostTuneError {
    fn from(err: std::io::Error) -> Self {
        HostTuneError::Io {
            path: std::path::PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for HostTuneError {
    fn from(err: serde_json::Error) -> Self {
        HostTuneError::StateError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| HostTuneError::io(path, e))
    }
}

/// Collects the errors of many independent operations into a single result.
///
/// Apply and revert touch every parameter of a profile before reporting;
/// partial application is accepted and all failures are surfaced jointly.
pub fn collect_errors(results: Vec<Result<()>>) -> Result<()> {
    let mut errors: Vec<HostTuneError> = results.into_iter().filter_map(|r| r.err()).collect();

    if errors.is_empty() {
        Ok(())
    } else if errors.len() == 1 {
        Err(errors.remove(0))
    } else {
        Err(HostTuneError::MultipleErrors {
            count: errors.len(),
            errors,
        })
    }
}
