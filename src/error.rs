//! Error Types
//!
//! Every fatal condition of a provisioning run is a variant of
//! [`ProvisionError`]. Nothing is retried: the first error ends the run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that terminate a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Unrecognized distribution: {0}")]
    UnknownDistribution(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Root privileges are required for a system-wide installation (use --local otherwise)")]
    NotRoot,

    #[error("Account '{name}' exists with uid {found}, but uid {expected} was requested")]
    AccountMismatch { name: String, expected: u32, found: u32 },

    #[error("Invalid answer '{0}' (expected 'y' or 'n')")]
    InvalidAnswer(String),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("Something is wrong with {}: conda initialize block not found", .0.display())]
    MissingShellInit(PathBuf),

    #[error("{}:{line}: {reason}", path.display())]
    PackageList {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Failed to parse profile {}: {source}", path.display())]
    Profile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with {}", exit_description(.code))]
    CommandFailed { program: String, code: Option<i32> },

    #[error("'{program}' timed out after {secs}s")]
    CommandTimedOut { program: String, secs: u64 },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProvisionError {
    /// Wraps an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (killed by signal)".to_string(),
    }
}
