//! CLI-specific error types and exit codes.

use courseforge_core::{StorageError, TaskError};
use courseforge_sync::TransportError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cached progress could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The build finished unsuccessfully.
    #[error("Course build failed: {0}")]
    TaskFailed(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: General error (including a failed build)
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::TaskFailed(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Storage(_) => 73,  // EX_CANTCREAT
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<TransportError> for CliError {
    fn from(err: TransportError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<TaskError> for CliError {
    fn from(err: TaskError) -> Self {
        Self::TaskFailed(err.message)
    }
}
