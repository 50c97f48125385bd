//! Error types for ec2prep

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ec2prep operations
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Instance identity unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("Failed to create completion marker {}: {source}", .path.display())]
    MarkerCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read scripts directory {}: {source}", .path.display())]
    DiscoveryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch script {}: {source}", .path.display())]
    ScriptLaunchFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Script {} exited with status {}: {stderr}", .path.display(), describe_code(.code))]
    ScriptExitedNonZero {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PrepError {
    /// Create an identity error
    pub fn identity(message: impl Into<String>) -> Self {
        Self::IdentityUnavailable(message.into())
    }

    /// Create a non-zero exit error for a script
    pub fn exited(path: impl Into<PathBuf>, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ScriptExitedNonZero {
            path: path.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Process exit code reported for this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}
