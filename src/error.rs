//! Typed error taxonomy for the engine.
//!
//! Library code returns `Result<T, TestmeError>`. The binary crate converts
//! these into `anyhow::Error` at the CLI boundary so it can add ad-hoc
//! context without growing the variant list here.

use std::path::PathBuf;

use thiserror::Error;

/// Error kinds the engine can surface, one per §7 of the design.
#[derive(Debug, Error)]
pub enum TestmeError {
    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("could not read directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{missing} not found on {platform}: {hint}")]
    DependencyMissing {
        missing: String,
        platform: String,
        hint: String,
    },

    #[error("compile failed for {source_file}: {stderr}")]
    Compile { source_file: PathBuf, stderr: String },

    #[error("failed to spawn test process for {source_file}: {source}")]
    Exec {
        source_file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("test {source_file} exceeded its {timeout_ms}ms timeout")]
    Timeout { source_file: PathBuf, timeout_ms: u64 },

    #[error("service '{op}' failed: {message}")]
    Service { op: &'static str, message: String },

    #[error("run cancelled by user")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl TestmeError {
    /// Exit code this error implies when it is fatal enough to abort the run
    /// before any tests execute (§7: bad CLI, missing root, unwritable
    /// artifact directory).
    pub fn exit_code(&self) -> i32 {
        match self {
            TestmeError::Config { .. } => 2,
            TestmeError::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, TestmeError>;
