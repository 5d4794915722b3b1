//! Error taxonomy for a run.
//!
//! Only [`RunError`] aborts a run. Everything a single job can hit is a
//! [`JobError`] and ends up inside that job's outcome; malformed manifest
//! records are reported as [`MalformedRecord`] and skipped.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Run-fatal errors: nothing can be scheduled.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create output directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A manifest record that could not be turned into a job.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("line {line}: {reason} ({raw:?})")]
pub struct MalformedRecord {
    /// 1-based line number in the manifest (the header is line 1).
    pub line: usize,
    pub raw: String,
    pub reason: MalformedReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    /// Not exactly two colon-separated fields.
    FieldCount(usize),
    EmptyField,
    /// The manifest producer writes `NULL` when it found no key.
    MissingKey,
    DuplicateId,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::FieldCount(n) => write!(f, "expected 2 fields, found {}", n),
            MalformedReason::EmptyField => write!(f, "empty id or key"),
            MalformedReason::MissingKey => write!(f, "key not found"),
            MalformedReason::DuplicateId => write!(f, "duplicate id"),
        }
    }
}

/// Errors local to one job. None of these leave the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum JobError {
    /// Advisory only; recorded but never terminal.
    #[error("priming failed: {0}")]
    Priming(String),

    #[error("failed to start acquisition tool: {0}")]
    Spawn(String),

    #[error("acquisition tool exited with {status}{}", stderr_suffix(.stderr_tail))]
    ExitStatus {
        status: String,
        stderr_tail: Option<String>,
    },

    #[error("error checking final size: {0}")]
    FinalStat(String),

    #[error("artifact is suspiciously small ({size_bytes} bytes, expected at least {threshold_bytes})")]
    SuspiciouslySmallArtifact { size_bytes: u64, threshold_bytes: u64 },

    #[error("job task panicked: {0}")]
    Panicked(String),
}

fn stderr_suffix(tail: &Option<String>) -> String {
    match tail {
        Some(t) if !t.is_empty() => format!("; stderr:\n{}", t),
        _ => String::new(),
    }
}
