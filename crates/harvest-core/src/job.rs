//! Job descriptors and their terminal outcomes.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::JobError;

/// One unit of work: acquire the artifact for `access_key` into `output_path`.
///
/// Identity is `id`. Fields are private so a job cannot change after the
/// job source has built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: String,
    access_key: String,
    output_path: PathBuf,
    priming_url: Option<String>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        access_key: impl Into<String>,
        output_path: impl Into<PathBuf>,
        priming_url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            access_key: access_key.into(),
            output_path: output_path.into(),
            priming_url: priming_url.filter(|u| !u.is_empty()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn priming_url(&self) -> Option<&str> {
        self.priming_url.as_deref()
    }
}

/// Terminal classification of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TerminalState {
    Succeeded,
    /// Could not certify the artifact; the reason is operator-readable.
    Failed(String),
    /// The tool exited 0 but the artifact is below the size threshold.
    SuspiciouslySmall,
}

impl TerminalState {
    pub fn label(&self) -> &'static str {
        match self {
            TerminalState::Succeeded => "succeeded",
            TerminalState::Failed(_) => "failed",
            TerminalState::SuspiciouslySmall => "suspiciously-small",
        }
    }
}

/// Exactly one per job that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub state: TerminalState,
    pub final_size_bytes: Option<u64>,
    pub error: Option<JobError>,
    /// Advisory problems that did not decide the outcome (e.g. failed priming).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<JobError>,
}

impl JobOutcome {
    pub fn succeeded(job_id: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            job_id: job_id.into(),
            state: TerminalState::Succeeded,
            final_size_bytes: Some(size_bytes),
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn suspiciously_small(job_id: impl Into<String>, size_bytes: u64, threshold_bytes: u64) -> Self {
        Self {
            job_id: job_id.into(),
            state: TerminalState::SuspiciouslySmall,
            final_size_bytes: Some(size_bytes),
            error: Some(JobError::SuspiciouslySmallArtifact {
                size_bytes,
                threshold_bytes,
            }),
            warnings: Vec::new(),
        }
    }

    /// A failed outcome; the reason string is taken from the error.
    pub fn failed(job_id: impl Into<String>, error: JobError, final_size_bytes: Option<u64>) -> Self {
        Self {
            job_id: job_id.into(),
            state: TerminalState::Failed(error.to_string()),
            final_size_bytes,
            error: Some(error),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<JobError>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_success(&self) -> bool {
        self.state == TerminalState::Succeeded
    }
}
