//! Job lifecycle events for the operator display.
//!
//! The engine sends these on an optional `mpsc` channel; the CLI turns each
//! one into a progress line. Nothing in the engine depends on them being read.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::job::JobOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Batch mode only: jobs `first..=last` (1-based) of `total` are starting.
    BatchStarted { number: usize, first: usize, last: usize, total: usize },
    Started { job_id: String, access_key: String },
    Priming { job_id: String, url: String },
    PrimingFailed { job_id: String, reason: String },
    Primed { job_id: String },
    /// The artifact size changed since the previous sample.
    Progress(ProgressSample),
    /// No growth for `idle`; advisory.
    Stalled { job_id: String, idle: Duration, size_bytes: u64 },
    CommandFinished { job_id: String, success: bool },
    Finished(JobOutcome),
}

/// One observed size change of a job's artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    pub job_id: String,
    pub size_bytes: u64,
    /// Change since the previous sample (negative if the tool truncated the file).
    pub delta_bytes: i64,
    pub elapsed: Duration,
}

impl ProgressSample {
    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / 1_048_576.0
    }

    /// Average growth since monitoring started, in bytes per second.
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.size_bytes as f64 / secs
    }
}

/// Cloneable handle for sending events; a no-op when there is no listener.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<JobEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<JobEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn none() -> Self {
        Self { tx: None }
    }

    /// Sends `event`, waiting for channel capacity. A closed channel is ignored.
    pub async fn emit(&self, event: JobEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event).await;
        }
    }

    /// Sends without waiting; dropped if the channel is full. Used for
    /// periodic samples where a newer one follows soon.
    pub fn try_emit(&self, event: JobEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.try_send(event);
        }
    }
}
