//! Polling loop for one artifact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use crate::events::{EventSink, JobEvent, ProgressSample};

use super::verdict::{classify_final_size, FinalVerdict};

/// One size observation. Owned by the monitor that took it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSample {
    pub size_bytes: u64,
    pub at: Instant,
}

/// Watches one job's output artifact.
#[derive(Debug)]
pub struct ProgressMonitor {
    job_id: String,
    path: PathBuf,
    interval: Duration,
    threshold_bytes: u64,
    stall_warn_after: Option<Duration>,
    events: EventSink,
}

impl ProgressMonitor {
    pub fn new(
        job_id: impl Into<String>,
        path: impl Into<PathBuf>,
        interval: Duration,
        threshold_bytes: u64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            path: path.into(),
            interval: interval.max(Duration::from_millis(1)),
            threshold_bytes,
            stall_warn_after: None,
            events: EventSink::none(),
        }
    }

    pub fn with_stall_warning(mut self, after: Option<Duration>) -> Self {
        self.stall_warn_after = after;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Polls until `done` fires, then runs the final check once and returns.
    ///
    /// If the sender of `done` is dropped without sending, the job was
    /// abandoned (run cancelled): no final check is made and `None` is returned.
    /// The interval timer lives inside this future and is dropped with it.
    pub async fn run(self, mut done: oneshot::Receiver<()>) -> Option<FinalVerdict> {
        let start = Instant::now();
        let mut ticker = tokio::time::interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last = MonitorSample {
            size_bytes: 0,
            at: start,
        };
        let mut last_growth = start;
        let mut stall_reported = false;

        loop {
            tokio::select! {
                biased;
                signal = &mut done => {
                    return match signal {
                        Ok(()) => Some(self.final_check().await),
                        Err(_) => {
                            tracing::debug!(job_id = %self.job_id, "monitor abandoned before final check");
                            None
                        }
                    };
                }
                _ = ticker.tick() => {
                    // Not created yet counts as empty, so a tool that never writes still stalls.
                    let size_bytes = current_size(&self.path).await.unwrap_or(0);
                    let now = Instant::now();
                    if size_bytes != last.size_bytes {
                        let sample = ProgressSample {
                            job_id: self.job_id.clone(),
                            size_bytes,
                            delta_bytes: size_bytes as i64 - last.size_bytes as i64,
                            elapsed: now - start,
                        };
                        tracing::debug!(
                            job_id = %self.job_id,
                            size_bytes,
                            delta_bytes = sample.delta_bytes,
                            "artifact grew"
                        );
                        self.events.try_emit(JobEvent::Progress(sample));
                        last_growth = now;
                        stall_reported = false;
                    } else if let Some(after) = self.stall_warn_after {
                        let idle = now - last_growth;
                        if !stall_reported && idle >= after {
                            tracing::warn!(
                                job_id = %self.job_id,
                                size_bytes,
                                idle_secs = idle.as_secs(),
                                "artifact has stopped growing"
                            );
                            self.events.try_emit(JobEvent::Stalled {
                                job_id: self.job_id.clone(),
                                idle,
                                size_bytes,
                            });
                            stall_reported = true;
                        }
                    }
                    last = MonitorSample { size_bytes, at: now };
                }
            }
        }
    }

    async fn final_check(&self) -> FinalVerdict {
        let verdict = match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => classify_final_size(meta.len(), self.threshold_bytes),
            Ok(_) => FinalVerdict::StatError(format!("{} is not a regular file", self.path.display())),
            Err(e) => FinalVerdict::StatError(format!("{}: {}", self.path.display(), e)),
        };
        match &verdict {
            FinalVerdict::Succeeded { size_bytes } => {
                tracing::info!(job_id = %self.job_id, size_bytes, "final size confirmed");
            }
            FinalVerdict::SuspiciouslySmall { size_bytes, threshold_bytes } => {
                tracing::warn!(
                    job_id = %self.job_id,
                    size_bytes,
                    threshold_bytes,
                    "artifact is suspiciously small"
                );
            }
            FinalVerdict::StatError(e) => {
                tracing::warn!(job_id = %self.job_id, "error checking final size: {}", e);
            }
        }
        verdict
    }
}

async fn current_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}
