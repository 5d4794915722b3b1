//! Dispatch loop: spawn one task per job, bound them with the gate, join all.

use std::future::Future;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::ScheduleMode;
use crate::error::JobError;
use crate::events::{EventSink, JobEvent};
use crate::job::{Job, JobOutcome};

use super::gate::AdmissionGate;
use super::plan::BatchPlan;

/// What the scheduler observed for a whole job sequence.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScheduleReport {
    /// One per job that reached a terminal state, in job order.
    pub outcomes: Vec<JobOutcome>,
    /// Jobs cut short or never started because the run was cancelled.
    pub interrupted: Vec<String>,
    /// Highest number of jobs active at once.
    pub peak_active: usize,
}

pub struct Scheduler {
    mode: ScheduleMode,
    gate: Arc<AdmissionGate>,
    events: EventSink,
}

type Pending = Vec<(String, JoinHandle<Option<JobOutcome>>)>;

impl Scheduler {
    pub fn new(mode: ScheduleMode, limit: usize) -> Self {
        Self {
            mode,
            gate: Arc::new(AdmissionGate::new(limit)),
            events: EventSink::none(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    pub fn limit(&self) -> usize {
        self.gate.capacity()
    }

    /// The admission gate shared by every job of this scheduler.
    pub fn gate(&self) -> Arc<AdmissionGate> {
        Arc::clone(&self.gate)
    }

    /// Runs `work` for every job and waits for all of them.
    ///
    /// `work` returns `None` when the job was interrupted by cancellation.
    /// Once `cancel` fires, jobs that have not been admitted are not started.
    pub async fn run<F, Fut>(&self, jobs: Vec<Job>, cancel: &CancellationToken, work: F) -> ScheduleReport
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<JobOutcome>> + Send + 'static,
    {
        let work = Arc::new(work);
        let mut report = ScheduleReport::default();
        tracing::info!(
            jobs = jobs.len(),
            limit = self.limit(),
            mode = ?self.mode,
            "scheduling jobs"
        );

        // Close the gate on cancellation so queued jobs stop waiting for a slot.
        let closer = {
            let gate = Arc::clone(&self.gate);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                gate.close();
            })
        };

        match self.mode {
            ScheduleMode::Semaphore => {
                let pending = jobs
                    .into_iter()
                    .map(|job| self.dispatch(job, cancel, &work))
                    .collect();
                join_in_order(pending, &mut report).await;
            }
            ScheduleMode::Batch => {
                let plan = BatchPlan::new(jobs, self.limit());
                let total = plan.total();
                let mut first = 1;
                for (idx, group) in plan.into_groups().into_iter().enumerate() {
                    let last = first + group.len() - 1;
                    if cancel.is_cancelled() {
                        report
                            .interrupted
                            .extend(group.iter().map(|j| j.id().to_string()));
                        first = last + 1;
                        continue;
                    }
                    tracing::info!(batch = idx + 1, first, last, total, "starting batch");
                    self.events
                        .emit(JobEvent::BatchStarted {
                            number: idx + 1,
                            first,
                            last,
                            total,
                        })
                        .await;
                    let pending = group
                        .into_iter()
                        .map(|job| self.dispatch(job, cancel, &work))
                        .collect();
                    join_in_order(pending, &mut report).await;
                    first = last + 1;
                }
            }
        }

        closer.abort();
        report.peak_active = self.gate.peak();
        tracing::info!(
            finished = report.outcomes.len(),
            interrupted = report.interrupted.len(),
            peak_active = report.peak_active,
            "all jobs joined"
        );
        report
    }

    /// Spawns the task for one job; never waits for the job itself.
    fn dispatch<F, Fut>(
        &self,
        job: Job,
        cancel: &CancellationToken,
        work: &Arc<F>,
    ) -> (String, JoinHandle<Option<JobOutcome>>)
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<JobOutcome>> + Send + 'static,
    {
        let id = job.id().to_string();
        let gate = Arc::clone(&self.gate);
        let cancel = cancel.clone();
        let work = Arc::clone(work);
        let handle = tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = gate.admit() => permit,
            };
            let Some(_permit) = permit else {
                tracing::debug!(job_id = job.id(), "not admitted: run cancelled");
                return None;
            };
            work(job).await
        });
        (id, handle)
    }
}

async fn join_in_order(pending: Pending, report: &mut ScheduleReport) {
    for (id, handle) in pending {
        match handle.await {
            Ok(Some(outcome)) => report.outcomes.push(outcome),
            Ok(None) => report.interrupted.push(id),
            Err(e) if e.is_panic() => {
                let msg = panic_message(e);
                tracing::error!(job_id = %id, "job task panicked: {}", msg);
                report
                    .outcomes
                    .push(JobOutcome::failed(id, JobError::Panicked(msg), None));
            }
            Err(_) => report.interrupted.push(id),
        }
    }
}

fn panic_message(e: JoinError) -> String {
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
