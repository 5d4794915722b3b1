//! Per-job lifecycle and the whole-run entry point.
//!
//! A job runs priming (if any) to completion, then spawns the acquisition
//! tool and starts its progress monitor. When the tool exits the monitor is
//! told once, makes its final size check, and the two results are combined
//! into exactly one [`JobOutcome`]. A tool failure dominates whatever size the
//! artifact has; a tool success defers to the monitor's verdict.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::HarvestConfig;
use crate::error::{JobError, RunError};
use crate::events::{EventSink, JobEvent};
use crate::job::{Job, JobOutcome};
use crate::manifest::read_manifest;
use crate::monitor::{FinalVerdict, ProgressMonitor};
use crate::output::{build_jobs, ensure_output_dir};
use crate::primer::{ChromiumPrimer, PrimingError, SessionPrimer};
use crate::runner::{AcquisitionCommand, AcquisitionExit};
use crate::scheduler::Scheduler;
use crate::summary::RunSummary;

/// Runs single jobs end to end. Shared by every job task of a run.
pub struct Orchestrator {
    command: AcquisitionCommand,
    poll_interval: Duration,
    threshold_bytes: u64,
    stall_warn_after: Option<Duration>,
    primer: Option<Arc<dyn SessionPrimer>>,
    events: EventSink,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(cfg: &HarvestConfig) -> Self {
        Self {
            command: AcquisitionCommand::from_config(&cfg.tool),
            poll_interval: cfg.poll_interval(),
            threshold_bytes: cfg.suspicious_below_bytes,
            stall_warn_after: cfg.stall_warn_after(),
            primer: None,
            events: EventSink::none(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_primer(mut self, primer: Arc<dyn SessionPrimer>) -> Self {
        self.primer = Some(primer);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Overrides the sampling interval (the config value is whole seconds).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn command(&self) -> &AcquisitionCommand {
        &self.command
    }

    /// Runs one job to its terminal state. `None` means the run was cancelled
    /// while this job was in flight.
    pub async fn run_job(&self, job: Job) -> Option<JobOutcome> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let job_id = job.id().to_string();
        tracing::info!(job_id = %job_id, key = job.access_key(), "job started");
        self.events
            .emit(JobEvent::Started {
                job_id: job_id.clone(),
                access_key: job.access_key().to_string(),
            })
            .await;

        let mut warnings = Vec::new();
        if let (Some(primer), Some(url)) = (self.primer.as_ref(), job.priming_url()) {
            match self.prime(primer.as_ref(), &job_id, url).await {
                Ok(()) => {}
                Err(PrimingError::Cancelled) => return None,
                Err(e) => warnings.push(JobError::Priming(e.to_string())),
            }
        }
        if self.cancel.is_cancelled() {
            return None;
        }

        let running = match self.command.spawn(&job) {
            Ok(running) => running,
            Err(e) => {
                tracing::warn!(job_id = %job_id, "{}", e);
                let outcome = JobOutcome::failed(&job_id, e, None).with_warnings(warnings);
                self.events.emit(JobEvent::Finished(outcome.clone())).await;
                return Some(outcome);
            }
        };

        let monitor = ProgressMonitor::new(
            &job_id,
            job.output_path(),
            self.poll_interval,
            self.threshold_bytes,
        )
        .with_stall_warning(self.stall_warn_after)
        .with_events(self.events.clone());
        let (done_tx, done_rx) = oneshot::channel();

        let acquisition = async {
            let exit = running.wait(&self.cancel).await;
            if exit != AcquisitionExit::Cancelled {
                self.events
                    .emit(JobEvent::CommandFinished {
                        job_id: job_id.clone(),
                        success: exit == AcquisitionExit::Finished,
                    })
                    .await;
                let _ = done_tx.send(());
            }
            // Cancelled: `done_tx` is dropped here and the monitor exits without a final check.
            exit
        };
        let (exit, verdict) = tokio::join!(acquisition, monitor.run(done_rx));

        let outcome = combine(&job_id, exit, verdict)?.with_warnings(warnings);
        tracing::info!(
            job_id = %job_id,
            state = outcome.state.label(),
            size_bytes = outcome.final_size_bytes,
            "job finished"
        );
        self.events.emit(JobEvent::Finished(outcome.clone())).await;
        Some(outcome)
    }

    async fn prime(&self, primer: &dyn SessionPrimer, job_id: &str, url: &str) -> Result<(), PrimingError> {
        self.events
            .emit(JobEvent::Priming {
                job_id: job_id.to_string(),
                url: url.to_string(),
            })
            .await;
        match primer.prime(job_id, url, &self.cancel).await {
            Ok(()) => {
                tracing::info!(job_id, "priming finished");
                self.events
                    .emit(JobEvent::Primed {
                        job_id: job_id.to_string(),
                    })
                    .await;
                Ok(())
            }
            Err(PrimingError::Cancelled) => Err(PrimingError::Cancelled),
            Err(e) => {
                tracing::warn!(job_id, "priming failed, continuing unprimed: {}", e);
                self.events
                    .emit(JobEvent::PrimingFailed {
                        job_id: job_id.to_string(),
                        reason: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Schedules every job and aggregates the outcomes. Shuts the primer down at the end.
    pub async fn run(self, jobs: Vec<Job>, scheduler: &Scheduler) -> RunSummary {
        let this = Arc::new(self);
        let cancel = this.cancel.clone();
        let worker = Arc::clone(&this);
        let report = scheduler
            .run(jobs, &cancel, move |job| {
                let worker = Arc::clone(&worker);
                async move { worker.run_job(job).await }
            })
            .await;
        if let Some(ref primer) = this.primer {
            primer.shutdown().await;
        }
        RunSummary {
            outcomes: report.outcomes,
            interrupted: report.interrupted,
            skipped: Vec::new(),
            peak_active: report.peak_active,
        }
    }
}

/// Combines the tool's exit with the monitor's verdict. `None` if either side
/// was cut short by cancellation.
pub fn combine(job_id: &str, exit: AcquisitionExit, verdict: Option<FinalVerdict>) -> Option<JobOutcome> {
    match (exit, verdict) {
        (AcquisitionExit::Cancelled, _) => None,
        (AcquisitionExit::Failed(e), verdict) => Some(JobOutcome::failed(
            job_id,
            e,
            verdict.and_then(|v| v.size_bytes()),
        )),
        (AcquisitionExit::Finished, Some(FinalVerdict::Succeeded { size_bytes })) => {
            Some(JobOutcome::succeeded(job_id, size_bytes))
        }
        (
            AcquisitionExit::Finished,
            Some(FinalVerdict::SuspiciouslySmall {
                size_bytes,
                threshold_bytes,
            }),
        ) => Some(JobOutcome::suspiciously_small(job_id, size_bytes, threshold_bytes)),
        (AcquisitionExit::Finished, Some(FinalVerdict::StatError(e))) => {
            Some(JobOutcome::failed(job_id, JobError::FinalStat(e), None))
        }
        (AcquisitionExit::Finished, None) => None,
    }
}

/// Options for [`run_manifest`] that do not live in the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Use the `[priming]` section if configured.
    pub prime: bool,
    pub events: EventSink,
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            prime: true,
            events: EventSink::none(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Reads the manifest, prepares the output directory, then runs every job.
///
/// Only an unreadable manifest or an uncreatable output directory is an
/// error; everything else ends up in the summary.
pub async fn run_manifest(
    cfg: &HarvestConfig,
    manifest_path: &Path,
    opts: RunOptions,
) -> Result<RunSummary, RunError> {
    let manifest = read_manifest(manifest_path)?;
    ensure_output_dir(&cfg.output_dir)?;
    let jobs = build_jobs(&manifest.records, cfg, opts.prime);

    let mut orchestrator = Orchestrator::new(cfg)
        .with_events(opts.events.clone())
        .with_cancellation(opts.cancel.clone());
    if let Some(primer) = launch_primer(cfg, &jobs, opts.prime).await {
        orchestrator = orchestrator.with_primer(primer);
    }

    let scheduler = Scheduler::new(cfg.schedule_mode, cfg.effective_concurrency()).with_events(opts.events);
    let mut summary = orchestrator.run(jobs, &scheduler).await;
    summary.skipped = manifest.skipped;
    Ok(summary)
}

/// Starts the shared browser when priming is configured, enabled, and some job
/// has a priming URL. A launch failure leaves the run unprimed.
async fn launch_primer(cfg: &HarvestConfig, jobs: &[Job], prime: bool) -> Option<Arc<dyn SessionPrimer>> {
    let priming = cfg.priming.as_ref().filter(|_| prime)?;
    if !jobs.iter().any(|j| j.priming_url().is_some()) {
        return None;
    }
    match ChromiumPrimer::launch(priming).await {
        Ok(primer) => Some(Arc::new(primer)),
        Err(e) => {
            tracing::warn!("{}; jobs will run unprimed", e);
            None
        }
    }
}
