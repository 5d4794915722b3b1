//! Spawning and waiting on the acquisition tool.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ToolConfig, ToolOutput};
use crate::error::JobError;
use crate::job::Job;

use super::stderr::collect_tail;

const OUTPUT_FLAG: &str = "-o";

/// How long a tool that died of SIGINT waits for the run to report cancellation.
const INTERRUPT_GRACE: Duration = Duration::from_millis(250);

/// How to invoke the acquisition tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionCommand {
    program: String,
    base_args: Vec<String>,
    mode_flag: String,
    output: ToolOutput,
}

/// Terminal status of one acquisition process.
#[derive(Debug, PartialEq, Eq)]
pub enum AcquisitionExit {
    /// Exit status 0. Certification is left to the final-size check.
    Finished,
    Failed(JobError),
    /// The run was cancelled; the child was killed.
    Cancelled,
}

impl AcquisitionCommand {
    pub fn new(
        program: impl Into<String>,
        base_args: Vec<String>,
        mode_flag: impl Into<String>,
        output: ToolOutput,
    ) -> Self {
        Self {
            program: program.into(),
            base_args,
            mode_flag: mode_flag.into(),
            output,
        }
    }

    pub fn from_config(cfg: &ToolConfig) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.base_args.clone(),
            cfg.mode_flag.clone(),
            cfg.output,
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program name for `job`.
    pub fn args_for(&self, job: &Job) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.base_args.iter().map(OsString::from).collect();
        args.push(job.access_key().into());
        args.push(self.mode_flag.clone().into());
        args.push(OUTPUT_FLAG.into());
        args.push(job.output_path().as_os_str().to_os_string());
        args
    }

    /// Human-readable command line for `job` (for `plan` output and logs).
    pub fn display_for(&self, job: &Job) -> String {
        std::iter::once(self.program.clone())
            .chain(
                self.args_for(job)
                    .into_iter()
                    .map(|a| a.to_string_lossy().into_owned()),
            )
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Starts the tool for `job` without waiting for it.
    ///
    /// A spawn failure is returned immediately and is terminal for this job only.
    pub fn spawn(&self, job: &Job) -> Result<RunningAcquisition, JobError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args_for(job))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches harvest only, which then kills the tool.
        #[cfg(unix)]
        cmd.process_group(0);

        match self.output {
            ToolOutput::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            ToolOutput::Capture => {
                cmd.stdout(Stdio::null()).stderr(Stdio::piped());
            }
            ToolOutput::Quiet => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| JobError::Spawn(format!("{}: {}", self.program, e)))?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_tail(stderr)));

        tracing::info!(
            job_id = job.id(),
            pid = child.id(),
            "started: {}",
            self.display_for(job)
        );

        Ok(RunningAcquisition {
            job_id: job.id().to_string(),
            child,
            stderr_task,
        })
    }
}

/// A started acquisition process, owned by exactly one job task.
#[derive(Debug)]
pub struct RunningAcquisition {
    job_id: String,
    child: Child,
    stderr_task: Option<JoinHandle<String>>,
}

impl RunningAcquisition {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Waits for the process to exit, or kills it when `cancel` fires.
    ///
    /// A tool that exits while the run is being cancelled is reported as
    /// cancelled, not failed.
    pub async fn wait(mut self, cancel: &CancellationToken) -> AcquisitionExit {
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(job_id = %self.job_id, "failed to kill acquisition tool: {}", e);
                }
                tracing::info!(job_id = %self.job_id, "acquisition tool killed (run cancelled)");
                return AcquisitionExit::Cancelled;
            }
            status = self.child.wait() => status,
        };

        if status.as_ref().map_or(false, interrupted) {
            // The interrupt may have reached the tool before the run's own handler ran.
            let _ = tokio::time::timeout(INTERRUPT_GRACE, cancel.cancelled()).await;
        }
        if cancel.is_cancelled() {
            tracing::info!(job_id = %self.job_id, "acquisition tool exited during cancellation");
            return AcquisitionExit::Cancelled;
        }

        let stderr_tail = match self.stderr_task.take() {
            Some(task) => task.await.ok().filter(|s| !s.is_empty()),
            None => None,
        };

        match status {
            Ok(status) if status.success() => {
                tracing::info!(job_id = %self.job_id, "acquisition command finished");
                AcquisitionExit::Finished
            }
            Ok(status) => {
                tracing::warn!(job_id = %self.job_id, "acquisition command failed: {}", status);
                AcquisitionExit::Failed(JobError::ExitStatus {
                    status: status.to_string(),
                    stderr_tail,
                })
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, "waiting for acquisition tool: {}", e);
                AcquisitionExit::Failed(JobError::ExitStatus {
                    status: format!("unknown ({})", e),
                    stderr_tail,
                })
            }
        }
    }
}

#[cfg(unix)]
fn interrupted(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(libc::SIGINT)
}

#[cfg(not(unix))]
fn interrupted(_status: &std::process::ExitStatus) -> bool {
    false
}
