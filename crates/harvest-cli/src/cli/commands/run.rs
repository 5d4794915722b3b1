//! `harvest run` – run every job in a manifest.

use std::path::Path;

use anyhow::Result;
use harvest_core::config::HarvestConfig;
use harvest_core::events::{EventSink, JobEvent};
use harvest_core::orchestrator::{run_manifest, RunOptions};
use harvest_core::summary::{outcome_line, RunSummary};
use tokio_util::sync::CancellationToken;

/// Exit code after Ctrl-C, as a shell reports SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

pub async fn run_manifest_cmd(
    cfg: &HarvestConfig,
    manifest: &Path,
    prime: bool,
    report: Option<&Path>,
) -> Result<i32> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut presses = 0;
            while tokio::signal::ctrl_c().await.is_ok() {
                presses += 1;
                match interrupt_action(presses) {
                    InterruptAction::Cancel => {
                        eprintln!("interrupted: stopping running jobs (Ctrl-C again to exit now)");
                        tracing::warn!("interrupt received, cancelling run");
                        cancel.cancel();
                    }
                    InterruptAction::Exit => {
                        eprintln!("second interrupt: exiting");
                        tracing::warn!("second interrupt received, exiting without cleanup");
                        std::process::exit(EXIT_INTERRUPTED);
                    }
                }
            }
        })
    };

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<JobEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("{}", event_line(&event));
        }
    });

    let opts = RunOptions {
        prime,
        events: EventSink::new(event_tx),
        cancel: cancel.clone(),
    };
    let result = run_manifest(cfg, manifest, opts).await;
    interrupt.abort();
    let _ = printer.await;
    let summary = result?;

    print_summary(&summary);

    if let Some(path) = report {
        summary.write_json(path)?;
        println!("report written to {}", path.display());
    }

    if summary.is_interrupted() || cancel.is_cancelled() {
        Ok(EXIT_INTERRUPTED)
    } else {
        Ok(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Cancel the run and let jobs wind down.
    Cancel,
    /// Give up on a clean shutdown.
    Exit,
}

fn interrupt_action(presses: u32) -> InterruptAction {
    if presses <= 1 {
        InterruptAction::Cancel
    } else {
        InterruptAction::Exit
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Summary:");
    for outcome in &summary.outcomes {
        println!("  {}", outcome_line(outcome));
    }
    for id in &summary.interrupted {
        println!("  [{}] interrupted", id);
    }
    for skipped in &summary.skipped {
        println!("  skipped {}", skipped);
    }
    println!("{}", summary.counts());
}

/// Operator line for one lifecycle event.
pub(crate) fn event_line(event: &JobEvent) -> String {
    match event {
        JobEvent::BatchStarted {
            number,
            first,
            last,
            total,
        } => format!("batch {}: jobs {}-{} of {}", number, first, last, total),
        JobEvent::Started { job_id, access_key } => {
            format!("[{}] starting (key {})", job_id, access_key)
        }
        JobEvent::Priming { job_id, url } => format!("[{}] priming {}", job_id, url),
        JobEvent::PrimingFailed { job_id, reason } => {
            format!("[{}] priming failed, continuing: {}", job_id, reason)
        }
        JobEvent::Primed { job_id } => format!("[{}] primed", job_id),
        JobEvent::Progress(sample) => format!(
            "[{}] {:.2} MiB ({:+} B, {:.2} MiB/s)",
            sample.job_id,
            sample.size_mib(),
            sample.delta_bytes,
            sample.bytes_per_sec() / 1_048_576.0
        ),
        JobEvent::Stalled {
            job_id,
            idle,
            size_bytes,
        } => format!(
            "[{}] no growth for {}s at {:.2} MiB",
            job_id,
            idle.as_secs(),
            *size_bytes as f64 / 1_048_576.0
        ),
        JobEvent::CommandFinished { job_id, success } => {
            if *success {
                format!("[{}] acquisition command finished", job_id)
            } else {
                format!("[{}] acquisition command failed", job_id)
            }
        }
        JobEvent::Finished(outcome) => outcome_line(outcome),
    }
}
