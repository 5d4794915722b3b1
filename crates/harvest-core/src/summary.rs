//! Run-level aggregation of job outcomes.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::error::MalformedRecord;
use crate::job::{JobOutcome, TerminalState};

/// Everything a run produced. Built once after the scheduler has joined every job.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
    /// Job ids cut short by cancellation. Their artifacts are indeterminate.
    pub interrupted: Vec<String>,
    pub skipped: Vec<MalformedRecord>,
    pub peak_active: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub suspiciously_small: usize,
    pub interrupted: usize,
    pub skipped: usize,
}

impl fmt::Display for SummaryCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} suspiciously small",
            self.succeeded, self.failed, self.suspiciously_small
        )?;
        if self.interrupted > 0 {
            write!(f, ", {} interrupted", self.interrupted)?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

impl RunSummary {
    pub fn counts(&self) -> SummaryCounts {
        let mut counts = SummaryCounts {
            interrupted: self.interrupted.len(),
            skipped: self.skipped.len(),
            ..SummaryCounts::default()
        };
        for o in &self.outcomes {
            match o.state {
                TerminalState::Succeeded => counts.succeeded += 1,
                TerminalState::Failed(_) => counts.failed += 1,
                TerminalState::SuspiciouslySmall => counts.suspiciously_small += 1,
            }
        }
        counts
    }

    pub fn is_interrupted(&self) -> bool {
        !self.interrupted.is_empty()
    }

    /// Jobs worth retrying: failed or suspiciously small.
    pub fn retry_candidates(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Writes the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize run summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("write run report {}", path.display()))?;
        Ok(())
    }
}

/// One operator line for an outcome, e.g. `[12] succeeded (153.2 MiB)`.
pub fn outcome_line(outcome: &JobOutcome) -> String {
    let size = outcome
        .final_size_bytes
        .map(|b| format!(" ({:.1} MiB)", b as f64 / 1_048_576.0))
        .unwrap_or_default();
    let mut line = format!("[{}] {}{}", outcome.job_id, outcome.state.label(), size);
    if let TerminalState::Failed(ref reason) = outcome.state {
        // Keep the summary to one line; the full stderr tail is in the log.
        let first = reason.lines().next().unwrap_or_default();
        line.push_str(": ");
        line.push_str(first);
    }
    for w in &outcome.warnings {
        line.push_str(&format!(" [warning: {}]", w));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{JobError, MalformedReason};

    fn summary() -> RunSummary {
        RunSummary {
            outcomes: vec![
                JobOutcome::succeeded("1", 20 * 1_048_576),
                JobOutcome::suspiciously_small("2", 4096, 10 * 1_048_576),
                JobOutcome::failed(
                    "3",
                    JobError::ExitStatus {
                        status: "exit status: 1".into(),
                        stderr_tail: Some("bad key\nmore".into()),
                    },
                    Some(50 * 1_048_576),
                ),
                JobOutcome::succeeded("4", 11 * 1_048_576)
                    .with_warnings(vec![JobError::Priming("timeout".into())]),
            ],
            interrupted: vec!["5".into()],
            skipped: vec![MalformedRecord {
                line: 3,
                raw: "a:b:c".into(),
                reason: MalformedReason::FieldCount(3),
            }],
            peak_active: 2,
        }
    }

    #[test]
    fn counts_every_category() {
        let c = summary().counts();
        assert_eq!(
            c,
            SummaryCounts {
                succeeded: 2,
                failed: 1,
                suspiciously_small: 1,
                interrupted: 1,
                skipped: 1,
            }
        );
        assert_eq!(
            c.to_string(),
            "2 succeeded, 1 failed, 1 suspiciously small, 1 interrupted, 1 skipped"
        );
        assert_eq!(
            SummaryCounts::default().to_string(),
            "0 succeeded, 0 failed, 0 suspiciously small"
        );
    }

    #[test]
    fn lines_are_single_line() {
        let s = summary();
        assert_eq!(outcome_line(&s.outcomes[0]), "[1] succeeded (20.0 MiB)");
        assert_eq!(
            outcome_line(&s.outcomes[2]),
            "[3] failed (50.0 MiB): acquisition tool exited with exit status: 1; stderr:"
        );
        assert_eq!(
            outcome_line(&s.outcomes[3]),
            "[4] succeeded (11.0 MiB) [warning: priming failed: timeout]"
        );
        assert!(s.is_interrupted());
        let retry: Vec<&str> = s.retry_candidates().map(|o| o.job_id.as_str()).collect();
        assert_eq!(retry, vec!["2", "3"]);
    }

    #[test]
    fn json_report_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        summary().write_json(&path).unwrap();
        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["outcomes"][0]["state"]["state"], "succeeded");
        assert_eq!(v["outcomes"][1]["state"]["state"], "suspiciously_small");
        assert_eq!(v["outcomes"][2]["error"]["kind"], "exit_status");
        assert_eq!(v["outcomes"][3]["warnings"][0]["kind"], "priming");
        assert_eq!(v["interrupted"][0], "5");
        assert_eq!(v["skipped"][0]["reason"]["field_count"], 3);
        assert_eq!(v["peak_active"], 2);
    }
}
