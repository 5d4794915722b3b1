//! Progress monitor: polls one job's artifact size until told the tool is
//! done, then performs a single final-size check.
//!
//! The final verdict is a size heuristic only. Below the threshold the
//! artifact is reported as suspiciously small (a failed, partial, or
//! placeholder download); at or above it the job succeeds.

mod verdict;
mod watch;

pub use verdict::{classify_final_size, FinalVerdict};
pub use watch::{MonitorSample, ProgressMonitor};
