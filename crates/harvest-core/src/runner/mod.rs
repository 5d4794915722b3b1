//! Subprocess runner: one acquisition tool process per job.
//!
//! The tool is invoked as `<program> <base args..> <key> <mode> -o <path>`.
//! Spawn failures and nonzero exits are terminal for the job. A zero exit
//! only means the command finished; the monitor's final-size check decides
//! whether the job succeeded.

mod command;
mod stderr;

pub use command::{AcquisitionCommand, AcquisitionExit, RunningAcquisition};
