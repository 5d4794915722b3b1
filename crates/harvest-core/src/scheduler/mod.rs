//! Bounded scheduler.
//!
//! Runs every job on its own task with at most `limit` active at once, in
//! one of two modes:
//!
//! - batch: consecutive groups of `limit`; a group must be fully terminal
//!   before the next group starts. Predictable resource use, but each group
//!   is as slow as its slowest job.
//! - semaphore: every job is dispatched at once and waits on the admission
//!   gate; a freed slot admits the next job immediately.
//!
//! A failing or panicking job never affects its siblings.

mod dispatch;
mod gate;
mod plan;

pub use dispatch::{ScheduleReport, Scheduler};
pub use gate::{AdmissionGate, GatePermit};
pub use plan::BatchPlan;
