//! Session priming: open a job's page in a headless browser before the
//! acquisition tool starts.
//!
//! Priming is best effort. A failure is logged and reported, and the job
//! goes on to spawn the acquisition tool anyway. Nothing obtained in the
//! browser is handed to the tool.

mod arena;
mod chromium;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use arena::ContextArena;
pub use chromium::ChromiumPrimer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimingError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser context: {0}")]
    Context(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser already closed")]
    Closed,

    #[error("cancelled")]
    Cancelled,
}

/// A browser session that can prime one job at a time per context.
///
/// Implementations must give every call its own isolated context and release
/// it before returning, whether priming succeeded or not.
#[async_trait]
pub trait SessionPrimer: Send + Sync {
    /// Navigates to `url` in a fresh context for `job_id` and waits for the page to settle.
    async fn prime(
        &self,
        job_id: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), PrimingError>;

    /// Releases every open context and the browser itself.
    async fn shutdown(&self) {}
}
