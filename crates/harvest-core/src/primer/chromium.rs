//! Headless Chromium primer over the DevTools protocol.
//!
//! One browser process is shared by every job. Each `prime` call creates its
//! own browser context (separate cookies and storage), opens a page in it,
//! navigates, waits for the settle delay, then closes the page and disposes
//! the context.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PrimingConfig;

use super::arena::ContextArena;
use super::{PrimingError, SessionPrimer};

pub struct ChromiumPrimer {
    /// Jobs share the browser through read guards; only shutdown takes it.
    browser: RwLock<Option<Browser>>,
    handler_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    contexts: ContextArena<BrowserContextId>,
    settle: Duration,
}

impl ChromiumPrimer {
    /// Launches the shared headless browser described by `cfg`.
    pub async fn launch(cfg: &PrimingConfig) -> Result<Self, PrimingError> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&cfg.browser_path)
            .arg("--disable-gpu");
        if cfg.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref ua) = cfg.user_agent {
            builder = builder.arg(format!("--user-agent={}", ua));
        }
        let config = builder.build().map_err(PrimingError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PrimingError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler stopped: {}", e);
                    break;
                }
            }
        });

        tracing::info!(path = %cfg.browser_path.display(), "headless browser launched");

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler_task: std::sync::Mutex::new(Some(handler_task)),
            contexts: ContextArena::new(),
            settle: cfg.settle(),
        })
    }

    /// Number of job contexts currently open.
    pub fn open_contexts(&self) -> usize {
        self.contexts.len()
    }

    async fn open_context(&self, job_id: &str) -> Result<Page, PrimingError> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or(PrimingError::Closed)?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| PrimingError::Context(e.to_string()))?
            .result
            .browser_context_id;
        if let Some(stale) = self.contexts.register(job_id, context_id.clone()) {
            tracing::warn!(job_id, "job already held a browser context; disposing it");
            dispose(browser, stale).await;
        }

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id)
            .build()
            .map_err(PrimingError::Context)?;
        browser
            .new_page(params)
            .await
            .map_err(|e| PrimingError::Context(e.to_string()))
    }

    async fn navigate_and_settle(
        &self,
        page: &Page,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), PrimingError> {
        let work = async {
            page.goto(url)
                .await
                .map_err(|e| PrimingError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            tokio::time::sleep(self.settle).await;
            Ok(())
        };
        tokio::select! {
            res = work => res,
            _ = cancel.cancelled() => Err(PrimingError::Cancelled),
        }
    }

    async fn close_context(&self, job_id: &str, page: Option<Page>) {
        if let Some(page) = page {
            if let Err(e) = page.close().await {
                tracing::debug!(job_id, "closing page: {}", e);
            }
        }
        let Some(context_id) = self.contexts.release(job_id) else {
            return;
        };
        let guard = self.browser.read().await;
        if let Some(browser) = guard.as_ref() {
            dispose(browser, context_id).await;
        }
    }
}

async fn dispose(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        tracing::debug!("disposing browser context: {}", e);
    }
}

#[async_trait]
impl SessionPrimer for ChromiumPrimer {
    async fn prime(
        &self,
        job_id: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), PrimingError> {
        let page = match self.open_context(job_id).await {
            Ok(page) => page,
            Err(e) => {
                self.close_context(job_id, None).await;
                return Err(e);
            }
        };
        tracing::info!(job_id, url, "priming: navigating");
        let result = self.navigate_and_settle(&page, url, cancel).await;
        self.close_context(job_id, Some(page)).await;
        result
    }

    async fn shutdown(&self) {
        let mut guard = self.browser.write().await;
        if let Some(browser) = guard.as_ref() {
            for (job_id, context_id) in self.contexts.drain() {
                tracing::debug!(job_id = %job_id, "disposing leftover browser context");
                dispose(browser, context_id).await;
            }
        }
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                tracing::debug!("closing browser: {}", e);
            }
            let _ = browser.wait().await;
        }
        drop(guard);

        let handler_task = self
            .handler_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = handler_task {
            task.abort();
        }
        tracing::info!("headless browser closed");
    }
}
