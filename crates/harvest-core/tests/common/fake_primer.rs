//! Session primers that never launch a browser.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use harvest_core::primer::{PrimingError, SessionPrimer};
use tokio_util::sync::CancellationToken;

/// Records every priming call and fails the ones whose URL contains `fail_on`.
#[derive(Default)]
pub struct ScriptedPrimer {
    pub fail_on: Option<String>,
    pub calls: Mutex<Vec<(String, String)>>,
    pub shut_down: Mutex<bool>,
}

impl ScriptedPrimer {
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionPrimer for ScriptedPrimer {
    async fn prime(
        &self,
        job_id: &str,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), PrimingError> {
        self.calls
            .lock()
            .unwrap()
            .push((job_id.to_string(), url.to_string()));
        match self.fail_on {
            Some(ref p) if url.contains(p.as_str()) => Err(PrimingError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn shutdown(&self) {
        *self.shut_down.lock().unwrap() = true;
    }
}
