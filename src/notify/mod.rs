//! Notification presenter
//!
//! One toast at a time. A new message replaces the visible one and restarts
//! the dismissal timer; the earlier timer is aborted so it can never hide the
//! newer toast.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::surface::{lock, ToastRegion};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToastRequest {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

struct Inner {
    region: Arc<dyn ToastRegion>,
    duration: Duration,
    pending: Mutex<Option<AbortHandle>>,
}

impl Notifier {
    pub fn new(region: Arc<dyn ToastRegion>, duration: Duration) -> Self {
        Self { inner: Arc::new(Inner { region, duration, pending: Mutex::new(None) }) }
    }

    pub fn success(&self, message: impl Into<String>) { self.notify(message, Severity::Success) }
    pub fn error(&self, message: impl Into<String>) { self.notify(message, Severity::Error) }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let toast = ToastRequest { id: Uuid::new_v4(), message: message.into(), severity };
        let region = &self.inner.region;
        region.ensure_region();

        let mut pending = lock(&self.inner.pending);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        region.show(&toast);
        debug!(toast_id = %toast.id, ?severity, message = %toast.message, "toast shown");

        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let region = Arc::clone(region);
                let id = toast.id;
                let deadline = Instant::now() + self.inner.duration;
                let task = rt.spawn(async move {
                    sleep_until(deadline).await;
                    region.dismiss(id);
                    debug!(toast_id = %id, "toast dismissed");
                });
                *pending = Some(task.abort_handle());
            }
            Err(_) => warn!(toast_id = %toast.id, "no async runtime; toast will not auto-dismiss"),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }
}
