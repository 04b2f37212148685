//! Explicit per-page context.
//!
//! Built once when a page loads and handed to every controller. Dropping the
//! last reference is the page unload: the scope aborts outstanding timers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::notify::Notifier;
use crate::scope::PageScope;
use crate::surface::{Navigator, PreviewSink, ToastRegion};
use crate::upload::{Coordinator, UploadPolicy};
use crate::{Result, StorefrontError};

pub struct PageContext {
    pub config: ClientConfig,
    pub notifier: Notifier,
    pub api: ApiClient,
    pub navigator: Arc<dyn Navigator>,
    pub scope: PageScope,
}

impl PageContext {
    pub fn new(config: ClientConfig, toasts: Arc<dyn ToastRegion>, navigator: Arc<dyn Navigator>) -> Result<Arc<Self>> {
        let api = ApiClient::new(&config)?;
        let notifier = Notifier::new(toasts, config.toast_duration);
        Ok(Arc::new(Self { config, notifier, api, navigator, scope: PageScope::new() }))
    }

    pub fn upload_coordinator(&self, previews: Arc<dyn PreviewSink>) -> Coordinator {
        Coordinator::new(UploadPolicy::from_config(&self.config), previews, self.notifier.clone())
    }

    pub fn redirect_after(&self, delay: Duration, location: &str) {
        let navigator = Arc::clone(&self.navigator);
        let location = location.to_string();
        debug!(%location, delay_ms = delay.as_millis() as u64, "redirect scheduled");
        self.scope.spawn_after(delay, move || navigator.redirect(&location));
    }

    pub fn reload_after(&self, delay: Duration) {
        let navigator = Arc::clone(&self.navigator);
        self.scope.spawn_after(delay, move || navigator.reload());
    }

    /// Logs `err` and shows it, falling back to `fallback` when neither the
    /// server nor local validation supplied a message.
    pub fn report(&self, err: &StorefrontError, fallback: &str) {
        warn!(error = %err, kind = ?err.kind(), "action failed");
        self.notifier.error(err.user_message(fallback));
    }
}
