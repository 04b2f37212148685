//! Page-lifetime task ownership.
//!
//! Every deferred callback a page schedules (toast follow-ups, redirects,
//! countdowns, clocks) is spawned through a [`PageScope`]. Named tasks replace
//! their predecessor; dropping the scope aborts whatever is still running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::surface::{lock, CountdownDisplay};

#[derive(Default)]
pub struct PageScope {
    tasks: Mutex<Tasks>,
}

#[derive(Default)]
struct Tasks {
    anonymous: Vec<AbortHandle>,
    named: HashMap<String, AbortHandle>,
}

impl PageScope {
    pub fn new() -> Self { Self::default() }

    /// Spawns `fut` for the life of the page. Outside a runtime the task is
    /// skipped with a warning, the same way toasts skip auto-dismiss.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(handle) = launch(None, fut) else { return };
        let mut tasks = lock(&self.tasks);
        tasks.anonymous.retain(|h| !h.is_finished());
        tasks.anonymous.push(handle);
    }

    /// Spawns `fut` under `name`, aborting any task already registered there.
    pub fn spawn_named<F>(&self, name: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(handle) = launch(Some(name), fut) else { return };
        if let Some(previous) = lock(&self.tasks).named.insert(name.to_string(), handle) {
            previous.abort();
            debug!(task = name, "replaced scoped task");
        }
    }

    pub fn cancel(&self, name: &str) -> bool {
        match lock(&self.tasks).named.remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        lock(&self.tasks).named.get(name).is_some_and(|h| !h.is_finished())
    }

    /// Runs `f` once after `delay`, unless the scope closes first.
    pub fn spawn_after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) {
        let deadline = Instant::now() + delay;
        self.spawn(async move {
            sleep_until(deadline).await;
            f();
        });
    }

    /// Calls `f` immediately and then once per `period` until cancelled.
    pub fn every(&self, name: &str, period: Duration, f: impl Fn() + Send + 'static) {
        let start = Instant::now();
        self.spawn_named(name, async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                f();
            }
        });
    }

    /// Shows `secs`, `secs - 1`, ... `1` a second apart, then reports
    /// completion. Restarting under the same name replaces the old countdown.
    pub fn countdown(&self, name: &str, secs: u64, display: Arc<dyn CountdownDisplay>) {
        let start = Instant::now();
        self.spawn_named(name, async move {
            for (elapsed, remaining) in (1..=secs).rev().enumerate() {
                sleep_until(start + Duration::from_secs(elapsed as u64)).await;
                display.tick(remaining);
            }
            sleep_until(start + Duration::from_secs(secs)).await;
            display.finished();
        });
    }

    /// Aborts every task. Called on drop.
    pub fn close(&self) {
        let mut tasks = lock(&self.tasks);
        let count = tasks.anonymous.len() + tasks.named.len();
        tasks.anonymous.drain(..).for_each(|h| h.abort());
        tasks.named.drain().for_each(|(_, h)| h.abort());
        if count > 0 {
            debug!(count, "page scope closed");
        }
    }
}

fn launch<F>(name: Option<&str>, fut: F) -> Option<AbortHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(runtime) => Some(runtime.spawn(fut).abort_handle()),
        Err(_) => {
            warn!(task = name.unwrap_or("anonymous"), "no async runtime; scoped task not started");
            None
        }
    }
}

impl Drop for PageScope {
    fn drop(&mut self) {
        self.close();
    }
}
