//! Page capabilities the core drives.
//!
//! Each trait is the narrow slice of a page one component touches. A browser
//! bridge implements them against real elements; [`memory`] keeps the state
//! in process for headless hosts and tests.

pub mod memory;

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::format::DeliveryEstimate;
use crate::notify::ToastRequest;
use crate::upload::Preview;

/// Fixed region that holds at most one toast.
pub trait ToastRegion: Send + Sync {
    /// Creates the region if the page did not render one. Idempotent.
    fn ensure_region(&self);
    /// Replaces whatever is shown with `toast`.
    fn show(&self, toast: &ToastRequest);
    /// Removes the toast with `id` if it is still the one shown.
    fn dismiss(&self, id: Uuid);
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PreviewHandle(pub Uuid);

pub trait PreviewSink: Send + Sync {
    fn attach(&self, slot: usize, file_name: &str, preview: &Preview) -> PreviewHandle;
    fn replace(&self, handle: &PreviewHandle, preview: &Preview);
    fn detach(&self, handle: &PreviewHandle);
}

/// The row of single-character OTP inputs.
pub trait OtpFields: Send + Sync {
    fn values(&self) -> Vec<String>;
    fn clear(&self);
    fn focus(&self, index: usize);
}

/// A push button that triggers a network action.
pub trait Control: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn set_label(&self, label: &str);
    fn label(&self) -> String;
}

/// A plain form whose fields are posted as they stand.
pub trait FormFields: Send + Sync {
    fn values(&self) -> Vec<(String, String)>;
    fn reset(&self);
}

pub trait Navigator: Send + Sync {
    fn redirect(&self, location: &str);
    fn reload(&self);
}

pub trait CountdownDisplay: Send + Sync {
    fn tick(&self, remaining_secs: u64);
    fn finished(&self);
}

pub trait DeliveryDisplay: Send + Sync {
    fn update(&self, estimate: &DeliveryEstimate);
}

/// Disables a control for the life of a request.
///
/// Dropping the guard restores the idle label and re-enables the control, so
/// every early return leaves the page interactive. Call [`ControlGuard::hold`]
/// when the page is about to navigate away.
pub struct ControlGuard {
    control: Arc<dyn Control>,
    idle_label: String,
    armed: bool,
}

impl ControlGuard {
    pub fn engage(control: Arc<dyn Control>, busy_label: &str) -> Self {
        let idle_label = control.label();
        control.set_enabled(false);
        control.set_label(busy_label);
        Self { control, idle_label, armed: true }
    }

    pub fn hold(mut self) {
        self.armed = false;
    }
}

impl Drop for ControlGuard {
    fn drop(&mut self) {
        if self.armed {
            self.control.set_label(&self.idle_label);
            self.control.set_enabled(true);
        }
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryControl;
    use super::*;

    #[test]
    fn guard_restores_control_on_drop() {
        let control = Arc::new(MemoryControl::new("Proceed to Pay"));
        {
            let _guard = ControlGuard::engage(control.clone(), "Processing...");
            assert!(!control.enabled());
            assert_eq!(control.label(), "Processing...");
        }
        assert!(control.enabled());
        assert_eq!(control.label(), "Proceed to Pay");
    }

    #[test]
    fn held_guard_leaves_control_disabled() {
        let control = Arc::new(MemoryControl::new("Pay"));
        ControlGuard::engage(control.clone(), "Processing...").hold();
        assert!(!control.enabled());
    }
}
