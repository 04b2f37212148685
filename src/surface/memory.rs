//! In-process surfaces.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::{lock, Control, CountdownDisplay, DeliveryDisplay, FormFields, Navigator, OtpFields, PreviewHandle, PreviewSink, ToastRegion};
use crate::format::DeliveryEstimate;
use crate::notify::ToastRequest;
use crate::upload::Preview;

#[derive(Default)]
pub struct MemoryToastRegion {
    state: Mutex<ToastState>,
}

#[derive(Default)]
struct ToastState {
    created: bool,
    creations: usize,
    visible: Option<ToastRequest>,
    history: Vec<ToastRequest>,
}

impl MemoryToastRegion {
    pub fn new() -> Self { Self::default() }
    pub fn visible(&self) -> Option<ToastRequest> { lock(&self.state).visible.clone() }
    pub fn visible_message(&self) -> Option<String> { self.visible().map(|t| t.message) }
    pub fn history(&self) -> Vec<ToastRequest> { lock(&self.state).history.clone() }
    pub fn region_creations(&self) -> usize { lock(&self.state).creations }
}

impl ToastRegion for MemoryToastRegion {
    fn ensure_region(&self) {
        let mut s = lock(&self.state);
        if !s.created {
            s.created = true;
            s.creations += 1;
        }
    }

    fn show(&self, toast: &ToastRequest) {
        let mut s = lock(&self.state);
        s.visible = Some(toast.clone());
        s.history.push(toast.clone());
    }

    fn dismiss(&self, id: Uuid) {
        let mut s = lock(&self.state);
        if s.visible.as_ref().is_some_and(|t| t.id == id) {
            s.visible = None;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ShownPreview {
    pub slot: usize,
    pub file_name: String,
    pub preview: Preview,
}

#[derive(Default)]
pub struct MemoryPreviews {
    shown: Mutex<HashMap<PreviewHandle, ShownPreview>>,
}

impl MemoryPreviews {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { lock(&self.shown).len() }
    pub fn in_slot(&self, slot: usize) -> Vec<ShownPreview> {
        lock(&self.shown).values().filter(|p| p.slot == slot).cloned().collect()
    }
    pub fn get(&self, handle: &PreviewHandle) -> Option<ShownPreview> { lock(&self.shown).get(handle).cloned() }
}

impl PreviewSink for MemoryPreviews {
    fn attach(&self, slot: usize, file_name: &str, preview: &Preview) -> PreviewHandle {
        let handle = PreviewHandle(Uuid::new_v4());
        lock(&self.shown).insert(handle.clone(), ShownPreview { slot, file_name: file_name.to_string(), preview: preview.clone() });
        handle
    }

    fn replace(&self, handle: &PreviewHandle, preview: &Preview) {
        if let Some(shown) = lock(&self.shown).get_mut(handle) {
            shown.preview = preview.clone();
        }
    }

    fn detach(&self, handle: &PreviewHandle) {
        lock(&self.shown).remove(handle);
    }
}

pub struct MemoryOtpFields {
    values: Mutex<Vec<String>>,
    focused: Mutex<Option<usize>>,
}

impl MemoryOtpFields {
    pub fn new(len: usize) -> Self {
        Self { values: Mutex::new(vec![String::new(); len]), focused: Mutex::new(None) }
    }

    /// Types `code` one character per field.
    pub fn type_code(&self, code: &str) {
        let mut values = lock(&self.values);
        for (slot, ch) in values.iter_mut().zip(code.chars()) {
            *slot = ch.to_string();
        }
    }

    pub fn focused(&self) -> Option<usize> { *lock(&self.focused) }
}

impl OtpFields for MemoryOtpFields {
    fn values(&self) -> Vec<String> { lock(&self.values).clone() }
    fn clear(&self) { lock(&self.values).iter_mut().for_each(String::clear); }
    fn focus(&self, index: usize) { *lock(&self.focused) = Some(index); }
}

pub struct MemoryControl {
    state: Mutex<(bool, String)>,
}

impl MemoryControl {
    pub fn new(label: &str) -> Self { Self { state: Mutex::new((true, label.to_string())) } }
    pub fn enabled(&self) -> bool { lock(&self.state).0 }
}

impl Control for MemoryControl {
    fn set_enabled(&self, enabled: bool) { lock(&self.state).0 = enabled; }
    fn set_label(&self, label: &str) { lock(&self.state).1 = label.to_string(); }
    fn label(&self) -> String { lock(&self.state).1.clone() }
}

#[derive(Default)]
pub struct MemoryForm {
    fields: Mutex<Vec<(String, String)>>,
}

impl MemoryForm {
    pub fn new() -> Self { Self::default() }

    pub fn fill(&self, name: &str, value: &str) {
        let mut fields = lock(&self.fields);
        match fields.iter_mut().find(|(k, _)| k == name) {
            Some(field) => field.1 = value.to_string(),
            None => fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn is_blank(&self) -> bool { lock(&self.fields).iter().all(|(_, v)| v.is_empty()) }
}

impl FormFields for MemoryForm {
    fn values(&self) -> Vec<(String, String)> { lock(&self.fields).clone() }
    fn reset(&self) {
        for field in lock(&self.fields).iter_mut() {
            field.1.clear();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Redirect(String),
    Reload,
}

#[derive(Default)]
pub struct MemoryNavigator {
    visits: Mutex<Vec<Navigation>>,
}

impl MemoryNavigator {
    pub fn new() -> Self { Self::default() }
    pub fn visits(&self) -> Vec<Navigation> { lock(&self.visits).clone() }
    pub fn last(&self) -> Option<Navigation> { lock(&self.visits).last().cloned() }
}

impl Navigator for MemoryNavigator {
    fn redirect(&self, location: &str) { lock(&self.visits).push(Navigation::Redirect(location.to_string())); }
    fn reload(&self) { lock(&self.visits).push(Navigation::Reload); }
}

#[derive(Default)]
pub struct MemoryCountdown {
    state: Mutex<(Vec<u64>, bool)>,
}

impl MemoryCountdown {
    pub fn new() -> Self { Self::default() }
    pub fn ticks(&self) -> Vec<u64> { lock(&self.state).0.clone() }
    pub fn is_finished(&self) -> bool { lock(&self.state).1 }
}

impl CountdownDisplay for MemoryCountdown {
    fn tick(&self, remaining_secs: u64) {
        let mut s = lock(&self.state);
        s.0.push(remaining_secs);
        s.1 = false;
    }
    fn finished(&self) { lock(&self.state).1 = true; }
}

#[derive(Default)]
pub struct MemoryDeliveryDisplay {
    last: Mutex<Option<DeliveryEstimate>>,
    updates: Mutex<usize>,
}

impl MemoryDeliveryDisplay {
    pub fn new() -> Self { Self::default() }
    pub fn last(&self) -> Option<DeliveryEstimate> { lock(&self.last).clone() }
    pub fn updates(&self) -> usize { *lock(&self.updates) }
}

impl DeliveryDisplay for MemoryDeliveryDisplay {
    fn update(&self, estimate: &DeliveryEstimate) {
        *lock(&self.last) = Some(estimate.clone());
        *lock(&self.updates) += 1;
    }
}
