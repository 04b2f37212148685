//! Image upload slots
//!
//! A page groups image uploads into slots (one per product variant, or a
//! single banner). Files enter through a picker or a drop, are validated as a
//! batch, previewed, optionally cropped to a fixed ratio, and finally written
//! into a multipart payload keyed by slot.

pub mod coordinator;
pub mod crop;
pub mod payload;
pub mod preview;
pub mod validate;

pub use coordinator::{Coordinator, SlotState};
pub use crop::{AspectRatio, CropRect, CropSession, Dimensions};
pub use payload::{FilePart, PayloadDescriptor};
pub use preview::Preview;
pub use validate::Rejection;

use std::sync::Arc;

use uuid::Uuid;

use crate::config::ClientConfig;
use crate::surface::PreviewHandle;

/// A file as handed over by a picker or a drop.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), media_type: media_type.into(), bytes }
    }

    pub fn size(&self) -> u64 { self.bytes.len() as u64 }
}

#[derive(Clone, Debug)]
pub struct PendingFile {
    pub id: Uuid,
    pub slot: usize,
    pub original_name: String,
    pub media_type: String,
    pub blob: Arc<[u8]>,
    pub dimensions: Option<Dimensions>,
    pub preview: Option<PreviewHandle>,
}

impl PendingFile {
    fn accept(slot: usize, file: SelectedFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            slot,
            original_name: file.name,
            media_type: file.media_type,
            blob: file.bytes.into(),
            dimensions: None,
            preview: None,
        }
    }
}

/// How many files a slot must hold before the form may be submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotSpec {
    pub min: usize,
    pub max: usize,
}

impl SlotSpec {
    pub const SINGLE: SlotSpec = SlotSpec { min: 1, max: 1 };

    pub fn between(min: usize, max: usize) -> Self {
        Self { min, max: max.max(min) }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct UploadPolicy {
    pub max_file_bytes: u64,
    pub crop_output: Dimensions,
}

impl UploadPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_file_bytes: config.max_upload_bytes,
            crop_output: Dimensions::new(config.crop_width, config.crop_height),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self { Self::from_config(&ClientConfig::default()) }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted { files: Vec<Uuid> },
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool { matches!(self, Self::Accepted { .. }) }
}
