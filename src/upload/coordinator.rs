//! Per-page upload state.
//!
//! The coordinator owns every pending file and the single crop session. Slot
//! states run `Empty -> HasFiles -> CroppingOneFile -> HasFiles -> Empty`;
//! cropping never changes how many files a slot holds.

use std::sync::Arc;

use image::GenericImageView;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::crop::{self, AspectRatio, CropSession, Dimensions};
use super::payload::{slot_key, FilePart, PayloadDescriptor};
use super::preview;
use super::validate::{self, Rejection};
use super::{PendingFile, SelectedFile, SlotSpec, UploadPolicy, ValidationOutcome};
use crate::api::{Ack, ApiClient};
use crate::notify::Notifier;
use crate::surface::PreviewSink;
use crate::{Result, StorefrontError};

const CROP_FAILED: &str = "Could not crop this image. Please try another file.";
const UNREADABLE_IMAGE: &str = "This image could not be read. Please choose another file.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    HasFiles,
    CroppingOneFile,
}

#[derive(Debug)]
struct UploadSlot {
    bounds: SlotSpec,
    files: Vec<PendingFile>,
}

#[derive(Clone, Copy, Debug)]
struct ActiveCrop {
    session: Uuid,
    slot: usize,
    file: Uuid,
}

pub struct Coordinator {
    policy: UploadPolicy,
    slots: Vec<UploadSlot>,
    previews: Arc<dyn PreviewSink>,
    notifier: Notifier,
    crop: Option<ActiveCrop>,
}

impl Coordinator {
    pub fn new(policy: UploadPolicy, previews: Arc<dyn PreviewSink>, notifier: Notifier) -> Self {
        Self { policy, slots: Vec::new(), previews, notifier, crop: None }
    }

    pub fn with_slots(mut self, slot_bounds: impl IntoIterator<Item = SlotSpec>) -> Self {
        for bounds in slot_bounds {
            self.add_slot(bounds);
        }
        self
    }

    /// Registers another slot, e.g. when a variant form is added, and
    /// returns its index.
    pub fn add_slot(&mut self, bounds: SlotSpec) -> usize {
        self.slots.push(UploadSlot { bounds, files: Vec::new() });
        self.slots.len() - 1
    }

    pub fn slot_count(&self) -> usize { self.slots.len() }

    pub fn files(&self, slot: usize) -> &[PendingFile] {
        self.slots.get(slot).map(|s| s.files.as_slice()).unwrap_or(&[])
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        let s = self.slots.get(slot)?;
        Some(match self.crop {
            Some(c) if c.slot == slot => SlotState::CroppingOneFile,
            _ if s.files.is_empty() => SlotState::Empty,
            _ => SlotState::HasFiles,
        })
    }

    /// File under the open crop session, if any.
    pub fn active_crop(&self) -> Option<&PendingFile> {
        let c = self.crop?;
        self.find(c.file)
    }

    pub async fn accept_files(&mut self, slot: usize, files: Vec<SelectedFile>) -> ValidationOutcome {
        let checked = match self.slots.get(slot) {
            Some(s) => validate::validate_batch(slot, s.bounds, s.files.len(), &files, self.policy.max_file_bytes),
            None => Err(Rejection::UnknownSlot(slot)),
        };
        if let Err(rejection) = checked {
            warn!(slot, offered = files.len(), %rejection, "files rejected");
            self.notifier.error(rejection.to_string());
            return ValidationOutcome::Rejected(rejection);
        }

        let accepted: Vec<PendingFile> = files.into_iter().map(|f| PendingFile::accept(slot, f)).collect();
        let ids: Vec<Uuid> = accepted.iter().map(|f| f.id).collect();
        self.slots[slot].files.extend(accepted);
        info!(slot, count = ids.len(), total = self.slots[slot].files.len(), "files accepted");

        for id in &ids {
            self.refresh_preview(*id).await;
        }
        ValidationOutcome::Accepted { files: ids }
    }

    /// Removes the first file in `slot` named `file_name`. Missing files are
    /// ignored.
    pub fn remove_file(&mut self, slot: usize, file_name: &str) {
        let Some(s) = self.slots.get_mut(slot) else { return };
        let Some(pos) = s.files.iter().position(|f| f.original_name == file_name) else {
            debug!(slot, file_name, "remove ignored: no such file");
            return;
        };
        let file = s.files.remove(pos);
        if let Some(handle) = &file.preview {
            self.previews.detach(handle);
        }
        if self.crop.is_some_and(|c| c.file == file.id) {
            self.crop = None;
            info!(slot, file_name, "crop session closed: file removed");
        }
        info!(slot, file_name, remaining = s.files.len(), "file removed");
    }

    pub fn begin_crop(&mut self, slot: usize, file_name: &str, aspect: AspectRatio) -> Result<CropSession> {
        if let Some(active) = self.crop {
            warn!(slot, file_name, active_file = %active.file, "crop refused: session already open");
            self.notifier.error("Please finish cropping the current image first.");
            return Err(StorefrontError::CropInProgress);
        }
        let Some(file) = self.files(slot).iter().find(|f| f.original_name == file_name) else {
            let err = StorefrontError::Invalid(format!("{file_name} is not in this upload"));
            self.notifier.error(err.user_message(CROP_FAILED));
            return Err(err);
        };
        let source = match file.dimensions {
            Some(d) => d,
            None => match image::load_from_memory(&file.blob) {
                Ok(img) => {
                    let (w, h) = img.dimensions();
                    Dimensions::new(w, h)
                }
                Err(e) => {
                    warn!(slot, file_name, error = %e, "crop refused: image could not be decoded");
                    self.notifier.error(UNREADABLE_IMAGE);
                    return Err(e.into());
                }
            },
        };
        let file_id = file.id;
        let session = CropSession::open(slot, file_id, aspect, source);
        self.crop = Some(ActiveCrop { session: session.id(), slot, file: file_id });
        debug!(slot, file_name, session = %session.id(), "crop session opened");
        Ok(session)
    }

    pub fn cancel_crop(&mut self, session: CropSession) {
        if self.crop.is_some_and(|c| c.session == session.id()) {
            self.crop = None;
            debug!(session = %session.id(), "crop cancelled");
        }
    }

    /// Replaces the file with the selected region scaled to `output`, which
    /// must have the session's aspect ratio. The session closes whether or
    /// not re-encoding succeeds.
    pub async fn commit_crop(&mut self, session: CropSession, output: Dimensions) -> Result<()> {
        match self.crop {
            Some(c) if c.session == session.id() => self.crop = None,
            _ => return Err(StorefrontError::StaleCropSession),
        }
        if AspectRatio::of(output) != Some(session.aspect()) {
            let aspect = session.aspect();
            warn!(session = %session.id(), width = output.width, height = output.height, "crop refused: output ratio differs from session");
            let err = StorefrontError::Invalid(format!(
                "crop output {}x{} does not keep the {}:{} frame",
                output.width,
                output.height,
                aspect.width(),
                aspect.height()
            ));
            self.notifier.error(CROP_FAILED);
            return Err(err);
        }
        let blob = self.find(session.file_id()).map(|f| Arc::clone(&f.blob)).ok_or(StorefrontError::StaleCropSession)?;
        let rect = session.selection();

        let result = match tokio::task::spawn_blocking(move || crop::crop_to(&blob, rect, output)).await {
            Ok(Ok(png)) => Ok(png),
            Ok(Err(e)) => Err(StorefrontError::from(e)),
            Err(e) => Err(StorefrontError::from(e)),
        };
        let png = match result {
            Ok(png) => png,
            Err(e) => {
                warn!(session = %session.id(), error = %e, "crop failed");
                self.notifier.error(CROP_FAILED);
                return Err(e);
            }
        };

        if let Some(file) = self.find_mut(session.file_id()) {
            file.blob = png.into();
            file.media_type = "image/png".to_string();
            file.dimensions = Some(output);
            info!(file = %file.original_name, width = output.width, height = output.height, "crop saved");
        }
        self.refresh_preview(session.file_id()).await;
        Ok(())
    }

    /// Crops with the configured output size.
    pub async fn commit_crop_default(&mut self, session: CropSession) -> Result<()> {
        let output = self.policy.crop_output;
        self.commit_crop(session, output).await
    }

    pub fn ensure_submittable(&self) -> std::result::Result<(), Rejection> {
        for (index, slot) in self.slots.iter().enumerate() {
            validate::check_minimum(index, slot.bounds, slot.files.len())?;
        }
        Ok(())
    }

    pub fn serialize(&self, fields: &[(String, String)]) -> PayloadDescriptor {
        let files = self
            .slots
            .iter()
            .enumerate()
            .flat_map(|(index, slot)| {
                slot.files.iter().map(move |f| FilePart {
                    key: slot_key(index),
                    slot: index,
                    file_name: f.original_name.clone(),
                    media_type: f.media_type.clone(),
                    bytes: Arc::clone(&f.blob),
                })
            })
            .collect();
        PayloadDescriptor { fields: fields.to_vec(), files }
    }

    /// Posts every slot to `path`. On success the slots are cleared; on any
    /// failure they are left exactly as they were so the user can resubmit.
    pub async fn submit(&mut self, api: &ApiClient, path: &str, fields: &[(String, String)]) -> Result<Ack> {
        if let Err(rejection) = self.ensure_submittable() {
            self.notifier.error(rejection.to_string());
            return Err(rejection.into());
        }
        let payload = self.serialize(fields);
        let file_count = payload.files.len();
        let form = payload.into_form()?;

        match api.post_form::<Ack>(path, form).await {
            Ok(ack) => {
                info!(path, file_count, "upload submitted");
                self.notifier.success(ack.message_or("Saved successfully"));
                self.reset();
                Ok(ack)
            }
            Err(e) => {
                warn!(path, error = %e, "upload failed; keeping selection");
                self.notifier.error(e.user_message("Upload failed. Please try again."));
                Err(e)
            }
        }
    }

    /// Drops every pending file and preview. Slots themselves remain.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            for file in slot.files.drain(..) {
                if let Some(handle) = &file.preview {
                    self.previews.detach(handle);
                }
            }
        }
        self.crop = None;
    }

    async fn refresh_preview(&mut self, id: Uuid) {
        let Some(blob) = self.find(id).map(|f| Arc::clone(&f.blob)) else { return };
        let rendered = preview::render_async(blob).await;
        let previews = Arc::clone(&self.previews);
        let Some(file) = self.find_mut(id) else { return };
        match rendered {
            Ok(p) => {
                file.dimensions = Some(p.source);
                match &file.preview {
                    Some(handle) => previews.replace(handle, &p),
                    None => file.preview = Some(previews.attach(file.slot, &file.original_name, &p)),
                }
            }
            Err(e) => warn!(file = %file.original_name, error = %e, "preview could not be generated"),
        }
    }

    fn find(&self, id: Uuid) -> Option<&PendingFile> {
        self.slots.iter().flat_map(|s| s.files.iter()).find(|f| f.id == id)
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut PendingFile> {
        self.slots.iter_mut().flat_map(|s| s.files.iter_mut()).find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::surface::memory::{MemoryPreviews, MemoryToastRegion};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use mockito::{Matcher, Server};
    use std::io::Cursor;
    use std::time::Duration;

    struct Page {
        toasts: Arc<MemoryToastRegion>,
        previews: Arc<MemoryPreviews>,
        coordinator: Coordinator,
    }

    fn page(slot_bounds: &[SlotSpec]) -> Page {
        let toasts = Arc::new(MemoryToastRegion::new());
        let previews = Arc::new(MemoryPreviews::new());
        let notifier = Notifier::new(toasts.clone(), Duration::from_millis(3000));
        let coordinator = Coordinator::new(UploadPolicy::default(), previews.clone(), notifier).with_slots(slot_bounds.iter().copied());
        Page { toasts, previews, coordinator }
    }

    fn image_file(name: &str, format: ImageFormat, w: u32, h: u32) -> SelectedFile {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(w, h)).write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        let media_type = match format {
            ImageFormat::Jpeg => "image/jpeg",
            _ => "image/png",
        };
        SelectedFile::new(name, media_type, bytes)
    }

    fn two_mib_jpeg(name: &str) -> SelectedFile {
        let mut file = image_file(name, ImageFormat::Jpeg, 64, 64);
        file.bytes.resize(2 * 1024 * 1024, 0);
        file
    }

    #[tokio::test]
    async fn single_slot_accepts_one_then_rejects_second() {
        let mut p = page(&[SlotSpec::SINGLE]);
        let first = p.coordinator.accept_files(0, vec![two_mib_jpeg("front.jpg")]).await;
        assert!(first.is_accepted());
        assert_eq!(p.coordinator.files(0).len(), 1);
        assert_eq!(p.coordinator.slot_state(0), Some(SlotState::HasFiles));

        let second = p.coordinator.accept_files(0, vec![two_mib_jpeg("back.jpg")]).await;
        assert!(matches!(second, ValidationOutcome::Rejected(Rejection::TooMany { .. })));
        assert_eq!(p.coordinator.files(0).len(), 1);
        assert_eq!(p.toasts.visible_message().as_deref(), Some("Please upload at most 1 image(s) here."));
    }

    #[tokio::test]
    async fn non_images_never_enter_a_slot() {
        let mut p = page(&[SlotSpec::between(1, 6)]);
        let batch = vec![image_file("a.png", ImageFormat::Png, 8, 8), SelectedFile::new("notes.txt", "text/plain", b"hi".to_vec())];
        let outcome = p.coordinator.accept_files(0, batch).await;
        assert!(matches!(outcome, ValidationOutcome::Rejected(Rejection::NotAnImage { .. })));
        assert!(p.coordinator.files(0).is_empty());
        assert_eq!(p.coordinator.slot_state(0), Some(SlotState::Empty));
    }

    #[tokio::test]
    async fn over_capacity_batch_is_rejected_whole() {
        let mut p = page(&[SlotSpec::between(1, 3)]);
        let two: Vec<_> = (0..2).map(|i| image_file(&format!("{i}.png"), ImageFormat::Png, 4, 4)).collect();
        assert!(p.coordinator.accept_files(0, two.clone()).await.is_accepted());
        assert!(!p.coordinator.accept_files(0, two).await.is_accepted());
        assert_eq!(p.coordinator.files(0).len(), 2);
    }

    #[tokio::test]
    async fn previews_follow_accept_and_remove() {
        let mut p = page(&[SlotSpec::between(1, 6), SlotSpec::between(0, 6)]);
        let files = vec![image_file("a.png", ImageFormat::Png, 320, 200), image_file("b.png", ImageFormat::Png, 50, 50)];
        p.coordinator.accept_files(1, files).await;
        assert_eq!(p.previews.in_slot(1).len(), 2);
        assert_eq!(p.coordinator.files(1)[0].dimensions, Some(Dimensions::new(320, 200)));

        p.coordinator.remove_file(1, "a.png");
        p.coordinator.remove_file(1, "missing.png");
        assert_eq!(p.coordinator.files(1).len(), 1);
        assert_eq!(p.previews.count(), 1);
    }

    #[tokio::test]
    async fn only_one_crop_session_at_a_time() {
        let mut p = page(&[SlotSpec::between(1, 6)]);
        let files = vec![image_file("a.png", ImageFormat::Png, 40, 40), image_file("b.png", ImageFormat::Png, 40, 40)];
        p.coordinator.accept_files(0, files).await;

        let session_a = p.coordinator.begin_crop(0, "a.png", AspectRatio::SQUARE).unwrap();
        let refused = p.coordinator.begin_crop(0, "b.png", AspectRatio::SQUARE);
        assert!(matches!(refused, Err(StorefrontError::CropInProgress)));
        assert_eq!(p.coordinator.active_crop().map(|f| f.original_name.as_str()), Some("a.png"));
        assert_eq!(p.coordinator.slot_state(0), Some(SlotState::CroppingOneFile));

        p.coordinator.cancel_crop(session_a);
        assert!(p.coordinator.active_crop().is_none());
        assert_eq!(p.coordinator.files(0).len(), 2);
        assert!(p.coordinator.begin_crop(0, "b.png", AspectRatio::SQUARE).is_ok());
    }

    #[tokio::test]
    async fn committed_crop_serializes_at_output_size() {
        let mut p = page(&[SlotSpec::SINGLE]);
        p.coordinator.accept_files(0, vec![image_file("wide.jpg", ImageFormat::Jpeg, 1200, 500)]).await;
        let original_id = p.coordinator.files(0)[0].id;

        let mut session = p.coordinator.begin_crop(0, "wide.jpg", AspectRatio::SQUARE).unwrap();
        session.select(crop::CropRect { x: 100, y: 0, width: 500, height: 500 });
        p.coordinator.commit_crop_default(session).await.unwrap();

        assert_eq!(p.coordinator.slot_state(0), Some(SlotState::HasFiles));
        let file = &p.coordinator.files(0)[0];
        assert_eq!(file.id, original_id);
        assert_eq!(file.media_type, "image/png");

        let payload = p.coordinator.serialize(&[]);
        let part = payload.files_for_slot(0).next().unwrap();
        assert_eq!(part.key, "images[0]");
        assert_eq!(image::load_from_memory(&part.bytes).unwrap().dimensions(), (400, 400));

        let handle = file.preview.clone().unwrap();
        assert_eq!(p.previews.get(&handle).unwrap().preview.source, Dimensions::new(400, 400));
    }

    #[tokio::test]
    async fn refused_crop_is_reported() {
        let mut p = page(&[SlotSpec::between(1, 6)]);
        let files = vec![image_file("a.png", ImageFormat::Png, 40, 40), SelectedFile::new("broken.png", "image/png", b"not a png".to_vec())];
        p.coordinator.accept_files(0, files).await;

        let err = p.coordinator.begin_crop(0, "broken.png", AspectRatio::SQUARE).unwrap_err();
        assert!(matches!(err, StorefrontError::Image(_)));
        assert_eq!(p.toasts.visible_message().as_deref(), Some(UNREADABLE_IMAGE));
        assert!(p.coordinator.active_crop().is_none());

        let _open = p.coordinator.begin_crop(0, "a.png", AspectRatio::SQUARE).unwrap();
        assert!(matches!(p.coordinator.begin_crop(0, "a.png", AspectRatio::SQUARE), Err(StorefrontError::CropInProgress)));
        assert_eq!(p.toasts.visible_message().as_deref(), Some("Please finish cropping the current image first."));
    }

    #[tokio::test]
    async fn output_with_another_ratio_is_refused() {
        let mut p = page(&[SlotSpec::SINGLE]);
        p.coordinator.accept_files(0, vec![image_file("wide.png", ImageFormat::Png, 300, 100)]).await;
        let before = Arc::clone(&p.coordinator.files(0)[0].blob);

        let session = p.coordinator.begin_crop(0, "wide.png", AspectRatio::SQUARE).unwrap();
        let err = p.coordinator.commit_crop(session, Dimensions::new(400, 200)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Invalid(_)));
        assert_eq!(p.toasts.visible_message().as_deref(), Some(CROP_FAILED));
        assert!(Arc::ptr_eq(&before, &p.coordinator.files(0)[0].blob));
        assert_eq!(p.coordinator.slot_state(0), Some(SlotState::HasFiles));

        let session = p.coordinator.begin_crop(0, "wide.png", AspectRatio::new(2, 1).unwrap()).unwrap();
        p.coordinator.commit_crop(session, Dimensions::new(400, 200)).await.unwrap();
        assert_eq!(p.coordinator.files(0)[0].dimensions, Some(Dimensions::new(400, 200)));
    }

    #[tokio::test]
    async fn stale_session_is_refused() {
        let mut p = page(&[SlotSpec::SINGLE]);
        p.coordinator.accept_files(0, vec![image_file("a.png", ImageFormat::Png, 20, 20)]).await;
        let session = p.coordinator.begin_crop(0, "a.png", AspectRatio::SQUARE).unwrap();
        p.coordinator.remove_file(0, "a.png");
        let err = p.coordinator.commit_crop(session, Dimensions::new(10, 10)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::StaleCropSession));
    }

    #[tokio::test]
    async fn serialize_groups_by_slot() {
        let mut p = page(&[SlotSpec::between(1, 6), SlotSpec::between(1, 6)]);
        p.coordinator.accept_files(0, vec![image_file("a.png", ImageFormat::Png, 4, 4)]).await;
        p.coordinator.accept_files(1, vec![image_file("b.png", ImageFormat::Png, 4, 4), image_file("c.png", ImageFormat::Png, 4, 4)]).await;

        let payload = p.coordinator.serialize(&[("product_id".into(), "42".into())]);
        assert_eq!(payload.field("product_id"), Some("42"));
        let slot1: Vec<_> = payload.files_for_slot(1).map(|f| f.file_name.as_str()).collect();
        assert_eq!(slot1, ["b.png", "c.png"]);
        assert!(payload.files.iter().all(|f| f.key == slot_key(f.slot)));
    }

    #[tokio::test]
    async fn failed_submit_keeps_files_and_success_clears() -> anyhow::Result<()> {
        let mut server = Server::new_async().await;
        let api = ApiClient::new(&ClientConfig { base_url: server.url(), ..ClientConfig::default() })?;
        let mut p = page(&[SlotSpec::SINGLE]);

        let missing = p.coordinator.submit(&api, "/admin/products/variant/add", &[]).await.unwrap_err();
        assert!(matches!(missing, StorefrontError::Rejected(Rejection::TooFew { .. })));

        p.coordinator.accept_files(0, vec![image_file("a.png", ImageFormat::Png, 4, 4)]).await;
        let failing = server
            .mock("POST", "/admin/products/variant/add")
            .with_status(500)
            .with_body(r#"{"message": "Database unavailable"}"#)
            .create_async()
            .await;
        assert!(p.coordinator.submit(&api, "/admin/products/variant/add", &[]).await.is_err());
        assert_eq!(p.coordinator.files(0).len(), 1);
        assert_eq!(p.toasts.visible_message().as_deref(), Some("Database unavailable"));
        failing.remove_async().await;

        server
            .mock("POST", "/admin/products/variant/add")
            .match_body(Matcher::Regex(r#"filename="a.png""#.into()))
            .with_status(200)
            .with_body(r#"{"message": "Variant added"}"#)
            .create_async()
            .await;
        let ack = p.coordinator.submit(&api, "/admin/products/variant/add", &[]).await?;
        assert_eq!(ack.message.as_deref(), Some("Variant added"));
        assert_eq!(p.coordinator.slot_state(0), Some(SlotState::Empty));
        assert_eq!(p.previews.count(), 0);
        Ok(())
    }
}
