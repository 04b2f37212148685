//! Admin catalogue pages: category management and main product details.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::fallback_for;
use crate::api::Ack;
use crate::page::PageContext;
use crate::surface::FormFields;
use crate::upload::{Coordinator, PayloadDescriptor};
use crate::{Result, StorefrontError};

pub const ADD_CATEGORY_PATH: &str = "/admin/category/add";
pub const MAIN_IMAGE_PATH: &str = "/admin/products/main/image/change";
pub const UPDATE_DESCRIPTIONS_PATH: &str = "/admin/products/variant/update/description";
pub const DELETE_DESCRIPTION_PATH: &str = "/admin/products/variant/description/delete";
pub const PRODUCT_DETAILS_PAGE: &str = "/admin/products/main/details";
pub const CATEGORY_RELOAD_DELAY: Duration = Duration::from_millis(500);

const MAIN_IMAGE_FIELD: &str = "product_image";
const MAIN_IMAGE_NAME: &str = "uploaded-image.png";
const UPLOAD_FAILED: &str = "Upload failed";

// ============================================================================
// Categories
// ============================================================================

pub struct CategoryManager {
    ctx: Arc<PageContext>,
    form: Arc<dyn FormFields>,
}

impl CategoryManager {
    pub fn new(ctx: Arc<PageContext>, form: Arc<dyn FormFields>) -> Self {
        Self { ctx, form }
    }

    /// Posts the add-category form as multipart, then clears it and reloads
    /// shortly after so the toast is seen.
    pub async fn add_category(&self) -> Result<()> {
        let form = self.form.values().into_iter().fold(Form::new(), |form, (name, value)| form.text(name, value));
        match self.ctx.api.post_form::<Ack>(ADD_CATEGORY_PATH, form).await {
            Ok(ack) => {
                info!("category added");
                self.ctx.notifier.success(ack.message_or("Category added successfully"));
                self.form.reset();
                self.ctx.reload_after(CATEGORY_RELOAD_DELAY);
                Ok(())
            }
            Err(e @ StorefrontError::Api { .. }) => {
                self.ctx.report(&e, "Error adding category");
                Err(e)
            }
            Err(e) => {
                self.ctx.report(&e, "An error occurred");
                Err(e)
            }
        }
    }
}

// ============================================================================
// Main product details
// ============================================================================

/// One heading and text pair from the description editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptionEntry {
    pub id: u64,
    pub heading: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
struct DescriptionUpdate {
    description_id: Vec<String>,
    heading: Vec<String>,
    description: Vec<String>,
}

impl DescriptionUpdate {
    fn from_entries(entries: &[DescriptionEntry]) -> Self {
        Self {
            description_id: entries.iter().map(|e| e.id.to_string()).collect(),
            heading: entries.iter().map(|e| e.heading.trim().to_string()).collect(),
            description: entries.iter().map(|e| e.description.trim().to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoredImage {
    #[serde(default)]
    filename: Option<String>,
}

pub struct ProductDetails {
    ctx: Arc<PageContext>,
    product_id: u64,
}

impl ProductDetails {
    pub fn new(ctx: Arc<PageContext>, product_id: u64) -> Self {
        Self { ctx, product_id }
    }

    pub fn product_id(&self) -> u64 { self.product_id }

    /// Sends the (usually cropped) image in slot 0 of `upload` as the new
    /// main product image and returns the name the server stored it under.
    pub async fn replace_main_image(&self, upload: &mut Coordinator) -> Result<String> {
        let payload = upload.serialize(&[("product_id".to_string(), self.product_id.to_string())]);
        let Some(mut image) = payload.files_for_slot(0).next().cloned() else {
            let err = StorefrontError::Invalid("Please upload an image first".into());
            self.ctx.report(&err, "");
            return Err(err);
        };
        image.key = MAIN_IMAGE_FIELD.to_string();
        image.file_name = MAIN_IMAGE_NAME.to_string();
        let form = PayloadDescriptor { fields: payload.fields, files: vec![image] }.into_form()?;

        let stored = match self.ctx.api.post_form::<StoredImage>(MAIN_IMAGE_PATH, form).await {
            Ok(reply) => reply.filename.filter(|f| !f.is_empty()),
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, UPLOAD_FAILED));
                return Err(e);
            }
        };
        match stored {
            Some(filename) => {
                info!(product_id = self.product_id, %filename, "main image replaced");
                self.ctx.notifier.success(format!("Image uploaded successfully: {filename}"));
                upload.reset();
                Ok(filename)
            }
            None => {
                warn!(product_id = self.product_id, "image accepted without a stored file name");
                let err = StorefrontError::Invalid(UPLOAD_FAILED.into());
                self.ctx.report(&err, UPLOAD_FAILED);
                Err(err)
            }
        }
    }

    /// Saves edited description pairs and reloads the page.
    pub async fn update_descriptions(&self, entries: &[DescriptionEntry]) -> Result<()> {
        if entries.is_empty() || entries.iter().any(|e| e.heading.trim().is_empty() || e.description.trim().is_empty()) {
            let err = StorefrontError::Invalid("Please fill in every heading and description".into());
            self.ctx.report(&err, "");
            return Err(err);
        }
        let path = format!("{UPDATE_DESCRIPTIONS_PATH}/{}", self.product_id);
        match self.ctx.api.patch_json::<_, Ack>(&path, &DescriptionUpdate::from_entries(entries)).await {
            Ok(_) => {
                info!(product_id = self.product_id, count = entries.len(), "descriptions updated");
                self.ctx.navigator.reload();
                Ok(())
            }
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Failed to update descriptions"));
                Err(e)
            }
        }
    }

    /// Deletes one description and returns to the product's details page.
    pub async fn delete_description(&self, description_id: u64) -> Result<()> {
        match self.ctx.api.delete(&format!("{DELETE_DESCRIPTION_PATH}/{description_id}")).await {
            Ok(_) => {
                info!(product_id = self.product_id, description_id, "description deleted");
                self.ctx.navigator.redirect(&format!("{PRODUCT_DETAILS_PAGE}?product_id={}", self.product_id));
                Ok(())
            }
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Failed to delete description"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::scope::clock::run_for;
    use crate::surface::memory::{MemoryForm, MemoryNavigator, MemoryPreviews, MemoryToastRegion, Navigation};
    use crate::upload::{AspectRatio, SelectedFile, SlotSpec};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use std::io::Cursor;

    fn page(server: &ServerGuard) -> (Arc<MemoryToastRegion>, Arc<MemoryNavigator>, Arc<PageContext>) {
        let toasts = Arc::new(MemoryToastRegion::new());
        let nav = Arc::new(MemoryNavigator::new());
        let ctx = PageContext::new(ClientConfig { base_url: server.url(), ..ClientConfig::default() }, toasts.clone(), nav.clone()).unwrap();
        (toasts, nav, ctx)
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(w, h)).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn entry(id: u64, heading: &str, description: &str) -> DescriptionEntry {
        DescriptionEntry { id, heading: heading.into(), description: description.into() }
    }

    #[tokio::test]
    async fn added_category_resets_form_and_reloads() {
        let mut server = Server::new_async().await;
        let (toasts, nav, ctx) = page(&server);
        let form = Arc::new(MemoryForm::new());
        form.fill("Name", "Headphones");
        form.fill("Description", "Wired and wireless");
        form.fill("status", "Active");
        let added = server
            .mock("POST", ADD_CATEGORY_PATH)
            .match_body(Matcher::AllOf(vec![Matcher::Regex(r#"name="Name""#.into()), Matcher::Regex("Headphones".into())]))
            .with_body(r#"{"status": "OK", "message": "Category created successfully", "code": 200}"#)
            .create_async()
            .await;

        CategoryManager::new(ctx, form.clone()).add_category().await.unwrap();
        added.assert_async().await;
        assert_eq!(toasts.visible_message().as_deref(), Some("Category created successfully"));
        assert!(form.is_blank());

        tokio::time::pause();
        assert!(nav.visits().is_empty());
        run_for(CATEGORY_RELOAD_DELAY).await;
        assert_eq!(nav.last(), Some(Navigation::Reload));
    }

    #[tokio::test]
    async fn rejected_category_keeps_form() {
        let mut server = Server::new_async().await;
        let (toasts, nav, ctx) = page(&server);
        let form = Arc::new(MemoryForm::new());
        form.fill("Name", "");
        form.fill("status", "Active");
        server
            .mock("POST", ADD_CATEGORY_PATH)
            .with_status(400)
            .with_body(r#"{"status": "Bad Request", "error": "Category name is required", "code": 400}"#)
            .create_async()
            .await;

        assert!(CategoryManager::new(ctx, form.clone()).add_category().await.is_err());
        assert_eq!(toasts.visible_message().as_deref(), Some("Category name is required"));
        assert!(!form.is_blank());
        assert!(nav.visits().is_empty());
    }

    #[tokio::test]
    async fn category_without_server_message_uses_fallback() {
        let mut server = Server::new_async().await;
        let (toasts, _nav, ctx) = page(&server);
        server.mock("POST", ADD_CATEGORY_PATH).with_status(500).with_body("{}").create_async().await;
        let form = Arc::new(MemoryForm::new());
        assert!(CategoryManager::new(ctx, form).add_category().await.is_err());
        assert_eq!(toasts.visible_message().as_deref(), Some("Error adding category"));
    }

    #[tokio::test]
    async fn cropped_main_image_is_sent_with_product_id() -> anyhow::Result<()> {
        let mut server = Server::new_async().await;
        let (toasts, _nav, ctx) = page(&server);
        let previews = Arc::new(MemoryPreviews::new());
        let mut upload = ctx.upload_coordinator(previews.clone()).with_slots([SlotSpec::SINGLE]);
        upload.accept_files(0, vec![SelectedFile::new("photo.png", "image/png", png(900, 600))]).await;
        let session = upload.begin_crop(0, "photo.png", AspectRatio::SQUARE)?;
        upload.commit_crop_default(session).await?;

        let sent = server
            .mock("POST", MAIN_IMAGE_PATH)
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="product_image"; filename="uploaded-image.png""#.into()),
                Matcher::Regex(r#"name="product_id"\r\n\r\n42"#.into()),
            ]))
            .with_body(r#"{"filename": "main_42.png"}"#)
            .create_async()
            .await;

        let stored = ProductDetails::new(ctx, 42).replace_main_image(&mut upload).await?;
        sent.assert_async().await;
        assert_eq!(stored, "main_42.png");
        assert_eq!(toasts.visible_message().as_deref(), Some("Image uploaded successfully: main_42.png"));
        assert!(upload.files(0).is_empty());
        assert_eq!(previews.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn main_image_needs_a_file_and_a_stored_name() {
        let mut server = Server::new_async().await;
        let (toasts, _nav, ctx) = page(&server);
        let mut upload = ctx.upload_coordinator(Arc::new(MemoryPreviews::new())).with_slots([SlotSpec::SINGLE]);
        let details = ProductDetails::new(ctx, 7);

        assert!(details.replace_main_image(&mut upload).await.is_err());
        assert_eq!(toasts.visible_message().as_deref(), Some("Please upload an image first"));

        upload.accept_files(0, vec![SelectedFile::new("a.png", "image/png", png(8, 8))]).await;
        server.mock("POST", MAIN_IMAGE_PATH).with_body("{}").create_async().await;
        assert!(details.replace_main_image(&mut upload).await.is_err());
        assert_eq!(toasts.visible_message().as_deref(), Some(UPLOAD_FAILED));
        assert_eq!(upload.files(0).len(), 1);
    }

    #[tokio::test]
    async fn descriptions_are_patched_as_parallel_lists() {
        let mut server = Server::new_async().await;
        let (_toasts, nav, ctx) = page(&server);
        let patched = server
            .mock("PATCH", "/admin/products/variant/update/description/42")
            .match_body(Matcher::Json(json!({
                "description_id": ["5", "6"],
                "heading": ["Battery", "Warranty"],
                "description": ["30 hours", "1 year"]
            })))
            .with_body(r#"{"message": "Descriptions updated"}"#)
            .create_async()
            .await;

        let details = ProductDetails::new(ctx, 42);
        details.update_descriptions(&[entry(5, "Battery", " 30 hours "), entry(6, "Warranty", "1 year")]).await.unwrap();
        patched.assert_async().await;
        assert_eq!(nav.last(), Some(Navigation::Reload));
    }

    #[tokio::test]
    async fn failed_description_update_shows_server_error() {
        let mut server = Server::new_async().await;
        let (toasts, nav, ctx) = page(&server);
        server
            .mock("PATCH", "/admin/products/variant/update/description/42")
            .with_status(400)
            .with_body(r#"{"error": "Mismatch in description IDs, headings, and descriptions"}"#)
            .create_async()
            .await;
        let details = ProductDetails::new(ctx, 42);

        assert!(details.update_descriptions(&[entry(5, "", "text")]).await.is_err());
        assert_eq!(toasts.visible_message().as_deref(), Some("Please fill in every heading and description"));

        assert!(details.update_descriptions(&[entry(5, "Battery", "30 hours")]).await.is_err());
        assert_eq!(toasts.visible_message().as_deref(), Some("Mismatch in description IDs, headings, and descriptions"));
        assert!(nav.visits().is_empty());
    }

    #[tokio::test]
    async fn deleted_description_returns_to_details() {
        let mut server = Server::new_async().await;
        let (toasts, nav, ctx) = page(&server);
        let details = ProductDetails::new(ctx, 42);
        let deleted = server
            .mock("DELETE", "/admin/products/variant/description/delete/5")
            .with_body(r#"{"message": "Descriptions deleted successfully"}"#)
            .create_async()
            .await;

        details.delete_description(5).await.unwrap();
        deleted.assert_async().await;
        assert_eq!(nav.last(), Some(Navigation::Redirect("/admin/products/main/details?product_id=42".into())));

        server.mock("DELETE", "/admin/products/variant/description/delete/6").with_status(404).create_async().await;
        assert!(details.delete_description(6).await.is_err());
        assert_eq!(toasts.visible_message().as_deref(), Some("Failed to delete description"));
    }
}
