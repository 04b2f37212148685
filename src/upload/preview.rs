//! Thumbnails shown next to each pending file.

use std::io::Cursor;
use std::sync::Arc;

use image::{GenericImageView, ImageFormat};

use super::Dimensions;
use crate::Result;

/// Longest edge of a preview thumbnail
pub const PREVIEW_EDGE: u32 = 160;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    /// Size of the decoded source image.
    pub source: Dimensions,
    pub thumbnail_png: Vec<u8>,
}

pub fn render(bytes: &[u8]) -> std::result::Result<Preview, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();
    let thumb = img.thumbnail(PREVIEW_EDGE, PREVIEW_EDGE);
    let mut thumbnail_png = Vec::new();
    thumb.write_to(&mut Cursor::new(&mut thumbnail_png), ImageFormat::Png)?;
    Ok(Preview { source: Dimensions::new(width, height), thumbnail_png })
}

/// Decodes off the async thread.
pub async fn render_async(bytes: Arc<[u8]>) -> Result<Preview> {
    Ok(tokio::task::spawn_blocking(move || render(&bytes)).await??)
}
