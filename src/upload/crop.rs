//! Fixed-ratio cropping.

use std::io::Cursor;

use image::imageops::FilterType;
use image::ImageFormat;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self { Self { width, height } }
}

/// Width:height, kept in lowest terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspectRatio {
    width: u32,
    height: u32,
}

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio { width: 1, height: 1 };

    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let g = gcd(width, height);
        Some(Self { width: width / g, height: height / g })
    }

    pub fn of(dims: Dimensions) -> Option<Self> { Self::new(dims.width, dims.height) }
    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    /// Largest `(w, h)` of this ratio that fits in `bound`.
    fn fit(&self, bound_w: u32, bound_h: u32) -> (u32, u32) {
        let (aw, ah) = (self.width as u64, self.height as u64);
        let (bw, bh) = (bound_w as u64, bound_h as u64);
        let (w, h) = if bw * ah > bh * aw { (bh * aw / ah, bh) } else { (bw, bw * ah / aw) };
        ((w as u32).max(1), (h as u32).max(1))
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn centered(image: Dimensions, aspect: AspectRatio) -> Self {
        let (width, height) = aspect.fit(image.width, image.height);
        Self { x: (image.width - width.min(image.width)) / 2, y: (image.height - height.min(image.height)) / 2, width, height }
    }

    /// Pulls the rectangle inside the image, then shrinks it to the ratio
    /// keeping the top-left corner.
    pub fn constrain(self, image: Dimensions, aspect: AspectRatio) -> Self {
        let x = self.x.min(image.width.saturating_sub(1));
        let y = self.y.min(image.height.saturating_sub(1));
        let max_w = self.width.clamp(1, image.width - x);
        let max_h = self.height.clamp(1, image.height - y);
        let (width, height) = aspect.fit(max_w, max_h);
        Self { x, y, width, height }
    }
}

/// An open crop dialog for one pending file.
#[derive(Debug)]
pub struct CropSession {
    id: Uuid,
    slot: usize,
    file: Uuid,
    aspect: AspectRatio,
    source: Dimensions,
    selection: CropRect,
}

impl CropSession {
    pub(crate) fn open(slot: usize, file: Uuid, aspect: AspectRatio, source: Dimensions) -> Self {
        Self { id: Uuid::new_v4(), slot, file, aspect, source, selection: CropRect::centered(source, aspect) }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn slot(&self) -> usize { self.slot }
    pub fn file_id(&self) -> Uuid { self.file }
    pub fn aspect(&self) -> AspectRatio { self.aspect }
    pub fn source(&self) -> Dimensions { self.source }
    pub fn selection(&self) -> CropRect { self.selection }

    /// Moves or resizes the crop box. The box always keeps the session ratio.
    pub fn select(&mut self, rect: CropRect) -> CropRect {
        self.selection = rect.constrain(self.source, self.aspect);
        self.selection
    }
}

/// Cuts `rect` out of the encoded image and scales it to exactly `output`.
/// The result is PNG.
pub fn crop_to(bytes: &[u8], rect: CropRect, output: Dimensions) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let scaled = cropped.resize_exact(output.width, output.height, FilterType::Lanczos3);
    let mut png = Vec::new();
    scaled.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, RgbImage};

    #[test]
    fn ratio_is_reduced() {
        let r = AspectRatio::new(400, 300).unwrap();
        assert_eq!((r.width(), r.height()), (4, 3));
        assert!(AspectRatio::new(0, 3).is_none());
    }

    #[test]
    fn centered_rect_is_largest_fit() {
        let wide = CropRect::centered(Dimensions::new(800, 400), AspectRatio::SQUARE);
        assert_eq!(wide, CropRect { x: 200, y: 0, width: 400, height: 400 });

        let tall = CropRect::centered(Dimensions::new(300, 900), AspectRatio::new(3, 2).unwrap());
        assert_eq!(tall, CropRect { x: 0, y: 350, width: 300, height: 200 });
    }

    #[test]
    fn constrain_clamps_and_keeps_ratio() {
        let image = Dimensions::new(500, 500);
        let r = CropRect { x: 450, y: 100, width: 300, height: 120 }.constrain(image, AspectRatio::SQUARE);
        assert_eq!(r, CropRect { x: 450, y: 100, width: 50, height: 50 });

        let off = CropRect { x: 900, y: 900, width: 10, height: 10 }.constrain(image, AspectRatio::SQUARE);
        assert_eq!((off.x, off.y, off.width, off.height), (499, 499, 1, 1));
    }

    #[test]
    fn crop_output_has_requested_size() {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(640, 360)).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        let rect = CropRect::centered(Dimensions::new(640, 360), AspectRatio::SQUARE);
        let out = crop_to(&buf, rect, Dimensions::new(400, 400)).unwrap();
        assert_eq!(image::load_from_memory(&out).unwrap().dimensions(), (400, 400));
    }
}
