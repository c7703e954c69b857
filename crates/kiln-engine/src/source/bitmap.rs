use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::coords::{Rect, Vec2};

use super::{FrameCanvas, FrameSource};

/// An in-memory RGBA bitmap.
#[derive(Debug, Clone)]
pub struct BitmapSource {
    image: RgbaImage,
    registration: Vec2,
    filter: FilterType,
}

impl BitmapSource {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            registration: Vec2::zero(),
            filter: FilterType::Triangle,
        }
    }

    pub fn with_registration(mut self, x: f32, y: f32) -> Self {
        self.registration = Vec2::new(x, y);
        self
    }

    /// Resampling filter used when drawn at a scale other than 1.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn set_image(&mut self, image: RgbaImage) {
        self.image = image;
    }
}

impl FrameSource for BitmapSource {
    fn bounds(&self) -> Option<Rect> {
        let (w, h) = self.image.dimensions();
        (w > 0 && h > 0).then(|| Rect::new(0.0, 0.0, w as f32, h as f32))
    }

    fn registration(&self) -> Vec2 {
        self.registration
    }

    fn draw(&self, source_rect: Rect, scale: f32, canvas: &mut FrameCanvas<'_>) {
        let (iw, ih) = self.image.dimensions();

        // Intersect the requested rect with the bitmap.
        let x0 = source_rect.origin.x.max(0.0).floor().min(iw as f32) as u32;
        let y0 = source_rect.origin.y.max(0.0).floor().min(ih as f32) as u32;
        let x1 = (source_rect.origin.x + source_rect.width()).ceil().clamp(0.0, iw as f32) as u32;
        let y1 = (source_rect.origin.y + source_rect.height()).ceil().clamp(0.0, ih as f32) as u32;
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let crop = imageops::crop_imm(&self.image, x0, y0, x1 - x0, y1 - y0).to_image();

        let dw = (((x1 - x0) as f32) * scale).round().max(1.0) as u32;
        let dh = (((y1 - y0) as f32) * scale).round().max(1.0) as u32;
        let scaled = if (dw, dh) == crop.dimensions() {
            crop
        } else {
            imageops::resize(&crop, dw, dh, self.filter)
        };

        let dx = ((x0 as f32 - source_rect.origin.x) * scale).round().max(0.0) as u32;
        let dy = ((y0 as f32 - source_rect.origin.y) * scale).round().max(0.0) as u32;
        canvas.blit(&scaled, dx, dy);
    }
}
