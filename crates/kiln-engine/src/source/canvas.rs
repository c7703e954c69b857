use image::{Rgba, RgbaImage};

use crate::coords::PixelRect;

/// Clipped window onto one frame's area of an atlas image.
///
/// Coordinates are local to the frame; writes outside it are dropped, so a
/// source can never bleed into its neighbours.
pub struct FrameCanvas<'a> {
    image: &'a mut RgbaImage,
    area: PixelRect,
}

impl<'a> FrameCanvas<'a> {
    /// `area` is clamped to the image bounds.
    pub fn new(image: &'a mut RgbaImage, area: PixelRect) -> Self {
        let (iw, ih) = image.dimensions();
        let x = area.x.min(iw);
        let y = area.y.min(ih);
        let area = PixelRect::new(x, y, area.width.min(iw - x), area.height.min(ih - y));
        Self { image, area }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.area.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.area.height
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if x < self.area.width && y < self.area.height {
            self.image.put_pixel(self.area.x + x, self.area.y + y, color);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        (x < self.area.width && y < self.area.height)
            .then(|| *self.image.get_pixel(self.area.x + x, self.area.y + y))
    }

    /// Copies `src` with its top-left corner at local `(dx, dy)`, replacing pixels.
    pub fn blit(&mut self, src: &RgbaImage, dx: u32, dy: u32) {
        let w = src.width().min(self.area.width.saturating_sub(dx));
        let h = src.height().min(self.area.height.saturating_sub(dy));
        for y in 0..h {
            for x in 0..w {
                self.image
                    .put_pixel(self.area.x + dx + x, self.area.y + dy + y, *src.get_pixel(x, y));
            }
        }
    }
}
