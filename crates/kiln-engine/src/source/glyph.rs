use std::fmt;
use std::rc::Rc;

use fontdue::{Font, FontSettings};
use image::Rgba;

use crate::coords::{Rect, Vec2};

use super::{FrameCanvas, FrameSource, SourceError};

/// A single font glyph, rasterized with `fontdue`.
///
/// One instance is typically queued many times with a setup step that calls
/// [`set_char`](Self::set_char) before each frame. Since bounds are resolved
/// when a frame is added, pass [`glyph_bounds`](Self::glyph_bounds) for the
/// target character as the frame's explicit rectangle.
pub struct GlyphSource {
    font: Rc<Font>,
    ch: char,
    px: f32,
    color: Rgba<u8>,
}

impl GlyphSource {
    pub fn new(font: Rc<Font>, ch: char, px: f32) -> Self {
        Self { font, ch, px, color: Rgba([255, 255, 255, 255]) }
    }

    /// Parses a TTF/OTF font and starts at `ch`.
    pub fn from_font_bytes(data: &[u8], ch: char, px: f32) -> Result<Self, SourceError> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| SourceError::Font(e.to_string()))?;
        Ok(Self::new(Rc::new(font), ch, px))
    }

    pub fn with_color(mut self, color: Rgba<u8>) -> Self {
        self.color = color;
        self
    }

    #[inline]
    pub fn char(&self) -> char {
        self.ch
    }

    pub fn set_char(&mut self, ch: char) {
        self.ch = ch;
    }

    /// Bounds `ch` would have at this source's pixel size; `None` for blank glyphs.
    pub fn glyph_bounds(&self, ch: char) -> Option<Rect> {
        let m = self.font.metrics(ch, self.px);
        (m.width > 0 && m.height > 0).then(|| Rect::new(0.0, 0.0, m.width as f32, m.height as f32))
    }
}

impl fmt::Debug for GlyphSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphSource")
            .field("ch", &self.ch)
            .field("px", &self.px)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

impl FrameSource for GlyphSource {
    fn bounds(&self) -> Option<Rect> {
        self.glyph_bounds(self.ch)
    }

    /// Pen origin on the baseline, relative to the glyph bitmap's top-left.
    fn registration(&self) -> Vec2 {
        let m = self.font.metrics(self.ch, self.px);
        Vec2::new(-m.xmin as f32, m.height as f32 + m.ymin as f32)
    }

    fn draw(&self, source_rect: Rect, scale: f32, canvas: &mut FrameCanvas<'_>) {
        // Rasterize at the target size rather than resampling a small bitmap.
        let (metrics, coverage) = self.font.rasterize(self.ch, self.px * scale);
        let ox = (source_rect.origin.x * scale).round() as i64;
        let oy = (source_rect.origin.y * scale).round() as i64;
        let Rgba([r, g, b, a]) = self.color;

        for (i, &cov) in coverage.iter().enumerate() {
            if cov == 0 {
                continue;
            }
            let x = (i % metrics.width) as i64 - ox;
            let y = (i / metrics.width) as i64 - oy;
            if x < 0 || y < 0 {
                continue;
            }
            let alpha = (cov as u16 * a as u16 / 255) as u8;
            canvas.put_pixel(x as u32, y as u32, Rgba([r, g, b, alpha]));
        }
    }
}
