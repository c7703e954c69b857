use super::Vec2;

/// Axis-aligned rectangle in source units (top-left origin).
///
/// Describes which portion of a frame source is drawn into the atlas.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub fn width(self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// A rectangle the packer can place: finite with positive area.
    #[inline]
    pub fn is_drawable(self) -> bool {
        self.is_finite() && !self.is_empty()
    }

    /// Whole-pixel footprint of this rectangle drawn at `scale`.
    ///
    /// Fractional sizes round up so the drawn content is never cropped.
    #[inline]
    pub fn scaled_extent(self, scale: f32) -> (u32, u32) {
        let w = (self.size.x * scale).ceil().max(0.0);
        let h = (self.size.y * scale).ceil().max(0.0);
        (w as u32, h as u32)
    }
}
