/// Whole-pixel rectangle inside an atlas image.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub const fn right(self) -> u32 {
        self.x + self.width
    }

    #[inline]
    pub const fn bottom(self) -> u32 {
        self.y + self.height
    }

    /// True when the two rectangles share any pixel. Touching edges do not overlap.
    #[inline]
    pub fn overlaps(self, other: PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// True when `self` lies fully inside a `width` × `height` area anchored at the origin.
    #[inline]
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }
}
