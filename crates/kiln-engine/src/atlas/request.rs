use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::coords::Rect;
use crate::source::SharedSource;

/// A step run immediately before one frame is drawn.
///
/// Pairs a target with the arguments to apply to it, so one source instance
/// can be drawn several times under different configurations:
///
/// ```ignore
/// let glyph = Rc::new(RefCell::new(GlyphSource::new(font, 'a', 32.0)));
/// let setup = FrameSetup::new(glyph.clone(), 'b', |g, ch| g.set_char(*ch));
/// builder.add_frame_with(glyph, FrameOptions::default().setup(setup));
/// ```
pub struct FrameSetup {
    apply: Box<dyn Fn() -> bool>,
}

impl FrameSetup {
    pub fn new<T, A, F>(target: Rc<RefCell<T>>, args: A, f: F) -> Self
    where
        T: ?Sized + 'static,
        A: 'static,
        F: Fn(&mut T, &A) + 'static,
    {
        Self {
            apply: Box::new(move || match target.try_borrow_mut() {
                Ok(mut target) => {
                    f(&mut target, &args);
                    true
                }
                Err(_) => false,
            }),
        }
    }

    /// Returns `false`, without applying anything, when the target is
    /// borrowed elsewhere.
    #[inline]
    pub(crate) fn run(&self) -> bool {
        (self.apply)()
    }
}

impl fmt::Debug for FrameSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameSetup(..)")
    }
}

/// Optional parameters for `AtlasBuilder::add_frame_with`.
#[derive(Debug, Default)]
pub struct FrameOptions {
    /// Portion of the source to draw. Defaults to the source's own bounds.
    pub source_rect: Option<Rect>,
    /// Per-frame scale, multiplied with the atlas scale. Defaults to 1.
    pub scale: Option<f32>,
    pub setup: Option<FrameSetup>,
}

impl FrameOptions {
    pub fn rect(mut self, source_rect: Rect) -> Self {
        self.source_rect = Some(source_rect);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn setup(mut self, setup: FrameSetup) -> Self {
        self.setup = Some(setup);
        self
    }
}

/// An accepted frame waiting to be packed and drawn.
pub struct FrameRequest {
    pub(crate) source: SharedSource,
    pub(crate) source_rect: Rect,
    pub(crate) scale: f32,
    pub(crate) setup: Option<FrameSetup>,
    pub(crate) frame_index: usize,
    pub(crate) sequence: u64,
}

impl FrameRequest {
    #[inline]
    pub fn source_rect(&self) -> Rect {
        self.source_rect
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Index of this frame in the sprite sheet it will be built into.
    #[inline]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Builder-wide insertion counter; never reused.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whole-pixel size once drawn with `global_scale` applied.
    #[inline]
    pub fn extent(&self, global_scale: f32) -> (u32, u32) {
        self.source_rect.scaled_extent(self.scale * global_scale)
    }
}

impl fmt::Debug for FrameRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRequest")
            .field("source_rect", &self.source_rect)
            .field("scale", &self.scale)
            .field("setup", &self.setup.is_some())
            .field("frame_index", &self.frame_index)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
