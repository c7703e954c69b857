//! Drawable frame sources.
//!
//! A [`FrameSource`] knows its natural bounds and registration point and can
//! draw any portion of itself, scaled, into a [`FrameCanvas`]. The atlas
//! builder never rasterizes anything itself.

mod bitmap;
mod canvas;
mod error;
mod glyph;
mod svg;

use std::cell::RefCell;
use std::rc::Rc;

use crate::coords::{Rect, Vec2};

pub use bitmap::BitmapSource;
pub use canvas::FrameCanvas;
pub use error::SourceError;
pub use glyph::GlyphSource;
pub use svg::SvgSource;

/// Something that can be drawn into an atlas frame.
pub trait FrameSource {
    /// Natural bounds, used when a frame is added without an explicit rectangle.
    ///
    /// `None` means the bounds cannot be determined and such frames are skipped.
    fn bounds(&self) -> Option<Rect> {
        None
    }

    /// Registration point, copied unchanged into the frame's location.
    fn registration(&self) -> Vec2 {
        Vec2::zero()
    }

    /// Draws `source_rect` at `scale` with its top-left corner at the canvas origin.
    fn draw(&self, source_rect: Rect, scale: f32, canvas: &mut FrameCanvas<'_>);
}

/// Handle under which sources are queued. Setup steps may mutate the source
/// between frames, so it is shared rather than owned by a request.
pub type SharedSource = Rc<RefCell<dyn FrameSource>>;

/// Wraps a concrete source for queueing while keeping a typed handle.
pub fn shared<S: FrameSource + 'static>(source: S) -> Rc<RefCell<S>> {
    Rc::new(RefCell::new(source))
}
