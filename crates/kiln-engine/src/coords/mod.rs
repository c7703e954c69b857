//! Geometry shared by the atlas packer and frame sources.
//!
//! Two spaces are in play:
//! - source space: `Rect`/`Vec2` in `f32` units, top-left origin, +Y down
//! - atlas space: `PixelRect` in whole pixels inside one atlas image

mod pixel_rect;
mod rect;
mod vec2;

pub use pixel_rect::PixelRect;
pub use rect::Rect;
pub use vec2::Vec2;
