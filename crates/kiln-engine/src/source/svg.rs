use std::fmt;
use std::str::FromStr;

use image::Rgba;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

use crate::coords::{Rect, Vec2};

use super::{FrameCanvas, FrameSource, SourceError};

/// Vector artwork rasterized with `resvg` at whatever scale the frame asks for.
pub struct SvgSource {
    tree: Tree,
    registration: Vec2,
}

impl SvgSource {
    pub fn from_data(data: &[u8]) -> Result<Self, SourceError> {
        let tree = Tree::from_data(data, &Options::default()).map_err(SourceError::Svg)?;
        Ok(Self::from_tree(tree))
    }

    pub fn from_tree(tree: Tree) -> Self {
        Self { tree, registration: Vec2::zero() }
    }

    pub fn with_registration(mut self, x: f32, y: f32) -> Self {
        self.registration = Vec2::new(x, y);
        self
    }

    /// Swaps the artwork, e.g. from a setup step between frames.
    pub fn set_tree(&mut self, tree: Tree) {
        self.tree = tree;
    }
}

impl FromStr for SvgSource {
    type Err = SourceError;

    fn from_str(text: &str) -> Result<Self, SourceError> {
        let tree = Tree::from_str(text, &Options::default()).map_err(SourceError::Svg)?;
        Ok(Self::from_tree(tree))
    }
}

impl fmt::Debug for SvgSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.tree.size();
        f.debug_struct("SvgSource")
            .field("width", &size.width())
            .field("height", &size.height())
            .field("registration", &self.registration)
            .finish()
    }
}

impl FrameSource for SvgSource {
    fn bounds(&self) -> Option<Rect> {
        let size = self.tree.size();
        Some(Rect::new(0.0, 0.0, size.width(), size.height()))
    }

    fn registration(&self) -> Vec2 {
        self.registration
    }

    fn draw(&self, source_rect: Rect, scale: f32, canvas: &mut FrameCanvas<'_>) {
        let (w, h) = (canvas.width(), canvas.height());
        let Some(mut pixmap) = Pixmap::new(w, h) else {
            log::warn!("SvgSource: cannot allocate {w}x{h} pixmap, frame left blank");
            return;
        };

        let transform = Transform::from_scale(scale, scale)
            .pre_translate(-source_rect.origin.x, -source_rect.origin.y);
        resvg::render(&self.tree, transform, &mut pixmap.as_mut());

        // tiny-skia stores premultiplied alpha; the atlas holds straight alpha.
        for (i, px) in pixmap.pixels().iter().enumerate() {
            let c = px.demultiply();
            let (x, y) = (i as u32 % w, i as u32 / w);
            canvas.put_pixel(x, y, Rgba([c.red(), c.green(), c.blue(), c.alpha()]));
        }
    }
}
