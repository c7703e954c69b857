use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde_json::{json, Map, Value};

use crate::coords::PixelRect;

/// One packed texture image.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasImage {
    pub index: usize,
    pub pixels: RgbaImage,
}

impl AtlasImage {
    pub(crate) fn new(index: usize, width: u32, height: u32) -> Self {
        Self { index, pixels: RgbaImage::new(width, height) }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Where a frame ended up: image, pixel rectangle, and registration point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameLocation {
    pub image: usize,
    pub rect: PixelRect,
    pub reg_x: f32,
    pub reg_y: f32,
}

/// Named frame sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub frames: Vec<usize>,
    /// Animation to continue with once this one ends; `None` stops.
    pub next: Option<String>,
    /// Playback speed multiplier.
    pub speed: Option<f32>,
}

/// Result of a successful build. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteSheet {
    images: Vec<AtlasImage>,
    frames: Vec<FrameLocation>,
    animations: Vec<Animation>,
}

impl SpriteSheet {
    pub(crate) fn new(
        images: Vec<AtlasImage>,
        frames: Vec<FrameLocation>,
        animations: Vec<Animation>,
    ) -> Self {
        Self { images, frames, animations }
    }

    #[inline]
    pub fn images(&self) -> &[AtlasImage] {
        &self.images
    }

    #[inline]
    pub fn image(&self, index: usize) -> Option<&AtlasImage> {
        self.images.get(index)
    }

    /// Frames indexed by the value `add_frame` returned.
    #[inline]
    pub fn frames(&self) -> &[FrameLocation] {
        &self.frames
    }

    #[inline]
    pub fn frame(&self, index: usize) -> Option<&FrameLocation> {
        self.frames.get(index)
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Sprite sheet data object with `images`, `frames` and `animations`.
    ///
    /// Each frame is `[x, y, width, height, imageIndex, regX, regY]`.
    /// `image_names` supplies the `images` entries; missing names fall back
    /// to `"<index>.png"`.
    pub fn to_json(&self, image_names: &[String]) -> Value {
        let images: Vec<Value> = self
            .images
            .iter()
            .map(|img| match image_names.get(img.index) {
                Some(name) => json!(name),
                None => json!(format!("{}.png", img.index)),
            })
            .collect();

        let frames: Vec<Value> = self
            .frames
            .iter()
            .map(|f| json!([f.rect.x, f.rect.y, f.rect.width, f.rect.height, f.image, f.reg_x, f.reg_y]))
            .collect();

        let mut animations = Map::new();
        for anim in &self.animations {
            let mut entry = Map::new();
            entry.insert("frames".into(), json!(anim.frames));
            if let Some(next) = &anim.next {
                entry.insert("next".into(), json!(next));
            }
            if let Some(speed) = anim.speed {
                entry.insert("speed".into(), json!(speed));
            }
            animations.insert(anim.name.clone(), Value::Object(entry));
        }

        json!({
            "images": images,
            "frames": frames,
            "animations": animations,
        })
    }

    /// Writes `<stem>_<n>.png` for every image plus `<stem>.json` into `dir`.
    ///
    /// Returns the written paths, JSON last.
    pub fn save(&self, dir: &Path, stem: &str) -> Result<Vec<PathBuf>, SheetError> {
        std::fs::create_dir_all(dir).map_err(SheetError::Io)?;

        let mut written = Vec::with_capacity(self.images.len() + 1);
        let mut names = Vec::with_capacity(self.images.len());

        for img in &self.images {
            let name = format!("{stem}_{}.png", img.index);
            let path = dir.join(&name);
            img.pixels.save(&path).map_err(SheetError::Image)?;
            log::debug!("SpriteSheet: wrote {}", path.display());
            names.push(name);
            written.push(path);
        }

        let json_path = dir.join(format!("{stem}.json"));
        let text = serde_json::to_string_pretty(&self.to_json(&names)).map_err(SheetError::Json)?;
        std::fs::write(&json_path, text).map_err(SheetError::Io)?;
        written.push(json_path);

        Ok(written)
    }
}

/// Failure while writing a sprite sheet to disk.
#[derive(Debug)]
pub enum SheetError {
    Io(std::io::Error),
    Image(image::ImageError),
    Json(serde_json::Error),
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetError::Io(e) => write!(f, "sprite sheet i/o error: {e}"),
            SheetError::Image(e) => write!(f, "sprite sheet image encoding error: {e}"),
            SheetError::Json(e) => write!(f, "sprite sheet json error: {e}"),
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SheetError::Io(e) => Some(e),
            SheetError::Image(e) => Some(e),
            SheetError::Json(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SpriteSheet {
        SpriteSheet::new(
            vec![AtlasImage::new(0, 64, 32)],
            vec![
                FrameLocation { image: 0, rect: PixelRect::new(0, 0, 10, 12), reg_x: 5.0, reg_y: 6.0 },
                FrameLocation { image: 0, rect: PixelRect::new(11, 0, 8, 8), reg_x: 0.0, reg_y: 0.0 },
            ],
            vec![Animation {
                name: "blink".into(),
                frames: vec![0, 1, 0],
                next: Some("idle".into()),
                speed: None,
            }],
        )
    }

    #[test]
    fn lookup_by_index_and_name() {
        let sheet = sample();
        assert_eq!(sheet.frame_count(), 2);
        assert_eq!(sheet.frame(1).unwrap().rect, PixelRect::new(11, 0, 8, 8));
        assert!(sheet.frame(2).is_none());
        assert_eq!(sheet.image(0).unwrap().width(), 64);
        assert_eq!(sheet.animation("blink").unwrap().frames, vec![0, 1, 0]);
        assert!(sheet.animation("walk").is_none());
    }

    #[test]
    fn json_layout() {
        let v = sample().to_json(&["atlas_0.png".to_string()]);
        assert_eq!(v["images"], json!(["atlas_0.png"]));
        assert_eq!(v["frames"][0], json!([0, 0, 10, 12, 0, 5.0, 6.0]));
        assert_eq!(v["animations"]["blink"]["frames"], json!([0, 1, 0]));
        assert_eq!(v["animations"]["blink"]["next"], json!("idle"));
        assert!(v["animations"]["blink"].get("speed").is_none());
    }

    #[test]
    fn json_falls_back_to_index_names() {
        let v = sample().to_json(&[]);
        assert_eq!(v["images"], json!(["0.png"]));
    }

    #[test]
    fn save_writes_pngs_and_json() {
        let dir = std::env::temp_dir().join(format!("kiln-sheet-{}", std::process::id()));
        let written = sample().save(&dir, "atlas").unwrap();

        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("atlas_0.png"));
        let text = std::fs::read_to_string(&written[1]).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["images"], json!(["atlas_0.png"]));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
