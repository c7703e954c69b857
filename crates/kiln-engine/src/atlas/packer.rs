//! Shelf bin-packing.
//!
//! Pure and deterministic: the same items and limits always yield the same
//! plan. Items are visited tallest first, then widest first, then in input
//! order, and laid left-to-right on shelves as tall as their first item.

use std::cmp::Reverse;
use std::fmt;

use crate::coords::PixelRect;

/// Size of one item to place, in whole pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PackItem {
    pub width: u32,
    pub height: u32,
}

impl PackItem {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PackLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub padding: u32,
    pub power_of_two: bool,
}

impl Default for PackLimits {
    fn default() -> Self {
        Self {
            max_width: 2048,
            max_height: 2048,
            padding: 1,
            power_of_two: true,
        }
    }
}

/// Where one item landed.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Placement {
    pub image: usize,
    pub rect: PixelRect,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PackPlan {
    /// One placement per input item, in input order.
    pub placements: Vec<Placement>,
    /// Input indices in the order they were placed.
    pub draw_order: Vec<usize>,
    /// `(width, height)` of each image.
    pub images: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PackError {
    DimensionsExceeded {
        item: usize,
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackError::DimensionsExceeded { item, width, height, max_width, max_height } => write!(
                f,
                "item {item} ({width}x{height}) does not fit in {max_width}x{max_height}"
            ),
        }
    }
}

impl std::error::Error for PackError {}

/// Visit order: height desc, width desc, input index asc.
pub fn sort_order(items: &[PackItem]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    // Stable sort keeps input order among equal sizes.
    order.sort_by_key(|&i| (Reverse(items[i].height), Reverse(items[i].width)));
    order
}

/// Packs `items` into as many images as needed.
///
/// Fails without a partial plan if any single item exceeds the limits.
pub fn pack(items: &[PackItem], limits: PackLimits) -> Result<PackPlan, PackError> {
    if let Some((item, it)) = items
        .iter()
        .enumerate()
        .find(|(_, it)| it.width > limits.max_width || it.height > limits.max_height)
    {
        return Err(PackError::DimensionsExceeded {
            item,
            width: it.width,
            height: it.height,
            max_width: limits.max_width,
            max_height: limits.max_height,
        });
    }

    let draw_order = sort_order(items);
    let mut placements = vec![Placement::default(); items.len()];
    let mut images = Vec::new();
    let mut shelf = Shelf::default();

    for &i in &draw_order {
        let it = items[i];

        if shelf.x > 0 && shelf.x.saturating_add(it.width) > limits.max_width {
            shelf.close(limits.padding);
        }
        if shelf.y.saturating_add(it.height) > limits.max_height {
            images.push(shelf.image_size(limits));
            shelf = Shelf::default();
        }

        let rect = PixelRect::new(shelf.x, shelf.y, it.width, it.height);
        placements[i] = Placement { image: images.len(), rect };
        shelf.advance(rect, limits.padding);
    }

    if !items.is_empty() {
        images.push(shelf.image_size(limits));
    }

    Ok(PackPlan { placements, draw_order, images })
}

/// Cursor state for the open shelf of the current image.
#[derive(Debug, Default)]
struct Shelf {
    x: u32,
    y: u32,
    height: u32,
    used_width: u32,
    used_height: u32,
}

impl Shelf {
    fn close(&mut self, padding: u32) {
        self.y = self.y.saturating_add(self.height).saturating_add(padding);
        self.x = 0;
        self.height = 0;
    }

    fn advance(&mut self, rect: PixelRect, padding: u32) {
        self.x = rect.right().saturating_add(padding);
        self.height = self.height.max(rect.height);
        self.used_width = self.used_width.max(rect.right());
        self.used_height = self.used_height.max(rect.bottom());
    }

    fn image_size(&self, limits: PackLimits) -> (u32, u32) {
        let fit = |used: u32, max: u32| {
            let used = used.max(1);
            let size = if limits.power_of_two { used.next_power_of_two() } else { used };
            size.min(max)
        };
        (fit(self.used_width, limits.max_width), fit(self.used_height, limits.max_height))
    }
}
