//! Sprite atlas building.
//!
//! - [`AtlasBuilder`] queues frames and drives builds, synchronously or a
//!   time slice per clock tick.
//! - [`packer`] decides placements; it is pure and usable on its own.
//! - [`SpriteSheet`] is the finished result handed to renderers.

mod builder;
mod config;
mod error;
pub mod packer;
mod request;
mod schedule;
mod sheet;

pub use builder::{AtlasBuilder, BuildEvent, BuildStatus};
pub use config::{AtlasConfig, DEFAULT_MAX_SIZE, DEFAULT_PADDING, DEFAULT_TIME_SLICE, MAX_TIME_SLICE, MIN_TIME_SLICE};
pub use error::AtlasError;
pub use packer::{pack, PackError, PackItem, PackLimits, PackPlan, Placement};
pub use request::{FrameOptions, FrameRequest, FrameSetup};
pub use sheet::{Animation, AtlasImage, FrameLocation, SheetError, SpriteSheet};
