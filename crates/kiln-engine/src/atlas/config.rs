use crate::config::{self, ConfigError};

use super::packer::PackLimits;

pub const DEFAULT_MAX_SIZE: u32 = 2048;
pub const DEFAULT_PADDING: u32 = 1;
pub const DEFAULT_TIME_SLICE: f64 = 0.3;
pub const MIN_TIME_SLICE: f64 = 0.01;
pub const MAX_TIME_SLICE: f64 = 0.99;

/// Atlas builder settings.
///
/// Every setter validates its input and leaves the old value in place on
/// error. A running build works from the snapshot taken when it started.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasConfig {
    max_width: u32,
    max_height: u32,
    scale: f32,
    padding: u32,
    time_slice: f64,
    power_of_two: bool,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_SIZE,
            max_height: DEFAULT_MAX_SIZE,
            scale: 1.0,
            padding: DEFAULT_PADDING,
            time_slice: DEFAULT_TIME_SLICE,
            power_of_two: true,
        }
    }
}

impl AtlasConfig {
    /// Largest atlas image width. Frames wider than this fail the build.
    #[inline]
    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn set_max_width(&mut self, max_width: u32) -> Result<(), ConfigError> {
        if max_width == 0 {
            return Err(ConfigError::new("max_width", "must be at least 1 pixel"));
        }
        self.max_width = max_width;
        Ok(())
    }

    /// Largest atlas image height. Frames taller than this fail the build.
    #[inline]
    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn set_max_height(&mut self, max_height: u32) -> Result<(), ConfigError> {
        if max_height == 0 {
            return Err(ConfigError::new("max_height", "must be at least 1 pixel"));
        }
        self.max_height = max_height;
        Ok(())
    }

    /// Global scale, multiplied with each frame's own scale.
    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<(), ConfigError> {
        self.scale = config::positive("scale", scale as f64)? as f32;
        Ok(())
    }

    /// Pixels left empty between neighbouring frames.
    #[inline]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Must be smaller than both maximum dimensions.
    pub fn set_padding(&mut self, padding: u32) -> Result<(), ConfigError> {
        if padding >= self.max_width.min(self.max_height) {
            return Err(ConfigError::new("padding", "must be smaller than the maximum atlas size"));
        }
        self.padding = padding;
        Ok(())
    }

    /// Fraction of each tick interval an asynchronous build may spend drawing.
    #[inline]
    pub fn time_slice(&self) -> f64 {
        self.time_slice
    }

    pub fn set_time_slice(&mut self, time_slice: f64) -> Result<(), ConfigError> {
        self.time_slice = config::in_range("time_slice", time_slice, MIN_TIME_SLICE, MAX_TIME_SLICE)?;
        Ok(())
    }

    /// Round atlas image sizes up to powers of two (still capped by the maximums).
    #[inline]
    pub fn power_of_two(&self) -> bool {
        self.power_of_two
    }

    pub fn set_power_of_two(&mut self, power_of_two: bool) {
        self.power_of_two = power_of_two;
    }

    pub(crate) fn limits(&self) -> PackLimits {
        PackLimits {
            max_width: self.max_width,
            max_height: self.max_height,
            padding: self.padding,
            power_of_two: self.power_of_two,
        }
    }
}
