//! Kiln engine crate.
//!
//! A cooperative frame clock plus a sprite atlas builder that spreads its
//! drawing work across clock ticks.

pub mod atlas;
pub mod config;
pub mod coords;
pub mod logging;
pub mod source;
pub mod time;

pub use image;
