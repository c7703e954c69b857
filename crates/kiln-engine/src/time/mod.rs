//! Time subsystem.
//!
//! [`FrameClock`] is a cooperative heartbeat: the host polls it, and it
//! broadcasts [`TickEvent`]s to listeners while keeping running statistics in
//! a [`StatsRing`]. Time comes from a [`TimeSource`], so tests can drive it
//! with [`ManualTime`].

mod frame_clock;
mod source;
mod stats;
mod tick;

pub use frame_clock::{ClockConfig, ClockState, FrameClock, DEFAULT_INTERVAL_MS, DEFAULT_MAX_DELTA_MS};
pub use source::{ManualTime, MonotonicTime, TimeSource};
pub use stats::{samples_per_second, StatsRing, TickSample, MAX_SAMPLES};
pub use tick::{ListenerToken, TickControl, TickEvent, TickListener};
