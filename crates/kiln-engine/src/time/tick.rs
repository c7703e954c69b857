/// Snapshot delivered to every listener on every tick, paused or not.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TickEvent {
    /// Milliseconds since the clock was started.
    pub timestamp_ms: f64,
    /// Milliseconds since the previous tick, clamped to the clock's max delta.
    pub delta_ms: f64,
    pub paused: bool,
    /// Measured dispatch time of the previous tick, in milliseconds.
    ///
    /// The current tick is still being dispatched when listeners see this event.
    pub run_time_ms: f64,
    /// Target interval at dispatch time.
    pub interval_ms: f64,
    /// Accumulated unpaused time since start, including this tick's delta when unpaused.
    pub running_ms: f64,
}

/// Directive returned by a listener after handling a tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TickControl {
    Continue,
    /// Deregister this listener once the current dispatch finishes with it.
    Remove,
}

/// Receives tick events from a [`FrameClock`](super::FrameClock).
pub trait TickListener {
    fn on_tick(&mut self, event: &TickEvent) -> TickControl;
}

impl<F> TickListener for F
where
    F: FnMut(&TickEvent) -> TickControl,
{
    #[inline]
    fn on_tick(&mut self, event: &TickEvent) -> TickControl {
        self(event)
    }
}

/// Registration handle returned by `FrameClock::add_listener`.
///
/// Tokens are unique per clock and never reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ListenerToken(pub(crate) u64);
