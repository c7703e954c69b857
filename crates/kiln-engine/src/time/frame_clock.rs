use std::fmt;
use std::time::Duration;

use crate::config::{self, ConfigError};

use super::source::{MonotonicTime, TimeSource};
use super::stats::{samples_per_second, StatsRing, TickSample};
use super::tick::{ListenerToken, TickControl, TickEvent, TickListener};

pub const DEFAULT_INTERVAL_MS: f64 = 50.0;
pub const DEFAULT_MAX_DELTA_MS: f64 = 250.0;

/// Initial clock settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockConfig {
    /// Target time between ticks. Must be positive.
    pub interval_ms: f64,
    /// Upper clamp for `TickEvent::delta_ms`. Must be positive.
    pub max_delta_ms: f64,
    pub paused: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            max_delta_ms: DEFAULT_MAX_DELTA_MS,
            paused: false,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        config::positive("interval_ms", self.interval_ms)?;
        config::positive("max_delta_ms", self.max_delta_ms)?;
        Ok(())
    }
}

/// Lifecycle of a [`FrameClock`]. Pausing is a flag, not a state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ClockState {
    Init,
    Running,
    Stopped,
}

struct Registered {
    token: ListenerToken,
    listener: Box<dyn TickListener>,
}

/// Heartbeat scheduler broadcasting [`TickEvent`]s to registered listeners.
///
/// The clock never spawns threads or timers. The host calls [`poll`](Self::poll)
/// from its own loop (or uses [`run_until`](Self::run_until)); each call that
/// finds the deadline reached dispatches exactly one tick, synchronously and in
/// registration order.
///
/// Deadlines stay on the `start + k * interval` grid, so a late wake-up does
/// not push later ticks back. Intervals missed entirely are coalesced into the
/// next tick instead of being replayed.
pub struct FrameClock {
    time: Box<dyn TimeSource>,
    state: ClockState,

    interval_ms: f64,
    max_delta_ms: f64,
    paused: bool,

    listeners: Vec<Registered>,
    next_token: u64,

    stats: StatsRing,

    start_ms: f64,
    last_tick_ms: f64,
    next_deadline_ms: f64,
    running_ms: f64,
    last_run_time_ms: f64,
    ticks: u64,
    paused_ticks: u64,
}

impl FrameClock {
    /// Creates a clock on the monotonic wall clock with default settings.
    pub fn new() -> Self {
        Self::with_time_source(MonotonicTime::new())
    }

    /// Creates a clock reading time from `time`.
    pub fn with_time_source(time: impl TimeSource + 'static) -> Self {
        Self {
            time: Box::new(time),
            state: ClockState::Init,
            interval_ms: DEFAULT_INTERVAL_MS,
            max_delta_ms: DEFAULT_MAX_DELTA_MS,
            paused: false,
            listeners: Vec::new(),
            next_token: 0,
            stats: StatsRing::new(samples_per_second(DEFAULT_INTERVAL_MS)),
            start_ms: 0.0,
            last_tick_ms: 0.0,
            next_deadline_ms: 0.0,
            running_ms: 0.0,
            last_run_time_ms: 0.0,
            ticks: 0,
            paused_ticks: 0,
        }
    }

    /// Creates a clock from a validated configuration.
    pub fn with_config(
        config: &ClockConfig,
        time: impl TimeSource + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut clock = Self::with_time_source(time);
        clock.interval_ms = config.interval_ms;
        clock.max_delta_ms = config.max_delta_ms;
        clock.paused = config.paused;
        clock.stats = StatsRing::new(samples_per_second(config.interval_ms));
        Ok(clock)
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Begins a run. Does nothing when already running.
    pub fn start(&mut self) {
        if self.state == ClockState::Running {
            return;
        }

        let now = self.now_ms();
        self.start_ms = now;
        self.last_tick_ms = now;
        self.next_deadline_ms = now + self.interval_ms;
        self.running_ms = 0.0;
        self.last_run_time_ms = 0.0;
        self.ticks = 0;
        self.paused_ticks = 0;
        self.stats.clear();
        self.state = ClockState::Running;

        log::debug!("FrameClock: started at {:.2} ms interval", self.interval_ms);
    }

    /// Stops ticking and drops every listener, including pending continuations.
    pub fn stop(&mut self) {
        let dropped = self.listeners.len();
        self.listeners.clear();
        self.state = ClockState::Stopped;

        log::debug!("FrameClock: stopped ({dropped} listeners removed)");
    }

    #[inline]
    pub fn state(&self) -> ClockState {
        self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    // ── listeners ─────────────────────────────────────────────────────────

    /// Registers a listener after all existing ones and starts the clock if needed.
    pub fn add_listener(&mut self, listener: impl TickListener + 'static) -> ListenerToken {
        let token = ListenerToken(self.next_token);
        self.next_token += 1;

        self.listeners.push(Registered {
            token,
            listener: Box::new(listener),
        });

        if !self.is_running() {
            self.start();
        }

        token
    }

    /// Closure form of [`add_listener`](Self::add_listener).
    pub fn add_fn<F>(&mut self, f: F) -> ListenerToken
    where
        F: FnMut(&TickEvent) -> TickControl + 'static,
    {
        self.add_listener(f)
    }

    /// Deregisters a listener. Returns `false` for unknown or already removed tokens.
    pub fn remove_listener(&mut self, token: ListenerToken) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.token != token);
        self.listeners.len() != before
    }

    #[inline]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ── settings ──────────────────────────────────────────────────────────

    /// Sets the target time between ticks.
    ///
    /// While running, the next deadline is re-anchored to the last tick.
    pub fn set_interval(&mut self, interval_ms: f64) -> Result<(), ConfigError> {
        let interval_ms = config::positive("interval_ms", interval_ms)?;

        self.interval_ms = interval_ms;
        self.stats.resize(samples_per_second(interval_ms));
        if self.is_running() {
            self.next_deadline_ms = self.last_tick_ms + interval_ms;
        }
        Ok(())
    }

    #[inline]
    pub fn interval(&self) -> f64 {
        self.interval_ms
    }

    /// Sets the target rate. Equivalent to `set_interval(1000 / fps)`.
    pub fn set_fps(&mut self, fps: f64) -> Result<(), ConfigError> {
        let fps = config::positive("fps", fps)?;
        self.set_interval(1000.0 / fps)
    }

    /// Target rate, `1000 / interval`, rounded to the nearest hundredth.
    pub fn fps(&self) -> f64 {
        (100_000.0 / self.interval_ms).round() / 100.0
    }

    pub fn set_max_delta(&mut self, max_delta_ms: f64) -> Result<(), ConfigError> {
        self.max_delta_ms = config::positive("max_delta_ms", max_delta_ms)?;
        Ok(())
    }

    #[inline]
    pub fn max_delta(&self) -> f64 {
        self.max_delta_ms
    }

    /// Marks future ticks as paused. Ticks are still delivered.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[inline]
    pub fn paused(&self) -> bool {
        self.paused
    }

    // ── measurement ───────────────────────────────────────────────────────

    /// Average dispatch time over the last `ticks` samples (default: one second's worth).
    pub fn measured_tick_time(&self, ticks: Option<usize>) -> f64 {
        self.stats.average_run_time(ticks.unwrap_or_else(|| self.ticks_per_second()))
    }

    /// Achieved rate over the last `ticks` samples (default: one second's worth).
    ///
    /// Returns `0.0` before the first tick.
    pub fn measured_fps(&self, ticks: Option<usize>) -> f64 {
        let avg = self.stats.average_delta(ticks.unwrap_or_else(|| self.ticks_per_second()));
        if avg > 0.0 { 1000.0 / avg } else { 0.0 }
    }

    #[inline]
    pub fn stats(&self) -> &StatsRing {
        &self.stats
    }

    /// Ticks dispatched in the current run.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks dispatched in the current run while not paused.
    #[inline]
    pub fn ticks_unpaused(&self) -> u64 {
        self.ticks - self.paused_ticks
    }

    /// Milliseconds since the current run started; `0.0` when not running.
    pub fn elapsed_ms(&self) -> f64 {
        if self.is_running() {
            self.now_ms() - self.start_ms
        } else {
            0.0
        }
    }

    /// Accumulated unpaused tick time in the current run.
    #[inline]
    pub fn running_ms(&self) -> f64 {
        self.running_ms
    }

    // ── scheduling ────────────────────────────────────────────────────────

    /// Time left until the next deadline; zero when overdue, `None` when not running.
    pub fn time_until_next_tick(&self) -> Option<Duration> {
        if !self.is_running() {
            return None;
        }
        let wait_ms = (self.next_deadline_ms - self.now_ms()).max(0.0);
        Some(Duration::from_nanos((wait_ms * 1_000_000.0).round() as u64))
    }

    /// Scheduler wake-up. Dispatches one tick if the deadline has been reached.
    ///
    /// Returns whether a tick was dispatched.
    pub fn poll(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }

        let now = self.now_ms();
        if now < self.next_deadline_ms {
            return false;
        }

        self.dispatch(now);
        true
    }

    /// Blocking host loop: sleeps until each deadline and polls, until `done`
    /// returns true or the clock stops.
    ///
    /// Only meaningful with a time source that advances on its own.
    pub fn run_until(&mut self, mut done: impl FnMut(&FrameClock) -> bool) {
        self.start();

        while self.is_running() && !done(self) {
            if let Some(wait) = self.time_until_next_tick() {
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
            }
            self.poll();
        }
    }

    fn dispatch(&mut self, now: f64) {
        let delta_ms = (now - self.last_tick_ms).clamp(0.0, self.max_delta_ms);
        self.last_tick_ms = now;
        self.advance_deadline(now);

        self.ticks += 1;
        if self.paused {
            self.paused_ticks += 1;
        } else {
            self.running_ms += delta_ms;
        }

        let event = TickEvent {
            timestamp_ms: now - self.start_ms,
            delta_ms,
            paused: self.paused,
            run_time_ms: self.last_run_time_ms,
            interval_ms: self.interval_ms,
            running_ms: self.running_ms,
        };

        let begin = self.now_ms();
        self.listeners
            .retain_mut(|entry| entry.listener.on_tick(&event) == TickControl::Continue);
        let run_time_ms = (self.now_ms() - begin).max(0.0);

        self.last_run_time_ms = run_time_ms;
        self.stats.push(TickSample { delta_ms, run_time_ms });

        log::trace!(
            "FrameClock: tick {} (delta {:.2} ms, dispatch {:.2} ms, {} listeners)",
            self.ticks,
            delta_ms,
            run_time_ms,
            self.listeners.len()
        );
    }

    /// Moves the deadline to the first grid point strictly after `now`.
    fn advance_deadline(&mut self, now: f64) {
        if self.next_deadline_ms > now {
            return;
        }
        let missed = ((now - self.next_deadline_ms) / self.interval_ms).floor();
        self.next_deadline_ms += (missed + 1.0) * self.interval_ms;
        if self.next_deadline_ms <= now {
            self.next_deadline_ms += self.interval_ms;
        }
        if missed >= 1.0 {
            log::debug!("FrameClock: coalesced {missed} missed intervals");
        }
    }

    fn ticks_per_second(&self) -> usize {
        samples_per_second(self.interval_ms)
    }

    /// Integer nanoseconds first, so whole-millisecond readings stay exact.
    #[inline]
    fn now_ms(&self) -> f64 {
        self.time.now().as_nanos() as f64 / 1_000_000.0
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClock")
            .field("state", &self.state)
            .field("interval_ms", &self.interval_ms)
            .field("paused", &self.paused)
            .field("listeners", &self.listeners.len())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}
