/// Timing recorded for one dispatched tick.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct TickSample {
    /// Clamped time since the previous tick, in milliseconds.
    pub delta_ms: f64,
    /// Time spent dispatching the tick to listeners, in milliseconds.
    pub run_time_ms: f64,
}

/// Upper bound on retained samples regardless of interval.
pub const MAX_SAMPLES: usize = 1000;

/// Number of samples covering one second at `interval_ms`, clamped to `1..=MAX_SAMPLES`.
pub fn samples_per_second(interval_ms: f64) -> usize {
    // Tolerate float noise so 1000 / (1000 / 30) stays 30.
    let n = (1000.0 / interval_ms - 1e-6).ceil();
    if n.is_finite() {
        (n as usize).clamp(1, MAX_SAMPLES)
    } else {
        MAX_SAMPLES
    }
}

/// Fixed-capacity circular buffer of recent tick samples.
///
/// Pushing into a full ring overwrites the oldest sample.
#[derive(Debug, Clone)]
pub struct StatsRing {
    samples: Vec<TickSample>,
    /// Next write position.
    head: usize,
    len: usize,
}

impl StatsRing {
    /// Creates an empty ring. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![TickSample::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn push(&mut self, sample: TickSample) {
        let cap = self.capacity();
        self.samples[self.head] = sample;
        self.head = (self.head + 1) % cap;
        self.len = (self.len + 1).min(cap);
    }

    /// Up to `n` samples, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = TickSample> + '_ {
        let cap = self.capacity();
        (0..n.min(self.len)).map(move |i| self.samples[(self.head + cap - 1 - i) % cap])
    }

    /// Changes capacity, keeping the newest samples that still fit.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity() {
            return;
        }

        let mut kept: Vec<TickSample> = self.recent(capacity).collect();
        kept.reverse();

        let len = kept.len();
        kept.resize(capacity, TickSample::default());

        self.samples = kept;
        self.len = len;
        self.head = len % capacity;
    }

    /// Mean `delta_ms` over the newest `min(n, len)` samples; `0.0` when empty.
    pub fn average_delta(&self, n: usize) -> f64 {
        self.average_by(n, |s| s.delta_ms)
    }

    /// Mean `run_time_ms` over the newest `min(n, len)` samples; `0.0` when empty.
    pub fn average_run_time(&self, n: usize) -> f64 {
        self.average_by(n, |s| s.run_time_ms)
    }

    fn average_by(&self, n: usize, field: impl Fn(&TickSample) -> f64) -> f64 {
        let count = n.min(self.len);
        if count == 0 {
            return 0.0;
        }
        let total: f64 = self.recent(count).map(|s| field(&s)).sum();
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(delta_ms: f64, run_time_ms: f64) -> TickSample {
        TickSample { delta_ms, run_time_ms }
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn samples_per_second_rounds_up_and_clamps() {
        assert_eq!(samples_per_second(50.0), 20);
        assert_eq!(samples_per_second(1000.0 / 30.0), 30);
        assert_eq!(samples_per_second(3000.0), 1);
        assert_eq!(samples_per_second(0.1), MAX_SAMPLES);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(StatsRing::new(0).capacity(), 1);
    }

    // ── push / recent ─────────────────────────────────────────────────────

    #[test]
    fn empty_ring_averages_to_zero() {
        let ring = StatsRing::new(4);
        assert!(ring.is_empty());
        assert_eq!(ring.average_delta(4), 0.0);
        assert_eq!(ring.average_run_time(4), 0.0);
        assert_eq!(ring.recent(1).count(), 0);
    }

    #[test]
    fn full_ring_overwrites_oldest() {
        let mut ring = StatsRing::new(3);
        for i in 1..=5 {
            ring.push(s(i as f64, 0.0));
        }
        assert_eq!(ring.len(), 3);
        let deltas: Vec<f64> = ring.recent(10).map(|x| x.delta_ms).collect();
        assert_eq!(deltas, vec![5.0, 4.0, 3.0]);
    }

    // ── averages ──────────────────────────────────────────────────────────

    #[test]
    fn average_uses_newest_samples() {
        let mut ring = StatsRing::new(8);
        ring.push(s(100.0, 10.0));
        ring.push(s(50.0, 4.0));
        ring.push(s(30.0, 2.0));
        assert_eq!(ring.average_delta(2), 40.0);
        assert_eq!(ring.average_run_time(1), 2.0);
    }

    #[test]
    fn average_clamps_to_available_depth() {
        let mut ring = StatsRing::new(8);
        ring.push(s(10.0, 1.0));
        ring.push(s(20.0, 3.0));
        assert_eq!(ring.average_delta(100), 15.0);
        assert_eq!(ring.average_run_time(100), 2.0);
    }

    // ── resize ────────────────────────────────────────────────────────────

    #[test]
    fn shrinking_keeps_newest() {
        let mut ring = StatsRing::new(5);
        for i in 1..=5 {
            ring.push(s(i as f64, 0.0));
        }
        ring.resize(2);
        let deltas: Vec<f64> = ring.recent(10).map(|x| x.delta_ms).collect();
        assert_eq!(deltas, vec![5.0, 4.0]);

        ring.push(s(6.0, 0.0));
        let deltas: Vec<f64> = ring.recent(10).map(|x| x.delta_ms).collect();
        assert_eq!(deltas, vec![6.0, 5.0]);
    }

    #[test]
    fn growing_keeps_everything_and_appends_after() {
        let mut ring = StatsRing::new(2);
        ring.push(s(1.0, 0.0));
        ring.push(s(2.0, 0.0));
        ring.push(s(3.0, 0.0));
        ring.resize(4);
        assert_eq!(ring.len(), 2);

        ring.push(s(4.0, 0.0));
        let deltas: Vec<f64> = ring.recent(10).map(|x| x.delta_ms).collect();
        assert_eq!(deltas, vec![4.0, 3.0, 2.0]);
    }
}
