use std::cell::Cell;
use std::time::{Duration, Instant};

/// Time source used by the synchronizer and the trial runner.
pub trait Clock {
    /// Seconds on a monotonic timeline; only differences are meaningful.
    fn now(&self) -> f64;
    fn sleep(&self, d: Duration);
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn sleep(&self, d: Duration) {
        (**self).sleep(d)
    }
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d)
    }
}

/// Clock that only moves when slept on or advanced; drives scheduler tests.
#[derive(Debug, Default)]
pub struct SimClock {
    now: Cell<f64>,
}

impl SimClock {
    pub fn starting_at(t: f64) -> Self {
        Self { now: Cell::new(t) }
    }

    pub fn advance(&self, secs: f64) {
        self.now.set(self.now.get() + secs);
    }
}

impl Clock for SimClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d.as_secs_f64());
    }
}

/// Sleep in slices of at most `poll` until `clock.now() >= target`.
pub fn wait_until<C: Clock + ?Sized>(clock: &C, target: f64, poll: Duration) {
    loop {
        let remaining = target - clock.now();
        // NaN targets count as reached
        if remaining.is_nan() || remaining <= 0.0 {
            return;
        }
        let remaining = Duration::try_from_secs_f64(remaining).unwrap_or(Duration::MAX);
        let slice = if poll.is_zero() {
            remaining
        } else {
            poll.min(remaining)
        };
        // sub-nanosecond remainder
        if slice.is_zero() {
            return;
        }
        clock.sleep(slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_lands_on_target() {
        let clock = SimClock::starting_at(1.0);
        wait_until(&clock, 1.25, Duration::from_millis(100));
        assert!((clock.now() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn wait_until_past_target_returns_immediately() {
        let clock = SimClock::starting_at(3.0);
        wait_until(&clock, 2.0, Duration::from_millis(10));
        assert_eq!(clock.now(), 3.0);
    }

    #[test]
    fn wait_until_nan_target_returns_immediately() {
        let clock = SimClock::starting_at(3.0);
        wait_until(&clock, f64::NAN, Duration::from_millis(10));
        assert_eq!(clock.now(), 3.0);
    }

    #[test]
    fn monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        clock.sleep(Duration::from_millis(2));
        assert!(clock.now() > a);
    }
}
