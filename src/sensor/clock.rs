// Time source for the sampling loop
// Millisecond uptime plus pacing sleeps; tests swap in a manual clock

use std::time::{Duration, Instant};

pub trait Clock: Send {
    /// Milliseconds since the clock was created (device uptime)
    fn now_ms(&self) -> u64;

    /// Block the loop for `ms` milliseconds
    fn sleep_ms(&self, ms: u64);
}

/// Monotonic wall clock
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }
}

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        clock.sleep_ms(5);
        assert!(clock.now_ms() >= a + 5);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.sleep_ms(30);
        assert_eq!(other.now_ms(), 30);
    }
}
