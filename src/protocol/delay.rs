//! Bus timing delays

use embedded_hal::delay::DelayNs;
use std::thread;
use std::time::Duration;

/// Delay that sleeps the calling thread
///
/// Userspace wake-up latency dwarfs the NU801's nanosecond timings, so
/// short delays mostly act as a lower bound.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        if ns > 0 {
            thread::sleep(Duration::from_nanos(ns as u64));
        }
    }

    fn delay_us(&mut self, us: u32) {
        if us > 0 {
            thread::sleep(Duration::from_micros(us as u64));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_latch_hold_sleeps_at_least_600us() {
        let start = Instant::now();
        SleepDelay.delay_us(600);
        assert!(start.elapsed() >= Duration::from_micros(600));
    }
}
