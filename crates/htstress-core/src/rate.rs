//! Progress cadence and throughput
//!
//! Bounded runs print ten progress lines (`tick = max_requests / 10`);
//! unbounded runs print one every `DEFAULT_TICK` completions. The controller
//! only observes the completion count, it never influences the run.

use std::io::Write;
use std::time::Duration;

use crate::constants::{DEFAULT_TICK, PROGRESS_STEPS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateController {
    tick: u64,
}

impl RateController {
    pub fn new(max_requests: u64) -> Self {
        let tick = if max_requests > 0 {
            max_requests / PROGRESS_STEPS
        } else {
            DEFAULT_TICK
        };
        Self { tick }
    }

    /// Completions between progress lines; 0 disables progress output
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn should_report(&self, completed: u64) -> bool {
        self.tick != 0 && completed % self.tick == 0
    }

    /// Print `"<completed> requests"` on stdout when `completed` is on a tick
    #[inline]
    pub fn observe(&self, completed: u64) {
        if self.should_report(completed) {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let _ = writeln!(out, "{}", progress_line(completed));
            let _ = out.flush();
        }
    }
}

/// The exact progress line format scraped by tooling
pub fn progress_line(completed: u64) -> String {
    format!("{} requests", completed)
}

/// Requests per second for the final report.
///
/// Bounded runs divide the ceiling (lowered to the completed count on a
/// graceful finish) by the elapsed time; unbounded ones use the completions.
pub fn throughput(limit: Option<u64>, completed: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    limit.unwrap_or(completed) as f64 / secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_bounded() {
        assert_eq!(RateController::new(1000).tick(), 100);
        assert_eq!(RateController::new(25).tick(), 2);
    }

    #[test]
    fn test_tick_unbounded_uses_default() {
        assert_eq!(RateController::new(0).tick(), DEFAULT_TICK);
    }

    #[test]
    fn test_tiny_run_prints_nothing() {
        let rate = RateController::new(5);
        assert_eq!(rate.tick(), 0);
        assert!((0..10).all(|n| !rate.should_report(n)));
    }

    #[test]
    fn test_should_report_cadence() {
        let rate = RateController::new(100);
        let reported: Vec<u64> = (1..=100).filter(|&n| rate.should_report(n)).collect();
        assert_eq!(reported, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_progress_line_format() {
        assert_eq!(progress_line(4200), "4200 requests");
    }

    #[test]
    fn test_throughput() {
        let t = throughput(Some(1000), 990, Duration::from_millis(500));
        assert!((t - 2000.0).abs() < 1e-9);

        let t = throughput(None, 300, Duration::from_secs(3));
        assert!((t - 100.0).abs() < 1e-9);

        assert_eq!(throughput(None, 10, Duration::ZERO), 0.0);
    }
}
