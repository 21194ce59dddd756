//! Cadence Metrics - frame and phase timing
//!
//! Collection compiles to no-ops unless the `metrics` feature is enabled.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use cadence_metrics::{FrameTimer, ReportInterval};
//!
//! let mut timer = FrameTimer::new(60); // Track last 60 frames
//! let mut report = ReportInterval::new(Duration::from_millis(250));
//! timer.record(frame_time);
//! if report.due(Instant::now()) {
//!     window.set_title(&format!("{:.2} ms", timer.frame_time_ms()));
//! }
//! ```

use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
mod frame_timer;
#[cfg(feature = "metrics")]
mod ring_buffer;
#[cfg(feature = "metrics")]
mod system_profiler;

#[cfg(feature = "metrics")]
pub use frame_timer::FrameTimer;
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;
#[cfg(feature = "metrics")]
pub use system_profiler::SystemProfiler;

/// Time a block under `$name` (zero-cost when metrics disabled)
#[macro_export]
macro_rules! time_scope {
    ($profiler:expr, $name:expr, $body:block) => {
        $profiler.time_system($name, || $body)
    };
}

/// Rate limiter for periodic reports (window title, log lines).
#[derive(Debug, Clone)]
pub struct ReportInterval {
    every: Duration,
    last: Option<Instant>,
}

impl ReportInterval {
    pub fn new(every: Duration) -> Self {
        Self { every, last: None }
    }

    /// True on the first call and then once per interval.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.every => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
pub struct FrameTimer;

#[cfg(not(feature = "metrics"))]
impl FrameTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn record(&mut self, _frame_time: Duration) {}
    pub fn frames(&self) -> u64 { 0 }
    pub fn fps(&self) -> f64 { 0.0 }
    pub fn frame_time_ms(&self) -> f64 { 0.0 }
    pub fn frame_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
}

#[cfg(not(feature = "metrics"))]
#[derive(Default)]
pub struct SystemProfiler;

#[cfg(not(feature = "metrics"))]
impl SystemProfiler {
    pub fn new() -> Self { Self }
    pub fn time_system<F, R>(&mut self, _name: &'static str, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn record(&mut self, _name: &'static str, _elapsed: Duration) {}
    pub fn get_timing(&self, _name: &str) -> Duration { Duration::ZERO }
    pub fn average_ms(&self, _name: &str) -> f64 { 0.0 }
    pub fn reset(&mut self) {}
    pub fn summary(&self) -> Vec<(&'static str, f64)> { Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_interval_rate_limits() {
        let start = Instant::now();
        let mut report = ReportInterval::new(Duration::from_millis(250));
        assert!(report.due(start));
        assert!(!report.due(start + Duration::from_millis(100)));
        assert!(report.due(start + Duration::from_millis(250)));
        assert!(!report.due(start + Duration::from_millis(400)));
        assert!(report.due(start + Duration::from_millis(600)));
    }

    #[test]
    fn timing_api_is_available_in_every_build() {
        let mut timer = FrameTimer::new(60);
        timer.record(Duration::from_millis(16));
        let mut profiler = SystemProfiler::new();
        let out = time_scope!(profiler, "update", { 1 + 1 });
        assert_eq!(out, 2);
    }
}
