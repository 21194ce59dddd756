//! Per-phase timing (update, render, ...)

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
struct PhaseTiming {
    total: Duration,
    samples: u32,
}

/// Accumulates time spent in named phases until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct SystemProfiler {
    phases: BTreeMap<&'static str, PhaseTiming>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_system<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        let phase = self.phases.entry(name).or_default();
        phase.total += elapsed;
        phase.samples += 1;
    }

    pub fn get_timing(&self, name: &str) -> Duration {
        self.phases
            .get(name)
            .map(|phase| phase.total)
            .unwrap_or(Duration::ZERO)
    }

    /// Mean time per sample of `name`, in milliseconds.
    pub fn average_ms(&self, name: &str) -> f64 {
        match self.phases.get(name) {
            Some(phase) if phase.samples > 0 => {
                phase.total.as_secs_f64() * 1000.0 / phase.samples as f64
            }
            _ => 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.phases.clear();
    }

    /// `(name, average ms)` in name order.
    pub fn summary(&self) -> Vec<(&'static str, f64)> {
        self.phases
            .keys()
            .map(|name| (*name, self.average_ms(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_per_phase() {
        let mut profiler = SystemProfiler::new();
        profiler.record("update", Duration::from_millis(2));
        profiler.record("update", Duration::from_millis(4));
        profiler.record("render", Duration::from_millis(1));
        assert_eq!(profiler.get_timing("update"), Duration::from_millis(6));
        assert!((profiler.average_ms("update") - 3.0).abs() < 1e-9);
        assert_eq!(profiler.summary().len(), 2);
        assert_eq!(profiler.summary()[0].0, "render");

        let value = profiler.time_system("physics", || 7);
        assert_eq!(value, 7);
        profiler.reset();
        assert_eq!(profiler.average_ms("update"), 0.0);
    }
}
