//! Simulation loop
//!
//! Drives a [`Simulation`] against a [`Surface`] one frame at a time:
//! drain input, run fixed-Δt updates, render once with the interpolation
//! factor. The loop never spawns threads; hosts either call
//! [`SimulationLoop::frame`] from their own event loop (winit) or hand
//! control to [`SimulationLoop::run`].

use crate::surface::{Event, Surface};
use crate::time::{FixedTimestep, SimulationTick};
use std::time::{Duration, Instant};

/// Bounds applied to [`LoopControl::set_time_scale`].
pub const MIN_TIME_SCALE: f64 = 1.0 / 16.0;
pub const MAX_TIME_SCALE: f64 = 16.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Requests a simulation can make of the loop while handling events.
///
/// Everything here takes effect within the current frame except stop,
/// which is observed at the top of the next one.
#[derive(Debug, Clone)]
pub struct LoopControl {
    state: LoopState,
    stop_requested: bool,
    pending_steps: u32,
    time_scale: f64,
}

impl LoopControl {
    fn new() -> Self {
        Self {
            state: LoopState::Stopped,
            stop_requested: false,
            pending_steps: 0,
            time_scale: 1.0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == LoopState::Paused
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn pause(&mut self) {
        if self.state == LoopState::Running {
            self.state = LoopState::Paused;
            tracing::debug!("simulation paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == LoopState::Paused {
            self.state = LoopState::Running;
            tracing::debug!("simulation resumed");
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            LoopState::Running => self.pause(),
            LoopState::Paused => self.resume(),
            LoopState::Stopped => {}
        }
    }

    /// Queue one update to run while paused.
    pub fn step(&mut self) {
        if self.state == LoopState::Paused {
            self.pending_steps += 1;
        }
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Scale applied to wall-clock time before it is accumulated.
    /// Clamped to `[MIN_TIME_SCALE, MAX_TIME_SCALE]`; non-finite values are ignored.
    pub fn set_time_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.time_scale = scale.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE);
        }
    }
}

/// Application logic driven by the loop.
pub trait Simulation<S: Surface + ?Sized> {
    /// Called for every drained event, before any update of the frame.
    fn handle_event(&mut self, _event: &Event, _control: &mut LoopControl) {}

    /// One fixed step of `dt` seconds.
    fn update(&mut self, dt: f64);

    /// Submit drawables. `alpha` is the fraction of a step not yet simulated.
    fn render(&mut self, surface: &mut S, alpha: f64);
}

/// What happened during one call to [`SimulationLoop::frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub updates: u32,
    pub dropped_steps: u64,
    pub alpha: f64,
    pub tick: SimulationTick,
    pub state: LoopState,
}

pub struct SimulationLoop {
    control: LoopControl,
    timestep: FixedTimestep,
}

impl SimulationLoop {
    pub fn new(timestep: FixedTimestep) -> Self {
        Self {
            control: LoopControl::new(),
            timestep,
        }
    }

    pub fn state(&self) -> LoopState {
        self.control.state
    }

    pub fn control(&self) -> &LoopControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut LoopControl {
        &mut self.control
    }

    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    pub fn tick(&self) -> SimulationTick {
        self.timestep.tick()
    }

    /// Stopped → Running. Starting an already running or paused loop does nothing.
    pub fn start(&mut self) {
        if self.control.state == LoopState::Stopped {
            self.control.state = LoopState::Running;
            self.control.stop_requested = false;
            self.timestep.discard_accumulator();
            tracing::info!(
                dt_ms = self.timestep.dt().as_secs_f64() * 1000.0,
                max_catch_up = self.timestep.max_catch_up(),
                "simulation loop started"
            );
        }
    }

    /// Request a stop; the frame in progress (if any) completes first.
    pub fn stop(&mut self) {
        self.control.request_stop();
    }

    /// Run one frame with `elapsed` wall-clock time since the previous one.
    pub fn frame<S, G>(&mut self, surface: &mut S, sim: &mut G, elapsed: Duration) -> FrameReport
    where
        S: Surface + ?Sized,
        G: Simulation<S> + ?Sized,
    {
        if self.control.stop_requested && self.control.state != LoopState::Stopped {
            self.control.state = LoopState::Stopped;
            self.control.pending_steps = 0;
            tracing::info!(tick = self.timestep.tick().count(), "simulation loop stopped");
        }
        if self.control.state == LoopState::Stopped {
            return self.report(0, 0);
        }

        for event in surface.poll_events() {
            if event == Event::Closed {
                self.control.request_stop();
            }
            sim.handle_event(&event, &mut self.control);
        }

        let mut updates = 0;
        let mut dropped = 0;
        match self.control.state {
            LoopState::Running => {
                let scaled = if self.control.time_scale == 1.0 {
                    elapsed
                } else {
                    elapsed.mul_f64(self.control.time_scale)
                };
                let plan = self.timestep.accumulate(scaled);
                if plan.dropped > 0 {
                    tracing::warn!(
                        dropped = plan.dropped,
                        max_catch_up = self.timestep.max_catch_up(),
                        "simulation fell behind, discarding steps"
                    );
                }
                updates = plan.steps;
                dropped = plan.dropped;
                // Steps queued before a resume in the same frame are not needed.
                self.control.pending_steps = 0;
            }
            LoopState::Paused => {
                updates = std::mem::take(&mut self.control.pending_steps);
            }
            LoopState::Stopped => {}
        }

        let dt = self.timestep.dt().as_secs_f64();
        for _ in 0..updates {
            sim.update(dt);
            self.timestep.advance_tick();
        }

        let alpha = self.timestep.alpha();
        surface.begin_frame();
        sim.render(surface, alpha);
        surface.end_frame();

        self.report(updates, dropped)
    }

    /// Drive frames from a monotonic clock until the loop stops.
    ///
    /// Pacing comes from the surface (`end_frame` blocking on vsync); with a
    /// non-blocking surface this spins.
    pub fn run<S, G>(&mut self, surface: &mut S, sim: &mut G)
    where
        S: Surface + ?Sized,
        G: Simulation<S> + ?Sized,
    {
        self.start();
        let mut last = Instant::now();
        while self.control.state != LoopState::Stopped {
            let now = Instant::now();
            self.frame(surface, sim, now - last);
            last = now;
        }
    }

    fn report(&self, updates: u32, dropped_steps: u64) -> FrameReport {
        FrameReport {
            updates,
            dropped_steps,
            alpha: self.timestep.alpha(),
            tick: self.timestep.tick(),
            state: self.control.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Color, Vec2};
    use crate::surface::{Drawable, HeadlessSurface, Key};

    const DT: Duration = Duration::from_millis(16);

    #[derive(Default)]
    struct Counter {
        updates: u32,
        renders: u32,
        last_alpha: f64,
        events: Vec<Event>,
    }

    impl<S: Surface + ?Sized> Simulation<S> for Counter {
        fn handle_event(&mut self, event: &Event, control: &mut LoopControl) {
            self.events.push(event.clone());
            match event {
                Event::KeyPressed(Key::Space) => control.toggle_pause(),
                Event::KeyPressed(Key::Char('u')) => control.step(),
                Event::KeyPressed(Key::Char('q')) => control.request_stop(),
                _ => {}
            }
        }

        fn update(&mut self, dt: f64) {
            assert!((dt - DT.as_secs_f64()).abs() < 1e-12);
            self.updates += 1;
        }

        fn render(&mut self, surface: &mut S, alpha: f64) {
            self.renders += 1;
            self.last_alpha = alpha;
            surface.submit(Drawable::Rect {
                center: Vec2::ZERO,
                half_extent: Vec2::splat(0.1),
                color: Color::WHITE,
            });
        }
    }

    fn running_loop() -> SimulationLoop {
        let mut sim_loop = SimulationLoop::new(FixedTimestep::from_duration(DT, 5));
        sim_loop.start();
        sim_loop
    }

    #[test]
    fn fractional_time_carries_over() {
        let mut sim_loop = running_loop();
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();

        let report = sim_loop.frame(&mut surface, &mut sim, DT * 3 + DT / 2);
        assert_eq!(report.updates, 3);
        assert_eq!(report.tick.accumulator(), DT / 2);
        assert!((sim.last_alpha - 0.5).abs() < 1e-9);
        assert_eq!(sim.renders, 1);
        assert_eq!(surface.frames(), 1);
        assert_eq!(surface.draws().len(), 1);
    }

    #[test]
    fn severe_lag_is_capped() {
        let mut sim_loop = running_loop();
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();

        let report = sim_loop.frame(&mut surface, &mut sim, DT * 100);
        assert_eq!(report.updates, 5);
        assert_eq!(report.dropped_steps, 95);
        assert_eq!(sim.updates, 5);
        assert_eq!(report.tick.count(), 5);

        let report = sim_loop.frame(&mut surface, &mut sim, Duration::ZERO);
        assert_eq!(report.updates, 0);
    }

    #[test]
    fn stop_is_observed_next_frame() {
        let mut sim_loop = running_loop();
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();

        surface.push_event(Event::KeyPressed(Key::Char('q')));
        let report = sim_loop.frame(&mut surface, &mut sim, DT);
        assert_eq!(report.state, LoopState::Running);
        assert_eq!(report.updates, 1);
        assert_eq!(sim.renders, 1);

        let report = sim_loop.frame(&mut surface, &mut sim, DT);
        assert_eq!(report.state, LoopState::Stopped);
        assert_eq!(report.updates, 0);
        assert_eq!(sim.renders, 1);
        assert_eq!(surface.frames(), 1);
    }

    #[test]
    fn close_event_stops_loop() {
        let mut sim_loop = running_loop();
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();

        surface.push_event(Event::Closed);
        sim_loop.frame(&mut surface, &mut sim, DT);
        assert_eq!(sim.events, [Event::Closed]);
        assert!(sim_loop.control().stop_requested());
        assert_eq!(
            sim_loop.frame(&mut surface, &mut sim, DT).state,
            LoopState::Stopped
        );
    }

    #[test]
    fn paused_loop_only_runs_requested_steps() {
        let mut sim_loop = running_loop();
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();

        surface.push_event(Event::KeyPressed(Key::Space));
        let report = sim_loop.frame(&mut surface, &mut sim, DT * 4);
        assert_eq!(report.state, LoopState::Paused);
        assert_eq!(report.updates, 0);
        assert_eq!(sim.renders, 1);

        surface.push_event(Event::KeyPressed(Key::Char('u')));
        surface.push_event(Event::KeyPressed(Key::Char('u')));
        let report = sim_loop.frame(&mut surface, &mut sim, DT * 4);
        assert_eq!(report.updates, 2);

        surface.push_event(Event::KeyPressed(Key::Space));
        let report = sim_loop.frame(&mut surface, &mut sim, DT);
        assert_eq!(report.state, LoopState::Running);
        assert_eq!(report.updates, 1);
        assert_eq!(sim.updates, 3);
    }

    #[test]
    fn time_scale_stretches_elapsed_time() {
        let mut sim_loop = running_loop();
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();

        sim_loop.control_mut().set_time_scale(2.0);
        assert_eq!(sim_loop.frame(&mut surface, &mut sim, DT).updates, 2);

        sim_loop.control_mut().set_time_scale(f64::NAN);
        assert_eq!(sim_loop.control().time_scale(), 2.0);
        sim_loop.control_mut().set_time_scale(1000.0);
        assert_eq!(sim_loop.control().time_scale(), MAX_TIME_SCALE);
    }

    #[test]
    fn stopped_loop_does_nothing() {
        let mut sim_loop = SimulationLoop::new(FixedTimestep::from_duration(DT, 5));
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();
        surface.push_event(Event::Closed);

        let report = sim_loop.frame(&mut surface, &mut sim, DT * 10);
        assert_eq!(report.state, LoopState::Stopped);
        assert_eq!(sim.updates, 0);
        assert!(sim.events.is_empty());
        assert_eq!(surface.frames(), 0);
    }

    #[test]
    fn run_returns_once_stopped() {
        let mut sim_loop = SimulationLoop::new(FixedTimestep::from_duration(DT, 5));
        let mut surface = HeadlessSurface::<()>::new();
        let mut sim = Counter::default();
        surface.push_event(Event::Closed);

        sim_loop.run(&mut surface, &mut sim);
        assert_eq!(sim_loop.state(), LoopState::Stopped);
        assert_eq!(surface.frames(), 1);
    }
}
