//! Windowed host
//!
//! Drives the simulation loop from winit's event loop: one loop frame per
//! redraw, with the window title showing frame time every 250ms.

use crate::demo::ParticleDemo;
use anyhow::{Context, Result};
use cadence_audio::Mixer;
use cadence_core::runloop::{LoopState, SimulationLoop};
use cadence_metrics::{FrameTimer, ReportInterval};
use cadence_render::window::window_attributes;
use cadence_render::winit::application::ApplicationHandler;
use cadence_render::winit::event::WindowEvent;
use cadence_render::winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use cadence_render::winit::window::WindowId;
use cadence_render::{WindowConfig, WindowSurface};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TITLE: &str = "Cadence";
const TITLE_INTERVAL: Duration = Duration::from_millis(250);

pub struct App {
    window: WindowConfig,
    demo: ParticleDemo,
    sim_loop: SimulationLoop,
    mixer: Option<Mixer>,
    surface: Option<WindowSurface>,
    last_frame: Option<Instant>,
    frame_timer: FrameTimer,
    title_report: ReportInterval,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(
        window: WindowConfig,
        demo: ParticleDemo,
        sim_loop: SimulationLoop,
        mixer: Mixer,
    ) -> Self {
        Self {
            window,
            demo,
            sim_loop,
            mixer: Some(mixer),
            surface: None,
            last_frame: None,
            frame_timer: FrameTimer::new(60),
            title_report: ReportInterval::new(TITLE_INTERVAL),
            error: None,
        }
    }

    /// Run until the loop stops or the window closes.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self).context("event loop failed")?;

        if let Some(err) = self.error.take() {
            return Err(err);
        }
        tracing::info!(
            ticks = self.sim_loop.tick().count(),
            frames = self.frame_timer.frames(),
            "window closed"
        );
        for (phase, avg_ms) in self.demo.profiler().summary() {
            tracing::info!(phase, avg_ms, "phase timing");
        }
        Ok(())
    }

    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<WindowSurface> {
        let window = event_loop
            .create_window(window_attributes(&self.window))
            .context("failed to create window")?;
        let mixer = self.mixer.take().unwrap_or_default();
        let surface = WindowSurface::new(Arc::new(window), self.window.vsync, mixer)
            .context("failed to initialise renderer")?;
        let caps = surface.renderer().capabilities();
        tracing::info!(
            backend = ?caps.backend,
            adapter = %caps.adapter_name,
            max_buffer_size = caps.max_buffer_size,
            vsync = surface.vsync(),
            "renderer ready"
        );
        Ok(surface)
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        let now = Instant::now();
        let elapsed = self
            .last_frame
            .replace(now)
            .map_or(Duration::ZERO, |last| now.duration_since(last));

        let report = self.sim_loop.frame(surface, &mut self.demo, elapsed);
        self.frame_timer.record(elapsed);

        if self.demo.take_vsync_toggle() {
            let vsync = !surface.vsync();
            surface.set_vsync(vsync);
            tracing::info!(vsync, "vsync toggled");
        }

        if self.title_report.due(now) {
            let paused = if report.state == LoopState::Paused { " [paused]" } else { "" };
            surface.set_title(&format!(
                "{TITLE} | {:.2} ms ({:.0} fps) | tick {} | x{}{paused}",
                self.frame_timer.frame_time_ms(),
                self.frame_timer.fps(),
                report.tick.count(),
                self.sim_loop.control().time_scale(),
            ));
        }

        if report.state == LoopState::Stopped {
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.surface.is_some() {
            return;
        }
        match self.create_surface(event_loop) {
            Ok(surface) => {
                self.surface = Some(surface);
                self.sim_loop.start();
            }
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(surface) = self.surface.as_mut() {
            surface.handle_window_event(&event);
        }
        if let WindowEvent::RedrawRequested = event {
            self.redraw(event_loop);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(surface) = &self.surface {
            surface.window().request_redraw();
        }
    }
}
