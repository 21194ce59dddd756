//! Window-backed surface
//!
//! The host forwards winit window events into [`WindowSurface::handle_window_event`];
//! the simulation loop drains them through [`Surface::poll_events`]. Drawables
//! submitted during a frame are batched and rendered at `end_frame`.

use crate::renderer::{rect_vertices, QuadRenderer, Vertex};
use crate::window::translate_event;
use crate::RenderError;
use cadence_asset::ResourceHandle;
use cadence_audio::{Mixer, Sound};
use cadence_core::math::Color;
use cadence_core::surface::{Drawable, Event, Surface};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use winit::event::WindowEvent;
use winit::window::Window;

pub struct WindowSurface {
    window: Arc<Window>,
    renderer: QuadRenderer,
    events: VecDeque<Event>,
    clear: Color,
    vertices: Vec<Vertex>,
    mixer: Mixer,
    mix_buffer: Vec<f32>,
    last_mix: Instant,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>, vsync: bool, mixer: Mixer) -> Result<Self, RenderError> {
        let renderer = pollster::block_on(QuadRenderer::new(Arc::clone(&window), vsync))?;
        Ok(Self {
            window,
            renderer,
            events: VecDeque::new(),
            clear: Color::BLACK,
            vertices: Vec::new(),
            mixer,
            mix_buffer: Vec::new(),
            last_mix: Instant::now(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn renderer(&self) -> &QuadRenderer {
        &self.renderer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    pub fn vsync(&self) -> bool {
        self.renderer.vsync()
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        if vsync != self.renderer.vsync() {
            self.renderer.set_vsync(vsync);
        }
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    /// Queue the engine event for a winit window event, if any.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        if let Some(event) = translate_event(event) {
            if let Event::Resized { width, height } = event {
                self.renderer.resize(width, height);
            }
            self.events.push_back(event);
        }
    }

    /// Advance the mixer by the wall-clock time since the last call.
    ///
    /// There is no output device, so mixed samples are discarded; this keeps
    /// voices (and the sounds they hold) on a real-time schedule.
    fn pump_audio(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_mix);
        self.last_mix = now;

        let frames = (elapsed.as_secs_f64() * self.mixer.sample_rate() as f64) as usize;
        if frames == 0 || self.mixer.active_voices() == 0 {
            return;
        }
        self.mix_buffer.resize(frames * 2, 0.0);
        self.mixer.mix(&mut self.mix_buffer);
    }
}

impl Surface for WindowSurface {
    type Sound = ResourceHandle<Sound>;

    fn poll_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn begin_frame(&mut self) {
        self.vertices.clear();
    }

    fn submit(&mut self, drawable: Drawable) {
        match drawable {
            Drawable::Clear(color) => {
                self.clear = color;
                self.vertices.clear();
            }
            Drawable::Rect {
                center,
                half_extent,
                color,
            } => self
                .vertices
                .extend_from_slice(&rect_vertices(center, half_extent, color)),
        }
    }

    fn end_frame(&mut self) {
        match self.renderer.draw(self.clear, &self.vertices) {
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "rendering failed, closing window");
                self.events.push_back(Event::Closed);
            }
        }
        self.pump_audio();
    }

    fn play_sound(&mut self, sound: &Self::Sound) {
        self.mixer.play(sound.clone());
    }
}
