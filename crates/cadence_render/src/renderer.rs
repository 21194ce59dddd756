//! wgpu quad renderer
//!
//! Every drawable rect becomes two triangles in one vertex buffer, drawn with
//! a single pipeline and a single render pass per frame.

use crate::backend::probe_capabilities;
use crate::{DeviceCapabilities, RenderError};
use cadence_core::math::{Color, Vec2};
use std::sync::Arc;
use winit::window::Window;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

const VERTICES_PER_RECT: usize = 6;
const INITIAL_RECT_CAPACITY: usize = 1024;

/// Two counter-clockwise triangles covering the rect.
pub fn rect_vertices(
    center: Vec2,
    half_extent: Vec2,
    color: Color,
) -> [Vertex; VERTICES_PER_RECT] {
    let min = center - half_extent;
    let max = center + half_extent;
    let color = color.to_array();
    let v = |x: f32, y: f32| Vertex {
        position: [x, y],
        color,
    };
    [
        v(min.x, min.y),
        v(max.x, min.y),
        v(max.x, max.y),
        v(min.x, min.y),
        v(max.x, max.y),
        v(min.x, max.y),
    ]
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

pub struct QuadRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    capabilities: DeviceCapabilities,
}

impl QuadRenderer {
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        let mut capabilities = probe_capabilities(&adapter);
        tracing::info!(
            backend = ?capabilities.backend,
            adapter = %capabilities.adapter_name,
            max_texture_size = capabilities.max_texture_size,
            max_buffer_size = capabilities.max_buffer_size,
            "graphics adapter selected"
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Cadence Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;
        // The device may be created with tighter limits than the adapter offers.
        capabilities.max_buffer_size = capabilities
            .max_buffer_size
            .min(device.limits().max_buffer_size);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present_mode(vsync),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Quad Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/quad.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Quad Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Quad Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let vertex_capacity = INITIAL_RECT_CAPACITY * VERTICES_PER_RECT;
        let vertex_buffer = create_vertex_buffer(&device, vertex_capacity);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            vertex_buffer,
            vertex_capacity,
            capabilities,
        })
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            // Minimized; keep the old configuration until a real size arrives.
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn vsync(&self) -> bool {
        self.config.present_mode == wgpu::PresentMode::AutoVsync
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.config.present_mode = present_mode(vsync);
        self.surface.configure(&self.device, &self.config);
        tracing::info!(vsync, "present mode changed");
    }

    /// Clear to `clear`, draw `vertices`, present.
    ///
    /// Returns `Ok(false)` if the frame was skipped because the surface had
    /// to be reconfigured or timed out.
    pub fn draw(&mut self, clear: Color, vertices: &[Vertex]) -> Result<bool, RenderError> {
        if vertices.len() > self.vertex_capacity {
            let capacity = grown_capacity(vertices.len(), self.capabilities.max_buffer_size);
            if capacity > self.vertex_capacity {
                self.vertex_capacity = capacity;
                self.vertex_buffer = create_vertex_buffer(&self.device, self.vertex_capacity);
                tracing::debug!(capacity = self.vertex_capacity, "vertex buffer grown");
            }
        }
        if vertices.len() > self.vertex_capacity {
            tracing::warn!(
                submitted = vertices.len(),
                capacity = self.vertex_capacity,
                "vertex buffer at device limit, dropping excess rects"
            );
        }
        let whole_rects = self.vertex_capacity - self.vertex_capacity % VERTICES_PER_RECT;
        let vertices = &vertices[..vertices.len().min(whole_rects)];
        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(false);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(err) => {
                tracing::warn!(error = %err, "skipping frame");
                return Ok(false);
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Quad Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Quad Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: clear.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if !vertices.is_empty() {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass.draw(0..vertices.len() as u32, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(true)
    }
}

/// Vertex capacity for at least `needed` vertices: the next power of two,
/// but never more than fits in `max_buffer_size` bytes.
fn grown_capacity(needed: usize, max_buffer_size: u64) -> usize {
    let max_vertices = max_buffer_size / std::mem::size_of::<Vertex>() as u64;
    let max_vertices = usize::try_from(max_vertices).unwrap_or(usize::MAX);
    needed.next_power_of_two().min(max_vertices)
}

fn create_vertex_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Quad Vertex Buffer"),
        size: (std::mem::size_of::<Vertex>() * vertices) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_covers_its_extent() {
        let color = Color::rgb(1.0, 0.5, 0.0);
        let verts = rect_vertices(Vec2::new(0.5, -0.5), Vec2::splat(0.25), color);
        let xs: Vec<f32> = verts.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = verts.iter().map(|v| v.position[1]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), 0.25);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 0.75);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -0.75);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), -0.25);
        assert!(verts.iter().all(|v| v.color == color.to_array()));
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn buffer_growth_respects_device_limit() {
        assert_eq!(grown_capacity(7000, u64::MAX), 8192);
        assert_eq!(grown_capacity(6144, u64::MAX), 8192);
        // 24-byte vertices, so a 120_000-byte buffer holds 5000 of them.
        assert_eq!(grown_capacity(7000, 120_000), 5000);
        assert_eq!(grown_capacity(4000, 120_000), 4096);
    }
}
