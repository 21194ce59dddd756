//! Cadence Render System
//!
//! Windowed [`Surface`](cadence_core::surface::Surface) implementation:
//! winit window and input, a wgpu quad renderer, and audio forwarding.

pub mod backend;
pub mod error;
pub mod renderer;
pub mod surface;
pub mod window;

pub use error::RenderError;
pub use renderer::QuadRenderer;
pub use surface::WindowSurface;
pub use wgpu;
pub use window::WindowConfig;
pub use winit;

/// Rendering backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Metal (macOS, iOS)
    Metal,
    /// DirectX 12 (Windows)
    DirectX12,
    /// Vulkan (cross-platform)
    Vulkan,
    /// OpenGL / GLES (cross-platform, fallback)
    OpenGL,
    /// WebGPU (web)
    WebGpu,
    /// No GPU backend (tests, headless)
    Empty,
}

/// Capability probe result
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    pub backend: BackendType,
    pub adapter_name: String,
    pub max_texture_size: u32,
    pub max_buffer_size: u64,
}
