//! Rendering backend probing
//!
//! wgpu picks the backend; this maps what it picked onto engine types for
//! logging and diagnostics.

use crate::{BackendType, DeviceCapabilities};

impl From<wgpu::Backend> for BackendType {
    fn from(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Metal => BackendType::Metal,
            wgpu::Backend::Dx12 => BackendType::DirectX12,
            wgpu::Backend::Vulkan => BackendType::Vulkan,
            wgpu::Backend::Gl => BackendType::OpenGL,
            wgpu::Backend::BrowserWebGpu => BackendType::WebGpu,
            wgpu::Backend::Empty => BackendType::Empty,
        }
    }
}

/// Describe the adapter a renderer was created on.
pub fn probe_capabilities(adapter: &wgpu::Adapter) -> DeviceCapabilities {
    let info = adapter.get_info();
    let limits = adapter.limits();
    DeviceCapabilities {
        backend: info.backend.into(),
        adapter_name: info.name,
        max_texture_size: limits.max_texture_dimension_2d,
        max_buffer_size: limits.max_buffer_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_wgpu_backends() {
        assert_eq!(BackendType::from(wgpu::Backend::Vulkan), BackendType::Vulkan);
        assert_eq!(BackendType::from(wgpu::Backend::Gl), BackendType::OpenGL);
        assert_eq!(BackendType::from(wgpu::Backend::Empty), BackendType::Empty);
    }
}
