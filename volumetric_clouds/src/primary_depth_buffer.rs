/// Depth buffer a host can render its scene into before the clouds.
///
/// Any depth target works for the cloud pass as long as it can also be sampled,
/// this one is set up accordingly.
pub struct PrimaryDepthBuffer {
    view: wgpu::TextureView,
}

impl PrimaryDepthBuffer {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Depth test & write for scene geometry.
    pub const STATE_WRITE: wgpu::DepthStencilState = wgpu::DepthStencilState {
        format: Self::FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::GreaterEqual, // Near plane is at 0, infinity is at 1.
        bias: wgpu::DepthBiasState {
            constant: 0,
            slope_scale: 0.0,
            clamp: 0.0,
        },
        stencil: wgpu::StencilState {
            front: wgpu::StencilFaceState::IGNORE,
            back: wgpu::StencilFaceState::IGNORE,
            read_mask: 0,
            write_mask: 0,
        },
    };

    /// Depth attached but neither tested nor written.
    ///
    /// Full-screen passes that sample depth themselves use this with a read-only depth attachment.
    pub const fn read_only_state(format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            ..Self::STATE_WRITE
        }
    }

    pub fn new(device: &wgpu::Device, resolution: glam::UVec2) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Primary depth buffer"),
            size: wgpu::Extent3d {
                width: resolution.x,
                height: resolution.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            // The cloud pass samples depth to stop rays at scene geometry.
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }

    pub fn on_resize(&mut self, device: &wgpu::Device, resolution: glam::UVec2) {
        *self = Self::new(device, resolution);
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}
