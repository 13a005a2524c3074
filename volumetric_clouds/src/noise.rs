//! Noise volumes consumed by the cloud pass.
//!
//! Generating the noise is not the cloud pass's business, it merely reads textures and viewer
//! settings from whatever [`NoiseProvider`] the host hands in.

use std::path::Path;

use anyhow::Context as _;
use wgpu::util::DeviceExt as _;

/// Which noise volume the noise viewer shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CloudNoiseType {
    /// Low frequency noise defining the overall cloud shape.
    #[default]
    Shape,
    /// High frequency noise eroding the edges of the base shape.
    Detail,
}

/// Settings of the noise viewer, a debug overlay showing a slice of a noise volume.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NoiseViewerState {
    pub viewer_enabled: bool,
    pub active_texture_type: CloudNoiseType,

    /// Depth of the displayed slice in `[0, 1]`.
    pub slice_depth: f32,
    /// How often the slice is repeated across the viewer.
    pub tile_amount: f32,
    /// Size of the viewer relative to the screen.
    pub viewer_size: f32,
    /// Weight of each of the RGBA channels in the displayed result.
    pub channel_mask: glam::Vec4,
    pub greyscale: bool,
    pub show_all_channels: bool,
}

impl Default for NoiseViewerState {
    fn default() -> Self {
        Self {
            viewer_enabled: false,
            active_texture_type: CloudNoiseType::Shape,
            slice_depth: 0.0,
            tile_amount: 1.0,
            viewer_size: 1.0,
            channel_mask: glam::vec4(1.0, 0.0, 0.0, 0.0),
            greyscale: true,
            show_all_channels: false,
        }
    }
}

/// Views on the noise volumes, valid for the current frame.
#[derive(Clone, Copy)]
pub struct NoiseTextures<'a> {
    pub shape: &'a wgpu::TextureView,
    pub detail: &'a wgpu::TextureView,
}

/// Source of the cloud noise volumes.
pub trait NoiseProvider {
    /// Gives the provider a chance to regenerate its noise before it is read for this frame.
    fn update_noise(&mut self) {}

    /// `None` if no noise has been generated yet.
    fn noise_textures(&self) -> Option<NoiseTextures<'_>>;

    fn viewer_state(&self) -> NoiseViewerState;
}

/// Viewer settings of a weather map provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WeatherViewerState {
    pub viewer_enabled: bool,
}

/// Source of a 2D weather map steering cloud coverage.
///
/// Not consumed by the cloud pass yet, only its viewer state takes part in debug view selection.
pub trait WeatherMapProvider {
    fn viewer_state(&self) -> WeatherViewerState;
}

/// [`NoiseProvider`] serving two fixed 3D textures.
pub struct VolumeNoiseProvider {
    shape: wgpu::TextureView,
    detail: wgpu::TextureView,

    pub viewer: NoiseViewerState,
}

impl VolumeNoiseProvider {
    pub fn new(shape: wgpu::TextureView, detail: wgpu::TextureView) -> Self {
        Self {
            shape,
            detail,
            viewer: NoiseViewerState::default(),
        }
    }

    /// Loads shape & detail noise from uncompressed dds volume textures.
    pub fn load_from_dds(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shape_path: impl AsRef<Path>,
        detail_path: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let shape = load_noise_volume(device, queue, shape_path.as_ref(), "Shape noise")?;
        let detail = load_noise_volume(device, queue, detail_path.as_ref(), "Detail noise")?;
        Ok(Self::new(shape, detail))
    }

    /// Creates a 3D noise texture from tightly packed texels, slice after slice.
    pub fn create_volume(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        size: glam::UVec3,
        format: wgpu::TextureFormat,
        data: &[u8],
    ) -> anyhow::Result<wgpu::TextureView> {
        let texel_size = format
            .block_copy_size(None)
            .with_context(|| format!("Unsupported noise volume format {format:?}"))?;
        let expected_len = size.x as usize * size.y as usize * size.z as usize * texel_size as usize;
        anyhow::ensure!(
            data.len() >= expected_len,
            "Noise volume {label:?} has {} bytes, expected {expected_len}",
            data.len()
        );

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size.x,
                    height: size.y,
                    depth_or_array_layers: size.z,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor, // Doesn't matter, no mipmaps!
            &data[..expected_len],
        );

        Ok(texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        }))
    }
}

impl NoiseProvider for VolumeNoiseProvider {
    fn noise_textures(&self) -> Option<NoiseTextures<'_>> {
        Some(NoiseTextures {
            shape: &self.shape,
            detail: &self.detail,
        })
    }

    fn viewer_state(&self) -> NoiseViewerState {
        self.viewer
    }
}

fn load_noise_volume(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
    label: &str,
) -> anyhow::Result<wgpu::TextureView> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open noise volume {path:?}"))?;
    let dds = ddsfile::Dds::read(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to read noise volume {path:?}"))?;

    let format = noise_volume_format(dds.get_dxgi_format())
        .with_context(|| format!("Noise volume {path:?}"))?;
    let size = glam::uvec3(dds.get_width(), dds.get_height(), dds.get_depth());
    let data = dds.get_data(0)?;

    log::info!(
        "Loaded noise volume {path:?} ({}x{}x{}, {format:?})",
        size.x,
        size.y,
        size.z
    );

    VolumeNoiseProvider::create_volume(device, queue, label, size, format, data)
}

fn noise_volume_format(format: Option<ddsfile::DxgiFormat>) -> anyhow::Result<wgpu::TextureFormat> {
    match format {
        Some(ddsfile::DxgiFormat::R8G8B8A8_UNorm) => Ok(wgpu::TextureFormat::Rgba8Unorm),
        Some(ddsfile::DxgiFormat::R8_UNorm) => Ok(wgpu::TextureFormat::R8Unorm),
        Some(ddsfile::DxgiFormat::R16G16B16A16_Float) => Ok(wgpu::TextureFormat::Rgba16Float),
        Some(other) => anyhow::bail!("Unsupported dxgi format {other:?}"),
        None => anyhow::bail!("Expected a dds file with dxgi header"),
    }
}
