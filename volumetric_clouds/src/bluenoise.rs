use std::path::Path;

use anyhow::Context as _;
use wgpu::util::DeviceExt as _;

/// Blue noise used to jitter ray start offsets, hiding banding from the limited step count.
pub struct BluenoiseTexture {
    pub texture_view_2d: wgpu::TextureView,
}

impl BluenoiseTexture {
    /// Loads an 8 bit PNG and keeps only its first channel.
    pub fn load_from_png(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open blue noise texture {path:?}"))?;
        let (size, data_singlechannel) = decode_first_channel(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to decode blue noise texture {path:?}"))?;

        let texture_2d = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Bluenoise Texture 2D"),
                size: wgpu::Extent3d {
                    width: size.x,
                    height: size.y,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::R8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data_singlechannel,
        );

        let texture_view_2d = texture_2d.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Bluenoise Texture 2D"),
            ..Default::default()
        });

        log::info!("Loaded blue noise texture {path:?} ({}x{})", size.x, size.y);

        Ok(Self { texture_view_2d })
    }
}

fn decode_first_channel(
    reader: impl std::io::BufRead + std::io::Seek,
) -> anyhow::Result<(glam::UVec2, Vec<u8>)> {
    let decoder = png::Decoder::new(reader);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![
        0;
        reader
            .output_buffer_size()
            .context("Can't retrieve output buffer size")?
    ];
    let info = reader.next_frame(&mut buf)?;
    anyhow::ensure!(
        info.bit_depth == png::BitDepth::Eight,
        "Expected 8 bit channels, got {:?}",
        info.bit_depth
    );
    let data = &buf[..info.buffer_size()];

    // Convert data to single channel
    let num_channels = info.color_type.samples();
    let num_pixels = info.width as usize * info.height as usize;
    anyhow::ensure!(
        data.len() == num_pixels * num_channels,
        "Unexpected PNG frame size"
    );
    let data_singlechannel = data.iter().step_by(num_channels).copied().collect();

    Ok((glam::uvec2(info.width, info.height), data_singlechannel))
}

#[cfg(test)]
mod tests {
    use super::decode_first_channel;

    fn encode_png(width: u32, height: u32, color_type: png::ColorType, data: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, width, height);
            encoder.set_color(color_type);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        bytes
    }

    #[test]
    fn keeps_only_first_channel_of_rgba() {
        let rgba = [10, 1, 2, 3, 20, 4, 5, 6, 30, 7, 8, 9, 40, 10, 11, 12];
        let bytes = encode_png(2, 2, png::ColorType::Rgba, &rgba);

        let (size, data) = decode_first_channel(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(size, glam::uvec2(2, 2));
        assert_eq!(data, vec![10, 20, 30, 40]);
    }

    #[test]
    fn grayscale_passes_through() {
        let bytes = encode_png(3, 1, png::ColorType::Grayscale, &[7, 8, 9]);

        let (size, data) = decode_first_channel(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(size, glam::uvec2(3, 1));
        assert_eq!(data, vec![7, 8, 9]);
    }
}
