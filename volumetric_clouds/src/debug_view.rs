use crate::noise::{CloudNoiseType, NoiseViewerState, WeatherViewerState};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    bytemuck::Zeroable,
    bytemuck::CheckedBitPattern,
    bytemuck::Contiguous,
)]
#[repr(u32)]
pub enum CloudDebugViewMode {
    #[default]
    None = 0,
    ShapeNoise = 1,
    DetailNoise = 2,
    WeatherMap = 3,
}

impl std::fmt::Display for CloudDebugViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudDebugViewMode::None => write!(f, "None"),
            CloudDebugViewMode::ShapeNoise => write!(f, "Shape noise"),
            CloudDebugViewMode::DetailNoise => write!(f, "Detail noise"),
            CloudDebugViewMode::WeatherMap => write!(f, "Weather map"),
        }
    }
}

impl From<CloudDebugViewMode> for u32 {
    fn from(value: CloudDebugViewMode) -> Self {
        value as u32
    }
}

/// Debug overlay state, translated from the providers' viewer settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugViewState {
    pub mode: CloudDebugViewMode,

    pub slice_depth: f32,
    pub tile_amount: f32,
    pub viewer_size: f32,
    pub channel_mask: glam::Vec4,
    pub greyscale: bool,
    pub show_all_channels: bool,
}

impl DebugViewState {
    /// Picks the debug view from noise and weather viewer state.
    ///
    /// The noise viewer wins over the weather viewer if both are enabled.
    pub fn select(noise: &NoiseViewerState, weather: Option<&WeatherViewerState>) -> Self {
        let mode = if noise.viewer_enabled {
            match noise.active_texture_type {
                CloudNoiseType::Shape => CloudDebugViewMode::ShapeNoise,
                CloudNoiseType::Detail => CloudDebugViewMode::DetailNoise,
            }
        } else if weather.is_some_and(|weather| weather.viewer_enabled) {
            CloudDebugViewMode::WeatherMap
        } else {
            CloudDebugViewMode::None
        };

        Self {
            mode,
            slice_depth: noise.slice_depth,
            tile_amount: noise.tile_amount,
            viewer_size: noise.viewer_size,
            channel_mask: noise.channel_mask,
            greyscale: noise.greyscale,
            show_all_channels: noise.show_all_channels,
        }
    }
}
