use crate::{
    cloud_params::CloudRenderParameters,
    container::ContainerBounds,
    debug_view::{CloudDebugViewMode, DebugViewState},
    wgpu_utils::wgpu_buffer_types::{BoolAsInteger, Vec2, Vec3Unpadded, Vec4, WgslEnum},
};

/// Whether time is advancing for the clouds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimeMode {
    /// The application is running, clouds move.
    Simulating,
    /// The scene is being edited, cloud motion is frozen.
    #[default]
    Authoring,
}

/// Uniform block of the cloud raymarching shader.
///
/// Mirrors `CloudUniforms` in `clouds/raymarch_clouds.wgsl` row by row.
/// Rewritten in full every frame.
#[repr(C, align(16))]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CloudUniformBuffer {
    pub bounds_min: Vec3Unpadded,
    pub num_steps_light: u32,
    // -- row boundary --
    pub bounds_max: Vec3Unpadded,
    pub ray_offset_strength: f32,
    // -- row boundary --
    /// Voxel grid resolution of the container as floats, w is unused.
    pub map_size: Vec4,
    // -- row boundary --
    pub shape_noise_weights: Vec4,
    // -- row boundary --
    /// (forward scattering, back scattering, base brightness, phase factor)
    pub phase_params: Vec4,
    // -- row boundary --
    pub shape_offset: Vec3Unpadded,
    pub cloud_scale: f32,
    // -- row boundary --
    pub detail_offset: Vec3Unpadded,
    pub detail_noise_scale: f32,
    // -- row boundary --
    pub detail_weights: Vec3Unpadded,
    pub detail_noise_weight: f32,
    // -- row boundary --
    pub test_params: Vec3Unpadded,
    pub density_multiplier: f32,
    // -- row boundary --
    pub height_offset: Vec2,
    pub density_offset: f32,
    pub darkness_threshold: f32,
    // -- row boundary --
    pub light_absorption_through_cloud: f32,
    pub light_absorption_toward_sun: f32,
    pub time_scale: f32,
    pub base_speed: f32,
    // -- row boundary --
    pub detail_speed: f32,
    /// Seconds since the pass was created.
    pub time: f32,
    pub debug_noise_slice_depth: f32,
    pub debug_tile_amount: f32,
    // -- row boundary --
    pub debug_channel_weight: Vec4,
    // -- row boundary --
    pub debug_view_mode: WgslEnum<CloudDebugViewMode>,
    pub debug_viewer_size: f32,
    pub debug_greyscale: BoolAsInteger,
    pub debug_show_all_channels: BoolAsInteger,
    // -- row boundary --
    pub color_a: Vec4,
    // -- row boundary --
    pub color_b: Vec4,
}

impl CloudUniformBuffer {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Maps every parameter of the frame to its uniform slot.
    pub fn bind(
        params: &CloudRenderParameters,
        bounds: &ContainerBounds,
        debug: &DebugViewState,
        time_mode: TimeMode,
        time: f32,
    ) -> Self {
        let CloudRenderParameters {
            march,
            base_shape,
            detail,
            lighting,
            animation,
            sky,
        } = params;

        let time_scale = match time_mode {
            TimeMode::Simulating => animation.time_scale,
            TimeMode::Authoring => 0.0,
        };

        Self {
            bounds_min: bounds.min().into(),
            num_steps_light: march.num_steps_light.get().max(1),
            bounds_max: bounds.max().into(),
            ray_offset_strength: march.ray_offset_strength,
            map_size: bounds.grid_size.as_vec3().extend(0.0).into(),
            shape_noise_weights: base_shape.shape_noise_weights.into(),
            phase_params: lighting.phase_params().into(),
            shape_offset: base_shape.shape_offset.into(),
            cloud_scale: base_shape.cloud_scale,
            detail_offset: detail.detail_offset.into(),
            detail_noise_scale: detail.detail_noise_scale,
            detail_weights: detail.detail_noise_weights.into(),
            detail_noise_weight: detail.detail_noise_weight,
            test_params: march.test_params.into(),
            density_multiplier: base_shape.density_multiplier,
            height_offset: base_shape.height_offset.into(),
            density_offset: base_shape.density_offset,
            darkness_threshold: lighting.darkness_threshold.get(),
            light_absorption_through_cloud: lighting.light_absorption_through_cloud,
            light_absorption_toward_sun: lighting.light_absorption_toward_sun,
            time_scale,
            base_speed: animation.base_speed,
            detail_speed: animation.detail_speed,
            time,
            debug_noise_slice_depth: debug.slice_depth,
            debug_tile_amount: debug.tile_amount,
            debug_channel_weight: debug.channel_mask.into(),
            debug_view_mode: WgslEnum::new(debug.mode),
            debug_viewer_size: debug.viewer_size,
            debug_greyscale: debug.greyscale.into(),
            debug_show_all_channels: debug.show_all_channels.into(),
            color_a: glam::Vec4::from_array(sky.color_a).into(),
            color_b: glam::Vec4::from_array(sky.color_b).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cloud_params::{StepCount, UnitInterval},
        container::ContainerTransform,
        noise::{CloudNoiseType, NoiseViewerState},
    };

    fn bind(params: &CloudRenderParameters, time_mode: TimeMode) -> CloudUniformBuffer {
        let bounds = ContainerBounds::resolve(&ContainerTransform {
            position: glam::Vec3::ZERO,
            scale: glam::vec3(5.4, 3.0, 2.0),
        });
        let debug = DebugViewState::select(&NoiseViewerState::default(), None);
        CloudUniformBuffer::bind(params, &bounds, &debug, time_mode, 12.5)
    }

    #[test]
    fn layout_matches_wgsl() {
        assert_eq!(CloudUniformBuffer::SIZE, 256);
        assert_eq!(std::mem::offset_of!(CloudUniformBuffer, map_size), 32);
        assert_eq!(std::mem::offset_of!(CloudUniformBuffer, phase_params), 64);
        assert_eq!(std::mem::offset_of!(CloudUniformBuffer, height_offset), 144);
        assert_eq!(std::mem::offset_of!(CloudUniformBuffer, debug_channel_weight), 192);
        assert_eq!(std::mem::offset_of!(CloudUniformBuffer, debug_view_mode), 208);
        assert_eq!(std::mem::offset_of!(CloudUniformBuffer, color_b), 240);
    }

    #[test]
    fn step_count_binds_at_least_one() {
        let mut params = CloudRenderParameters::default();
        params.march.num_steps_light = StepCount::new(-3);

        assert_eq!(bind(&params, TimeMode::Simulating).num_steps_light, 1);
    }

    #[test]
    fn ranged_coefficients_bind_clamped() {
        let mut params = CloudRenderParameters::default();
        params.lighting.darkness_threshold = UnitInterval::new(-2.0);
        params.lighting.forward_scattering = UnitInterval::new(1.7);
        params.lighting.back_scattering = UnitInterval::new(-0.1);
        params.lighting.base_brightness = UnitInterval::new(3.0);
        params.lighting.phase_factor = UnitInterval::new(0.5);

        let uniforms = bind(&params, TimeMode::Simulating);
        assert_eq!(uniforms.darkness_threshold, 0.0);
        assert_eq!(
            glam::Vec4::from(uniforms.phase_params),
            glam::vec4(1.0, 0.0, 1.0, 0.5)
        );
    }

    #[test]
    fn time_scale_freezes_while_authoring() {
        let mut params = CloudRenderParameters::default();
        params.animation.time_scale = 3.5;

        assert_eq!(bind(&params, TimeMode::Authoring).time_scale, 0.0);
        assert_eq!(bind(&params, TimeMode::Simulating).time_scale, 3.5);

        // Speeds themselves are untouched.
        assert_eq!(bind(&params, TimeMode::Authoring).base_speed, 1.0);
    }

    #[test]
    fn bounds_and_map_size() {
        let uniforms = bind(&CloudRenderParameters::default(), TimeMode::Authoring);

        assert_eq!(
            glam::Vec3::from(uniforms.bounds_min),
            glam::vec3(-2.7, -1.5, -1.0)
        );
        assert_eq!(
            glam::Vec3::from(uniforms.bounds_max),
            glam::vec3(2.7, 1.5, 1.0)
        );
        assert_eq!(
            glam::Vec4::from(uniforms.map_size),
            glam::vec4(6.0, 3.0, 2.0, 0.0)
        );
    }

    #[test]
    fn unbounded_multipliers_pass_through() {
        let mut params = CloudRenderParameters::default();
        params.base_shape.density_multiplier = -4.0;
        params.lighting.light_absorption_through_cloud = 1000.0;

        let uniforms = bind(&params, TimeMode::Simulating);
        assert_eq!(uniforms.density_multiplier, -4.0);
        assert_eq!(uniforms.light_absorption_through_cloud, 1000.0);
    }

    #[test]
    fn debug_state_binds_as_integers() {
        let bounds = ContainerBounds::resolve(&ContainerTransform::default());
        let debug = DebugViewState::select(
            &NoiseViewerState {
                viewer_enabled: true,
                active_texture_type: CloudNoiseType::Detail,
                greyscale: true,
                show_all_channels: false,
                ..Default::default()
            },
            None,
        );

        let uniforms = CloudUniformBuffer::bind(
            &CloudRenderParameters::default(),
            &bounds,
            &debug,
            TimeMode::Simulating,
            0.0,
        );
        assert_eq!(uniforms.debug_view_mode.as_u32(), 2);
        assert_eq!(uniforms.debug_greyscale.as_u32(), 1);
        assert_eq!(uniforms.debug_show_all_channels.as_u32(), 0);
    }
}
