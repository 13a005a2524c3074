//! egui inspectors for the cloud pass.
//!
//! All widgets write through the clamping setters, so the inspector can't produce values the
//! shader doesn't expect. Widget ranges only limit edits, drawing never changes a value.

mod ui_elements;

use crate::{
    cloud_params::{
        Animation, BaseShape, CloudRenderParameters, DetailShape, Lighting, MarchSettings,
        SkyColors,
    },
    config::CloudPassConfig,
    container::ContainerTransform,
    noise::{CloudNoiseType, NoiseViewerState},
};

use ui_elements::{
    color_edit, drag_value_f32, drag_value_vec2, drag_value_vec3, drag_value_vec4,
    row_with_default, step_count_drag, unit_interval_slider,
};

/// Everything of a [`CloudPassConfig`] except for paths, which are only read on startup.
pub fn cloud_pass_config_ui(ui: &mut egui::Ui, config: &mut CloudPassConfig) {
    ui.horizontal(|ui| {
        ui.checkbox(&mut config.enabled, "Enabled");
        if ui.button("Reset all to defaults").clicked() {
            config.container = ContainerTransform::default();
            config.params = CloudRenderParameters::default();
        }
    });

    egui::CollapsingHeader::new("Container")
        .default_open(false)
        .show(ui, |ui| container_ui(ui, &mut config.container));

    cloud_settings_ui(ui, &mut config.params);
}

pub fn container_ui(ui: &mut egui::Ui, container: &mut ContainerTransform) {
    let default = ContainerTransform::default();

    egui::Grid::new("cloud_container").show(ui, |ui| {
        row_with_default(
            ui,
            "Position",
            &mut container.position,
            default.position,
            drag_value_vec3,
        );
        row_with_default(ui, "Scale", &mut container.scale, default.scale, drag_value_vec3);
    });
}

/// Inspector for all cloud parameters, grouped into collapsible sections.
pub fn cloud_settings_ui(ui: &mut egui::Ui, params: &mut CloudRenderParameters) {
    let CloudRenderParameters {
        march,
        base_shape,
        detail,
        lighting,
        animation,
        sky,
    } = params;

    egui::CollapsingHeader::new("March settings")
        .default_open(true)
        .show(ui, |ui| march_settings(ui, march));
    egui::CollapsingHeader::new("Base shape")
        .default_open(true)
        .show(ui, |ui| base_shape_settings(ui, base_shape));
    egui::CollapsingHeader::new("Detail")
        .default_open(false)
        .show(ui, |ui| detail_settings(ui, detail));
    egui::CollapsingHeader::new("Lighting")
        .default_open(true)
        .show(ui, |ui| lighting_settings(ui, lighting));
    egui::CollapsingHeader::new("Animation")
        .default_open(false)
        .show(ui, |ui| animation_settings(ui, animation));
    egui::CollapsingHeader::new("Sky")
        .default_open(false)
        .show(ui, |ui| sky_settings(ui, sky));
}

fn march_settings(ui: &mut egui::Ui, march: &mut MarchSettings) {
    let MarchSettings {
        num_steps_light,
        ray_offset_strength,
        test_params,
    } = march;
    let default = MarchSettings::default();

    egui::Grid::new("cloud_march").show(ui, |ui| {
        row_with_default(
            ui,
            "Light steps",
            num_steps_light,
            default.num_steps_light,
            step_count_drag,
        );
        row_with_default(
            ui,
            "Ray offset strength",
            ray_offset_strength,
            default.ray_offset_strength,
            drag_value_f32,
        );
        row_with_default(
            ui,
            "Test params",
            test_params,
            default.test_params,
            drag_value_vec3,
        );
    });
}

fn base_shape_settings(ui: &mut egui::Ui, base_shape: &mut BaseShape) {
    let BaseShape {
        cloud_scale,
        density_multiplier,
        density_offset,
        shape_offset,
        height_offset,
        shape_noise_weights,
    } = base_shape;
    let default = BaseShape::default();

    egui::Grid::new("cloud_base_shape").show(ui, |ui| {
        row_with_default(ui, "Scale", cloud_scale, default.cloud_scale, drag_value_f32);
        row_with_default(
            ui,
            "Density multiplier",
            density_multiplier,
            default.density_multiplier,
            drag_value_f32,
        );
        row_with_default(
            ui,
            "Density offset",
            density_offset,
            default.density_offset,
            drag_value_f32,
        );
        row_with_default(
            ui,
            "Shape offset",
            shape_offset,
            default.shape_offset,
            drag_value_vec3,
        );
        row_with_default(
            ui,
            "Height offset",
            height_offset,
            default.height_offset,
            drag_value_vec2,
        );
        row_with_default(
            ui,
            "Noise weights",
            shape_noise_weights,
            default.shape_noise_weights,
            drag_value_vec4,
        );
    });
}

fn detail_settings(ui: &mut egui::Ui, detail: &mut DetailShape) {
    let DetailShape {
        detail_noise_scale,
        detail_noise_weight,
        detail_noise_weights,
        detail_offset,
    } = detail;
    let default = DetailShape::default();

    egui::Grid::new("cloud_detail").show(ui, |ui| {
        row_with_default(
            ui,
            "Scale",
            detail_noise_scale,
            default.detail_noise_scale,
            drag_value_f32,
        );
        row_with_default(
            ui,
            "Weight",
            detail_noise_weight,
            default.detail_noise_weight,
            drag_value_f32,
        );
        row_with_default(
            ui,
            "Noise weights",
            detail_noise_weights,
            default.detail_noise_weights,
            drag_value_vec3,
        );
        row_with_default(ui, "Offset", detail_offset, default.detail_offset, drag_value_vec3);
    });
}

fn lighting_settings(ui: &mut egui::Ui, lighting: &mut Lighting) {
    let Lighting {
        light_absorption_through_cloud,
        light_absorption_toward_sun,
        darkness_threshold,
        forward_scattering,
        back_scattering,
        base_brightness,
        phase_factor,
    } = lighting;
    let default = Lighting::default();

    egui::Grid::new("cloud_lighting").show(ui, |ui| {
        row_with_default(
            ui,
            "Absorption through cloud",
            light_absorption_through_cloud,
            default.light_absorption_through_cloud,
            drag_value_f32,
        );
        row_with_default(
            ui,
            "Absorption toward sun",
            light_absorption_toward_sun,
            default.light_absorption_toward_sun,
            drag_value_f32,
        );
        row_with_default(
            ui,
            "Darkness threshold",
            darkness_threshold,
            default.darkness_threshold,
            unit_interval_slider,
        );

        ui.separator();
        ui.end_row();

        row_with_default(
            ui,
            "Forward scattering",
            forward_scattering,
            default.forward_scattering,
            unit_interval_slider,
        );
        row_with_default(
            ui,
            "Back scattering",
            back_scattering,
            default.back_scattering,
            unit_interval_slider,
        );
        row_with_default(
            ui,
            "Base brightness",
            base_brightness,
            default.base_brightness,
            unit_interval_slider,
        );
        row_with_default(
            ui,
            "Phase factor",
            phase_factor,
            default.phase_factor,
            unit_interval_slider,
        );
    });
}

fn animation_settings(ui: &mut egui::Ui, animation: &mut Animation) {
    let Animation {
        time_scale,
        base_speed,
        detail_speed,
    } = animation;
    let default = Animation::default();

    egui::Grid::new("cloud_animation").show(ui, |ui| {
        row_with_default(ui, "Time scale", time_scale, default.time_scale, drag_value_f32);
        row_with_default(ui, "Base speed", base_speed, default.base_speed, drag_value_f32);
        row_with_default(
            ui,
            "Detail speed",
            detail_speed,
            default.detail_speed,
            drag_value_f32,
        );
    });
}

fn sky_settings(ui: &mut egui::Ui, sky: &mut SkyColors) {
    let SkyColors { color_a, color_b } = sky;
    let default = SkyColors::default();

    egui::Grid::new("cloud_sky").show(ui, |ui| {
        row_with_default(ui, "Color A", color_a, default.color_a, color_edit);
        row_with_default(ui, "Color B", color_b, default.color_b, color_edit);
    });
}

/// Settings of the noise debug viewer.
pub fn noise_viewer_ui(ui: &mut egui::Ui, viewer: &mut NoiseViewerState) {
    let NoiseViewerState {
        viewer_enabled,
        active_texture_type,
        slice_depth,
        tile_amount,
        viewer_size,
        channel_mask,
        greyscale,
        show_all_channels,
    } = viewer;

    ui.checkbox(viewer_enabled, "Show noise viewer");
    ui.add_enabled_ui(*viewer_enabled, |ui| {
        ui.horizontal(|ui| {
            ui.selectable_value(active_texture_type, CloudNoiseType::Shape, "Shape");
            ui.selectable_value(active_texture_type, CloudNoiseType::Detail, "Detail");
        });

        egui::Grid::new("noise_viewer").show(ui, |ui| {
            ui.label("Slice depth");
            ui.add(
                egui::Slider::new(slice_depth, 0.0..=1.0).clamping(egui::SliderClamping::Edits),
            );
            ui.end_row();

            ui.label("Tile amount");
            ui.add(
                egui::DragValue::new(tile_amount)
                    .speed(0.1)
                    .range(0.0..=100.0)
                    .clamp_existing_to_range(false),
            );
            ui.end_row();

            ui.label("Viewer size");
            ui.add(
                egui::Slider::new(viewer_size, 0.0..=1.0).clamping(egui::SliderClamping::Edits),
            );
            ui.end_row();

            ui.label("Channel weights");
            drag_value_vec4(ui, channel_mask);
            ui.end_row();
        });

        ui.checkbox(greyscale, "Greyscale");
        ui.checkbox(show_all_channels, "Show all channels");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_params::{StepCount, UnitInterval};

    fn run_ui(mut add_contents: impl FnMut(&mut egui::Ui)) {
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| add_contents(ui));
        });
    }

    #[test]
    fn inspector_leaves_parameters_untouched_without_input() {
        let mut params = CloudRenderParameters::default();
        params.march.num_steps_light = StepCount::new(3);
        params.lighting.back_scattering = UnitInterval::new(0.9);
        params.base_shape.density_multiplier = -2.0;
        let before = params;

        run_ui(|ui| cloud_settings_ui(ui, &mut params));
        assert_eq!(params, before);
    }

    #[test]
    fn inspector_keeps_values_outside_of_widget_ranges() {
        let mut params = CloudRenderParameters::default();
        params.march.num_steps_light = StepCount::new(500);
        let mut viewer = NoiseViewerState {
            viewer_enabled: true,
            slice_depth: 1.5,
            tile_amount: 250.0,
            viewer_size: -0.5,
            ..Default::default()
        };
        let viewer_before = viewer;

        run_ui(|ui| {
            cloud_settings_ui(ui, &mut params);
            noise_viewer_ui(ui, &mut viewer);
        });
        assert_eq!(params.march.num_steps_light.get(), 500);
        assert_eq!(viewer, viewer_before);
    }

    #[test]
    fn config_inspector_keeps_paths() {
        let mut config = CloudPassConfig {
            blue_noise_path: "elsewhere/noise.png".into(),
            ..Default::default()
        };
        let mut viewer = NoiseViewerState::default();

        run_ui(|ui| {
            cloud_pass_config_ui(ui, &mut config);
            noise_viewer_ui(ui, &mut viewer);
        });
        assert_eq!(config.blue_noise_path, std::path::Path::new("elsewhere/noise.png"));
        assert_eq!(viewer, NoiseViewerState::default());
    }
}
