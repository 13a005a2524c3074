//! Artist facing cloud parameters.
//!
//! Values that the shader expects in `[0, 1]` and step counts are clamped when they are assigned
//! (including when read from a config file), never when they are consumed.
//! Multipliers like the density multiplier or the absorption coefficients are unbounded.

/// A float clamped to `[0, 1]` on construction.
///
/// NaN is mapped to zero.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct UnitInterval(f32);

impl UnitInterval {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    #[inline]
    pub fn get(self) -> f32 {
        self.0
    }

    pub fn set(&mut self, value: f32) {
        *self = Self::new(value);
    }
}

impl From<f32> for UnitInterval {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<UnitInterval> for f32 {
    fn from(value: UnitInterval) -> Self {
        value.0
    }
}

/// Number of raymarching steps, at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(from = "i32", into = "u32")]
pub struct StepCount(u32);

impl StepCount {
    pub const MIN: Self = Self(1);

    /// Clamps to at least one step, negative and zero counts become a single step.
    pub fn new(steps: i32) -> Self {
        Self(steps.max(1) as u32)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn set(&mut self, steps: i32) {
        *self = Self::new(steps);
    }
}

impl From<i32> for StepCount {
    fn from(steps: i32) -> Self {
        Self::new(steps)
    }
}

impl From<StepCount> for u32 {
    fn from(steps: StepCount) -> Self {
        steps.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MarchSettings {
    /// Steps towards the sun for every sample on the view ray.
    pub num_steps_light: StepCount,

    /// Scales the blue noise jitter applied to ray start positions.
    pub ray_offset_strength: f32,

    /// Free-form values forwarded to the shader for experiments.
    pub test_params: glam::Vec3,
}

impl Default for MarchSettings {
    fn default() -> Self {
        Self {
            num_steps_light: StepCount::new(8),
            ray_offset_strength: 0.0,
            test_params: glam::Vec3::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BaseShape {
    pub cloud_scale: f32,
    pub density_multiplier: f32,
    pub density_offset: f32,
    pub shape_offset: glam::Vec3,
    pub height_offset: glam::Vec2,

    /// Weight per octave of the shape noise.
    pub shape_noise_weights: glam::Vec4,
}

impl Default for BaseShape {
    fn default() -> Self {
        Self {
            cloud_scale: 1.0,
            density_multiplier: 1.0,
            density_offset: 0.0,
            shape_offset: glam::Vec3::ZERO,
            height_offset: glam::Vec2::ZERO,
            shape_noise_weights: glam::vec4(1.0, 0.5, 0.15, 0.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetailShape {
    pub detail_noise_scale: f32,
    pub detail_noise_weight: f32,
    pub detail_noise_weights: glam::Vec3,
    pub detail_offset: glam::Vec3,
}

impl Default for DetailShape {
    fn default() -> Self {
        Self {
            detail_noise_scale: 10.0,
            detail_noise_weight: 0.1,
            detail_noise_weights: glam::Vec3::ZERO,
            detail_offset: glam::Vec3::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Lighting {
    pub light_absorption_through_cloud: f32,
    pub light_absorption_toward_sun: f32,
    pub darkness_threshold: UnitInterval,

    // Phase function.
    pub forward_scattering: UnitInterval,
    pub back_scattering: UnitInterval,
    pub base_brightness: UnitInterval,
    pub phase_factor: UnitInterval,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            light_absorption_through_cloud: 1.0,
            light_absorption_toward_sun: 1.0,
            darkness_threshold: UnitInterval::new(0.2),
            forward_scattering: UnitInterval::new(0.83),
            back_scattering: UnitInterval::new(0.3),
            base_brightness: UnitInterval::new(0.8),
            phase_factor: UnitInterval::new(0.15),
        }
    }
}

impl Lighting {
    /// Phase function parameters in the order the shader unpacks them:
    /// (forward scattering, back scattering, base brightness, phase factor).
    ///
    /// Changing this order silently breaks the scattering model in the shader.
    pub fn phase_params(&self) -> glam::Vec4 {
        glam::vec4(
            self.forward_scattering.get(),
            self.back_scattering.get(),
            self.base_brightness.get(),
            self.phase_factor.get(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Animation {
    /// Global speed of cloud motion. Only applies while simulating.
    pub time_scale: f32,
    pub base_speed: f32,
    pub detail_speed: f32,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            base_speed: 1.0,
            detail_speed: 2.0,
        }
    }
}

/// The two colors the cloud shader blends between for the sky behind the clouds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SkyColors {
    /// Linear RGBA.
    pub color_a: [f32; 4],
    /// Linear RGBA.
    pub color_b: [f32; 4],
}

impl Default for SkyColors {
    fn default() -> Self {
        Self {
            color_a: [0.0; 4],
            color_b: [0.0; 4],
        }
    }
}

/// All parameters of the cloud pass that are not derived from the scene.
///
/// Uploaded every frame in full, there is no change tracking.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CloudRenderParameters {
    pub march: MarchSettings,
    pub base_shape: BaseShape,
    pub detail: DetailShape,
    pub lighting: Lighting,
    pub animation: Animation,
    pub sky: SkyColors,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_count_never_drops_below_one() {
        for steps in [-3, -1, 0] {
            assert_eq!(StepCount::new(steps).get(), 1);
        }
        assert_eq!(StepCount::new(1).get(), 1);
        assert_eq!(StepCount::new(12).get(), 12);
        assert_eq!(StepCount::new(i32::MIN).get(), 1);

        let mut steps = StepCount::new(8);
        steps.set(-3);
        assert_eq!(steps, StepCount::MIN);
    }

    #[test]
    fn unit_interval_clamps_on_assignment() {
        assert_eq!(UnitInterval::new(-0.5).get(), 0.0);
        assert_eq!(UnitInterval::new(1.5).get(), 1.0);
        assert_eq!(UnitInterval::new(0.25).get(), 0.25);
        assert_eq!(UnitInterval::new(f32::NAN).get(), 0.0);
        assert_eq!(UnitInterval::new(f32::INFINITY).get(), 1.0);

        let mut value = UnitInterval::ZERO;
        value.set(7.0);
        assert_eq!(value, UnitInterval::ONE);
    }

    #[test]
    fn defaults() {
        let params = CloudRenderParameters::default();
        assert_eq!(params.march.num_steps_light.get(), 8);
        assert_eq!(
            params.base_shape.shape_noise_weights,
            glam::vec4(1.0, 0.5, 0.15, 0.0)
        );
        assert_eq!(params.detail.detail_noise_scale, 10.0);
        assert_eq!(params.lighting.darkness_threshold.get(), 0.2);
        assert_eq!(params.animation.detail_speed, 2.0);
    }

    #[test]
    fn phase_params_order() {
        let lighting = Lighting {
            forward_scattering: UnitInterval::new(0.1),
            back_scattering: UnitInterval::new(0.2),
            base_brightness: UnitInterval::new(0.3),
            phase_factor: UnitInterval::new(0.4),
            ..Default::default()
        };
        assert_eq!(lighting.phase_params(), glam::vec4(0.1, 0.2, 0.3, 0.4));
    }

    #[test]
    fn deserialization_clamps_ranged_values() {
        let params: CloudRenderParameters = ron::de::from_str(
            "(
                march: (num_steps_light: -3),
                lighting: (
                    darkness_threshold: 4.0,
                    forward_scattering: -1.0,
                    light_absorption_toward_sun: 25.0,
                ),
            )",
        )
        .unwrap();

        assert_eq!(params.march.num_steps_light.get(), 1);
        assert_eq!(params.lighting.darkness_threshold.get(), 1.0);
        assert_eq!(params.lighting.forward_scattering.get(), 0.0);
        // Unbounded, kept as is.
        assert_eq!(params.lighting.light_absorption_toward_sun, 25.0);
        // Missing fields fall back to defaults.
        assert_eq!(params.lighting.back_scattering.get(), 0.3);
        assert_eq!(params.base_shape, BaseShape::default());
    }
}
