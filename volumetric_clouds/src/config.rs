use std::path::{Path, PathBuf};

use crate::{
    cloud_params::CloudRenderParameters, container::ContainerTransform,
    resource_managers::ShaderEntryPoint,
};

/// Everything about the cloud pass that is worth persisting, stored as a single ron file.
///
/// Missing fields fall back to their defaults, so older files keep loading.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CloudPassConfig {
    pub enabled: bool,

    /// Fragment shader doing the raymarch, relative to the shader directory.
    pub shader: ShaderEntryPoint,

    /// Blue noise texture used to jitter ray starts.
    pub blue_noise_path: PathBuf,

    pub container: ContainerTransform,
    pub params: CloudRenderParameters,
}

impl Default for CloudPassConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shader: ShaderEntryPoint::first_in("clouds/raymarch_clouds.wgsl"),
            blue_noise_path: PathBuf::from("assets/bluenoise.png"),
            container: ContainerTransform::default(),
            params: CloudRenderParameters::default(),
        }
    }
}

impl CloudPassConfig {
    pub fn to_ron_string(&self) -> anyhow::Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::new(),
        )?)
    }

    pub fn from_ron_str(contents: &str) -> anyhow::Result<Self> {
        Ok(ron::de::from_str(contents)?)
    }

    pub fn save_to_ron_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    pub fn save_to_ron_file_or_log_error(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if let Err(err) = self.save_to_ron_file(path) {
            log::error!("Failed to save cloud config to {path:?}: {err}");
        }
    }

    pub fn load_from_ron_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file_contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&file_contents)
    }

    /// Falls back to the default config and writes it to `path` if loading fails.
    pub fn load_from_ron_file_or_default_and_log_error(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load_from_ron_file(path).unwrap_or_else(|err| {
            log::warn!("Failed to load cloud config from {path:?}: {err}");
            let default = Self::default();
            default.save_to_ron_file_or_log_error(path);
            default
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CloudPassConfig;
    use crate::cloud_params::{StepCount, UnitInterval};

    #[test]
    fn ron_round_trip() {
        let mut config = CloudPassConfig {
            enabled: false,
            ..Default::default()
        };
        config.container.position = glam::vec3(1.0, 250.0, -3.0);
        config.params.march.num_steps_light = StepCount::new(12);
        config.params.lighting.phase_factor = UnitInterval::new(0.6);

        let serialized = config.to_ron_string().unwrap();
        assert_eq!(CloudPassConfig::from_ron_str(&serialized).unwrap(), config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config = CloudPassConfig::from_ron_str("(enabled: false)").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.shader, CloudPassConfig::default().shader);
        assert_eq!(config.params, CloudPassConfig::default().params);
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() {
        let config = CloudPassConfig::from_ron_str(
            "(params: (march: (num_steps_light: 0), lighting: (base_brightness: 2.5)))",
        )
        .unwrap();
        assert_eq!(config.params.march.num_steps_light, StepCount::MIN);
        assert_eq!(config.params.lighting.base_brightness, UnitInterval::ONE);
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = std::env::temp_dir().join(format!(
            "volumetric_clouds_config_test_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clouds.ron");
        let _ = std::fs::remove_file(&path);

        let config = CloudPassConfig::load_from_ron_file_or_default_and_log_error(&path);
        assert_eq!(config, CloudPassConfig::default());

        // The default was written back.
        assert_eq!(CloudPassConfig::load_from_ron_file(&path).unwrap(), config);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
