use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! { pub struct ShaderHandle; }

struct ShaderSourceEntry {
    file_path: PathBuf,
    source: String,

    /// All shaders that depend on this shader source directly.
    direct_dependents: HashSet<ShaderHandle>,
}

/// Loads wgsl files from the shader directory and composes them via `naga_oil`.
///
/// `#import "some/file.wgsl"` pulls in other files relative to the shader directory,
/// which are tracked as dependencies so that editing an import invalidates all its users.
pub struct ShaderCache {
    shaders_dir: PathBuf,
    composer: naga_oil::compose::Composer,

    shader_sources: SlotMap<ShaderHandle, ShaderSourceEntry>,
    shader_modules: SecondaryMap<ShaderHandle, wgpu::ShaderModule>,

    // Once preprocessor setting is supported, a single path buf would map to several shaders?
    shader_sources_per_path: HashMap<PathBuf, ShaderHandle>,
}

#[derive(thiserror::Error, Debug)]
pub enum ShaderCacheError {
    #[error("Failed to load shader for path {path:?}: {err}")]
    FailedToLoadShaderSource { path: PathBuf, err: std::io::Error },

    #[error("Shader path {path:?} is not valid UTF-8")]
    NonUtf8Path { path: PathBuf },

    #[error("Shader path {path:?} is outside of the shader directory {shaders_dir:?}")]
    OutsideShaderDirectory { path: PathBuf, shaders_dir: PathBuf },

    #[error("Named modules are not supported, used by {path:?}")]
    NamedModuleNotSupported { path: PathBuf },

    #[error("Failed NagaOil composing step for {path:?}: {err_formatted}")]
    NagaOilComposeError {
        path: PathBuf,
        err_formatted: String,
    },
}

impl ShaderCache {
    pub fn new(shaders_dir: impl Into<PathBuf>) -> Self {
        Self {
            shaders_dir: shaders_dir.into(),
            composer: naga_oil::compose::Composer::default()
                // TODO: set composer caps from the adapter's downlevel capabilities.
                .with_capabilities(wgpu::naga::valid::Capabilities::all()),

            shader_sources: Default::default(),
            shader_modules: Default::default(),

            shader_sources_per_path: Default::default(),
        }
    }

    pub fn shaders_dir(&self) -> &Path {
        &self.shaders_dir
    }

    /// Erases all memory of a given shader path.
    ///
    /// This recursively removes all shaders depending on this path as well.
    /// Path may be absolute or relative to the shader directory.
    /// Returns a list of all shaders that were removed.
    pub fn remove_shader_for_path(&mut self, path: &Path) -> Vec<ShaderHandle> {
        let Ok(path) = self.resolve_path(path) else {
            log::error!("Failed to resolve shader path {path:?}");
            return vec![];
        };
        let Some(handle) = self.shader_sources_per_path.remove(&path) else {
            log::debug!("Shader for path {path:?} not found");
            return vec![];
        };

        let mut removed_shaders = vec![handle];

        if let Some(shader_source) = self.shader_sources.remove(handle) {
            for child in shader_source.direct_dependents {
                if let Some(child_shader) = self.shader_sources.get(child) {
                    removed_shaders
                        .extend(self.remove_shader_for_path(&child_shader.file_path.clone()));
                }
            }
        }

        match self.composer_path(&path) {
            Ok(composer_path) => self.composer.remove_composable_module(&composer_path),
            Err(err) => log::error!("{err}"),
        }

        self.shader_modules.remove(handle);

        log::debug!("Removed shader for path {path:?}");

        removed_shaders
    }

    pub fn shader_module(&self, handle: ShaderHandle) -> Option<&wgpu::ShaderModule> {
        self.shader_modules.get(handle)
    }

    /// Get or load a shader module for the given path.
    ///
    /// If the shader module is already loaded, it will be returned.
    pub fn get_or_load_shader_module(
        &mut self,
        device: &wgpu::Device,
        path: &Path,
    ) -> Result<ShaderHandle, ShaderCacheError> {
        let path = self.resolve_path(path)?;
        let handle = if let Some(handle) = self.shader_sources_per_path.get(&path) {
            log::debug!("Shader for path {path:?} already loaded");
            *handle
        } else {
            log::debug!("Loading shader for path {path:?}");
            self.get_or_load_shader_source(&path)?
        };

        if self.shader_modules.contains_key(handle) {
            log::debug!("shader module for path {path:?} already loaded");
            return Ok(handle);
        }

        let source = &self.shader_sources[handle];
        let path_string = path_to_str(&path)?;

        let module = self
            .composer
            .make_naga_module(naga_oil::compose::NagaModuleDescriptor {
                source: &source.source,
                file_path: path_string,
                shader_type: naga_oil::compose::ShaderType::Wgsl,
                shader_defs: HashMap::default(),
                additional_imports: &[],
            })
            .map_err(|err| ShaderCacheError::NagaOilComposeError {
                path: path.to_path_buf(),
                err_formatted: err.emit_to_string(&self.composer),
            })?;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(path_string),
            source: wgpu::ShaderSource::Naga(std::borrow::Cow::Owned(module)),
        });

        self.shader_modules.insert(handle, module);

        Ok(handle)
    }

    /// Loads shader source into the composer and returns a handle if it wasn't already loaded.
    fn get_or_load_shader_source(&mut self, path: &Path) -> Result<ShaderHandle, ShaderCacheError> {
        let path = self.resolve_path(path)?;
        if let Some(handle) = self.shader_sources_per_path.get(&path) {
            debug_assert!(self.shader_sources.contains_key(*handle));
            return Ok(*handle);
        }

        let source = std::fs::read_to_string(&path).map_err(|err| {
            ShaderCacheError::FailedToLoadShaderSource {
                path: path.clone(),
                err,
            }
        })?;

        let (module_name, required_imports, shader_defs) =
            naga_oil::compose::get_preprocessor_data(&source);
        if module_name.is_some() {
            return Err(ShaderCacheError::NamedModuleNotSupported { path });
        }

        let parent_shaders = required_imports
            .iter()
            .map(|import| {
                let import_path = import.import.trim_matches('"');
                self.get_or_load_shader_source(Path::new(import_path))
            })
            .collect::<Result<Vec<_>, _>>()?;

        {
            let composer_path = self.composer_path(&path)?;
            if let Err(err) =
                self.composer
                    .add_composable_module(naga_oil::compose::ComposableModuleDescriptor {
                        source: &source,
                        file_path: &composer_path,
                        language: naga_oil::compose::ShaderLanguage::Wgsl,
                        as_name: Some(format!("{composer_path:?}")),
                        additional_imports: &[],
                        shader_defs,
                    })
            {
                // Make sure composer no longer knows this module - looks like depending on the error it may still :/
                self.composer.remove_composable_module(&composer_path);

                // Can't do map_err because otherwise borrow checker gets angry.
                return Err(ShaderCacheError::NagaOilComposeError {
                    path: composer_path.into(),
                    err_formatted: err.emit_to_string(&self.composer),
                });
            }
        }

        let handle = self.shader_sources.insert(ShaderSourceEntry {
            file_path: path.clone(),
            source,
            direct_dependents: HashSet::new(),
        });
        self.shader_sources_per_path.insert(path, handle);

        for parent_shader in parent_shaders {
            self.shader_sources[parent_shader]
                .direct_dependents
                .insert(handle);
        }

        Ok(handle)
    }

    fn resolve_path(&self, path: &Path) -> Result<PathBuf, ShaderCacheError> {
        self.shaders_dir.join(path).canonicalize().map_err(|err| {
            ShaderCacheError::FailedToLoadShaderSource {
                path: path.into(),
                err,
            }
        })
    }

    /// Path as known to the `naga_oil` composer: relative to the shader directory with forward slashes.
    fn composer_path(&self, path: &Path) -> Result<String, ShaderCacheError> {
        let base_path = self.shaders_dir.canonicalize().map_err(|err| {
            ShaderCacheError::FailedToLoadShaderSource {
                path: self.shaders_dir.clone(),
                err,
            }
        })?;
        let relative_path =
            path.strip_prefix(&base_path)
                .map_err(|_| ShaderCacheError::OutsideShaderDirectory {
                    path: path.to_path_buf(),
                    shaders_dir: base_path.clone(),
                })?;
        Ok(path_to_str(relative_path)?.replace('\\', "/"))
    }
}

fn path_to_str(path: &Path) -> Result<&str, ShaderCacheError> {
    path.to_str().ok_or_else(|| ShaderCacheError::NonUtf8Path {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{ShaderCache, ShaderCacheError};

    fn shaders_dir() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"))
    }

    #[test]
    fn composer_path_is_relative_with_forward_slashes() {
        let cache = ShaderCache::new(shaders_dir());
        let resolved = cache
            .resolve_path(Path::new("clouds/raymarch_clouds.wgsl"))
            .expect("shader file exists");

        assert_eq!(
            cache.composer_path(&resolved).unwrap(),
            "clouds/raymarch_clouds.wgsl"
        );
    }

    #[test]
    fn missing_shader_fails_to_resolve() {
        let cache = ShaderCache::new(shaders_dir());
        let err = cache
            .resolve_path(Path::new("clouds/does_not_exist.wgsl"))
            .unwrap_err();

        assert!(matches!(
            err,
            ShaderCacheError::FailedToLoadShaderSource { .. }
        ));
    }
}
