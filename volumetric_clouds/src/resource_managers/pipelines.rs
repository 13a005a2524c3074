use std::path::{Path, PathBuf};

use itertools::Itertools as _;

use super::shader_cache::{ShaderCache, ShaderCacheError, ShaderHandle};

slotmap::new_key_type! { pub struct RenderPipelineHandle; }

/// A shader file and the entry point to use from it.
///
/// Two entry points with the same path and function name refer to the same shader program,
/// which is what the cloud pass uses to detect that its configured shader changed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ShaderEntryPoint {
    /// Path relative to the shader directory.
    pub path: PathBuf,
    /// The actual shader entry point.
    ///
    /// `None` picks the first entry point of the respective stage in the file.
    pub function_name: Option<String>,
}

impl ShaderEntryPoint {
    pub fn first_in(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            function_name: None,
        }
    }

    pub fn named(path: impl Into<PathBuf>, function_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            function_name: Some(function_name.into()),
        }
    }
}

impl std::fmt::Display for ShaderEntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.function_name {
            Some(function_name) => write!(f, "{}:{function_name}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Render pipeline descriptor, mostly a copy of [`wgpu::RenderPipelineDescriptor`],
/// but without the lifetime dependencies & special handling for shaders.
///
/// Also, leaving out some fields that aren't needed & simplifying others.
/// (like vertex buffers. Srsly who needs vertex buffers in this time and day when you can just always do programmable pulling ;-))
pub struct RenderPipelineDescriptor {
    pub debug_label: String,
    pub layout: wgpu::PipelineLayout,
    pub vertex_shader: ShaderEntryPoint,
    pub fragment_shader: Option<ShaderEntryPoint>,
    pub fragment_targets: Vec<wgpu::ColorTargetState>,
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
}

struct RenderPipelineEntry {
    pipeline: wgpu::RenderPipeline,
    descriptor: RenderPipelineDescriptor,

    /// Shaders the pipeline was built from, used to find pipelines affected by a shader reload.
    shaders: Vec<ShaderHandle>,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    ShaderCache(#[from] ShaderCacheError),

    #[error(transparent)]
    FileWatcherError(#[from] notify::Error),

    #[error("Failed to create render pipeline {label:?}: {description}")]
    PipelineCreation { label: String, description: String },

    #[error("Render pipeline handle {0:?} is unknown, pipeline was removed or never created")]
    UnknownPipeline(RenderPipelineHandle),
}

/// Render pipeline manager with simple shader reload.
pub struct PipelineManager {
    shader_cache: ShaderCache,
    render_pipelines: slotmap::SlotMap<RenderPipelineHandle, RenderPipelineEntry>,
    shader_change_rx: std::sync::mpsc::Receiver<PathBuf>,

    /// Bumped whenever shader files changed on disk.
    shader_generation: u64,

    _filewatcher: Option<notify::RecommendedWatcher>,
}

impl PipelineManager {
    /// Creates a pipeline manager loading shaders from `shaders_dir`.
    ///
    /// With `watch_for_changes`, shader files are watched and pipelines using them
    /// are recreated on [`PipelineManager::reload_changed_pipelines`].
    pub fn new(shaders_dir: impl AsRef<Path>, watch_for_changes: bool) -> Result<Self, PipelineError> {
        let shaders_dir = shaders_dir.as_ref();
        let (shader_change_tx, shader_change_rx) = std::sync::mpsc::channel();

        let filewatcher = if watch_for_changes {
            let mut watcher =
                notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                    Ok(event) => match event.kind {
                        notify::EventKind::Any
                        | notify::EventKind::Modify(notify::event::ModifyKind::Any)
                        | notify::EventKind::Modify(notify::event::ModifyKind::Data(_)) => {
                            for path in event.paths {
                                if let Err(err) = shader_change_tx.send(path) {
                                    log::error!("Failed to send shader change event: {}", err);
                                }
                            }
                        }

                        notify::EventKind::Access(_)
                        | notify::EventKind::Create(_)
                        | notify::EventKind::Remove(_)
                        | notify::EventKind::Other
                        | notify::EventKind::Modify(_) => {
                            // Reloading doesn't make sense?
                        }
                    },
                    Err(err) => log::error!("Failed to watch shaders directory: {}", err),
                })?;

            notify::Watcher::watch(&mut watcher, shaders_dir, notify::RecursiveMode::Recursive)?;

            Some(watcher)
        } else {
            None
        };

        Ok(Self {
            shader_cache: ShaderCache::new(shaders_dir),
            render_pipelines: slotmap::SlotMap::default(),
            shader_change_rx,
            shader_generation: 0,
            _filewatcher: filewatcher,
        })
    }

    pub fn create_render_pipeline(
        &mut self,
        device: &wgpu::Device,
        descriptor: RenderPipelineDescriptor,
    ) -> Result<RenderPipelineHandle, PipelineError> {
        let (pipeline, shaders) =
            create_wgpu_render_pipeline(&mut self.shader_cache, &descriptor, device)?;
        log::info!("Created pipeline {:?}", descriptor.debug_label);

        let handle = self.render_pipelines.insert(RenderPipelineEntry {
            pipeline,
            descriptor,
            shaders,
        });

        Ok(handle)
    }

    pub fn get_render_pipeline(
        &self,
        handle: RenderPipelineHandle,
    ) -> Result<&wgpu::RenderPipeline, PipelineError> {
        self.render_pipelines
            .get(handle)
            .map(|entry| &entry.pipeline)
            .ok_or(PipelineError::UnknownPipeline(handle))
    }

    /// Drops a render pipeline.
    ///
    /// Returns false if the handle was already removed.
    pub fn remove_render_pipeline(&mut self, handle: RenderPipelineHandle) -> bool {
        match self.render_pipelines.remove(handle) {
            Some(entry) => {
                log::debug!("Removed pipeline {:?}", entry.descriptor.debug_label);
                true
            }
            None => false,
        }
    }

    /// Changes whenever [`PipelineManager::reload_changed_pipelines`] saw modified shader files.
    ///
    /// Owners of pipelines that failed to build can use this to know when to try again.
    pub fn shader_generation(&self) -> u64 {
        self.shader_generation
    }

    pub fn reload_changed_pipelines(&mut self, device: &wgpu::Device) {
        // Sometimes several change events come in at once, which is a bit annoying because of extra log.
        // Use `itertools::unique` to filter out duplicates.
        let changed_paths = self.shader_change_rx.try_iter().unique().collect::<Vec<_>>();
        if !changed_paths.is_empty() {
            // Also covers shaders that never compiled and thus aren't in the cache.
            self.shader_generation += 1;
        }

        for path in changed_paths {
            let removed_shaders = self.shader_cache.remove_shader_for_path(&path);
            if removed_shaders.is_empty() {
                continue;
            }
            log::info!("Reloading shader {:?}", path);

            // Try to recreate all pipelines that use this shader or any shader depending on it.
            for render_pipeline in self.render_pipelines.values_mut() {
                if !render_pipeline
                    .shaders
                    .iter()
                    .any(|shader| removed_shaders.contains(shader))
                {
                    continue;
                }

                match create_wgpu_render_pipeline(
                    &mut self.shader_cache,
                    &render_pipeline.descriptor,
                    device,
                ) {
                    Ok((wgpu_pipeline, shaders)) => {
                        log::info!(
                            "Recreated pipeline {:?}",
                            render_pipeline.descriptor.debug_label
                        );
                        render_pipeline.pipeline = wgpu_pipeline;
                        render_pipeline.shaders = shaders;
                    }
                    Err(err) => {
                        // Keep the outdated pipeline around, better than nothing.
                        log::error!(
                            "Failed to recreate pipeline {:?}: {}",
                            render_pipeline.descriptor.debug_label,
                            err
                        );
                    }
                }
            }
        }
    }
}

fn create_wgpu_render_pipeline(
    shader_cache: &mut ShaderCache,
    descriptor: &RenderPipelineDescriptor,
    device: &wgpu::Device,
) -> Result<(wgpu::RenderPipeline, Vec<ShaderHandle>), PipelineError> {
    let vertex_shader_handle =
        shader_cache.get_or_load_shader_module(device, &descriptor.vertex_shader.path)?;
    let fragment_shader_handle = descriptor
        .fragment_shader
        .as_ref()
        .map(|fragment_shader| shader_cache.get_or_load_shader_module(device, &fragment_shader.path))
        .transpose()?;

    let missing_module = |path: &Path| PipelineError::PipelineCreation {
        label: descriptor.debug_label.clone(),
        description: format!("shader module for {path:?} was not loaded"),
    };
    let vertex_shader_module = shader_cache
        .shader_module(vertex_shader_handle)
        .ok_or_else(|| missing_module(&descriptor.vertex_shader.path))?;
    let fragment = match (&descriptor.fragment_shader, fragment_shader_handle) {
        (Some(fragment_shader), Some(handle)) => Some((
            fragment_shader,
            shader_cache
                .shader_module(handle)
                .ok_or_else(|| missing_module(&fragment_shader.path))?,
        )),
        _ => None,
    };

    let targets = descriptor
        .fragment_targets
        .iter()
        .map(|target| Some(target.clone()))
        .collect::<Vec<_>>();
    let wgpu_desc = wgpu::RenderPipelineDescriptor {
        label: Some(&descriptor.debug_label),
        layout: Some(&descriptor.layout),
        vertex: wgpu::VertexState {
            module: vertex_shader_module,
            entry_point: descriptor.vertex_shader.function_name.as_deref(),
            compilation_options: shader_compilation_options(),
            buffers: &[],
        },
        fragment: fragment.map(|(entry_point, module)| wgpu::FragmentState {
            module,
            entry_point: entry_point.function_name.as_deref(),
            compilation_options: shader_compilation_options(),
            targets: &targets,
        }),
        primitive: descriptor.primitive,
        depth_stencil: descriptor.depth_stencil.clone(),
        multisample: descriptor.multisample,
        multiview: None,
        cache: None,
    };

    // Errors on pipeline creation are reported via error scopes.
    // On native these resolve immediately, so blocking here is fine.
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu_desc);
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(PipelineError::PipelineCreation {
            label: descriptor.debug_label.clone(),
            description: err.to_string(),
        });
    }

    let mut shaders = vec![vertex_shader_handle];
    shaders.extend(fragment_shader_handle);

    Ok((pipeline, shaders))
}

fn shader_compilation_options() -> wgpu::PipelineCompilationOptions<'static> {
    wgpu::PipelineCompilationOptions::default()
}

#[cfg(test)]
mod tests {
    use super::ShaderEntryPoint;

    #[test]
    fn shader_entry_point_identity() {
        let a = ShaderEntryPoint::first_in("clouds/raymarch_clouds.wgsl");
        let b = ShaderEntryPoint::first_in("clouds/raymarch_clouds.wgsl");
        let c = ShaderEntryPoint::named("clouds/raymarch_clouds.wgsl", "fs_main");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c.to_string(), "clouds/raymarch_clouds.wgsl:fs_main");
    }
}
