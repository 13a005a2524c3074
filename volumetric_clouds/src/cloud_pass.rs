//! The volumetric cloud pass.
//!
//! Once per frame, gathers noise, container & parameters, writes them to the cloud uniforms and
//! raymarches the clouds with a single full-screen triangle on top of whatever the host already
//! rendered into its color target.

use crate::{
    EncoderScope,
    cloud_params::CloudRenderParameters,
    cloud_uniforms::{CloudUniformBuffer, TimeMode},
    config::CloudPassConfig,
    container::{ContainerBounds, ContainerTransform},
    debug_view::DebugViewState,
    noise::{NoiseProvider, NoiseTextures},
    primary_depth_buffer::PrimaryDepthBuffer,
    resource_managers::{
        GlobalBindings, PipelineError, PipelineManager, RenderPipelineDescriptor,
        RenderPipelineHandle, ShaderEntryPoint,
    },
    wgpu_utils::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc},
};

#[derive(thiserror::Error, Debug)]
pub enum CloudPassError {
    #[error("No noise provider was passed to the cloud pass, can't render clouds")]
    MissingNoiseProvider,

    #[error("Cloud shader {shader} is unavailable, skipping clouds until it changes: {err}")]
    ShaderUnavailable {
        shader: ShaderEntryPoint,
        #[source]
        err: PipelineError,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramState {
    /// Nothing built yet, or the last build failed.
    Uninitialized,
    /// Built from the currently configured shader.
    Ready,
    /// Built, but the configured shader changed since.
    Stale,
}

struct BuiltProgram<P> {
    shader: ShaderEntryPoint,
    program: P,
}

/// A shading program that is built lazily from a shader identity and rebuilt whenever the
/// identity changes.
///
/// A failed build is not attempted again until the identity changes, [`ProgramSlot::retry`]
/// is called or the program is taken. Each failed attempt is handed out exactly once.
pub struct ProgramSlot<P> {
    shader: ShaderEntryPoint,
    built: Option<BuiltProgram<P>>,
    build_failed: bool,
}

impl<P> ProgramSlot<P> {
    pub fn new(shader: ShaderEntryPoint) -> Self {
        Self {
            shader,
            built: None,
            build_failed: false,
        }
    }

    pub fn shader(&self) -> &ShaderEntryPoint {
        &self.shader
    }

    pub fn state(&self) -> ProgramState {
        match &self.built {
            None => ProgramState::Uninitialized,
            Some(built) if built.shader == self.shader => ProgramState::Ready,
            Some(_) => ProgramState::Stale,
        }
    }

    /// Takes effect on the next [`ProgramSlot::ensure_ready`].
    pub fn set_shader(&mut self, shader: ShaderEntryPoint) {
        if self.shader != shader {
            log::debug!("Cloud shader changed from {} to {shader}", self.shader);
            self.shader = shader;
            self.build_failed = false;
        }
    }

    /// Allows another build attempt after a failure, e.g. after shader sources changed on disk.
    pub fn retry(&mut self) {
        self.build_failed = false;
    }

    /// Returns the program, (re)building it if it is uninitialized or stale.
    ///
    /// A stale program is handed to `release` before the rebuild.
    /// Fails with `Some(err)` when a build attempt fails and with `None` while a failed build
    /// waits for a change.
    pub fn ensure_ready<C, E>(
        &mut self,
        context: &mut C,
        build: impl FnOnce(&mut C, &ShaderEntryPoint) -> Result<P, E>,
        release: impl FnOnce(&mut C, P),
    ) -> Result<&P, Option<E>> {
        if self.state() == ProgramState::Stale {
            if let Some(stale) = self.built.take() {
                release(context, stale.program);
            }
        }

        if self.built.is_none() {
            if self.build_failed {
                return Err(None);
            }
            match build(context, &self.shader) {
                Ok(program) => {
                    self.built = Some(BuiltProgram {
                        shader: self.shader.clone(),
                        program,
                    });
                }
                Err(err) => {
                    self.build_failed = true;
                    return Err(Some(err));
                }
            }
        }

        self.built
            .as_ref()
            .map(|built| &built.program)
            .ok_or(None)
    }

    /// Drops the program, returning to [`ProgramState::Uninitialized`].
    pub fn take(&mut self) -> Option<P> {
        self.build_failed = false;
        self.built.take().map(|built| built.program)
    }
}

/// Everything the pass reads from the host for a frame.
pub struct FrameInputs<'a> {
    pub params: &'a CloudRenderParameters,
    pub container: &'a ContainerTransform,
    /// Passed explicitly by the host, there is no lookup of a global provider.
    pub noise_provider: Option<&'a mut dyn NoiseProvider>,
    pub time_mode: TimeMode,
}

/// Data of a frame that is ready to be drawn.
pub struct CloudFrame<'a> {
    pub uniforms: CloudUniformBuffer,
    pub noise: NoiseTextures<'a>,
}

/// Collects the frame's uniforms and noise textures.
///
/// Returns `Ok(None)` if the provider hasn't generated any noise yet.
pub fn gather_frame<'a>(
    inputs: FrameInputs<'a>,
    time: f32,
) -> Result<Option<CloudFrame<'a>>, CloudPassError> {
    let FrameInputs {
        params,
        container,
        noise_provider,
        time_mode,
    } = inputs;

    let noise_provider = noise_provider.ok_or(CloudPassError::MissingNoiseProvider)?;
    noise_provider.update_noise();
    let noise_provider: &'a dyn NoiseProvider = noise_provider;

    let Some(noise) = noise_provider.noise_textures() else {
        log::debug!("No cloud noise available yet, skipping clouds");
        return Ok(None);
    };

    let bounds = ContainerBounds::resolve(container);
    // Weather maps are not wired up, so only the noise viewer can enable a debug view.
    let debug = DebugViewState::select(&noise_provider.viewer_state(), None);

    Ok(Some(CloudFrame {
        uniforms: CloudUniformBuffer::bind(params, &bounds, &debug, time_mode, time),
        noise,
    }))
}

/// Formats of the host targets the clouds are drawn into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloudPassTargetFormats {
    pub color: wgpu::TextureFormat,
    pub depth: wgpu::TextureFormat,
}

impl Default for CloudPassTargetFormats {
    fn default() -> Self {
        Self {
            color: wgpu::TextureFormat::Rgba16Float,
            depth: PrimaryDepthBuffer::FORMAT,
        }
    }
}

/// Host targets for this frame.
///
/// The depth view is both attached read-only and sampled, so it needs `TEXTURE_BINDING` usage.
#[derive(Clone, Copy)]
pub struct CloudPassTargets<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
}

struct CloudPassResources {
    uniform_buffer: wgpu::Buffer,
    bind_group_layout: BindGroupLayoutWithDesc,
    pipeline_layout: wgpu::PipelineLayout,
}

impl CloudPassResources {
    fn new(device: &wgpu::Device, global_bindings: &GlobalBindings) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cloud uniform buffer"),
            size: CloudUniformBuffer::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let noise_volume = wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D3,
            multisampled: false,
        };
        let bind_group_layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(CloudUniformBuffer::SIZE),
            })
            .next_binding_fragment(noise_volume) // Shape noise
            .next_binding_fragment(noise_volume) // Detail noise
            .next_binding_fragment(wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            })
            .create(device, "clouds/raymarch");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("clouds/raymarch"),
            bind_group_layouts: &[
                &global_bindings.bind_group_layout.layout,
                &bind_group_layout.layout,
            ],
            push_constant_ranges: &[],
        });

        Self {
            uniform_buffer,
            bind_group_layout,
            pipeline_layout,
        }
    }
}

/// Additive in-scattering, transmittance in alpha attenuates what's behind the clouds.
const CLOUD_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::SrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub struct CloudPass {
    enabled: bool,
    program: ProgramSlot<RenderPipelineHandle>,
    target_formats: CloudPassTargetFormats,

    /// Created on first draw, dropped on release.
    resources: Option<CloudPassResources>,

    /// Last seen [`PipelineManager::shader_generation`].
    shader_generation: u64,

    start_time: web_time::Instant,
}

impl CloudPass {
    /// Doesn't touch the GPU, all resources are created on the first draw.
    pub fn new(shader: ShaderEntryPoint, target_formats: CloudPassTargetFormats) -> Self {
        Self {
            enabled: true,
            program: ProgramSlot::new(shader),
            target_formats,
            resources: None,
            shader_generation: 0,
            start_time: web_time::Instant::now(),
        }
    }

    pub fn from_config(config: &CloudPassConfig, target_formats: CloudPassTargetFormats) -> Self {
        let mut pass = Self::new(config.shader.clone(), target_formats);
        pass.enabled = config.enabled;
        pass
    }

    pub fn program_state(&self) -> ProgramState {
        self.program.state()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling releases all GPU resources of the pass, re-enabling rebuilds them lazily.
    pub fn set_enabled(&mut self, enabled: bool, pipeline_manager: &mut PipelineManager) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            self.release(pipeline_manager);
        }
    }

    /// The pipeline is rebuilt on the next draw.
    pub fn set_shader(&mut self, shader: ShaderEntryPoint) {
        self.program.set_shader(shader);
    }

    /// Gives a failed shader another chance once shader files changed on disk.
    fn retry_after_shader_changes(&mut self, shader_generation: u64) {
        if self.shader_generation != shader_generation {
            self.shader_generation = shader_generation;
            self.program.retry();
        }
    }

    pub fn apply_config(&mut self, config: &CloudPassConfig, pipeline_manager: &mut PipelineManager) {
        self.set_enabled(config.enabled, pipeline_manager);
        self.set_shader(config.shader.clone());
    }

    /// Drops the pipeline and destroys the uniform buffer.
    pub fn release(&mut self, pipeline_manager: &mut PipelineManager) {
        if let Some(pipeline) = self.program.take() {
            pipeline_manager.remove_render_pipeline(pipeline);
        }
        if let Some(resources) = self.resources.take() {
            resources.uniform_buffer.destroy();
        }
    }

    /// Raymarches the clouds into `targets`.
    ///
    /// Loads the existing color, never clears, and only reads depth.
    /// Does nothing while disabled or while the shader is unavailable.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut EncoderScope<'_>,
        pipeline_manager: &mut PipelineManager,
        global_bindings: &GlobalBindings,
        targets: CloudPassTargets<'_>,
        inputs: FrameInputs<'_>,
    ) -> Result<(), CloudPassError> {
        if !self.enabled {
            return Ok(());
        }

        self.retry_after_shader_changes(pipeline_manager.shader_generation());

        let resources = self
            .resources
            .get_or_insert_with(|| CloudPassResources::new(device, global_bindings));
        let target_formats = &self.target_formats;

        let pipeline = match self.program.ensure_ready(
            pipeline_manager,
            |pipeline_manager, shader| {
                create_cloud_pipeline(
                    device,
                    pipeline_manager,
                    &resources.pipeline_layout,
                    target_formats,
                    shader,
                )
            },
            |pipeline_manager, stale| {
                pipeline_manager.remove_render_pipeline(stale);
            },
        ) {
            Ok(pipeline) => *pipeline,
            Err(Some(err)) => {
                return Err(CloudPassError::ShaderUnavailable {
                    shader: self.program.shader().clone(),
                    err,
                });
            }
            Err(None) => return Ok(()),
        };

        let Some(CloudFrame { uniforms, noise }) =
            gather_frame(inputs, self.start_time.elapsed().as_secs_f32())?
        else {
            return Ok(());
        };

        queue.write_buffer(&resources.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        // Noise providers may swap their textures at any time.
        let bind_group = BindGroupBuilder::new(&resources.bind_group_layout)
            .buffer(wgpu::BufferBinding {
                buffer: &resources.uniform_buffer,
                offset: 0,
                size: std::num::NonZeroU64::new(CloudUniformBuffer::SIZE),
            })
            .texture(noise.shape)
            .texture(noise.detail)
            .texture(targets.depth)
            .create(device, "clouds/raymarch");

        let pipeline = pipeline_manager.get_render_pipeline(pipeline)?;

        let mut render_pass = encoder.scoped_render_pass(
            "Clouds",
            wgpu::RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: targets.color,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: targets.depth,
                    depth_ops: None, // Read-only.
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            },
        );

        render_pass.set_bind_group(0, &global_bindings.bind_group, &[]);
        render_pass.set_bind_group(1, &bind_group, &[]);
        render_pass.set_pipeline(pipeline);
        render_pass.draw(0..3, 0..1);

        Ok(())
    }
}

fn create_cloud_pipeline(
    device: &wgpu::Device,
    pipeline_manager: &mut PipelineManager,
    layout: &wgpu::PipelineLayout,
    target_formats: &CloudPassTargetFormats,
    shader: &ShaderEntryPoint,
) -> Result<RenderPipelineHandle, PipelineError> {
    pipeline_manager.create_render_pipeline(
        device,
        RenderPipelineDescriptor {
            debug_label: format!("clouds/raymarch ({shader})"),
            layout: layout.clone(),
            vertex_shader: ShaderEntryPoint::named("screen_triangle.wgsl", "vs_main"),
            fragment_shader: Some(shader.clone()),
            fragment_targets: vec![wgpu::ColorTargetState {
                format: target_formats.color,
                blend: Some(CLOUD_BLEND),
                write_mask: wgpu::ColorWrites::ALL,
            }],
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(PrimaryDepthBuffer::read_only_state(target_formats.depth)),
            multisample: wgpu::MultisampleState::default(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseViewerState;

    fn shader_a() -> ShaderEntryPoint {
        ShaderEntryPoint::first_in("clouds/raymarch_clouds.wgsl")
    }

    fn shader_b() -> ShaderEntryPoint {
        ShaderEntryPoint::named("clouds/raymarch_clouds.wgsl", "fs_debug")
    }

    /// Records builds and releases.
    #[derive(Default)]
    struct Events(Vec<String>);

    fn build_ok(events: &mut Events, shader: &ShaderEntryPoint) -> Result<u32, &'static str> {
        events.0.push(format!("build {shader}"));
        Ok(events.0.len() as u32)
    }

    fn build_err(events: &mut Events, shader: &ShaderEntryPoint) -> Result<u32, &'static str> {
        events.0.push(format!("build {shader}"));
        Err("compile error")
    }

    fn release(events: &mut Events, program: u32) {
        events.0.push(format!("release {program}"));
    }

    #[test]
    fn program_is_built_lazily_once() {
        let mut events = Events::default();
        let mut slot = ProgramSlot::new(shader_a());
        assert_eq!(slot.state(), ProgramState::Uninitialized);
        assert!(events.0.is_empty());

        assert_eq!(slot.ensure_ready(&mut events, build_ok, release), Ok(&1));
        assert_eq!(slot.state(), ProgramState::Ready);

        // Already ready, no rebuild.
        assert_eq!(slot.ensure_ready(&mut events, build_ok, release), Ok(&1));
        assert_eq!(events.0, vec!["build clouds/raymarch_clouds.wgsl"]);
    }

    #[test]
    fn shader_change_makes_program_stale() {
        let mut events = Events::default();
        let mut slot = ProgramSlot::new(shader_a());
        slot.ensure_ready(&mut events, build_ok, release).unwrap();

        // Same identity is not a change.
        slot.set_shader(shader_a());
        assert_eq!(slot.state(), ProgramState::Ready);

        slot.set_shader(shader_b());
        assert_eq!(slot.state(), ProgramState::Stale);

        assert_eq!(slot.ensure_ready(&mut events, build_ok, release), Ok(&3));
        assert_eq!(slot.state(), ProgramState::Ready);
        assert_eq!(
            events.0,
            vec![
                "build clouds/raymarch_clouds.wgsl",
                "release 1",
                "build clouds/raymarch_clouds.wgsl:fs_debug",
            ]
        );
    }

    #[test]
    fn failed_build_waits_for_a_change() {
        let mut events = Events::default();
        let mut slot = ProgramSlot::new(shader_a());

        assert_eq!(
            slot.ensure_ready(&mut events, build_err, release),
            Err(Some("compile error"))
        );
        assert_eq!(slot.state(), ProgramState::Uninitialized);

        // Neither rebuilt nor reported again on the following frames.
        assert_eq!(slot.ensure_ready(&mut events, build_err, release), Err(None));
        assert_eq!(slot.ensure_ready(&mut events, build_err, release), Err(None));
        assert_eq!(events.0.len(), 1);

        // Setting the same shader again is not a change.
        slot.set_shader(shader_a());
        assert_eq!(slot.ensure_ready(&mut events, build_err, release), Err(None));
        assert_eq!(events.0.len(), 1);
    }

    #[test]
    fn switching_back_to_a_failed_shader_reports_again() {
        let mut events = Events::default();
        let mut slot = ProgramSlot::new(shader_a());

        assert_eq!(
            slot.ensure_ready(&mut events, build_err, release),
            Err(Some("compile error"))
        );

        slot.set_shader(shader_b());
        assert_eq!(slot.ensure_ready(&mut events, build_ok, release), Ok(&2));

        slot.set_shader(shader_a());
        assert_eq!(
            slot.ensure_ready(&mut events, build_err, release),
            Err(Some("compile error"))
        );
        assert_eq!(slot.ensure_ready(&mut events, build_err, release), Err(None));
        assert_eq!(
            events.0,
            vec![
                "build clouds/raymarch_clouds.wgsl",
                "build clouds/raymarch_clouds.wgsl:fs_debug",
                "release 2",
                "build clouds/raymarch_clouds.wgsl",
            ]
        );
    }

    #[test]
    fn retry_rebuilds_failed_program() {
        let mut events = Events::default();
        let mut slot = ProgramSlot::new(shader_a());

        assert!(matches!(
            slot.ensure_ready(&mut events, build_err, release),
            Err(Some(_))
        ));
        assert_eq!(slot.ensure_ready(&mut events, build_ok, release), Err(None));

        slot.retry();
        assert_eq!(slot.ensure_ready(&mut events, build_ok, release), Ok(&2));
        assert_eq!(slot.state(), ProgramState::Ready);

        // Taking the program allows a fresh attempt, too.
        slot.take();
        assert!(matches!(
            slot.ensure_ready(&mut events, build_err, release),
            Err(Some(_))
        ));
        slot.take();
        assert!(matches!(
            slot.ensure_ready(&mut events, build_err, release),
            Err(Some(_))
        ));
    }

    #[test]
    fn take_returns_to_uninitialized() {
        let mut events = Events::default();
        let mut slot = ProgramSlot::new(shader_a());
        slot.ensure_ready(&mut events, build_ok, release).unwrap();

        assert_eq!(slot.take(), Some(1));
        assert_eq!(slot.state(), ProgramState::Uninitialized);
        assert_eq!(slot.take(), None);
    }

    struct UngeneratedNoise {
        updates: usize,
    }

    impl NoiseProvider for UngeneratedNoise {
        fn update_noise(&mut self) {
            self.updates += 1;
        }

        fn noise_textures(&self) -> Option<NoiseTextures<'_>> {
            None
        }

        fn viewer_state(&self) -> NoiseViewerState {
            NoiseViewerState::default()
        }
    }

    #[test]
    fn missing_noise_provider_is_an_error() {
        let params = CloudRenderParameters::default();
        let container = ContainerTransform::default();

        let result = gather_frame(
            FrameInputs {
                params: &params,
                container: &container,
                noise_provider: None,
                time_mode: TimeMode::Simulating,
            },
            0.0,
        );
        assert!(matches!(result, Err(CloudPassError::MissingNoiseProvider)));
    }

    #[test]
    fn frame_is_skipped_until_noise_exists() {
        let params = CloudRenderParameters::default();
        let container = ContainerTransform::default();
        let mut noise = UngeneratedNoise { updates: 0 };

        let result = gather_frame(
            FrameInputs {
                params: &params,
                container: &container,
                noise_provider: Some(&mut noise),
                time_mode: TimeMode::Authoring,
            },
            1.0,
        );
        assert!(matches!(result, Ok(None)));
        assert_eq!(noise.updates, 1);
    }

    #[test]
    fn pass_without_gpu_resources() {
        let mut pipeline_manager = PipelineManager::new(
            concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"),
            false,
        )
        .unwrap();

        let mut pass = CloudPass::new(shader_a(), CloudPassTargetFormats::default());
        assert!(pass.is_enabled());
        assert_eq!(pass.program_state(), ProgramState::Uninitialized);

        pass.set_enabled(false, &mut pipeline_manager);
        assert!(!pass.is_enabled());
        assert_eq!(pass.program_state(), ProgramState::Uninitialized);

        // Releasing twice is fine.
        pass.release(&mut pipeline_manager);

        let config = CloudPassConfig {
            shader: shader_b(),
            ..Default::default()
        };
        pass.apply_config(&config, &mut pipeline_manager);
        assert!(pass.is_enabled());
        assert_eq!(pass.program_state(), ProgramState::Uninitialized);
    }

    #[test]
    fn shader_reload_rearms_failed_pipeline() {
        let mut builds = 0;
        let mut build_err = |builds: &mut i32, _: &ShaderEntryPoint| {
            *builds += 1;
            Err::<RenderPipelineHandle, _>("compile error")
        };
        let mut ensure_ready = |pass: &mut CloudPass, builds: &mut i32| {
            pass.program
                .ensure_ready(builds, &mut build_err, |_, _| {})
                .map(|_| ())
        };

        let mut pass = CloudPass::new(shader_a(), CloudPassTargetFormats::default());
        assert_eq!(ensure_ready(&mut pass, &mut builds), Err(Some("compile error")));

        // No shader file changed.
        pass.retry_after_shader_changes(0);
        assert_eq!(ensure_ready(&mut pass, &mut builds), Err(None));

        pass.retry_after_shader_changes(1);
        assert_eq!(ensure_ready(&mut pass, &mut builds), Err(Some("compile error")));
        pass.retry_after_shader_changes(1);
        assert_eq!(ensure_ready(&mut pass, &mut builds), Err(None));
        assert_eq!(builds, 2);
    }
}
