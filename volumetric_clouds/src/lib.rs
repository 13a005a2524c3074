//! Screen-space volumetric clouds for wgpu renderers.
//!
//! [`cloud_pass::CloudPass`] raymarches a box shaped cloud volume with a single full-screen
//! triangle, composited on top of the host's color target.

pub mod bluenoise;
pub mod cloud_params;
pub mod cloud_pass;
pub mod cloud_uniforms;
pub mod config;
pub mod container;
pub mod debug_view;
pub mod gui;
pub mod noise;
pub mod primary_depth_buffer;
pub mod resource_managers;
pub mod wgpu_error_handling;
pub mod wgpu_utils;

pub use cloud_params::CloudRenderParameters;
pub use cloud_pass::{CloudPass, CloudPassError, CloudPassTargetFormats, CloudPassTargets, FrameInputs};
pub use cloud_uniforms::TimeMode;
pub use config::CloudPassConfig;
pub use container::{ContainerBounds, ContainerTransform};
pub use noise::{NoiseProvider, VolumeNoiseProvider};

pub type EncoderScope<'a> = wgpu_profiler::Scope<'a, wgpu::CommandEncoder>;
