mod binding_builder;
pub mod wgpu_buffer_types;

pub use binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc};
