mod global_bindings;
mod pipelines;
mod shader_cache;

pub use global_bindings::{FrameUniformBuffer, GlobalBindings};
pub use pipelines::*;
pub use shader_cache::{ShaderCache, ShaderCacheError, ShaderHandle};
