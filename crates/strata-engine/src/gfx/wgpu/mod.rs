//! wgpu implementation of the device command surface.

mod backend;
mod pipeline;

pub use backend::{FrameTarget, WgpuBackend};
pub use pipeline::{depth_texture, DEPTH_FORMAT, MAX_TEXTURE_UNITS};
