//! Device-facing graphics layer.
//!
//! Thin, explicitly-owned wrappers over a [`Backend`]:
//! - [`GpuBuffer`], [`VertexArray`], [`Texture`], [`Shader`] own one device handle each
//! - [`FrameBuffer`] is an offscreen target whose color attachment is a [`Texture`]
//! - [`Context`] tracks the bound vertex array, program and framebuffer
//! - [`VertexLayout`] is derived from shader source and drives attribute setup

mod backend;
mod buffer;
mod context;
mod error;
mod framebuffer;
mod headless;
mod texture;
mod vertex_array;

pub mod shader;
pub mod wgpu;

pub use backend::{
    AttribPointer, Backend, BufferId, BufferKind, BufferUsage, DepthFunc, DrawCommand,
    ElementType, FramebufferId, PipelineState, ProgramId, TextureId, Topology, UniformValue, UsageAccess,
    UsageFrequency, VertexArrayId,
};
pub use buffer::GpuBuffer;
pub use context::Context;
pub use error::DeviceError;
pub use framebuffer::FrameBuffer;
pub use headless::{BoundAttribute, DrawRecord, HeadlessBackend, HeadlessBuffer, HeadlessVertexArray, UniformData};
pub use shader::{LayoutError, Shader, ShaderError, VertexAttribute, VertexLayout};
pub use texture::{Texture, TextureRegion};
pub use vertex_array::VertexArray;
pub use self::wgpu::WgpuBackend;
