//! Device command surface.
//!
//! The batch layer talks to the GPU exclusively through [`Backend`]. The
//! surface is deliberately close to a classic bind-then-draw device: buffers
//! and vertex arrays are bound, attribute pointers read from the bound vertex
//! buffer, and `draw` consumes whatever is currently bound.
//!
//! Implementations:
//! - [`HeadlessBackend`](super::HeadlessBackend): records commands in memory (tests, tools)
//! - [`WgpuBackend`](super::WgpuBackend): translates commands to wgpu pipelines and passes

use super::DeviceError;
use crate::paint::Color;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Device buffer handle.
    BufferId
);
handle!(
    /// Vertex array (attribute binding set) handle.
    VertexArrayId
);
handle!(
    /// Texture handle. Stable for the lifetime of the texture.
    TextureId
);
handle!(
    /// Compiled shader program handle.
    ProgramId
);
handle!(
    /// Offscreen render target handle.
    FramebufferId
);

/// Buffer category: what the buffer is bound as.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    /// Source of vertex attributes.
    Vertex,
    /// Source of draw indices (`u32`).
    Index,
}

/// How often the contents of a buffer are replaced.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UsageFrequency {
    Static,
    Dynamic,
    Stream,
}

/// Who reads the contents of a buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UsageAccess {
    Draw,
    Copy,
    Read,
}

/// Usage hint forwarded to the device with every full upload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferUsage {
    pub frequency: UsageFrequency,
    pub access: UsageAccess,
}

impl BufferUsage {
    pub const STATIC_DRAW: Self = Self::new(UsageFrequency::Static, UsageAccess::Draw);
    pub const STATIC_COPY: Self = Self::new(UsageFrequency::Static, UsageAccess::Copy);
    pub const STATIC_READ: Self = Self::new(UsageFrequency::Static, UsageAccess::Read);
    pub const DYNAMIC_DRAW: Self = Self::new(UsageFrequency::Dynamic, UsageAccess::Draw);
    pub const DYNAMIC_COPY: Self = Self::new(UsageFrequency::Dynamic, UsageAccess::Copy);
    pub const DYNAMIC_READ: Self = Self::new(UsageFrequency::Dynamic, UsageAccess::Read);
    pub const STREAM_DRAW: Self = Self::new(UsageFrequency::Stream, UsageAccess::Draw);
    pub const STREAM_COPY: Self = Self::new(UsageFrequency::Stream, UsageAccess::Copy);
    pub const STREAM_READ: Self = Self::new(UsageFrequency::Stream, UsageAccess::Read);

    #[inline]
    pub const fn new(frequency: UsageFrequency, access: UsageAccess) -> Self {
        Self { frequency, access }
    }
}

/// Scalar type of one attribute component.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ElementType {
    Float,
    Int,
    Uint,
}

impl ElementType {
    /// Size of one component in bytes.
    #[inline]
    pub const fn size(self) -> u32 {
        4
    }
}

/// One attribute registration: where a shader input reads from inside a vertex.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AttribPointer {
    pub location: u32,
    /// 1..=4 components.
    pub components: u32,
    pub element: ElementType,
    /// Bytes between consecutive vertices.
    pub stride: u32,
    /// Byte offset of this attribute inside a vertex.
    pub offset: u32,
}

/// Primitive assembly for a draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    Triangles,
    Lines,
}

/// A single draw call over the currently bound state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawCommand {
    /// Non-indexed draw of `count` vertices starting at `first`.
    Arrays { topology: Topology, first: u32, count: u32 },
    /// Indexed draw of `count` `u32` indices from the vertex array's index buffer.
    Elements { topology: Topology, first_index: u32, count: u32 },
}

impl DrawCommand {
    #[inline]
    pub fn topology(&self) -> Topology {
        match *self {
            DrawCommand::Arrays { topology, .. } | DrawCommand::Elements { topology, .. } => {
                topology
            }
        }
    }

    #[inline]
    pub fn count(&self) -> u32 {
        match *self {
            DrawCommand::Arrays { count, .. } | DrawCommand::Elements { count, .. } => count,
        }
    }
}

/// Uniform payloads accepted by [`Backend::set_uniform`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    /// Column-major 4×4 matrix.
    Mat4(&'a [f32; 16]),
    IntArray(&'a [i32]),
}

/// Depth comparison used while depth testing is enabled.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DepthFunc {
    Less,
    LessEqual,
    Always,
}

/// Fixed-function state applied to subsequent draws.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PipelineState {
    /// `None` disables depth testing and depth writes.
    pub depth_test: Option<DepthFunc>,
    /// Straight-alpha "source over" blending.
    pub blending: bool,
    pub line_width: f32,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            depth_test: None,
            blending: true,
            line_width: 1.0,
        }
    }
}

/// GPU device abstraction used by buffers, vertex arrays, shaders and batches.
///
/// Errors from resource calls are returned directly. Errors produced while
/// executing a draw are held as a pending error and reported by
/// [`take_error`](Backend::take_error), which callers poll after every draw.
pub trait Backend {
    /// Number of texture units a single draw may sample from.
    fn max_texture_units(&self) -> u32;

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId, DeviceError>;
    fn delete_buffer(&mut self, id: BufferId);
    /// Makes `id` current for `kind`. Binding an index buffer while a vertex
    /// array is bound attaches it to that vertex array.
    fn bind_buffer(&mut self, kind: BufferKind, id: Option<BufferId>);
    /// Replaces the entire contents of `id`, sized to `data`.
    fn buffer_data(&mut self, id: BufferId, data: &[u8], usage: BufferUsage)
        -> Result<(), DeviceError>;
    /// Overwrites `data.len()` bytes at `offset` without reallocating.
    fn buffer_sub_data(&mut self, id: BufferId, offset: u64, data: &[u8])
        -> Result<(), DeviceError>;

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DeviceError>;
    fn delete_vertex_array(&mut self, id: VertexArrayId);
    fn bind_vertex_array(&mut self, id: Option<VertexArrayId>);
    /// Registers an attribute on the bound vertex array, sourcing the bound vertex buffer.
    fn vertex_attrib_pointer(&mut self, pointer: AttribPointer) -> Result<(), DeviceError>;
    /// Toggles one attribute location on the bound vertex array.
    fn set_attribute_enabled(&mut self, location: u32, enabled: bool)
        -> Result<(), DeviceError>;

    /// Creates an RGBA8 texture from tightly packed rows.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8])
        -> Result<TextureId, DeviceError>;
    fn delete_texture(&mut self, id: TextureId);
    fn bind_texture(&mut self, unit: u32, id: TextureId);

    fn create_program(&mut self, source: &str) -> Result<ProgramId, DeviceError>;
    fn delete_program(&mut self, id: ProgramId);
    fn use_program(&mut self, id: Option<ProgramId>);
    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue<'_>,
    ) -> Result<(), DeviceError>;

    /// Creates an offscreen target: a sampleable color texture of
    /// `width` × `height` plus a depth attachment.
    fn create_framebuffer(&mut self, width: u32, height: u32)
        -> Result<(FramebufferId, TextureId), DeviceError>;
    /// Deletes the framebuffer together with its color texture.
    fn delete_framebuffer(&mut self, id: FramebufferId);
    /// Redirects clears and draws to `id`; `None` restores the default target.
    fn bind_framebuffer(&mut self, id: Option<FramebufferId>);
    /// Clears color and depth of the current target. Depth clears to 1.0.
    fn clear(&mut self, color: Color) -> Result<(), DeviceError>;

    fn set_pipeline_state(&mut self, state: PipelineState);
    fn draw(&mut self, cmd: DrawCommand);

    /// Returns and clears the pending device error, if any.
    fn take_error(&mut self) -> Option<DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_constants_cover_all_combinations() {
        let all = [
            BufferUsage::STATIC_DRAW,
            BufferUsage::STATIC_COPY,
            BufferUsage::STATIC_READ,
            BufferUsage::DYNAMIC_DRAW,
            BufferUsage::DYNAMIC_COPY,
            BufferUsage::DYNAMIC_READ,
            BufferUsage::STREAM_DRAW,
            BufferUsage::STREAM_COPY,
            BufferUsage::STREAM_READ,
        ];
        let unique: std::collections::HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), 9);
    }

    #[test]
    fn draw_command_accessors() {
        let cmd = DrawCommand::Elements { topology: Topology::Triangles, first_index: 0, count: 12 };
        assert_eq!(cmd.topology(), Topology::Triangles);
        assert_eq!(cmd.count(), 12);
    }
}
