//! Immediate-mode batching.
//!
//! A batch records draw requests between `begin()` and `end()` and submits
//! them on flush:
//! - [`RenderBatch`]: quads, triangles and lines, one draw call per class
//! - [`MeshBatch`]: transformed mesh instances, one draw call in total
//!
//! Design constraints:
//! - every draw request advances a depth counter so later requests win ties
//! - texture slots are resolved per flush and bounded by the device
//! - errors are returned immediately; nothing is retried

mod error;
mod indices;
mod mesh;
mod mesh_batch;
mod render_batch;
mod slots;
mod vertex;

use glam::Mat4;

use crate::gfx::{Backend, Context, DrawCommand, GpuBuffer, VertexArray, VertexLayout};
use crate::math::OrthographicCamera;
use crate::paint::Color;

pub use error::BatchError;
pub use indices::quad_indices;
pub use mesh::{Mesh, MeshData};
pub use mesh_batch::MeshBatch;
pub use render_batch::RenderBatch;
pub use slots::TextureSlots;
pub use vertex::{Vertex, VertexPool};

/// Construction options shared by batches.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Upper bound on texture slots. Clamped to the device's texture units.
    pub max_textures: Option<u32>,

    /// Vertices pre-allocated in the pool.
    pub initial_vertices: usize,

    /// Depth added after every primitive.
    pub depth_step: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_textures: None,
            initial_vertices: 1024,
            depth_step: 1.0e-6,
        }
    }
}

/// Outcome of one flush.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FlushStats {
    pub draw_calls: u32,
    pub vertices: u32,
}

impl FlushStats {
    fn record(&mut self, vertices: usize) {
        self.draw_calls += 1;
        self.vertices += vertices as u32;
    }
}

/// State every batch carries: draw color, matrices and fixed-function toggles.
#[derive(Debug, Clone)]
pub struct BatchState {
    pub color: Color,
    pub projection: Mat4,
    pub view: Mat4,
    pub line_width: f32,
    pub blending: bool,
    recording: bool,
}

impl Default for BatchState {
    /// Matrices of a default [`OrthographicCamera`], so larger depth counters
    /// land nearer even before a camera is installed.
    fn default() -> Self {
        let camera = OrthographicCamera::default();
        Self {
            color: Color::WHITE,
            projection: camera.projection(),
            view: camera.view(),
            line_width: 1.0,
            blending: true,
            recording: false,
        }
    }
}

impl BatchState {
    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn start_recording(&mut self) -> Result<(), BatchError> {
        if self.recording {
            return Err(BatchError::AlreadyRecording);
        }
        self.recording = true;
        Ok(())
    }

    pub fn stop_recording(&mut self) -> Result<(), BatchError> {
        if !self.recording {
            return Err(BatchError::NotRecording);
        }
        self.recording = false;
        Ok(())
    }

    #[inline]
    pub fn ensure_recording(&self) -> Result<(), BatchError> {
        if self.recording { Ok(()) } else { Err(BatchError::NotRecording) }
    }
}

/// Record → flush lifecycle shared by all batches.
pub trait Batch {
    fn state(&self) -> &BatchState;
    fn state_mut(&mut self) -> &mut BatchState;

    /// Starts recording and discards everything from the previous frame.
    fn begin(&mut self) -> Result<(), BatchError>;

    /// Submits what has been recorded. Does not change the recording state.
    fn flush<B: Backend>(&mut self, ctx: &mut Context<B>) -> Result<FlushStats, BatchError>;

    /// Releases every device resource owned by the batch.
    fn dispose<B: Backend>(self, ctx: &mut Context<B>)
    where
        Self: Sized;

    /// Stops recording and flushes.
    ///
    /// The batch is idle afterwards even if the flush fails.
    fn end<B: Backend>(&mut self, ctx: &mut Context<B>) -> Result<FlushStats, BatchError> {
        self.state_mut().stop_recording()?;
        self.flush(ctx)
    }

    fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    fn set_color(&mut self, color: Color) {
        self.state_mut().color = color;
    }

    fn color(&self) -> Color {
        self.state().color
    }

    fn set_projection_matrix(&mut self, projection: Mat4) {
        self.state_mut().projection = projection;
    }

    fn projection_matrix(&self) -> Mat4 {
        self.state().projection
    }

    fn set_view_matrix(&mut self, view: Mat4) {
        self.state_mut().view = view;
    }

    fn view_matrix(&self) -> Mat4 {
        self.state().view
    }

    fn set_line_width(&mut self, width: f32) {
        self.state_mut().line_width = width;
    }

    fn line_width(&self) -> f32 {
        self.state().line_width
    }

    fn set_blending(&mut self, enabled: bool) {
        self.state_mut().blending = enabled;
    }

    fn is_blending(&self) -> bool {
        self.state().blending
    }
}

/// Binds `vertex_array`, draws once, then restores attribute and binding state.
///
/// Attributes are disabled and the array unbound even when the device reports
/// an error for the draw.
fn submit<B: Backend>(
    ctx: &mut Context<B>,
    layout: &VertexLayout,
    vertex_array: &VertexArray,
    command: DrawCommand,
) -> Result<(), BatchError> {
    vertex_array.bind(ctx);
    layout.enable(ctx, vertex_array)?;

    ctx.backend_mut().draw(command);
    let drawn = ctx.check_error();

    layout.disable(ctx, vertex_array)?;
    vertex_array.unbind(ctx);
    drawn?;
    Ok(())
}

/// Creates a vertex array reading `buffer` through `layout`, attributes left disabled.
fn configured_vertex_array<B: Backend>(
    ctx: &mut Context<B>,
    layout: &VertexLayout,
    buffer: &GpuBuffer,
) -> Result<VertexArray, BatchError> {
    let vertex_array = VertexArray::new(ctx)?;
    let configured = layout
        .configure(ctx, &vertex_array, buffer)
        .and_then(|()| layout.disable(ctx, &vertex_array));
    match configured {
        Ok(()) => Ok(vertex_array),
        Err(err) => {
            vertex_array.dispose(ctx);
            Err(err.into())
        }
    }
}
