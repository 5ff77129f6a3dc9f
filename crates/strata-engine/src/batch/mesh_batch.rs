use std::sync::Arc;

use crate::gfx::{
    Backend, BufferKind, BufferUsage, Context, DepthFunc, DrawCommand, GpuBuffer, PipelineState,
    Shader, Topology, VertexArray,
};
use crate::math::Transform;

use super::{
    configured_vertex_array, submit, Batch, BatchError, BatchState, FlushStats, Mesh, MeshData,
};

const MESH_SHADER: &str = include_str!("../shaders/mesh.wgsl");

/// Floats appended to every mesh vertex: `[tx, ty, sx, sy, rotation]`.
const POSE_FLOATS: usize = 5;

/// Draws any number of mesh instances with a single draw call.
///
/// The batch keeps a shared reference to each mesh's geometry and a copy of
/// its transform as it was when [`mesh`](MeshBatch::mesh) was called.
#[derive(Debug)]
pub struct MeshBatch {
    state: BatchState,
    shader: Option<Shader>,
    entries: Vec<(Arc<MeshData>, Transform)>,

    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    vertex_array: VertexArray,
}

impl MeshBatch {
    pub fn new<B: Backend>(ctx: &mut Context<B>) -> Result<Self, BatchError> {
        let mut batch = Self::without_shader(ctx)?;
        let shader = Shader::new(ctx, MESH_SHADER)?;
        batch.set_shader(ctx, shader)?;
        Ok(batch)
    }

    pub fn without_shader<B: Backend>(ctx: &mut Context<B>) -> Result<Self, BatchError> {
        Ok(Self {
            state: BatchState::default(),
            shader: None,
            entries: Vec::new(),
            vertex_buffer: GpuBuffer::new(ctx, BufferKind::Vertex)?,
            index_buffer: GpuBuffer::new(ctx, BufferKind::Index)?,
            vertex_array: VertexArray::new(ctx)?,
        })
    }

    /// Installs `shader`, returning the previous one.
    ///
    /// The shader's vertex inputs must end with the five pose floats and have
    /// at least one intrinsic float before them.
    pub fn set_shader<B: Backend>(
        &mut self,
        ctx: &mut Context<B>,
        shader: Shader,
    ) -> Result<Option<Shader>, BatchError> {
        let layout = shader.layout();
        let floats = layout.float_count();
        if floats as usize <= POSE_FLOATS {
            return Err(BatchError::LayoutMismatch {
                expected: POSE_FLOATS as u32 + 1,
                actual: floats,
            });
        }

        let fresh = configured_vertex_array(ctx, layout, &self.vertex_buffer)?;
        std::mem::replace(&mut self.vertex_array, fresh).dispose(ctx);
        self.vertex_array.bind(ctx);
        self.index_buffer.bind(ctx);
        self.vertex_array.unbind(ctx);

        Ok(self.shader.replace(shader))
    }

    pub fn shader(&self) -> Option<&Shader> {
        self.shader.as_ref()
    }

    /// Queues one instance of `mesh` at its current transform.
    pub fn mesh(&mut self, mesh: &Mesh) -> Result<(), BatchError> {
        self.state.ensure_recording()?;
        self.entries.push((Arc::clone(mesh.geometry()), mesh.transform));
        Ok(())
    }

    /// Instances queued since `begin()`.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Interleaves every queued instance into one vertex stream.
    ///
    /// Returns the vertex floats, the vertex count and, when any instance is
    /// indexed, the combined index list.
    #[allow(clippy::type_complexity)]
    fn assemble(&self, intrinsic: usize) -> Result<(Vec<f32>, u32, Option<Vec<u32>>), BatchError> {
        let indexed = self.entries.iter().any(|(geometry, _)| geometry.indices.is_some());

        let mut floats = Vec::new();
        let mut indices = Vec::new();
        let mut base = 0u32;
        for (mesh, (geometry, pose)) in self.entries.iter().enumerate() {
            if geometry.vertices.len() % intrinsic != 0 {
                return Err(BatchError::MeshVertexData {
                    mesh,
                    floats: geometry.vertices.len(),
                    per_vertex: intrinsic,
                });
            }
            let count = (geometry.vertices.len() / intrinsic) as u32;
            let suffix = pose.to_floats();

            floats.reserve(count as usize * (intrinsic + POSE_FLOATS));
            for vertex in geometry.vertices.chunks_exact(intrinsic) {
                floats.extend_from_slice(vertex);
                floats.extend_from_slice(&suffix);
            }

            if indexed {
                match &geometry.indices {
                    Some(own) => indices.extend(own.iter().map(|i| i + base)),
                    None => indices.extend(base..base + count),
                }
            }
            base += count;
        }

        Ok((floats, base, indexed.then_some(indices)))
    }
}

impl Batch for MeshBatch {
    fn state(&self) -> &BatchState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut BatchState {
        &mut self.state
    }

    fn begin(&mut self) -> Result<(), BatchError> {
        self.state.start_recording()?;
        self.entries.clear();
        Ok(())
    }

    fn flush<B: Backend>(&mut self, ctx: &mut Context<B>) -> Result<FlushStats, BatchError> {
        let mut stats = FlushStats::default();
        if self.entries.is_empty() {
            return Ok(stats);
        }
        let shader = self.shader.as_ref().ok_or(BatchError::NoShader)?;
        let intrinsic = shader.layout().float_count() as usize - POSE_FLOATS;

        let (floats, vertices, indices) = self.assemble(intrinsic)?;
        if vertices == 0 {
            return Ok(stats);
        }

        self.vertex_buffer.bind(ctx);
        self.vertex_buffer.upload(ctx, &floats, BufferUsage::STREAM_DRAW)?;
        let command = match &indices {
            Some(indices) => {
                self.vertex_array.bind(ctx);
                self.index_buffer.bind(ctx);
                self.index_buffer.upload(ctx, indices, BufferUsage::STREAM_DRAW)?;
                DrawCommand::Elements {
                    topology: Topology::Triangles,
                    first_index: 0,
                    count: indices.len() as u32,
                }
            }
            None => DrawCommand::Arrays { topology: Topology::Triangles, first: 0, count: vertices },
        };

        ctx.backend_mut().set_pipeline_state(PipelineState {
            depth_test: Some(DepthFunc::LessEqual),
            blending: self.state.blending,
            line_width: self.state.line_width,
        });
        shader.bind(ctx);
        let drawn = (|| -> Result<(), BatchError> {
            shader.upload_mat4(ctx, Shader::PROJECTION, &self.state.projection)?;
            shader.upload_mat4(ctx, Shader::VIEW, &self.state.view)?;
            submit(ctx, shader.layout(), &self.vertex_array, command)
        })();
        shader.unbind(ctx);
        ctx.backend_mut().set_pipeline_state(PipelineState::default());
        drawn?;

        stats.record(vertices as usize);
        log::trace!(
            "MeshBatch::flush: meshes={} vertices={vertices} indexed={}",
            self.entries.len(),
            indices.is_some()
        );
        Ok(stats)
    }

    fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        self.vertex_array.dispose(ctx);
        self.vertex_buffer.dispose(ctx);
        self.index_buffer.dispose(ctx);
        if let Some(shader) = self.shader {
            shader.dispose(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::gfx::{DeviceError, HeadlessBackend};

    fn setup() -> (Context<HeadlessBackend>, MeshBatch) {
        let mut ctx = Context::new(HeadlessBackend::new());
        let batch = MeshBatch::new(&mut ctx).unwrap();
        (ctx, batch)
    }

    /// `count` vertices of `[x, y, r, g, b, a]`, x counting up from `start`.
    fn strip(start: f32, count: usize) -> Vec<f32> {
        (0..count)
            .flat_map(|i| [start + i as f32, 0.0, 1.0, 1.0, 1.0, 1.0])
            .collect()
    }

    #[test]
    fn pose_is_appended_to_every_vertex() {
        let (mut ctx, mut batch) = setup();
        let pose = Transform::from_translation(Vec2::new(3.0, 4.0))
            .with_scale(Vec2::new(2.0, 2.0))
            .with_rotation(0.5);
        let mesh = Mesh::new(strip(0.0, 3)).with_transform(pose);

        batch.begin().unwrap();
        batch.mesh(&mesh).unwrap();
        let stats = batch.end(&mut ctx).unwrap();
        assert_eq!(stats, FlushStats { draw_calls: 1, vertices: 3 });

        let draw = &ctx.backend().draws()[0];
        assert_eq!(draw.command, DrawCommand::Arrays { topology: Topology::Triangles, first: 0, count: 3 });
        assert_eq!(draw.state.depth_test, Some(DepthFunc::LessEqual));

        let floats = draw.vertex_floats();
        assert_eq!(floats.len(), 3 * 11);
        for (i, vertex) in floats.chunks_exact(11).enumerate() {
            assert_eq!(vertex[0], i as f32);
            assert_eq!(&vertex[6..], &[3.0, 4.0, 2.0, 2.0, 0.5]);
        }
    }

    #[test]
    fn indices_are_offset_by_prior_vertices() {
        let (mut ctx, mut batch) = setup();
        let first = Mesh::indexed(strip(0.0, 3), vec![0, 1, 2]);
        let plain = Mesh::new(strip(10.0, 3));
        let last = Mesh::indexed(strip(20.0, 4), vec![0, 2, 1, 1, 2, 3]);

        batch.begin().unwrap();
        batch.mesh(&first).unwrap();
        batch.mesh(&plain).unwrap();
        batch.mesh(&last).unwrap();
        batch.end(&mut ctx).unwrap();

        let draw = &ctx.backend().draws()[0];
        assert!(matches!(draw.command, DrawCommand::Elements { count: 12, .. }));
        assert_eq!(
            draw.indices.as_deref(),
            Some(&[0, 1, 2, 3, 4, 5, 6, 8, 7, 7, 8, 9][..])
        );
        assert_eq!(draw.vertex_floats().len(), 10 * 11);
    }

    #[test]
    fn pose_is_captured_when_queued() {
        let (mut ctx, mut batch) = setup();
        let mut mesh = Mesh::new(strip(0.0, 3));

        batch.begin().unwrap();
        batch.mesh(&mesh).unwrap();
        mesh.transform.translation = Vec2::new(100.0, 0.0);
        batch.mesh(&mesh).unwrap();
        batch.end(&mut ctx).unwrap();

        let floats = ctx.backend().draws()[0].vertex_floats();
        assert_eq!(floats[6], 0.0);
        assert_eq!(floats[3 * 11 + 6], 100.0);
    }

    #[test]
    fn ragged_geometry_is_rejected() {
        let (mut ctx, mut batch) = setup();
        batch.begin().unwrap();
        batch.mesh(&Mesh::new(strip(0.0, 3))).unwrap();
        batch.mesh(&Mesh::new(vec![0.0; 7])).unwrap();

        let err = batch.end(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            BatchError::MeshVertexData { mesh: 1, floats: 7, per_vertex: 6 }
        ));
        assert!(!batch.is_recording());
        assert!(ctx.backend().draws().is_empty());
    }

    #[test]
    fn queueing_requires_recording() {
        let (_ctx, mut batch) = setup();
        let mesh = Mesh::new(strip(0.0, 3));
        assert!(matches!(batch.mesh(&mesh), Err(BatchError::NotRecording)));

        batch.begin().unwrap();
        batch.mesh(&mesh).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn shader_needs_intrinsic_floats() {
        let (mut ctx, mut batch) = setup();
        let source = "@vertex\nfn vs_main(@location(0) p: vec4<f32>, @location(1) q: f32) {}";
        let small = Shader::new(&mut ctx, source).unwrap();

        assert!(matches!(
            batch.set_shader(&mut ctx, small),
            Err(BatchError::LayoutMismatch { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn device_error_surfaces_from_end() {
        let (mut ctx, mut batch) = setup();
        batch.begin().unwrap();
        batch.mesh(&Mesh::new(strip(0.0, 3))).unwrap();
        ctx.backend_mut().fail_next_draw(DeviceError::Validation("lost".into()));

        assert!(matches!(
            batch.end(&mut ctx),
            Err(BatchError::Device(DeviceError::Validation(_)))
        ));
        assert_eq!(ctx.bound_program(), None);
    }

    #[test]
    fn dispose_releases_device_objects() {
        let (mut ctx, batch) = setup();
        batch.dispose(&mut ctx);
        assert_eq!(ctx.backend().live_buffers(), 0);
        assert_eq!(ctx.backend().live_vertex_arrays(), 0);
        assert_eq!(ctx.backend().live_programs(), 0);
    }
}
