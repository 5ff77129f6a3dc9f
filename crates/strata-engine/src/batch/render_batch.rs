use glam::Vec2;

use crate::gfx::{
    Backend, BufferKind, BufferUsage, Context, DepthFunc, DrawCommand, GpuBuffer, PipelineState,
    Shader, Texture, TextureRegion, Topology, VertexArray,
};

use super::{
    configured_vertex_array, quad_indices, submit, Batch, BatchConfig, BatchError, BatchState,
    FlushStats, TextureSlots, Vertex, VertexPool,
};

const BATCH_SHADER: &str = include_str!("../shaders/batch.wgsl");

/// One primitive class: its vertex indices plus the device objects it draws from.
#[derive(Debug)]
struct PrimitiveList {
    vertices: Vec<u32>,
    buffer: GpuBuffer,
    vertex_array: VertexArray,
}

impl PrimitiveList {
    fn new<B: Backend>(ctx: &mut Context<B>) -> Result<Self, BatchError> {
        Ok(Self {
            vertices: Vec::new(),
            buffer: GpuBuffer::new(ctx, BufferKind::Vertex)?,
            vertex_array: VertexArray::new(ctx)?,
        })
    }

    fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        self.vertex_array.dispose(ctx);
        self.buffer.dispose(ctx);
    }
}

/// Batches quads, triangles and lines into at most three draw calls.
///
/// Every primitive gets the current depth and then advances it by
/// [`BatchConfig::depth_step`], so across all three classes a later request
/// is drawn in front of an earlier one at the same position.
#[derive(Debug)]
pub struct RenderBatch {
    state: BatchState,
    shader: Option<Shader>,
    depth_step: f32,
    z: f32,

    pool: VertexPool,
    slots: TextureSlots,

    triangles: PrimitiveList,
    quads: PrimitiveList,
    lines: PrimitiveList,
    quad_indices: GpuBuffer,
}

impl RenderBatch {
    /// Creates a batch with the built-in shader installed.
    pub fn new<B: Backend>(ctx: &mut Context<B>, config: BatchConfig) -> Result<Self, BatchError> {
        let mut batch = Self::without_shader(ctx, config)?;
        let shader = Shader::new(ctx, BATCH_SHADER)?;
        batch.set_shader(ctx, shader)?;
        Ok(batch)
    }

    /// Creates a batch with no shader; install one with [`set_shader`](Self::set_shader)
    /// before the first flush.
    pub fn without_shader<B: Backend>(
        ctx: &mut Context<B>,
        config: BatchConfig,
    ) -> Result<Self, BatchError> {
        let units = ctx.max_texture_units();
        let capacity = config.max_textures.map_or(units, |cap| cap.min(units));

        let batch = Self {
            state: BatchState::default(),
            shader: None,
            depth_step: config.depth_step,
            z: 0.0,
            pool: VertexPool::with_capacity(config.initial_vertices),
            slots: TextureSlots::new(capacity),
            triangles: PrimitiveList::new(ctx)?,
            quads: PrimitiveList::new(ctx)?,
            lines: PrimitiveList::new(ctx)?,
            quad_indices: GpuBuffer::new(ctx, BufferKind::Index)?,
        };
        log::debug!("RenderBatch::new: texture slots={capacity}");
        Ok(batch)
    }

    /// Installs `shader` and rebuilds the vertex arrays from its layout.
    ///
    /// Returns the previously installed shader so the caller can dispose it.
    pub fn set_shader<B: Backend>(
        &mut self,
        ctx: &mut Context<B>,
        shader: Shader,
    ) -> Result<Option<Shader>, BatchError> {
        let layout = shader.layout();
        if layout.stride() != Vertex::BYTES {
            return Err(BatchError::LayoutMismatch {
                expected: Vertex::BYTES,
                actual: layout.stride(),
            });
        }

        // All or nothing: the lists keep their arrays unless every rebuild succeeds.
        let mut fresh = Vec::with_capacity(3);
        for list in [&self.triangles, &self.quads, &self.lines] {
            match configured_vertex_array(ctx, layout, &list.buffer) {
                Ok(vertex_array) => fresh.push(vertex_array),
                Err(err) => {
                    for vertex_array in fresh {
                        vertex_array.dispose(ctx);
                    }
                    return Err(err);
                }
            }
        }
        for (list, vertex_array) in [&mut self.triangles, &mut self.quads, &mut self.lines]
            .into_iter()
            .zip(fresh)
        {
            std::mem::replace(&mut list.vertex_array, vertex_array).dispose(ctx);
        }
        // The index buffer belongs to the quad vertex array.
        self.quads.vertex_array.bind(ctx);
        self.quad_indices.bind(ctx);
        self.quads.vertex_array.unbind(ctx);

        Ok(self.shader.replace(shader))
    }

    pub fn shader(&self) -> Option<&Shader> {
        self.shader.as_ref()
    }

    /// Depth the next primitive will receive.
    #[inline]
    pub fn depth(&self) -> f32 {
        self.z
    }

    #[inline]
    pub fn slots(&self) -> &TextureSlots {
        &self.slots
    }

    pub fn can_fit(&self, texture: &Texture) -> bool {
        self.slots.can_fit(texture.id())
    }

    pub fn triangle_vertices(&self) -> Vec<Vertex> {
        self.pool.gather(&self.triangles.vertices)
    }

    pub fn quad_vertices(&self) -> Vec<Vertex> {
        self.pool.gather(&self.quads.vertices)
    }

    pub fn line_vertices(&self) -> Vec<Vertex> {
        self.pool.gather(&self.lines.vertices)
    }

    /// Untextured quad; corners in perimeter order.
    pub fn quad(&mut self, p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2) -> Result<(), BatchError> {
        self.state.ensure_recording()?;
        let (z, color) = (self.z, self.state.color);
        for p in [p0, p1, p2, p3] {
            let v = self.pool.acquire(Vertex::untextured(p.x, p.y, z, color));
            self.quads.vertices.push(v);
        }
        self.advance();
        Ok(())
    }

    /// Untextured axis-aligned rectangle with its lower-left corner at `(x, y)`.
    pub fn quad_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<(), BatchError> {
        let [p0, p1, p2, p3] = rect_corners(x, y, w, h);
        self.quad(p0, p1, p2, p3)
    }

    /// Textured quad; `p0..p3` in perimeter order starting at the region's lower-left.
    pub fn texture_quad(
        &mut self,
        region: &TextureRegion<'_>,
        p0: Vec2,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
    ) -> Result<(), BatchError> {
        self.state.ensure_recording()?;
        let slot = self.slots.resolve(region.texture().id())?;
        let (z, color) = (self.z, self.state.color);
        let uvs = [
            region.lower_left(),
            region.lower_right(),
            region.upper_right(),
            region.upper_left(),
        ];
        for (p, uv) in [p0, p1, p2, p3].into_iter().zip(uvs) {
            let v = self.pool.acquire(Vertex::textured(p.x, p.y, z, color, uv, slot));
            self.quads.vertices.push(v);
        }
        self.advance();
        Ok(())
    }

    pub fn texture_region(
        &mut self,
        region: &TextureRegion<'_>,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    ) -> Result<(), BatchError> {
        let [p0, p1, p2, p3] = rect_corners(x, y, w, h);
        self.texture_quad(region, p0, p1, p2, p3)
    }

    /// Whole texture at its pixel size.
    pub fn texture(&mut self, texture: &Texture, x: f32, y: f32) -> Result<(), BatchError> {
        self.texture_sized(texture, x, y, texture.width() as f32, texture.height() as f32)
    }

    pub fn texture_sized(
        &mut self,
        texture: &Texture,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    ) -> Result<(), BatchError> {
        self.texture_region(&TextureRegion::full(texture), x, y, w, h)
    }

    pub fn triangle(&mut self, p0: Vec2, p1: Vec2, p2: Vec2) -> Result<(), BatchError> {
        self.state.ensure_recording()?;
        let (z, color) = (self.z, self.state.color);
        for p in [p0, p1, p2] {
            let v = self.pool.acquire(Vertex::untextured(p.x, p.y, z, color));
            self.triangles.vertices.push(v);
        }
        self.advance();
        Ok(())
    }

    /// Triangle sampling the region's lower-left, lower-right and upper-left corners.
    pub fn textured_triangle(
        &mut self,
        region: &TextureRegion<'_>,
        p0: Vec2,
        p1: Vec2,
        p2: Vec2,
    ) -> Result<(), BatchError> {
        let uvs = [region.lower_left(), region.lower_right(), region.upper_left()];
        self.push_textured_triangle(region.texture(), [p0, p1, p2], uvs)
    }

    /// Triangle with explicit per-corner UVs.
    pub fn textured_triangle_uv(
        &mut self,
        texture: &Texture,
        points: [Vec2; 3],
        uvs: [Vec2; 3],
    ) -> Result<(), BatchError> {
        self.push_textured_triangle(texture, points, uvs.map(|uv| uv.to_array()))
    }

    pub fn line(&mut self, p0: Vec2, p1: Vec2) -> Result<(), BatchError> {
        self.state.ensure_recording()?;
        let (z, color) = (self.z, self.state.color);
        for p in [p0, p1] {
            let v = self.pool.acquire(Vertex::untextured(p.x, p.y, z, color));
            self.lines.vertices.push(v);
        }
        self.advance();
        Ok(())
    }

    fn push_textured_triangle(
        &mut self,
        texture: &Texture,
        points: [Vec2; 3],
        uvs: [[f32; 2]; 3],
    ) -> Result<(), BatchError> {
        self.state.ensure_recording()?;
        let slot = self.slots.resolve(texture.id())?;
        let (z, color) = (self.z, self.state.color);
        for (p, uv) in points.into_iter().zip(uvs) {
            let v = self.pool.acquire(Vertex::textured(p.x, p.y, z, color, uv, slot));
            self.triangles.vertices.push(v);
        }
        self.advance();
        Ok(())
    }

    #[inline]
    fn advance(&mut self) {
        self.z += self.depth_step;
    }

    /// Uploads one list and issues its draw.
    fn draw_list<B: Backend>(
        ctx: &mut Context<B>,
        shader: &Shader,
        pool: &VertexPool,
        list: &mut PrimitiveList,
        command: DrawCommand,
    ) -> Result<(), BatchError> {
        let vertices = pool.gather(&list.vertices);
        list.buffer.bind(ctx);
        list.buffer.upload(ctx, &vertices, BufferUsage::STREAM_DRAW)?;
        submit(ctx, shader.layout(), &list.vertex_array, command)
    }
}

impl Batch for RenderBatch {
    fn state(&self) -> &BatchState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut BatchState {
        &mut self.state
    }

    fn begin(&mut self) -> Result<(), BatchError> {
        self.state.start_recording()?;
        for list in [&mut self.triangles, &mut self.quads, &mut self.lines] {
            self.pool.release_all(list.vertices.drain(..));
        }
        self.slots.clear();
        self.z = 0.0;
        Ok(())
    }

    fn flush<B: Backend>(&mut self, ctx: &mut Context<B>) -> Result<FlushStats, BatchError> {
        let mut stats = FlushStats::default();
        if self.triangles.vertices.is_empty()
            && self.quads.vertices.is_empty()
            && self.lines.vertices.is_empty()
        {
            return Ok(stats);
        }
        let shader = self.shader.as_ref().ok_or(BatchError::NoShader)?;

        ctx.backend_mut().set_pipeline_state(PipelineState {
            depth_test: Some(DepthFunc::Less),
            blending: self.state.blending,
            line_width: self.state.line_width,
        });

        shader.bind(ctx);
        shader.upload_mat4(ctx, Shader::PROJECTION, &self.state.projection)?;
        shader.upload_mat4(ctx, Shader::VIEW, &self.state.view)?;
        shader.upload_int_array(ctx, Shader::TEXTURES, &self.slots.unit_table())?;
        for (slot, texture) in self.slots.iter() {
            ctx.backend_mut().bind_texture(slot, texture);
        }
        ctx.check_error()?;

        let result = (|| -> Result<(), BatchError> {
            if !self.triangles.vertices.is_empty() {
                let count = self.triangles.vertices.len();
                let command = DrawCommand::Arrays {
                    topology: Topology::Triangles,
                    first: 0,
                    count: count as u32,
                };
                Self::draw_list(ctx, shader, &self.pool, &mut self.triangles, command)?;
                stats.record(count);
            }

            if !self.quads.vertices.is_empty() {
                let count = self.quads.vertices.len();
                let indices = quad_indices(count / 4);
                self.quads.vertex_array.bind(ctx);
                self.quad_indices.bind(ctx);
                self.quad_indices.upload(ctx, &indices, BufferUsage::STREAM_DRAW)?;
                let command = DrawCommand::Elements {
                    topology: Topology::Triangles,
                    first_index: 0,
                    count: indices.len() as u32,
                };
                Self::draw_list(ctx, shader, &self.pool, &mut self.quads, command)?;
                stats.record(count);
            }

            if !self.lines.vertices.is_empty() {
                let count = self.lines.vertices.len();
                let command = DrawCommand::Arrays {
                    topology: Topology::Lines,
                    first: 0,
                    count: count as u32,
                };
                Self::draw_list(ctx, shader, &self.pool, &mut self.lines, command)?;
                stats.record(count);
            }
            Ok(())
        })();

        shader.unbind(ctx);
        ctx.backend_mut().set_pipeline_state(PipelineState::default());
        result?;

        log::trace!(
            "RenderBatch::flush: draw_calls={} vertices={} textures={}",
            stats.draw_calls,
            stats.vertices,
            self.slots.len()
        );
        Ok(stats)
    }

    fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        self.triangles.dispose(ctx);
        self.quads.dispose(ctx);
        self.lines.dispose(ctx);
        self.quad_indices.dispose(ctx);
        if let Some(shader) = self.shader {
            shader.dispose(ctx);
        }
    }
}

fn rect_corners(x: f32, y: f32, w: f32, h: f32) -> [Vec2; 4] {
    [
        Vec2::new(x, y),
        Vec2::new(x + w, y),
        Vec2::new(x + w, y + h),
        Vec2::new(x, y + h),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{DeviceError, HeadlessBackend, UniformData};
    use crate::paint::Color;

    fn setup() -> (Context<HeadlessBackend>, RenderBatch) {
        let mut ctx = Context::new(HeadlessBackend::new());
        let batch = RenderBatch::new(&mut ctx, BatchConfig::default()).unwrap();
        (ctx, batch)
    }

    fn checker(ctx: &mut Context<HeadlessBackend>) -> Texture {
        Texture::from_rgba8(ctx, 2, 2, &[255; 16]).unwrap()
    }

    #[test]
    fn mixed_frame_records_each_class() {
        let (mut ctx, mut batch) = setup();
        let texture = checker(&mut ctx);
        let step = BatchConfig::default().depth_step;

        batch.begin().unwrap();
        batch
            .quad(Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y)
            .unwrap();
        batch.set_color(Color::RED);
        let region = TextureRegion::full(&texture);
        batch
            .textured_triangle(&region, Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0))
            .unwrap();

        let quads = batch.quad_vertices();
        assert_eq!(quads.len(), 4);
        assert!(quads.iter().all(|v| v.slot_index().is_none() && v.position[2] == 0.0));
        assert_eq!(quads[2].position, [1.0, 1.0, 0.0]);
        assert_eq!(quads[0].color, Color::WHITE.to_array());

        let triangles = batch.triangle_vertices();
        assert_eq!(triangles.len(), 3);
        assert!(triangles.iter().all(|v| v.slot_index() == Some(0) && v.position[2] == step));
        assert_eq!(triangles[0].color, Color::RED.to_array());
        assert_eq!(triangles[0].uv, region.lower_left());
        assert_eq!(triangles[2].uv, region.upper_left());

        assert_eq!(batch.slots().len(), 1);
        assert_eq!(batch.depth(), 2.0 * step);

        let stats = batch.end(&mut ctx).unwrap();
        assert_eq!(stats, FlushStats { draw_calls: 2, vertices: 7 });
        assert!(!batch.is_recording());

        let draws = ctx.backend().draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].command.topology(), Topology::Triangles);
        assert_eq!(draws[0].textures, vec![(0, texture.id())]);
        assert!(matches!(draws[1].command, DrawCommand::Elements { count: 6, .. }));
        assert_eq!(draws[1].indices.as_deref(), Some(&[3, 2, 0, 0, 2, 1][..]));
        assert_eq!(draws[1].state.depth_test, Some(DepthFunc::Less));
    }

    #[test]
    fn uploaded_vertices_match_recorded_ones() {
        let (mut ctx, mut batch) = setup();
        batch.begin().unwrap();
        batch.line(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)).unwrap();
        batch.end(&mut ctx).unwrap();

        let draw = &ctx.backend().draws()[0];
        assert_eq!(draw.command, DrawCommand::Arrays { topology: Topology::Lines, first: 0, count: 2 });
        let floats = draw.vertex_floats();
        assert_eq!(floats.len(), 2 * Vertex::FLOATS);
        assert_eq!(&floats[..3], &[-1.0, -1.0, 0.0]);
        assert_eq!(floats[9], Vertex::NO_TEXTURE);
    }

    #[test]
    fn later_requests_are_nearer() {
        let (_ctx, mut batch) = setup();
        batch.begin().unwrap();
        batch.quad_rect(0.0, 0.0, 1.0, 1.0).unwrap();
        batch.quad_rect(0.0, 0.0, 1.0, 1.0).unwrap();

        let quads = batch.quad_vertices();
        assert!(quads[4].position[2] > quads[0].position[2]);
    }

    #[test]
    fn drawing_requires_recording() {
        let (mut ctx, mut batch) = setup();
        let texture = checker(&mut ctx);

        assert!(matches!(batch.quad_rect(0.0, 0.0, 1.0, 1.0), Err(BatchError::NotRecording)));
        assert!(matches!(batch.texture(&texture, 0.0, 0.0), Err(BatchError::NotRecording)));
        assert!(matches!(batch.end(&mut ctx), Err(BatchError::NotRecording)));

        batch.begin().unwrap();
        assert!(matches!(batch.begin(), Err(BatchError::AlreadyRecording)));
    }

    #[test]
    fn texture_slots_are_bounded() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let config = BatchConfig { max_textures: Some(1), ..BatchConfig::default() };
        let mut batch = RenderBatch::new(&mut ctx, config).unwrap();
        let a = checker(&mut ctx);
        let b = checker(&mut ctx);

        batch.begin().unwrap();
        batch.texture(&a, 0.0, 0.0).unwrap();
        assert!(batch.can_fit(&a));
        assert!(!batch.can_fit(&b));
        assert!(matches!(
            batch.texture(&b, 0.0, 0.0),
            Err(BatchError::TextureSlotsFull { capacity: 1 })
        ));
        // The failed request leaves nothing behind.
        assert_eq!(batch.quad_vertices().len(), 4);
    }

    #[test]
    fn slot_capacity_follows_device() {
        let mut ctx = Context::new(HeadlessBackend::with_texture_units(4));
        let config = BatchConfig { max_textures: Some(32), ..BatchConfig::default() };
        let batch = RenderBatch::new(&mut ctx, config).unwrap();
        assert_eq!(batch.slots().capacity(), 4);
    }

    #[test]
    fn flush_uploads_matrices_and_unit_table() {
        let (mut ctx, mut batch) = setup();
        let projection = glam::Mat4::from_scale(glam::Vec3::splat(2.0));
        batch.set_projection_matrix(projection);

        batch.begin().unwrap();
        batch.triangle(Vec2::ZERO, Vec2::X, Vec2::Y).unwrap();
        batch.end(&mut ctx).unwrap();

        let program = batch.shader().unwrap().id();
        let backend = ctx.backend();
        assert_eq!(
            backend.uniform(program, Shader::PROJECTION),
            Some(&UniformData::Mat4(projection.to_cols_array()))
        );
        let Some(UniformData::IntArray(units)) = backend.uniform(program, Shader::TEXTURES) else {
            panic!("texture unit table was not uploaded");
        };
        assert_eq!(units.len(), 16);
        assert_eq!(backend.pipeline_state(), PipelineState::default());
        assert_eq!(ctx.bound_program(), None);
        assert_eq!(ctx.bound_vertex_array(), None);
    }

    #[test]
    fn device_error_surfaces_from_end() {
        let (mut ctx, mut batch) = setup();
        batch.begin().unwrap();
        batch.quad_rect(0.0, 0.0, 1.0, 1.0).unwrap();
        ctx.backend_mut().fail_next_draw(DeviceError::OutOfMemory { what: "test" });

        let err = batch.end(&mut ctx).unwrap_err();
        assert!(matches!(err, BatchError::Device(DeviceError::OutOfMemory { .. })));
        assert!(!batch.is_recording());
        assert_eq!(ctx.bound_vertex_array(), None);
    }

    #[test]
    fn begin_discards_previous_frame() {
        let (mut ctx, mut batch) = setup();
        let texture = checker(&mut ctx);

        batch.begin().unwrap();
        batch.texture(&texture, 0.0, 0.0).unwrap();
        batch.line(Vec2::ZERO, Vec2::ONE).unwrap();
        batch.end(&mut ctx).unwrap();

        batch.begin().unwrap();
        assert!(batch.quad_vertices().is_empty());
        assert!(batch.line_vertices().is_empty());
        assert!(batch.slots().is_empty());
        assert_eq!(batch.depth(), 0.0);

        ctx.backend_mut().clear_draws();
        assert_eq!(batch.end(&mut ctx).unwrap(), FlushStats::default());
        assert!(ctx.backend().draws().is_empty());
    }

    #[test]
    fn flush_without_shader() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let mut batch = RenderBatch::without_shader(&mut ctx, BatchConfig::default()).unwrap();

        batch.begin().unwrap();
        assert_eq!(batch.flush(&mut ctx).unwrap(), FlushStats::default());
        batch.quad_rect(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(matches!(batch.flush(&mut ctx), Err(BatchError::NoShader)));
    }

    #[test]
    fn set_shader_checks_vertex_size() {
        let (mut ctx, mut batch) = setup();
        let mesh = Shader::new(&mut ctx, include_str!("../shaders/mesh.wgsl")).unwrap();

        let err = batch.set_shader(&mut ctx, mesh).unwrap_err();
        assert!(matches!(
            err,
            BatchError::LayoutMismatch { expected: 40, actual: 44 }
        ));

        let replacement = Shader::new(&mut ctx, BATCH_SHADER).unwrap();
        let previous = batch.set_shader(&mut ctx, replacement).unwrap();
        assert!(previous.is_some());
        previous.unwrap().dispose(&mut ctx);
    }

    #[test]
    fn texture_quad_maps_corners_to_region() {
        let (mut ctx, mut batch) = setup();
        let texture = checker(&mut ctx);
        let region = TextureRegion::from_uv_rect(&texture, 0.25, 0.5, 0.5, 0.25);

        batch.begin().unwrap();
        batch
            .texture_quad(&region, Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y)
            .unwrap();

        let uvs: Vec<[f32; 2]> = batch.quad_vertices().iter().map(|v| v.uv).collect();
        assert_eq!(
            uvs,
            vec![
                region.lower_left(),
                region.lower_right(),
                region.upper_right(),
                region.upper_left(),
            ]
        );
        assert_eq!(uvs[0], [0.25, 0.75]);
        assert_eq!(uvs[2], [0.75, 0.5]);
    }

    #[test]
    fn failed_shader_swap_keeps_previous_arrays() {
        let (mut ctx, mut batch) = setup();
        let before = [
            batch.triangles.vertex_array.id(),
            batch.quads.vertex_array.id(),
            batch.lines.vertex_array.id(),
        ];
        let live = ctx.backend().live_vertex_arrays();

        ctx.backend_mut().fail_vertex_array_creation(1);
        let replacement = Shader::new(&mut ctx, BATCH_SHADER).unwrap();
        let err = batch.set_shader(&mut ctx, replacement).unwrap_err();
        assert!(matches!(err, BatchError::Device(DeviceError::OutOfMemory { .. })));

        let after = [
            batch.triangles.vertex_array.id(),
            batch.quads.vertex_array.id(),
            batch.lines.vertex_array.id(),
        ];
        assert_eq!(after, before);
        assert_eq!(ctx.backend().live_vertex_arrays(), live);

        // The batch still draws with the shader it had.
        batch.begin().unwrap();
        batch.quad_rect(0.0, 0.0, 1.0, 1.0).unwrap();
        assert_eq!(batch.end(&mut ctx).unwrap().draw_calls, 1);
    }

    #[test]
    fn dispose_releases_device_objects() {
        let (mut ctx, batch) = setup();
        batch.dispose(&mut ctx);

        let backend = ctx.backend();
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.live_vertex_arrays(), 0);
        assert_eq!(backend.live_programs(), 0);
        assert!(ctx.backend_mut().take_error().is_none());
    }
}
