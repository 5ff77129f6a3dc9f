//! In-memory backend.
//!
//! Keeps buffer contents, vertex array bindings, uniforms and a log of every
//! draw, and validates draws the way a real device would. Used by the test
//! suite and by tools that want to inspect what a frame would submit without
//! a GPU.

use std::collections::{BTreeMap, HashMap};

use super::{
    AttribPointer, Backend, BufferId, BufferKind, BufferUsage, DeviceError, DrawCommand,
    FramebufferId, PipelineState, ProgramId, TextureId, UniformValue, VertexArrayId,
};
use crate::paint::Color;

const DEFAULT_TEXTURE_UNITS: u32 = 16;

/// Buffer contents as last uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessBuffer {
    pub kind: BufferKind,
    pub data: Vec<u8>,
    pub usage: Option<BufferUsage>,
    /// Number of full uploads (`buffer_data`) so far.
    pub uploads: u32,
}

/// Attribute registered on a vertex array.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundAttribute {
    pub pointer: AttribPointer,
    pub buffer: BufferId,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessVertexArray {
    pub attributes: BTreeMap<u32, BoundAttribute>,
    pub index_buffer: Option<BufferId>,
}

/// Owned copy of an uploaded uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    Float(f32),
    Mat4([f32; 16]),
    IntArray(Vec<i32>),
}

impl From<UniformValue<'_>> for UniformData {
    fn from(value: UniformValue<'_>) -> Self {
        match value {
            UniformValue::Float(v) => UniformData::Float(v),
            UniformValue::Mat4(m) => UniformData::Mat4(*m),
            UniformValue::IntArray(a) => UniformData::IntArray(a.to_vec()),
        }
    }
}

/// Snapshot of one accepted draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub command: DrawCommand,
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    /// `(unit, texture)` pairs bound when the draw was issued.
    pub textures: Vec<(u32, TextureId)>,
    pub state: PipelineState,
    /// Target of the draw; `None` is the default target.
    pub framebuffer: Option<FramebufferId>,
    /// Contents of the vertex buffer feeding the vertex array.
    pub vertices: Vec<u8>,
    /// Contents of the attached index buffer for indexed draws.
    pub indices: Option<Vec<u32>>,
}

impl DrawRecord {
    /// Vertex buffer contents reinterpreted as floats.
    pub fn vertex_floats(&self) -> Vec<f32> {
        self.vertices
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Recording backend with no device behind it.
#[derive(Debug)]
pub struct HeadlessBackend {
    max_texture_units: u32,
    memory_limit: Option<usize>,
    next_id: u32,

    buffers: HashMap<BufferId, HeadlessBuffer>,
    vertex_arrays: HashMap<VertexArrayId, HeadlessVertexArray>,
    textures: HashMap<TextureId, (u32, u32)>,
    programs: HashMap<ProgramId, HashMap<String, UniformData>>,
    /// Framebuffer → color texture.
    framebuffers: HashMap<FramebufferId, TextureId>,

    bound_vertex_buffer: Option<BufferId>,
    bound_index_buffer: Option<BufferId>,
    bound_vertex_array: Option<VertexArrayId>,
    program: Option<ProgramId>,
    texture_units: BTreeMap<u32, TextureId>,
    state: PipelineState,
    framebuffer: Option<FramebufferId>,

    draws: Vec<DrawRecord>,
    clears: Vec<(Option<FramebufferId>, Color)>,
    pending_error: Option<DeviceError>,
    injected_draw_error: Option<DeviceError>,
    /// Vertex arrays still created successfully before creation fails.
    vertex_arrays_until_failure: Option<usize>,
    vertex_array_binds: usize,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_texture_units(DEFAULT_TEXTURE_UNITS)
    }

    pub fn with_texture_units(max_texture_units: u32) -> Self {
        Self {
            max_texture_units,
            memory_limit: None,
            next_id: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            framebuffers: HashMap::new(),
            bound_vertex_buffer: None,
            bound_index_buffer: None,
            bound_vertex_array: None,
            program: None,
            texture_units: BTreeMap::new(),
            state: PipelineState::default(),
            framebuffer: None,
            draws: Vec::new(),
            clears: Vec::new(),
            pending_error: None,
            injected_draw_error: None,
            vertex_arrays_until_failure: None,
            vertex_array_binds: 0,
        }
    }

    /// Uploads larger than `bytes` fail with [`DeviceError::OutOfMemory`].
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Makes the next draw report `err` through [`Backend::take_error`].
    pub fn fail_next_draw(&mut self, err: DeviceError) {
        self.injected_draw_error = Some(err);
    }

    /// Lets `successes` more vertex arrays be created, then fails the next
    /// creation with [`DeviceError::OutOfMemory`].
    pub fn fail_vertex_array_creation(&mut self, successes: usize) {
        self.vertex_arrays_until_failure = Some(successes);
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    /// `(target, color)` of every clear so far.
    pub fn clears(&self) -> &[(Option<FramebufferId>, Color)] {
        &self.clears
    }

    pub fn buffer(&self, id: BufferId) -> Option<&HeadlessBuffer> {
        self.buffers.get(&id)
    }

    pub fn vertex_array(&self, id: VertexArrayId) -> Option<&HeadlessVertexArray> {
        self.vertex_arrays.get(&id)
    }

    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<&UniformData> {
        self.programs.get(&program).and_then(|u| u.get(name))
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.state
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of vertex array bind calls that reached the backend.
    pub fn vertex_array_binds(&self) -> usize {
        self.vertex_array_binds
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record_error(&mut self, err: DeviceError) {
        // First error sticks until polled.
        if self.pending_error.is_none() {
            self.pending_error = Some(err);
        }
    }

    fn bound_vertex_array_mut(&mut self) -> Result<&mut HeadlessVertexArray, DeviceError> {
        let id = self
            .bound_vertex_array
            .ok_or_else(|| DeviceError::Validation("no vertex array bound".into()))?;
        self.vertex_arrays
            .get_mut(&id)
            .ok_or(DeviceError::InvalidHandle { kind: "vertex array", id: id.raw() })
    }

    fn validate_draw(&self, cmd: DrawCommand) -> Result<DrawRecord, DeviceError> {
        let program = self
            .program
            .ok_or_else(|| DeviceError::Validation("draw without a program".into()))?;
        let vao_id = self
            .bound_vertex_array
            .ok_or_else(|| DeviceError::Validation("draw without a vertex array".into()))?;
        let vao = self
            .vertex_arrays
            .get(&vao_id)
            .ok_or(DeviceError::InvalidHandle { kind: "vertex array", id: vao_id.raw() })?;

        if let Some(fb) = self.framebuffer {
            let color = self
                .framebuffers
                .get(&fb)
                .ok_or(DeviceError::InvalidHandle { kind: "framebuffer", id: fb.raw() })?;
            if self.texture_units.values().any(|t| t == color) {
                return Err(DeviceError::Validation(format!(
                    "texture {} is the color attachment of the bound framebuffer",
                    color.raw()
                )));
            }
        }

        let Some(first) = vao.attributes.values().next() else {
            return Err(DeviceError::Validation("vertex array has no attributes".into()));
        };
        if let Some(disabled) = vao.attributes.values().find(|a| !a.enabled) {
            return Err(DeviceError::Validation(format!(
                "attribute {} is disabled",
                disabled.pointer.location
            )));
        }

        let vertices = self
            .buffers
            .get(&first.buffer)
            .map(|b| b.data.clone())
            .unwrap_or_default();
        let stride = first.pointer.stride.max(1) as usize;
        let available = (vertices.len() / stride) as u64;

        let indices = match cmd {
            DrawCommand::Arrays { first, count, .. } => {
                if u64::from(first) + u64::from(count) > available {
                    return Err(DeviceError::Validation(format!(
                        "draw reads {} vertices, buffer holds {available}",
                        first + count
                    )));
                }
                None
            }
            DrawCommand::Elements { first_index, count, .. } => {
                let ibo = vao.index_buffer.ok_or_else(|| {
                    DeviceError::Validation("indexed draw without an index buffer".into())
                })?;
                let data = self.buffers.get(&ibo).map(|b| b.data.as_slice()).unwrap_or(&[]);
                let all: Vec<u32> = data
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                let start = first_index as usize;
                let end = start + count as usize;
                if end > all.len() {
                    return Err(DeviceError::Validation(format!(
                        "draw reads {end} indices, buffer holds {}",
                        all.len()
                    )));
                }
                if let Some(bad) = all[start..end].iter().find(|&&i| u64::from(i) >= available) {
                    return Err(DeviceError::Validation(format!(
                        "index {bad} out of range for {available} vertices"
                    )));
                }
                Some(all)
            }
        };

        Ok(DrawRecord {
            command: cmd,
            program,
            vertex_array: vao_id,
            textures: self.texture_units.iter().map(|(&u, &t)| (u, t)).collect(),
            state: self.state,
            framebuffer: self.framebuffer,
            vertices,
            indices,
        })
    }
}

impl Backend for HeadlessBackend {
    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId, DeviceError> {
        let id = BufferId(self.alloc_id());
        self.buffers.insert(
            id,
            HeadlessBuffer { kind, data: Vec::new(), usage: None, uploads: 0 },
        );
        Ok(id)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id).is_none() {
            self.record_error(DeviceError::InvalidHandle { kind: "buffer", id: id.raw() });
        }
        if self.bound_vertex_buffer == Some(id) {
            self.bound_vertex_buffer = None;
        }
        if self.bound_index_buffer == Some(id) {
            self.bound_index_buffer = None;
        }
    }

    fn bind_buffer(&mut self, kind: BufferKind, id: Option<BufferId>) {
        match kind {
            BufferKind::Vertex => self.bound_vertex_buffer = id,
            BufferKind::Index => {
                self.bound_index_buffer = id;
                if let Ok(vao) = self.bound_vertex_array_mut() {
                    vao.index_buffer = id;
                }
            }
        }
    }

    fn buffer_data(
        &mut self,
        id: BufferId,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<(), DeviceError> {
        if let Some(limit) = self.memory_limit {
            if data.len() > limit {
                return Err(DeviceError::OutOfMemory { what: "buffer storage" });
            }
        }
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer", id: id.raw() })?;
        buffer.data.clear();
        buffer.data.extend_from_slice(data);
        buffer.usage = Some(usage);
        buffer.uploads += 1;
        Ok(())
    }

    fn buffer_sub_data(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer", id: id.raw() })?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.data.len() {
            return Err(DeviceError::Validation(format!(
                "sub-range {start}..{end} exceeds buffer size {}",
                buffer.data.len()
            )));
        }
        buffer.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DeviceError> {
        match self.vertex_arrays_until_failure {
            Some(0) => {
                self.vertex_arrays_until_failure = None;
                return Err(DeviceError::OutOfMemory { what: "vertex array" });
            }
            Some(n) => self.vertex_arrays_until_failure = Some(n - 1),
            None => {}
        }
        let id = VertexArrayId(self.alloc_id());
        self.vertex_arrays.insert(id, HeadlessVertexArray::default());
        Ok(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        if self.vertex_arrays.remove(&id).is_none() {
            self.record_error(DeviceError::InvalidHandle { kind: "vertex array", id: id.raw() });
        }
        if self.bound_vertex_array == Some(id) {
            self.bound_vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, id: Option<VertexArrayId>) {
        self.vertex_array_binds += 1;
        self.bound_vertex_array = id;
    }

    fn vertex_attrib_pointer(&mut self, pointer: AttribPointer) -> Result<(), DeviceError> {
        if !(1..=4).contains(&pointer.components) {
            return Err(DeviceError::Validation(format!(
                "attribute {} has {} components",
                pointer.location, pointer.components
            )));
        }
        let buffer = self
            .bound_vertex_buffer
            .ok_or_else(|| DeviceError::Validation("no vertex buffer bound".into()))?;
        let vao = self.bound_vertex_array_mut()?;
        vao.attributes.insert(
            pointer.location,
            BoundAttribute { pointer, buffer, enabled: false },
        );
        Ok(())
    }

    fn set_attribute_enabled(&mut self, location: u32, enabled: bool) -> Result<(), DeviceError> {
        let vao = self.bound_vertex_array_mut()?;
        let attr = vao.attributes.get_mut(&location).ok_or_else(|| {
            DeviceError::Validation(format!("attribute {location} is not registered"))
        })?;
        attr.enabled = enabled;
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, DeviceError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(DeviceError::Validation(format!(
                "texture data is {} bytes, expected {expected}",
                rgba.len()
            )));
        }
        let id = TextureId(self.alloc_id());
        self.textures.insert(id, (width, height));
        Ok(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_none() {
            self.record_error(DeviceError::InvalidHandle { kind: "texture", id: id.raw() });
        }
        self.texture_units.retain(|_, t| *t != id);
    }

    fn bind_texture(&mut self, unit: u32, id: TextureId) {
        if unit >= self.max_texture_units || !self.textures.contains_key(&id) {
            self.record_error(DeviceError::InvalidHandle { kind: "texture", id: id.raw() });
            return;
        }
        self.texture_units.insert(unit, id);
    }

    fn create_program(&mut self, source: &str) -> Result<ProgramId, DeviceError> {
        if source.trim().is_empty() {
            return Err(DeviceError::ShaderCompilation("empty source".into()));
        }
        let id = ProgramId(self.alloc_id());
        self.programs.insert(id, HashMap::new());
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        if self.programs.remove(&id).is_none() {
            self.record_error(DeviceError::InvalidHandle { kind: "program", id: id.raw() });
        }
        if self.program == Some(id) {
            self.program = None;
        }
    }

    fn use_program(&mut self, id: Option<ProgramId>) {
        self.program = id;
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &str,
        value: UniformValue<'_>,
    ) -> Result<(), DeviceError> {
        let uniforms = self
            .programs
            .get_mut(&program)
            .ok_or(DeviceError::InvalidHandle { kind: "program", id: program.raw() })?;
        uniforms.insert(name.to_string(), value.into());
        Ok(())
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<(FramebufferId, TextureId), DeviceError> {
        if let Some(limit) = self.memory_limit {
            if width as usize * height as usize * 4 > limit {
                return Err(DeviceError::OutOfMemory { what: "framebuffer attachments" });
            }
        }
        let texture = TextureId(self.alloc_id());
        self.textures.insert(texture, (width, height));
        let id = FramebufferId(self.alloc_id());
        self.framebuffers.insert(id, texture);
        Ok((id, texture))
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        match self.framebuffers.remove(&id) {
            Some(texture) => {
                self.textures.remove(&texture);
                self.texture_units.retain(|_, t| *t != texture);
            }
            None => self.record_error(DeviceError::InvalidHandle { kind: "framebuffer", id: id.raw() }),
        }
        if self.framebuffer == Some(id) {
            self.framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, id: Option<FramebufferId>) {
        if let Some(fb) = id {
            if !self.framebuffers.contains_key(&fb) {
                self.record_error(DeviceError::InvalidHandle { kind: "framebuffer", id: fb.raw() });
                return;
            }
        }
        self.framebuffer = id;
    }

    fn clear(&mut self, color: Color) -> Result<(), DeviceError> {
        self.clears.push((self.framebuffer, color));
        Ok(())
    }

    fn set_pipeline_state(&mut self, state: PipelineState) {
        self.state = state;
    }

    fn draw(&mut self, cmd: DrawCommand) {
        if let Some(err) = self.injected_draw_error.take() {
            self.record_error(err);
            return;
        }
        match self.validate_draw(cmd) {
            Ok(record) => self.draws.push(record),
            Err(err) => self.record_error(err),
        }
    }

    fn take_error(&mut self) -> Option<DeviceError> {
        self.pending_error.take()
    }
}
