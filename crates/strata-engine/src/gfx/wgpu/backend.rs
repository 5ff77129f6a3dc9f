use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::gfx::{
    AttribPointer, Backend, BufferId, BufferKind, BufferUsage, DeviceError, DrawCommand,
    FramebufferId, PipelineState, ProgramId, TextureId, UniformValue, UsageFrequency, VertexArrayId,
};
use crate::gfx::shader::Shader;
use crate::paint::Color;

use super::pipeline::{self, PipelineKey, Uniforms, MAX_TEXTURE_UNITS};

/// Views a frame renders into.
#[derive(Debug, Clone)]
pub struct FrameTarget {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
}

struct BufferSlot {
    kind: BufferKind,
    raw: Option<wgpu::Buffer>,
    capacity: u64,
    len: u64,
}

#[derive(Default)]
struct VertexArraySlot {
    attributes: BTreeMap<u32, (AttribPointer, BufferId, bool)>,
    index_buffer: Option<BufferId>,
}

struct TextureSlot {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct FramebufferSlot {
    color: TextureId,
    depth: wgpu::Texture,
    target: FrameTarget,
}

struct ProgramSlot {
    module: wgpu::ShaderModule,
    uniforms: Uniforms,
    ubo: wgpu::Buffer,
    dirty: bool,
}

/// [`Backend`] on a wgpu device.
///
/// Each draw records its own render pass that loads the current frame
/// target, so draws compose in submission order. Pipelines are built lazily
/// per (program, topology, attribute layout, depth, blending) and cached.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    max_texture_units: u32,

    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    placeholder: TextureSlot,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    next_id: u32,
    buffers: HashMap<BufferId, BufferSlot>,
    vertex_arrays: HashMap<VertexArrayId, VertexArraySlot>,
    textures: HashMap<TextureId, TextureSlot>,
    programs: HashMap<ProgramId, ProgramSlot>,
    framebuffers: HashMap<FramebufferId, FramebufferSlot>,

    bound_vertex_buffer: Option<BufferId>,
    bound_vertex_array: Option<VertexArrayId>,
    program: Option<ProgramId>,
    texture_units: [Option<TextureId>; MAX_TEXTURE_UNITS as usize],
    state: PipelineState,
    target: Option<FrameTarget>,
    framebuffer: Option<FramebufferId>,

    pending_error: Option<DeviceError>,
    warned_line_width: bool,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        let limits = device.limits();
        let max_texture_units = MAX_TEXTURE_UNITS.min(limits.max_sampled_textures_per_shader_stage);

        let bind_group_layout = pipeline::bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("strata batch pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("strata batch sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let placeholder = upload_texture(&device, &queue, 1, 1, &[255, 255, 255, 255]);

        log::debug!(
            "WgpuBackend::new: format={color_format:?} texture_units={max_texture_units}"
        );

        Self {
            device,
            queue,
            color_format,
            max_texture_units,
            bind_group_layout,
            pipeline_layout,
            sampler,
            placeholder,
            pipelines: HashMap::new(),
            next_id: 1,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            framebuffers: HashMap::new(),
            bound_vertex_buffer: None,
            bound_vertex_array: None,
            program: None,
            texture_units: [None; MAX_TEXTURE_UNITS as usize],
            state: PipelineState::default(),
            target: None,
            framebuffer: None,
            pending_error: None,
            warned_line_width: false,
        }
    }

    /// Points subsequent draws at `target`. `None` makes draws fail with
    /// [`DeviceError::NoRenderTarget`].
    pub fn set_target(&mut self, target: Option<FrameTarget>) {
        self.target = target;
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Bound framebuffer's target, else the frame target.
    fn current_target(&self) -> Result<&FrameTarget, DeviceError> {
        match self.framebuffer {
            Some(id) => self
                .framebuffers
                .get(&id)
                .map(|fb| &fb.target)
                .ok_or(DeviceError::InvalidHandle { kind: "framebuffer", id: id.raw() }),
            None => self.target.as_ref().ok_or(DeviceError::NoRenderTarget),
        }
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record_error(&mut self, err: DeviceError) {
        if self.pending_error.is_none() {
            self.pending_error = Some(err);
        }
    }

    fn bound_vertex_array_mut(&mut self) -> Result<&mut VertexArraySlot, DeviceError> {
        let id = self
            .bound_vertex_array
            .ok_or_else(|| DeviceError::Validation("no vertex array bound".into()))?;
        self.vertex_arrays
            .get_mut(&id)
            .ok_or(DeviceError::InvalidHandle { kind: "vertex array", id: id.raw() })
    }

    fn try_draw(&mut self, cmd: DrawCommand) -> Result<(), DeviceError> {
        let program_id = self
            .program
            .ok_or_else(|| DeviceError::Validation("draw without a program".into()))?;
        let vao_id = self
            .bound_vertex_array
            .ok_or_else(|| DeviceError::Validation("draw without a vertex array".into()))?;
        let vao = self
            .vertex_arrays
            .get(&vao_id)
            .ok_or(DeviceError::InvalidHandle { kind: "vertex array", id: vao_id.raw() })?;

        let mut pointers = Vec::with_capacity(vao.attributes.len());
        let mut source = None;
        for (pointer, buffer, enabled) in vao.attributes.values() {
            if !enabled {
                return Err(DeviceError::Validation(format!(
                    "attribute {} is disabled",
                    pointer.location
                )));
            }
            if source.is_some_and(|b| b != *buffer) {
                return Err(DeviceError::Validation(
                    "attributes must read from a single vertex buffer".into(),
                ));
            }
            source = Some(*buffer);
            pointers.push(*pointer);
        }
        let vertex_buffer = source
            .ok_or_else(|| DeviceError::Validation("vertex array has no attributes".into()))?;
        let index_buffer = vao.index_buffer;

        if self.state.line_width != 1.0 && !self.warned_line_width {
            log::debug!("WgpuBackend: line width {} unsupported; drawing 1px lines", self.state.line_width);
            self.warned_line_width = true;
        }

        let key = PipelineKey {
            program: program_id,
            topology: cmd.topology(),
            attributes: pointers,
            depth: self.state.depth_test,
            blending: self.state.blending,
        };
        if !self.pipelines.contains_key(&key) {
            let program = self
                .programs
                .get(&program_id)
                .ok_or(DeviceError::InvalidHandle { kind: "program", id: program_id.raw() })?;
            let device = &self.device;
            let layout = &self.pipeline_layout;
            let format = self.color_format;
            let (built, err) = capture_validation(device, || {
                pipeline::create(device, layout, &program.module, format, &key)
            });
            if let Some(err) = err {
                return Err(DeviceError::Validation(err.to_string()));
            }
            log::debug!("WgpuBackend: built pipeline for program {} ({:?})", program_id.raw(), key.topology);
            self.pipelines.insert(key.clone(), built?);
        }

        let program = self
            .programs
            .get_mut(&program_id)
            .ok_or(DeviceError::InvalidHandle { kind: "program", id: program_id.raw() })?;
        if program.dirty {
            self.queue.write_buffer(&program.ubo, 0, bytemuck::bytes_of(&program.uniforms));
            program.dirty = false;
        }

        let target = self.current_target()?;
        if let Some(color) = self.framebuffer.and_then(|id| self.framebuffers.get(&id)).map(|fb| fb.color) {
            if self.texture_units.contains(&Some(color)) {
                return Err(DeviceError::Validation(format!(
                    "texture {} is the color attachment of the bound framebuffer",
                    color.raw()
                )));
            }
        }
        let vbo = self
            .buffers
            .get(&vertex_buffer)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer", id: vertex_buffer.raw() })?;
        let vertex_raw = vbo
            .raw
            .as_ref()
            .ok_or_else(|| DeviceError::Validation("vertex buffer has no contents".into()))?;
        let stride = u64::from(key.attributes[0].stride.max(1));
        let available = vbo.len / stride;

        let span = match cmd {
            DrawCommand::Arrays { first, count, .. } => {
                if u64::from(first) + u64::from(count) > available {
                    return Err(DeviceError::Validation(format!(
                        "draw reads {} vertices, buffer holds {available}",
                        first + count
                    )));
                }
                DrawSpan::Vertices(first..first + count)
            }
            DrawCommand::Elements { first_index, count, .. } => {
                let ibo_id = index_buffer.ok_or_else(|| {
                    DeviceError::Validation("indexed draw without an index buffer".into())
                })?;
                let ibo = self
                    .buffers
                    .get(&ibo_id)
                    .ok_or(DeviceError::InvalidHandle { kind: "buffer", id: ibo_id.raw() })?;
                let index_raw = ibo
                    .raw
                    .as_ref()
                    .ok_or_else(|| DeviceError::Validation("index buffer has no contents".into()))?;
                if u64::from(first_index) + u64::from(count) > ibo.len / 4 {
                    return Err(DeviceError::Validation(format!(
                        "draw reads {} indices, buffer holds {}",
                        first_index + count,
                        ibo.len / 4
                    )));
                }
                DrawSpan::Indices(index_raw, first_index..first_index + count)
            }
        };

        let views: Vec<&wgpu::TextureView> = self
            .texture_units
            .iter()
            .map(|unit| {
                unit.and_then(|id| self.textures.get(&id))
                    .map(|t| &t.view)
                    .unwrap_or(&self.placeholder.view)
            })
            .collect();
        let program = &self.programs[&program_id];
        let render_pipeline = &self.pipelines[&key];
        let device = &self.device;
        let queue = &self.queue;

        // Bind group creation, pass encoding and submission report their
        // validation failures through the scope, not through a return value.
        let ((), err) = capture_validation(device, || {
            let bind_group = pipeline::bind_group(
                device,
                &self.bind_group_layout,
                &program.ubo,
                &self.sampler,
                &views,
            );

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strata draw encoder"),
            });
            {
                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("strata draw pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.color,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &target.depth,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });

                rpass.set_pipeline(render_pipeline);
                rpass.set_bind_group(0, &bind_group, &[]);
                rpass.set_vertex_buffer(0, vertex_raw.slice(..));
                match span {
                    DrawSpan::Vertices(range) => rpass.draw(range, 0..1),
                    DrawSpan::Indices(index_raw, range) => {
                        rpass.set_index_buffer(index_raw.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(range, 0, 0..1);
                    }
                }
            }
            queue.submit(std::iter::once(encoder.finish()));
        });

        match err {
            Some(err) => Err(DeviceError::Validation(err.to_string())),
            None => Ok(()),
        }
    }
}

impl Backend for WgpuBackend {
    fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferId, DeviceError> {
        let id = BufferId(self.alloc_id());
        self.buffers.insert(id, BufferSlot { kind, raw: None, capacity: 0, len: 0 });
        Ok(id)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        match self.buffers.remove(&id) {
            Some(slot) => {
                if let Some(raw) = slot.raw {
                    raw.destroy();
                }
            }
            None => self.record_error(DeviceError::InvalidHandle { kind: "buffer", id: id.raw() }),
        }
        if self.bound_vertex_buffer == Some(id) {
            self.bound_vertex_buffer = None;
        }
    }

    fn bind_buffer(&mut self, kind: BufferKind, id: Option<BufferId>) {
        match kind {
            BufferKind::Vertex => self.bound_vertex_buffer = id,
            BufferKind::Index => {
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
        let device = self.device.clone();
        let slot = self
            .buffers
            .get_mut(&id)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer", id: id.raw() })?;

        let padded = padded_len(data.len() as u64);
        if slot.raw.is_none() || slot.capacity < padded {
            // Streamed contents grow geometrically; static contents are sized exactly.
            let capacity = match usage.frequency {
                UsageFrequency::Static => padded.max(4),
                UsageFrequency::Dynamic | UsageFrequency::Stream => {
                    padded.next_power_of_two().max(256)
                }
            };
            let gpu_usage = match slot.kind {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
            } | wgpu::BufferUsages::COPY_DST;

            let (raw, err) = capture_out_of_memory(&device, || {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("strata buffer"),
                    size: capacity,
                    usage: gpu_usage,
                    mapped_at_creation: false,
                })
            });
            if err.is_some() {
                return Err(DeviceError::OutOfMemory { what: "buffer storage" });
            }
            if let Some(old) = slot.raw.replace(raw) {
                old.destroy();
            }
            slot.capacity = capacity;
        }

        slot.len = data.len() as u64;
        if let Some(raw) = slot.raw.as_ref() {
            write_padded(&self.queue, raw, 0, data);
        }
        Ok(())
    }

    fn buffer_sub_data(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let slot = self
            .buffers
            .get(&id)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer", id: id.raw() })?;
        let end = offset + data.len() as u64;
        if end > slot.len {
            return Err(DeviceError::Validation(format!(
                "sub-range {offset}..{end} exceeds buffer size {}",
                slot.len
            )));
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(DeviceError::Validation(format!("offset {offset} is not 4-byte aligned")));
        }
        if let Some(raw) = slot.raw.as_ref() {
            write_padded(&self.queue, raw, offset, data);
        }
        Ok(())
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayId, DeviceError> {
        let id = VertexArrayId(self.alloc_id());
        self.vertex_arrays.insert(id, VertexArraySlot::default());
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
        self.bound_vertex_array = id;
    }

    fn vertex_attrib_pointer(&mut self, pointer: AttribPointer) -> Result<(), DeviceError> {
        pipeline::vertex_format(&pointer)?;
        let buffer = self
            .bound_vertex_buffer
            .ok_or_else(|| DeviceError::Validation("no vertex buffer bound".into()))?;
        let vao = self.bound_vertex_array_mut()?;
        vao.attributes.insert(pointer.location, (pointer, buffer, false));
        Ok(())
    }

    fn set_attribute_enabled(&mut self, location: u32, enabled: bool) -> Result<(), DeviceError> {
        let vao = self.bound_vertex_array_mut()?;
        let attr = vao.attributes.get_mut(&location).ok_or_else(|| {
            DeviceError::Validation(format!("attribute {location} is not registered"))
        })?;
        attr.2 = enabled;
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
        let limit = self.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(DeviceError::Validation(format!(
                "texture size {width}x{height} exceeds device limit {limit}"
            )));
        }
        let slot = upload_texture(&self.device, &self.queue, width, height, rgba);
        let id = TextureId(self.alloc_id());
        self.textures.insert(id, slot);
        Ok(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        match self.textures.remove(&id) {
            Some(slot) => slot.texture.destroy(),
            None => self.record_error(DeviceError::InvalidHandle { kind: "texture", id: id.raw() }),
        }
        for unit in self.texture_units.iter_mut() {
            if *unit == Some(id) {
                *unit = None;
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, id: TextureId) {
        if unit >= self.max_texture_units || !self.textures.contains_key(&id) {
            self.record_error(DeviceError::InvalidHandle { kind: "texture", id: id.raw() });
            return;
        }
        self.texture_units[unit as usize] = Some(id);
    }

    fn create_program(&mut self, source: &str) -> Result<ProgramId, DeviceError> {
        let device = &self.device;
        let (module, err) = capture_validation(device, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("strata shader"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        if let Some(err) = err {
            return Err(DeviceError::ShaderCompilation(err.to_string()));
        }

        let ubo = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("strata uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let id = ProgramId(self.alloc_id());
        self.programs.insert(
            id,
            ProgramSlot { module, uniforms: Uniforms::default(), ubo, dirty: true },
        );
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        match self.programs.remove(&id) {
            Some(slot) => slot.ubo.destroy(),
            None => self.record_error(DeviceError::InvalidHandle { kind: "program", id: id.raw() }),
        }
        self.pipelines.retain(|key, _| key.program != id);
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
        let slot = self
            .programs
            .get_mut(&program)
            .ok_or(DeviceError::InvalidHandle { kind: "program", id: program.raw() })?;

        match (name, value) {
            (Shader::PROJECTION, UniformValue::Mat4(m)) => slot.uniforms.projection = *m,
            (Shader::VIEW, UniformValue::Mat4(m)) => slot.uniforms.view = *m,
            (Shader::TEXTURES, UniformValue::IntArray(units)) => {
                if units.len() > MAX_TEXTURE_UNITS as usize {
                    return Err(DeviceError::Validation(format!(
                        "{} texture units exceed the limit of {MAX_TEXTURE_UNITS}",
                        units.len()
                    )));
                }
                slot.uniforms.set_texture_units(units);
            }
            (Shader::PROJECTION | Shader::VIEW | Shader::TEXTURES, other) => {
                return Err(DeviceError::Validation(format!(
                    "uniform `{name}` cannot hold {other:?}"
                )));
            }
            _ => return Err(DeviceError::UnknownUniform { name: name.to_string() }),
        }
        slot.dirty = true;
        Ok(())
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<(FramebufferId, TextureId), DeviceError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(DeviceError::Validation(format!(
                "framebuffer size {width}x{height} exceeds device limit {limit}"
            )));
        }
        let device = &self.device;
        let color_format = self.color_format;
        let ((texture, depth), err) = capture_out_of_memory(device, || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("strata framebuffer color"),
                size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: color_format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            (texture, pipeline::depth_texture(device, width, height))
        });
        if err.is_some() {
            texture.destroy();
            depth.destroy();
            return Err(DeviceError::OutOfMemory { what: "framebuffer attachments" });
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let target = FrameTarget {
            color: view.clone(),
            depth: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        };
        let color = TextureId(self.alloc_id());
        self.textures.insert(color, TextureSlot { texture, view });
        let id = FramebufferId(self.alloc_id());
        self.framebuffers.insert(id, FramebufferSlot { color, depth, target });
        Ok((id, color))
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        let Some(slot) = self.framebuffers.remove(&id) else {
            self.record_error(DeviceError::InvalidHandle { kind: "framebuffer", id: id.raw() });
            return;
        };
        slot.depth.destroy();
        self.delete_texture(slot.color);
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
        let target = self.current_target()?;
        let device = &self.device;
        let queue = &self.queue;

        let ((), err) = capture_validation(device, || {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strata clear encoder"),
            });
            {
                let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("strata clear pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.color,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: f64::from(color.r()),
                                g: f64::from(color.g()),
                                b: f64::from(color.b()),
                                a: f64::from(color.a()),
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &target.depth,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });
            }
            queue.submit(std::iter::once(encoder.finish()));
        });
        match err {
            Some(err) => Err(DeviceError::Validation(err.to_string())),
            None => Ok(()),
        }
    }

    fn set_pipeline_state(&mut self, state: PipelineState) {
        self.state = state;
    }

    fn draw(&mut self, cmd: DrawCommand) {
        if let Err(err) = self.try_draw(cmd) {
            self.record_error(err);
        }
    }

    fn take_error(&mut self) -> Option<DeviceError> {
        self.pending_error.take()
    }
}

fn padded_len(len: u64) -> u64 {
    len.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

/// `write_buffer` needs a 4-byte multiple; pad the tail with zeros.
fn write_padded(queue: &wgpu::Queue, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
        queue.write_buffer(buffer, offset, data);
    } else {
        let mut padded = data.to_vec();
        padded.resize(padded_len(data.len() as u64) as usize, 0);
        queue.write_buffer(buffer, offset, &padded);
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> TextureSlot {
    let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("strata texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    TextureSlot { texture, view }
}

/// Vertices or indices read by one draw.
enum DrawSpan<'a> {
    Vertices(Range<u32>),
    Indices(&'a wgpu::Buffer, Range<u32>),
}

fn capture_validation<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    capture(device, wgpu::ErrorFilter::Validation, f)
}

fn capture_out_of_memory<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    capture(device, wgpu::ErrorFilter::OutOfMemory, f)
}

/// Runs `f` inside an error scope and waits for the scope's verdict.
fn capture<T>(
    device: &wgpu::Device,
    filter: wgpu::ErrorFilter,
    f: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    let scope = device.push_error_scope(filter);
    let value = f();
    let err = pollster::block_on(scope.pop());
    (value, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{ElementType, Topology};

    const MESH_SHADER: &str = include_str!("../../shaders/mesh.wgsl");

    /// Device on whatever adapter the machine has; `None` skips GPU tests.
    fn device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default())).ok()?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()
    }

    fn target(device: &wgpu::Device, format: wgpu::TextureFormat) -> FrameTarget {
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d { width: 4, height: 4, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        FrameTarget {
            color: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth: pipeline::depth_texture(device, 4, 4)
                .create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }

    /// Mesh program with one triangle bound: position, color, translation, scale, rotation.
    fn triangle_setup(backend: &mut WgpuBackend) {
        let program = backend.create_program(MESH_SHADER).unwrap();
        let buffer = backend.create_buffer(BufferKind::Vertex).unwrap();
        backend.bind_buffer(BufferKind::Vertex, Some(buffer));
        let vertex = [0.0f32, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let vertices: Vec<f32> = vertex.iter().copied().cycle().take(vertex.len() * 3).collect();
        backend
            .buffer_data(buffer, bytemuck::cast_slice(&vertices), BufferUsage::STREAM_DRAW)
            .unwrap();

        let vao = backend.create_vertex_array().unwrap();
        backend.bind_vertex_array(Some(vao));
        let mut offset = 0;
        for (location, components) in [2u32, 4, 2, 2, 1].into_iter().enumerate() {
            let pointer = AttribPointer {
                location: location as u32,
                components,
                element: ElementType::Float,
                stride: 44,
                offset,
            };
            backend.vertex_attrib_pointer(pointer).unwrap();
            backend.set_attribute_enabled(pointer.location, true).unwrap();
            offset += components * 4;
        }
        backend.use_program(Some(program));
    }

    const TRIANGLE: DrawCommand = DrawCommand::Arrays { topology: Topology::Triangles, first: 0, count: 3 };

    #[test]
    fn draw_into_framebuffer_succeeds() {
        let Some((device, queue)) = device() else { return };
        let mut backend = WgpuBackend::new(device, queue, wgpu::TextureFormat::Rgba8Unorm);
        triangle_setup(&mut backend);

        let (fb, _) = backend.create_framebuffer(16, 16).unwrap();
        backend.bind_framebuffer(Some(fb));
        backend.clear(Color::BLACK).unwrap();
        backend.draw(TRIANGLE);
        assert!(backend.take_error().is_none());
    }

    #[test]
    fn pass_validation_failure_is_reported() {
        let Some((device, queue)) = device() else { return };
        let mut backend = WgpuBackend::new(device.clone(), queue, wgpu::TextureFormat::Rgba8Unorm);
        triangle_setup(&mut backend);

        // The attachment format disagrees with the pipeline; only the pass
        // encoding notices.
        backend.set_target(Some(target(&device, wgpu::TextureFormat::Rgba16Float)));
        backend.draw(TRIANGLE);
        assert!(matches!(backend.take_error(), Some(DeviceError::Validation(_))));
    }

    #[test]
    fn framebuffer_texture_cannot_be_sampled_while_bound() {
        let Some((device, queue)) = device() else { return };
        let mut backend = WgpuBackend::new(device, queue, wgpu::TextureFormat::Rgba8Unorm);
        triangle_setup(&mut backend);

        let (fb, color) = backend.create_framebuffer(8, 8).unwrap();
        backend.bind_texture(0, color);
        backend.bind_framebuffer(Some(fb));
        backend.draw(TRIANGLE);
        assert!(matches!(backend.take_error(), Some(DeviceError::Validation(_))));

        backend.delete_framebuffer(fb);
        assert!(backend.take_error().is_none());
        assert!(matches!(backend.current_target(), Err(DeviceError::NoRenderTarget)));
    }
}
