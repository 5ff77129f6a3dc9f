//! Pipeline construction for [`WgpuBackend`](super::WgpuBackend).
//!
//! Every program shares one bind group layout:
//! - binding 0: [`Uniforms`] block
//! - binding 1: sampler
//! - bindings 2..2+[`MAX_TEXTURE_UNITS`]: one `texture_2d<f32>` per unit

use bytemuck::{Pod, Zeroable};

use crate::gfx::{AttribPointer, DepthFunc, DeviceError, ElementType, ProgramId, Topology};

pub const MAX_TEXTURE_UNITS: u32 = 8;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const TEXTURE_BINDING_BASE: u32 = 2;

/// CPU mirror of the uniform block every program declares at binding 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Uniforms {
    pub projection: [f32; 16],
    pub view: [f32; 16],
    /// Slot → unit table, four entries per `vec4<i32>`.
    pub texture_units: [[i32; 4]; 2],
}

impl Default for Uniforms {
    fn default() -> Self {
        let identity = glam::Mat4::IDENTITY.to_cols_array();
        Self {
            projection: identity,
            view: identity,
            texture_units: [[0; 4]; 2],
        }
    }
}

impl Uniforms {
    pub fn set_texture_units(&mut self, units: &[i32]) {
        self.texture_units = [[0; 4]; 2];
        for (i, &unit) in units.iter().take(MAX_TEXTURE_UNITS as usize).enumerate() {
            self.texture_units[i / 4][i % 4] = unit;
        }
    }
}

/// Everything that forces a distinct `wgpu::RenderPipeline`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramId,
    pub topology: Topology,
    pub attributes: Vec<AttribPointer>,
    pub depth: Option<DepthFunc>,
    pub blending: bool,
}

pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ];
    for unit in 0..MAX_TEXTURE_UNITS {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: TEXTURE_BINDING_BASE + unit,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("strata batch bgl"),
        entries: &entries,
    })
}

pub fn bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    units: &[&wgpu::TextureView],
) -> wgpu::BindGroup {
    let mut entries = vec![
        wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() },
        wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
    ];
    for (unit, view) in units.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: TEXTURE_BINDING_BASE + unit as u32,
            resource: wgpu::BindingResource::TextureView(view),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("strata batch bind group"),
        layout,
        entries: &entries,
    })
}

pub fn vertex_format(pointer: &AttribPointer) -> Result<wgpu::VertexFormat, DeviceError> {
    use wgpu::VertexFormat as V;
    let format = match (pointer.element, pointer.components) {
        (ElementType::Float, 1) => V::Float32,
        (ElementType::Float, 2) => V::Float32x2,
        (ElementType::Float, 3) => V::Float32x3,
        (ElementType::Float, 4) => V::Float32x4,
        (ElementType::Int, 1) => V::Sint32,
        (ElementType::Int, 2) => V::Sint32x2,
        (ElementType::Int, 3) => V::Sint32x3,
        (ElementType::Int, 4) => V::Sint32x4,
        (ElementType::Uint, 1) => V::Uint32,
        (ElementType::Uint, 2) => V::Uint32x2,
        (ElementType::Uint, 3) => V::Uint32x3,
        (ElementType::Uint, 4) => V::Uint32x4,
        (_, n) => {
            return Err(DeviceError::Validation(format!(
                "attribute {} has {n} components",
                pointer.location
            )));
        }
    };
    Ok(format)
}

/// Depth attachment of `width` × `height` (clamped to at least 1×1).
pub fn depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("strata depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

fn compare(depth: Option<DepthFunc>) -> wgpu::CompareFunction {
    match depth {
        Some(DepthFunc::Less) => wgpu::CompareFunction::Less,
        Some(DepthFunc::LessEqual) => wgpu::CompareFunction::LessEqual,
        Some(DepthFunc::Always) | None => wgpu::CompareFunction::Always,
    }
}

pub fn create(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    key: &PipelineKey,
) -> Result<wgpu::RenderPipeline, DeviceError> {
    let attributes = key
        .attributes
        .iter()
        .map(|p| {
            Ok(wgpu::VertexAttribute {
                format: vertex_format(p)?,
                offset: u64::from(p.offset),
                shader_location: p.location,
            })
        })
        .collect::<Result<Vec<_>, DeviceError>>()?;
    let stride = key.attributes.first().map(|p| p.stride).unwrap_or(0);

    let vertex_buffers = [wgpu::VertexBufferLayout {
        array_stride: u64::from(stride),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];

    let topology = match key.topology {
        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
    };

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("strata batch pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &vertex_buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: key.blending.then_some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth.is_some(),
            depth_compare: compare(key.depth),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_matches_wgsl_size() {
        // mat4x4 + mat4x4 + array<vec4<i32>, 2>
        assert_eq!(std::mem::size_of::<Uniforms>(), 64 + 64 + 32);
    }

    #[test]
    fn texture_units_pack_four_per_vector() {
        let mut u = Uniforms::default();
        u.set_texture_units(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(u.texture_units, [[0, 1, 2, 3], [4, 5, 0, 0]]);
    }

    #[test]
    fn formats_follow_element_type() {
        let p = AttribPointer {
            location: 0,
            components: 3,
            element: ElementType::Uint,
            stride: 12,
            offset: 0,
        };
        assert_eq!(vertex_format(&p).unwrap(), wgpu::VertexFormat::Uint32x3);
        assert!(vertex_format(&AttribPointer { components: 5, ..p }).is_err());
    }
}
