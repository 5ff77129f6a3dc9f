use thiserror::Error;

use super::parse;
use super::types::TypeInfo;
use crate::gfx::{AttribPointer, Backend, Context, DeviceError, ElementType, GpuBuffer, VertexArray};

/// Why a vertex layout could not be derived from shader source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("line {line}: malformed attribute declaration `{text}`")]
    Malformed { line: usize, text: String },

    #[error("line {line}: unknown attribute type `{ty}`")]
    UnknownType { line: usize, ty: String },

    #[error("attribute location {location} is declared more than once")]
    DuplicateLocation { location: u32 },

    #[error("vertex input struct `{name}` not found")]
    UnknownStruct { name: String },

    #[error("shader has no @vertex entry point")]
    MissingEntryPoint,
}

/// One vertex shader input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    pub location: u32,
    pub ty: TypeInfo,
}

impl VertexAttribute {
    pub fn new(name: impl Into<String>, location: u32, ty: TypeInfo) -> Self {
        Self { name: name.into(), location, ty }
    }

    /// Number of 4-byte values the attribute occupies in a vertex.
    #[inline]
    pub fn size(&self) -> u32 {
        self.ty.components * self.ty.columns
    }

    #[inline]
    pub fn bytes(&self) -> u32 {
        self.ty.bytes()
    }

    #[inline]
    pub fn element(&self) -> ElementType {
        self.ty.element
    }

    /// Locations covered by this attribute; matrices take one per column.
    fn locations(&self) -> std::ops::Range<u32> {
        self.location..self.location + self.ty.columns
    }
}

/// Interleaved vertex layout of a shader.
///
/// Attributes are ordered by location regardless of declaration order; each
/// attribute starts where the previous one ends and all share one stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    pub fn new(mut attributes: Vec<VertexAttribute>) -> Result<Self, LayoutError> {
        attributes.sort_by_key(|a| a.location);

        let mut covered: Vec<u32> = Vec::new();
        for attr in &attributes {
            for location in attr.locations() {
                if covered.contains(&location) {
                    return Err(LayoutError::DuplicateLocation { location });
                }
                covered.push(location);
            }
        }

        let stride = attributes.iter().map(VertexAttribute::bytes).sum();
        Ok(Self { attributes, stride })
    }

    /// Derives the layout from the `@vertex` entry point of a WGSL module.
    pub fn from_wgsl(source: &str) -> Result<Self, LayoutError> {
        Self::new(parse::vertex_inputs(source)?)
    }

    #[inline]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Bytes per vertex.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// 4-byte values per vertex.
    pub fn float_count(&self) -> u32 {
        self.attributes.iter().map(VertexAttribute::size).sum()
    }

    /// Byte offset of the attribute at `index` (in location order).
    pub fn offset(&self, index: usize) -> u32 {
        self.attributes[..index].iter().map(VertexAttribute::bytes).sum()
    }

    /// Attribute pointers in location order, matrices expanded per column.
    pub fn pointers(&self) -> Vec<AttribPointer> {
        let mut out = Vec::new();
        let mut offset = 0;
        for attr in &self.attributes {
            let column_bytes = attr.ty.components * attr.element().size();
            for (i, location) in attr.locations().enumerate() {
                out.push(AttribPointer {
                    location,
                    components: attr.ty.components,
                    element: attr.element(),
                    stride: self.stride,
                    offset: offset + i as u32 * column_bytes,
                });
            }
            offset += attr.bytes();
        }
        out
    }

    /// Registers every attribute of this layout on `vertex_array`, sourcing `buffer`.
    pub fn configure<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        vertex_array: &VertexArray,
        buffer: &GpuBuffer,
    ) -> Result<(), DeviceError> {
        vertex_array.bind(ctx);
        buffer.bind(ctx);
        for pointer in self.pointers() {
            vertex_array.vertex_attrib_pointer(ctx, pointer)?;
        }
        Ok(())
    }

    pub fn enable<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        vertex_array: &VertexArray,
    ) -> Result<(), DeviceError> {
        for pointer in self.pointers() {
            vertex_array.enable_attribute(ctx, pointer.location)?;
        }
        Ok(())
    }

    pub fn disable<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        vertex_array: &VertexArray,
    ) -> Result<(), DeviceError> {
        for pointer in self.pointers() {
            vertex_array.disable_attribute(ctx, pointer.location)?;
        }
        Ok(())
    }
}
