//! Shader programs and vertex input introspection.

mod layout;
mod parse;
pub mod types;

use glam::Mat4;
use thiserror::Error;

use super::{Backend, Context, DeviceError, ProgramId, UniformValue};

pub use layout::{LayoutError, VertexAttribute, VertexLayout};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Compiled program plus the vertex layout read from its source.
#[derive(Debug)]
pub struct Shader {
    program: ProgramId,
    layout: VertexLayout,
}

impl Shader {
    /// Projection matrix uniform.
    pub const PROJECTION: &'static str = "u_projection";
    /// View matrix uniform.
    pub const VIEW: &'static str = "u_view";
    /// Slot → texture unit table.
    pub const TEXTURES: &'static str = "u_textures";

    /// Reads the vertex layout from `source` and compiles it.
    pub fn new<B: Backend>(ctx: &mut Context<B>, source: &str) -> Result<Self, ShaderError> {
        let layout = VertexLayout::from_wgsl(source)?;
        let program = ctx.backend_mut().create_program(source)?;
        log::debug!(
            "Shader::new: program {} stride={} attributes={}",
            program.raw(),
            layout.stride(),
            layout.attributes().len()
        );
        Ok(Self { program, layout })
    }

    #[inline]
    pub fn id(&self) -> ProgramId {
        self.program
    }

    #[inline]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn bind<B: Backend>(&self, ctx: &mut Context<B>) {
        ctx.use_program(Some(self.program));
    }

    pub fn unbind<B: Backend>(&self, ctx: &mut Context<B>) {
        if ctx.bound_program() == Some(self.program) {
            ctx.use_program(None);
        }
    }

    pub fn upload_mat4<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        name: &str,
        value: &Mat4,
    ) -> Result<(), DeviceError> {
        let cols = value.to_cols_array();
        ctx.backend_mut()
            .set_uniform(self.program, name, UniformValue::Mat4(&cols))
    }

    pub fn upload_int_array<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        name: &str,
        values: &[i32],
    ) -> Result<(), DeviceError> {
        ctx.backend_mut()
            .set_uniform(self.program, name, UniformValue::IntArray(values))
    }

    pub fn upload_float<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        name: &str,
        value: f32,
    ) -> Result<(), DeviceError> {
        ctx.backend_mut()
            .set_uniform(self.program, name, UniformValue::Float(value))
    }

    pub fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        ctx.forget_program(self.program);
        ctx.backend_mut().delete_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{HeadlessBackend, UniformData};

    const SOURCE: &str = "@vertex\nfn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {\n    return vec4<f32>(pos, 0.0, 1.0);\n}\n";

    #[test]
    fn compiles_and_reads_layout() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let shader = Shader::new(&mut ctx, SOURCE).unwrap();

        assert_eq!(shader.layout().stride(), 8);
        shader.bind(&mut ctx);
        assert_eq!(ctx.bound_program(), Some(shader.id()));
    }

    #[test]
    fn layout_error_creates_no_program() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let err = Shader::new(&mut ctx, "fn f() {}").unwrap_err();

        assert!(matches!(err, ShaderError::Layout(LayoutError::MissingEntryPoint)));
        assert_eq!(ctx.backend().live_programs(), 0);
    }

    #[test]
    fn uniforms_reach_the_program() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let shader = Shader::new(&mut ctx, SOURCE).unwrap();
        let m = Mat4::from_scale(glam::Vec3::new(2.0, 3.0, 1.0));

        shader.upload_mat4(&mut ctx, Shader::PROJECTION, &m).unwrap();
        shader.upload_int_array(&mut ctx, Shader::TEXTURES, &[0, 1]).unwrap();

        let backend = ctx.backend();
        assert_eq!(
            backend.uniform(shader.id(), Shader::PROJECTION),
            Some(&UniformData::Mat4(m.to_cols_array()))
        );
        assert_eq!(
            backend.uniform(shader.id(), Shader::TEXTURES),
            Some(&UniformData::IntArray(vec![0, 1]))
        );
    }

    #[test]
    fn dispose_unbinds() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let shader = Shader::new(&mut ctx, SOURCE).unwrap();
        shader.bind(&mut ctx);

        shader.dispose(&mut ctx);
        assert_eq!(ctx.bound_program(), None);
        assert_eq!(ctx.backend().live_programs(), 0);
    }
}
