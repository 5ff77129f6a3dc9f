use super::{AttribPointer, Backend, Context, DeviceError, VertexArrayId};

/// A set of attribute bindings, each reading from a vertex buffer.
///
/// Binding goes through [`Context`], so binding an array that is already
/// current costs nothing.
#[derive(Debug)]
pub struct VertexArray {
    id: VertexArrayId,
}

impl VertexArray {
    pub fn new<B: Backend>(ctx: &mut Context<B>) -> Result<Self, DeviceError> {
        let id = ctx.backend_mut().create_vertex_array()?;
        log::debug!("VertexArray::new: {}", id.raw());
        Ok(Self { id })
    }

    #[inline]
    pub fn id(&self) -> VertexArrayId {
        self.id
    }

    pub fn is_bound<B: Backend>(&self, ctx: &Context<B>) -> bool {
        ctx.bound_vertex_array() == Some(self.id)
    }

    pub fn bind<B: Backend>(&self, ctx: &mut Context<B>) {
        ctx.bind_vertex_array(Some(self.id));
    }

    /// Unbinds only when this array is the current one.
    pub fn unbind<B: Backend>(&self, ctx: &mut Context<B>) {
        if self.is_bound(ctx) {
            ctx.bind_vertex_array(None);
        }
    }

    /// Registers `pointer` against the bound vertex buffer and enables it.
    pub fn vertex_attrib_pointer<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        pointer: AttribPointer,
    ) -> Result<(), DeviceError> {
        self.bind(ctx);
        let backend = ctx.backend_mut();
        backend.vertex_attrib_pointer(pointer)?;
        backend.set_attribute_enabled(pointer.location, true)
    }

    pub fn enable_attribute<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        location: u32,
    ) -> Result<(), DeviceError> {
        self.bind(ctx);
        ctx.backend_mut().set_attribute_enabled(location, true)
    }

    pub fn disable_attribute<B: Backend>(
        &self,
        ctx: &mut Context<B>,
        location: u32,
    ) -> Result<(), DeviceError> {
        self.bind(ctx);
        ctx.backend_mut().set_attribute_enabled(location, false)
    }

    pub fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        ctx.forget_vertex_array(self.id);
        ctx.backend_mut().delete_vertex_array(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{BufferKind, ElementType, GpuBuffer, HeadlessBackend};

    #[test]
    fn bind_is_idempotent() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let vao = VertexArray::new(&mut ctx).unwrap();

        vao.bind(&mut ctx);
        vao.bind(&mut ctx);
        vao.bind(&mut ctx);

        assert_eq!(ctx.backend().vertex_array_binds(), 1);
        assert!(vao.is_bound(&ctx));
    }

    #[test]
    fn unbind_only_when_current() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let a = VertexArray::new(&mut ctx).unwrap();
        let b = VertexArray::new(&mut ctx).unwrap();

        a.bind(&mut ctx);
        b.unbind(&mut ctx);
        assert!(a.is_bound(&ctx));

        a.unbind(&mut ctx);
        assert_eq!(ctx.bound_vertex_array(), None);
        assert_eq!(ctx.backend().vertex_array_binds(), 2);
    }

    #[test]
    fn attribute_pointer_registers_enabled() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let vao = VertexArray::new(&mut ctx).unwrap();
        let vbo = GpuBuffer::new(&mut ctx, BufferKind::Vertex).unwrap();
        vbo.bind(&mut ctx);

        let pointer = AttribPointer {
            location: 2,
            components: 4,
            element: ElementType::Float,
            stride: 16,
            offset: 0,
        };
        vao.vertex_attrib_pointer(&mut ctx, pointer).unwrap();
        let attr = ctx.backend().vertex_array(vao.id()).unwrap().attributes[&2];
        assert!(attr.enabled);
        assert_eq!(attr.buffer, vbo.id());

        vao.disable_attribute(&mut ctx, 2).unwrap();
        assert!(!ctx.backend().vertex_array(vao.id()).unwrap().attributes[&2].enabled);
    }

    #[test]
    fn dispose_clears_bound_reference() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let vao = VertexArray::new(&mut ctx).unwrap();
        vao.bind(&mut ctx);

        vao.dispose(&mut ctx);

        assert_eq!(ctx.bound_vertex_array(), None);
        assert_eq!(ctx.backend().live_vertex_arrays(), 0);
        assert!(ctx.backend_mut().take_error().is_none());
    }
}
