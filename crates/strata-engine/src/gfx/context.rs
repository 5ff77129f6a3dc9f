use super::{Backend, DeviceError, FramebufferId, ProgramId, VertexArrayId};

/// Rendering context: a backend plus the binding state tracked on its behalf.
///
/// Every bind call goes through a `&mut Context`, so "what is currently bound"
/// is a property of the context value rather than process-wide state. One
/// context per window; it is not shared between threads.
#[derive(Debug)]
pub struct Context<B: Backend> {
    backend: B,
    bound_vertex_array: Option<VertexArrayId>,
    bound_program: Option<ProgramId>,
    bound_framebuffer: Option<FramebufferId>,
}

impl<B: Backend> Context<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            bound_vertex_array: None,
            bound_program: None,
            bound_framebuffer: None,
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    #[inline]
    pub fn max_texture_units(&self) -> u32 {
        self.backend.max_texture_units()
    }

    #[inline]
    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.bound_vertex_array
    }

    #[inline]
    pub fn bound_program(&self) -> Option<ProgramId> {
        self.bound_program
    }

    /// Framebuffer receiving draws; `None` is the default target.
    #[inline]
    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bound_framebuffer
    }

    /// Binds `id` unless it is already current.
    ///
    /// Returns `true` when a backend call was issued.
    pub fn bind_vertex_array(&mut self, id: Option<VertexArrayId>) -> bool {
        if self.bound_vertex_array == id {
            return false;
        }
        self.backend.bind_vertex_array(id);
        self.bound_vertex_array = id;
        true
    }

    /// Makes `id` the active program unless it already is.
    pub fn use_program(&mut self, id: Option<ProgramId>) -> bool {
        if self.bound_program == id {
            return false;
        }
        self.backend.use_program(id);
        self.bound_program = id;
        true
    }

    pub fn bind_framebuffer(&mut self, id: Option<FramebufferId>) -> bool {
        if self.bound_framebuffer == id {
            return false;
        }
        self.backend.bind_framebuffer(id);
        self.bound_framebuffer = id;
        true
    }

    /// Drops tracked references to a vertex array that is being deleted.
    pub(crate) fn forget_vertex_array(&mut self, id: VertexArrayId) {
        if self.bound_vertex_array == Some(id) {
            self.bound_vertex_array = None;
        }
    }

    pub(crate) fn forget_program(&mut self, id: ProgramId) {
        if self.bound_program == Some(id) {
            self.bound_program = None;
        }
    }

    pub(crate) fn forget_framebuffer(&mut self, id: FramebufferId) {
        if self.bound_framebuffer == Some(id) {
            self.bound_framebuffer = None;
        }
    }

    /// Polls the device and fails if it reports an error.
    pub fn check_error(&mut self) -> Result<(), DeviceError> {
        match self.backend.take_error() {
            Some(err) => {
                log::error!("device error: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }
}
