use bytemuck::Pod;

use super::{Backend, BufferId, BufferKind, BufferUsage, Context, DeviceError};

/// One device buffer.
///
/// Carries no vertex semantics: callers decide what the bytes mean. The
/// handle is released by [`dispose`](GpuBuffer::dispose), which consumes the
/// value so it cannot run twice.
#[derive(Debug)]
pub struct GpuBuffer {
    id: BufferId,
    kind: BufferKind,
    /// Bytes of the last full upload.
    len: u64,
}

impl GpuBuffer {
    pub fn new<B: Backend>(ctx: &mut Context<B>, kind: BufferKind) -> Result<Self, DeviceError> {
        let id = ctx.backend_mut().create_buffer(kind)?;
        log::debug!("GpuBuffer::new: {kind:?} buffer {}", id.raw());
        Ok(Self { id, kind, len: 0 })
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Size in bytes of the current contents.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bind<B: Backend>(&self, ctx: &mut Context<B>) {
        ctx.backend_mut().bind_buffer(self.kind, Some(self.id));
    }

    pub fn unbind<B: Backend>(&self, ctx: &mut Context<B>) {
        ctx.backend_mut().bind_buffer(self.kind, None);
    }

    /// Replaces the entire contents, sized to `data`.
    pub fn upload<B: Backend, T: Pod>(
        &mut self,
        ctx: &mut Context<B>,
        data: &[T],
        usage: BufferUsage,
    ) -> Result<(), DeviceError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        ctx.backend_mut().buffer_data(self.id, bytes, usage)?;
        self.len = bytes.len() as u64;
        Ok(())
    }

    /// Overwrites part of the contents starting at `byte_offset`.
    pub fn update_range<B: Backend, T: Pod>(
        &mut self,
        ctx: &mut Context<B>,
        data: &[T],
        byte_offset: u64,
    ) -> Result<(), DeviceError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        ctx.backend_mut().buffer_sub_data(self.id, byte_offset, bytes)
    }

    pub fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        ctx.backend_mut().delete_buffer(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::HeadlessBackend;

    #[test]
    fn upload_replaces_and_update_overwrites() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let mut buffer = GpuBuffer::new(&mut ctx, BufferKind::Vertex).unwrap();

        buffer.upload(&mut ctx, &[1.0f32, 2.0, 3.0], BufferUsage::DYNAMIC_DRAW).unwrap();
        buffer.update_range(&mut ctx, &[9.0f32], 4).unwrap();

        assert_eq!(buffer.len(), 12);
        let stored = ctx.backend().buffer(buffer.id()).unwrap();
        assert_eq!(stored.usage, Some(BufferUsage::DYNAMIC_DRAW));
        let floats: Vec<f32> = stored
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(floats, vec![1.0, 9.0, 3.0]);
    }

    #[test]
    fn out_of_memory_propagates() {
        let mut ctx = Context::new(HeadlessBackend::new().with_memory_limit(4));
        let mut buffer = GpuBuffer::new(&mut ctx, BufferKind::Vertex).unwrap();

        let err = buffer
            .upload(&mut ctx, &[0u32; 4], BufferUsage::STATIC_DRAW)
            .unwrap_err();
        assert!(matches!(err, DeviceError::OutOfMemory { .. }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn dispose_releases_handle() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let buffer = GpuBuffer::new(&mut ctx, BufferKind::Index).unwrap();
        assert_eq!(ctx.backend().live_buffers(), 1);

        buffer.dispose(&mut ctx);
        assert_eq!(ctx.backend().live_buffers(), 0);
        assert!(ctx.backend_mut().take_error().is_none());
    }
}
