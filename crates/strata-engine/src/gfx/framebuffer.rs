use super::{Backend, Context, DeviceError, FramebufferId, Texture};
use crate::paint::Color;

/// Offscreen render target.
///
/// Draws issued while the framebuffer is bound land in its color texture,
/// which batches can then sample like any other [`Texture`] once the
/// framebuffer is unbound.
#[derive(Debug)]
pub struct FrameBuffer {
    id: FramebufferId,
    texture: Texture,
}

impl FrameBuffer {
    pub fn new<B: Backend>(ctx: &mut Context<B>, width: u32, height: u32) -> Result<Self, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::Validation(format!(
                "framebuffer size {width}x{height} is empty"
            )));
        }
        let (id, texture) = ctx.backend_mut().create_framebuffer(width, height)?;
        log::debug!("FrameBuffer::new: {} ({width}x{height}, texture {})", id.raw(), texture.raw());
        Ok(Self { id, texture: Texture::from_raw(texture, width, height) })
    }

    #[inline]
    pub fn id(&self) -> FramebufferId {
        self.id
    }

    /// Color attachment. Valid until the framebuffer is disposed.
    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn is_bound<B: Backend>(&self, ctx: &Context<B>) -> bool {
        ctx.bound_framebuffer() == Some(self.id)
    }

    pub fn bind<B: Backend>(&self, ctx: &mut Context<B>) {
        ctx.bind_framebuffer(Some(self.id));
    }

    /// Restores the default target if this framebuffer is the current one.
    pub fn unbind<B: Backend>(&self, ctx: &mut Context<B>) {
        if self.is_bound(ctx) {
            ctx.bind_framebuffer(None);
        }
    }

    /// Binds the framebuffer and clears its color and depth.
    pub fn clear<B: Backend>(&self, ctx: &mut Context<B>, color: Color) -> Result<(), DeviceError> {
        self.bind(ctx);
        ctx.backend_mut().clear(color)
    }

    /// Releases the framebuffer and its color texture.
    pub fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        ctx.forget_framebuffer(self.id);
        ctx.backend_mut().delete_framebuffer(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Batch, BatchConfig, RenderBatch};
    use crate::gfx::{HeadlessBackend, TextureRegion};

    fn ctx() -> Context<HeadlessBackend> {
        Context::new(HeadlessBackend::new())
    }

    #[test]
    fn rejects_empty_size() {
        let mut ctx = ctx();
        assert!(matches!(FrameBuffer::new(&mut ctx, 0, 16), Err(DeviceError::Validation(_))));
        assert_eq!(ctx.backend().live_framebuffers(), 0);
    }

    #[test]
    fn bind_routes_draws_until_unbound() {
        let mut ctx = ctx();
        let fb = FrameBuffer::new(&mut ctx, 64, 32).unwrap();
        assert_eq!((fb.texture().width(), fb.texture().height()), (64, 32));

        fb.clear(&mut ctx, Color::BLACK).unwrap();
        assert!(fb.is_bound(&ctx));

        let mut batch = RenderBatch::new(&mut ctx, BatchConfig::default()).unwrap();
        batch.begin().unwrap();
        batch.quad_rect(0.0, 0.0, 1.0, 1.0).unwrap();
        batch.end(&mut ctx).unwrap();

        fb.unbind(&mut ctx);
        assert_eq!(ctx.bound_framebuffer(), None);

        batch.begin().unwrap();
        batch.texture_region(&TextureRegion::full(fb.texture()), 0.0, 0.0, 1.0, 1.0).unwrap();
        batch.end(&mut ctx).unwrap();

        let draws = ctx.backend().draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].framebuffer, Some(fb.id()));
        assert_eq!(draws[1].framebuffer, None);
        assert_eq!(draws[1].textures, vec![(0, fb.texture().id())]);
        assert_eq!(ctx.backend().clears(), &[(Some(fb.id()), Color::BLACK)]);
    }

    #[test]
    fn sampling_own_texture_while_bound_fails() {
        let mut ctx = ctx();
        let fb = FrameBuffer::new(&mut ctx, 8, 8).unwrap();
        let mut batch = RenderBatch::new(&mut ctx, BatchConfig::default()).unwrap();

        fb.bind(&mut ctx);
        batch.begin().unwrap();
        batch.texture(fb.texture(), 0.0, 0.0).unwrap();
        let err = batch.end(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("framebuffer"), "{err}");
    }

    #[test]
    fn dispose_releases_texture_and_binding() {
        let mut ctx = ctx();
        let fb = FrameBuffer::new(&mut ctx, 8, 8).unwrap();
        fb.bind(&mut ctx);
        assert_eq!(ctx.backend().live_textures(), 1);

        fb.dispose(&mut ctx);
        assert_eq!(ctx.bound_framebuffer(), None);
        assert_eq!(ctx.backend().live_framebuffers(), 0);
        assert_eq!(ctx.backend().live_textures(), 0);
        assert!(ctx.check_error().is_ok());
    }
}
