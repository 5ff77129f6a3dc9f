use super::{Backend, Context, DeviceError, TextureId};

/// RGBA8 texture owned by the caller.
///
/// Batches only ever hold the [`TextureId`]; the texture must outlive any
/// batch flush that samples it.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
}

impl Texture {
    /// Uploads tightly packed RGBA8 rows, top row first.
    pub fn from_rgba8<B: Backend>(
        ctx: &mut Context<B>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::Validation(format!(
                "texture size {width}x{height} is empty"
            )));
        }
        let id = ctx.backend_mut().create_texture(width, height, pixels)?;
        log::debug!("Texture::from_rgba8: {} ({width}x{height})", id.raw());
        Ok(Self { id, width, height })
    }

    /// Wraps a texture the device created on the caller's behalf.
    pub(crate) fn from_raw(id: TextureId, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bind_to_slot<B: Backend>(&self, ctx: &mut Context<B>, unit: u32) {
        ctx.backend_mut().bind_texture(unit, self.id);
    }

    pub fn dispose<B: Backend>(self, ctx: &mut Context<B>) {
        ctx.backend_mut().delete_texture(self.id);
    }
}

/// Rectangle of a texture expressed as four corner UVs.
///
/// Texture space has `v = 0` on the first pixel row. Corners are named for
/// where they land on screen, so the lower-left corner samples the bottom of
/// the region.
#[derive(Debug, Copy, Clone)]
pub struct TextureRegion<'t> {
    texture: &'t Texture,
    /// Lower-left, lower-right, upper-left, upper-right.
    uvs: [[f32; 2]; 4],
}

impl<'t> TextureRegion<'t> {
    pub fn full(texture: &'t Texture) -> Self {
        Self::from_uv_rect(texture, 0.0, 0.0, 1.0, 1.0)
    }

    /// Region whose top-left corner is `(u, v)`, spanning `w` by `h` in UV units.
    pub fn from_uv_rect(texture: &'t Texture, u: f32, v: f32, w: f32, h: f32) -> Self {
        Self {
            texture,
            uvs: [[u, v + h], [u + w, v + h], [u, v], [u + w, v]],
        }
    }

    /// Region in pixels, `(x, y)` being the top-left pixel.
    pub fn from_pixels(texture: &'t Texture, x: u32, y: u32, w: u32, h: u32) -> Self {
        let tw = texture.width() as f32;
        let th = texture.height() as f32;
        Self::from_uv_rect(
            texture,
            x as f32 / tw,
            y as f32 / th,
            w as f32 / tw,
            h as f32 / th,
        )
    }

    /// Explicit corners `[llu, llv, lru, lrv, ulu, ulv, uru, urv]`, clamped to `[0, 1]`.
    pub fn from_uvs(texture: &'t Texture, uvs: [f32; 8]) -> Self {
        let c = uvs.map(|x| x.clamp(0.0, 1.0));
        Self {
            texture,
            uvs: [[c[0], c[1]], [c[2], c[3]], [c[4], c[5]], [c[6], c[7]]],
        }
    }

    #[inline]
    pub fn texture(&self) -> &'t Texture {
        self.texture
    }

    #[inline]
    pub fn uvs(&self) -> [[f32; 2]; 4] {
        self.uvs
    }

    #[inline]
    pub fn lower_left(&self) -> [f32; 2] {
        self.uvs[0]
    }

    #[inline]
    pub fn lower_right(&self) -> [f32; 2] {
        self.uvs[1]
    }

    #[inline]
    pub fn upper_left(&self) -> [f32; 2] {
        self.uvs[2]
    }

    #[inline]
    pub fn upper_right(&self) -> [f32; 2] {
        self.uvs[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::HeadlessBackend;

    fn texture(ctx: &mut Context<HeadlessBackend>, w: u32, h: u32) -> Texture {
        Texture::from_rgba8(ctx, w, h, &vec![255; (w * h * 4) as usize]).unwrap()
    }

    #[test]
    fn pixel_region_normalizes() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let tex = texture(&mut ctx, 64, 32);

        let region = TextureRegion::from_pixels(&tex, 16, 8, 32, 16);
        assert_eq!(region.upper_left(), [0.25, 0.25]);
        assert_eq!(region.lower_right(), [0.75, 0.75]);
    }

    #[test]
    fn full_region_maps_first_row_to_top() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let tex = texture(&mut ctx, 2, 2);

        let region = TextureRegion::full(&tex);
        assert_eq!(region.uvs(), [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn explicit_uvs_are_clamped() {
        let mut ctx = Context::new(HeadlessBackend::new());
        let tex = texture(&mut ctx, 1, 1);

        let region = TextureRegion::from_uvs(&tex, [-0.5, 0.0, 1.5, 0.0, 0.0, 1.0, 1.0, 2.0]);
        assert_eq!(region.lower_left(), [0.0, 0.0]);
        assert_eq!(region.lower_right(), [1.0, 0.0]);
        assert_eq!(region.upper_right(), [1.0, 1.0]);
    }

    #[test]
    fn pixel_size_mismatch_is_rejected() {
        let mut ctx = Context::new(HeadlessBackend::new());
        assert!(Texture::from_rgba8(&mut ctx, 2, 2, &[0; 4]).is_err());
        assert!(Texture::from_rgba8(&mut ctx, 0, 2, &[]).is_err());
    }
}
