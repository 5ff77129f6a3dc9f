use anyhow::{Context as _, Result};
use winit::window::{Window, WindowId};

use crate::device::{Gpu, SurfaceErrorAction};
use crate::gfx::{Backend, Context, WgpuBackend};
use crate::paint::Color;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

/// Per-window handles and window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Drawable size in physical pixels.
    pub fn physical_size(&self) -> (f32, f32) {
        let size = self.window.inner_size();
        (size.width as f32, size.height as f32)
    }

    pub fn logical_size(&self) -> (f32, f32) {
        let logical: winit::dpi::LogicalSize<f64> =
            self.window.inner_size().to_logical(self.window.scale_factor());
        (logical.width as f32, logical.height as f32)
    }
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window borrow carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub gfx: &'a mut Context<WgpuBackend>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl FrameCtx<'_, '_> {
    /// Acquires the next frame, clears color and depth, runs `draw` against the
    /// window's rendering context and presents.
    ///
    /// A minimized window or a transient surface error skips the frame and
    /// returns `Ok`. Errors from `draw` are returned after the frame has been
    /// presented.
    pub fn render<F>(&mut self, clear: Color, draw: F) -> Result<()>
    where
        F: FnOnce(&mut Context<WgpuBackend>) -> Result<()>,
    {
        if !self.gpu.is_drawable() {
            return Ok(());
        }

        let frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("FrameCtx::render: surface error: {err}");
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => Err(anyhow::anyhow!("surface is out of memory")),
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => Ok(()),
                };
            }
        };

        // Frames always start on the window target.
        self.gfx.bind_framebuffer(None);
        let backend = self.gfx.backend_mut();
        backend.set_target(Some(frame.target.clone()));
        let drawn = match backend.clear(clear).context("failed to clear frame") {
            Ok(()) => draw(&mut *self.gfx),
            Err(err) => Err(err),
        };
        self.gfx.backend_mut().set_target(None);

        self.window.window.pre_present_notify();
        self.gpu.present(frame);
        drawn
    }
}
