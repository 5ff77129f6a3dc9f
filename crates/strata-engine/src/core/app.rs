use winit::event::WindowEvent;
use winit::window::WindowId;

use super::ctx::FrameCtx;
use crate::gfx::{Context, WgpuBackend};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by [`Runtime`](crate::window::Runtime).
pub trait App {
    /// Called for every window event before the runtime handles it.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// Called once per redraw per window.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called right before a window and its rendering context are destroyed,
    /// including at shutdown. Device resources created through `gfx` should be
    /// disposed here.
    fn on_window_closing(&mut self, window_id: WindowId, gfx: &mut Context<WgpuBackend>) {
        let _ = (window_id, gfx);
    }
}
