//! Contract between the window runtime and applications.
//!
//! Applications implement [`App`] and receive a [`FrameCtx`] once per frame,
//! which hands out the rendering context for the window being drawn.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
