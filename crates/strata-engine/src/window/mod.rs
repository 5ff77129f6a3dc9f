//! Window + runtime loop.
//!
//! Owns the `winit` event loop and windows, and gives every window its own
//! GPU surface and rendering context.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
