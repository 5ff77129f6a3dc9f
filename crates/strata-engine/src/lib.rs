//! strata: immediate-mode 2D batch rendering on wgpu.
//!
//! - [`batch`]: `RenderBatch` (quads, triangles, lines) and `MeshBatch`
//! - [`gfx`]: the device seam (`Backend`, `Context`) with headless and wgpu backends,
//!   buffers, vertex arrays, shaders with introspected vertex layouts, textures,
//!   offscreen framebuffers
//! - [`math`], [`paint`]: camera, transform and color value types
//! - [`window`], [`core`], [`device`]: the winit/wgpu driver loop

pub mod batch;
pub mod core;
pub mod device;
pub mod gfx;
pub mod logging;
pub mod math;
pub mod paint;
pub mod time;
pub mod window;
