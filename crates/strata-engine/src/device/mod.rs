//! GPU device and surface management.
//!
//! - creates the wgpu Instance/Adapter/Device/Queue
//! - configures the surface and a matching depth target
//! - acquires frames as [`FrameTarget`](crate::gfx::wgpu::FrameTarget)s

mod gpu;

pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
