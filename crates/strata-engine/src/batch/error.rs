use thiserror::Error;

use crate::gfx::{DeviceError, ShaderError};

/// Errors returned by batch operations.
///
/// None of these are retried internally; the caller decides whether to skip
/// the frame or stop.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("begin() called while the batch is already recording")]
    AlreadyRecording,

    #[error("batch is not recording; call begin() first")]
    NotRecording,

    #[error("all {capacity} texture slots are in use")]
    TextureSlotsFull { capacity: u32 },

    #[error("no shader installed")]
    NoShader,

    #[error("shader vertex layout mismatch: expected {expected}, found {actual}")]
    LayoutMismatch { expected: u32, actual: u32 },

    #[error("mesh {mesh} has {floats} vertex floats, not a multiple of {per_vertex}")]
    MeshVertexData {
        mesh: usize,
        floats: usize,
        per_vertex: usize,
    },

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
