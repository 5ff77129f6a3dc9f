use thiserror::Error;

/// Errors reported by a [`Backend`](super::Backend).
///
/// Every variant is fatal for the current frame. Callers propagate them and
/// never retry the failed device call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    /// The device could not allocate memory for a resource.
    #[error("out of device memory while allocating {what}")]
    OutOfMemory { what: &'static str },

    /// The device rejected a call (bad state, bad range, bad pipeline).
    #[error("device validation failed: {0}")]
    Validation(String),

    /// A handle did not refer to a live resource.
    #[error("invalid {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    /// The bound program has no uniform with this name.
    #[error("unknown uniform `{name}`")]
    UnknownUniform { name: String },

    /// Shader source was rejected by the device compiler.
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// A draw was issued without a frame target to render into.
    #[error("draw issued without a render target")]
    NoRenderTarget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = DeviceError::OutOfMemory { what: "vertex buffer" };
        assert_eq!(err.to_string(), "out of device memory while allocating vertex buffer");

        let err = DeviceError::InvalidHandle { kind: "buffer", id: 7 };
        assert_eq!(err.to_string(), "invalid buffer handle 7");
    }
}
