//! Crate-wide error type.
//!
//! Shape and size mismatches are *not* represented here: they are caller bugs and
//! every kernel panics on them with a descriptive message. This enum covers the
//! conditions a caller can reasonably react to: an accelerator that failed, a
//! kernel that is declared but deliberately not provided, a layer used out of
//! order, bad configuration, or a parameter snapshot that failed validation.

/// All recoverable errors produced by `briny_kernels`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A GEMM kernel name that is neither `blas` nor `asm`.
    #[error("unsupported gemm kernel `{0}` (expected `blas` or `asm`)")]
    UnsupportedKernel(String),

    /// A kernel that is part of the interface but has no implementation.
    #[error("kernel `{0}` is not implemented")]
    Unimplemented(&'static str),

    /// The accelerator could not run a kernel.
    #[cfg(feature = "wgpu")]
    #[error(transparent)]
    Gpu(#[from] crate::ops::wgpu::GpuFailure),

    /// A layer method was called in a state that does not allow it.
    #[error("layer is {state}, cannot {action}")]
    LayerState {
        /// Human readable name of the current state.
        state: &'static str,
        /// The attempted operation.
        action: &'static str,
    },

    /// Distribution parameters rejected by the sampler.
    #[error("invalid distribution parameters: {0}")]
    InvalidDistribution(String),

    /// Malformed configuration document.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Unknown device name in configuration or environment.
    #[error("unknown device `{0}`")]
    UnknownDevice(String),

    /// I/O failure while reading or writing a parameter snapshot.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A parameter snapshot failed integrity checks.
    #[error("snapshot validation failed: {0}")]
    Validation(&'static str),
}

/// Shorthand used across the crate.
pub type Result<T> = core::result::Result<T, Error>;
