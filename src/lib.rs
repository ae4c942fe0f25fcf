//! briny_kernels: the numerical core of a small neural-network trainer.
//!
//! Every tensor operation a layer needs is expressed as a kernel on the
//! [`Backend`](backend::Backend) trait, with interchangeable implementations
//! for the host and for the GPU.
//!
//! # Features
//!
//! - Dense [`Tensor`](tensors::Tensor)s over `f32` or `f64`, row- or column-major.
//! - A host backend built on `rayon` and `matrixmultiply`, with two GEMM paths
//!   (`blas` and a packed `asm` kernel).
//! - An optional `wgpu` backend (feature `wgpu`) running WGSL compute shaders.
//! - A [`DispatchBackend`](ops::dispatch::DispatchBackend) that picks a device
//!   at runtime and falls back to the host when the accelerator fails.
//! - Activation, loss, filler and optimizer policies, and an
//!   [`Affine`](layers::Affine) layer composed from them.
//! - JSON [`config`] and `.bpat` parameter snapshots in [`modelio`].
//!
//! # Modules
//!
//! - [`tensors`]: the tensor container and `tensor!` macro.
//! - [`backend`]: the kernel trait, device selection and GEMM kernel names.
//! - [`ops`]: backend implementations.
//! - [`activation`], [`loss`], [`filler`], [`optim`]: policies.
//! - [`layers`]: the layer lifecycle and the affine layer.
//! - [`config`], [`modelio`], [`error`], [`random`].
//!
//! # Example
//!
//! ```rust
//! use briny_kernels::backend::{Backend, GemmKernel};
//! use briny_kernels::ops::cpu::CpuBackend;
//! use briny_kernels::tensor;
//! use briny_kernels::tensors::Tensor;
//!
//! let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
//! let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
//! let mut c = Tensor::zeros(vec![2, 2]);
//! CpuBackend
//!     .matrix_dot(&a, &b, false, false, 1.0, 0.0, &mut c, GemmKernel::Blas)
//!     .unwrap();
//! assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
//! ```
//!
//! ## Notes
//!
//! The library emits `tracing` events but never installs a subscriber.

#![deny(unsafe_code)]

pub mod activation;
pub mod backend;
pub mod config;
pub mod element;
pub mod error;
pub mod filler;
pub mod layers;
pub mod loss;
pub mod modelio;
pub mod ops;
pub mod optim;
pub mod random;
pub mod tensors;

pub use backend::{Backend, Device, GemmKernel, get_default_device, set_default_device};
pub use error::{Error, Result};
pub use tensors::{Layout, Tensor};
