//! Kernel Dispatch Layer
//!
//! [`DispatchBackend`] selects the device for each kernel at runtime and
//! routes the call to the matching [`Backend`] implementation.
//!
//! Each kernel is attempted in priority order:
//! 1. `Wgpu` (if selected and the `wgpu` feature is enabled)
//! 2. Falls back to `Cpu`
//!
//! # Design Highlights
//! - **Pluggable**: The accelerator is optional and feature-gated
//! - **Minimal overhead**: Returns immediately once a device succeeds
//! - **Fallback logic**: A GPU failure is logged with `tracing::warn!` and the
//!   kernel reruns on the host; outputs are only written by the device that
//!   succeeded
//!
//! # Example
//! ```rust
//! use briny_kernels::backend::{Backend, GemmKernel};
//! use briny_kernels::ops::dispatch::DispatchBackend;
//! use briny_kernels::{tensor, tensors::Tensor};
//!
//! let backend = DispatchBackend::default(); // follows the process-wide default device
//! let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
//! let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
//! let mut c = Tensor::zeros(vec![2, 2]);
//! backend
//!     .matrix_dot(&a, &b, false, false, 1.0, 0.0, &mut c, GemmKernel::Blas)
//!     .unwrap();
//! assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
//! ```

use crate::backend::{Backend, Device, GemmKernel, get_default_device};
use crate::element::Element;
use crate::error::Result;
use crate::ops::cpu::CpuBackend;
use crate::random::RngState;
use crate::tensors::Tensor;

/// Runtime-selected backend with host fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchBackend {
    device: Device,
}

impl DispatchBackend {
    /// Routes kernels to `device`.
    ///
    /// If the device cannot be used at all (feature disabled or no adapter),
    /// a warning is logged and every kernel runs on the host.
    pub fn new(device: Device) -> Self {
        let device = match device {
            Device::Cpu => Device::Cpu,
            Device::Wgpu => {
                #[cfg(feature = "wgpu")]
                {
                    match super::wgpu::context() {
                        Ok(_) => Device::Wgpu,
                        Err(e) => {
                            tracing::warn!(error = %e, "GPU unavailable, using the host backend");
                            Device::Cpu
                        }
                    }
                }
                #[cfg(not(feature = "wgpu"))]
                {
                    tracing::warn!("built without the `wgpu` feature, using the host backend");
                    Device::Cpu
                }
            }
        };
        Self { device }
    }

    /// Device kernels are routed to first.
    pub fn selected(&self) -> Device {
        self.device
    }

    fn route<T, R, F>(&self, kernel: &'static str, mut call: F) -> Result<R>
    where
        T: Element,
        F: FnMut(&dyn Backend<T>) -> Result<R>,
    {
        #[cfg(feature = "wgpu")]
        if self.device == Device::Wgpu {
            match call(&super::wgpu::WgpuBackend) {
                Err(crate::error::Error::Gpu(e)) => {
                    tracing::warn!(kernel, error = %e, "GPU kernel failed, rerunning on the host");
                }
                done => return done,
            }
        }
        #[cfg(not(feature = "wgpu"))]
        let _ = kernel;
        call(&CpuBackend)
    }
}

impl Default for DispatchBackend {
    /// Follows [`get_default_device`].
    fn default() -> Self {
        Self::new(get_default_device())
    }
}

impl<T: Element> Backend<T> for DispatchBackend {
    fn device(&self) -> Device {
        self.device
    }

    fn rectlin_apply(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>) -> Result<()> {
        self.route("rectlin_apply", |b| b.rectlin_apply(input, slope, output))
    }

    fn rectlin_derivative(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>) -> Result<()> {
        self.route("rectlin_derivative", |b| b.rectlin_derivative(input, slope, output))
    }

    fn logistic_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("logistic_apply", |b| b.logistic_apply(input, output))
    }

    fn logistic_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) -> Result<()> {
        self.route("logistic_derivative", |b| b.logistic_derivative(input, output, short_cut))
    }

    fn softmax_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("softmax_apply", |b| b.softmax_apply(input, output))
    }

    fn softmax_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) -> Result<()> {
        self.route("softmax_derivative", |b| b.softmax_derivative(input, output, short_cut))
    }

    fn cross_entropy_binary_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        self.route("cross_entropy_binary_apply", |b| b.cross_entropy_binary_apply(input, target))
    }

    fn cross_entropy_binary_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("cross_entropy_binary_derivative", |b| {
            b.cross_entropy_binary_derivative(input, target, output)
        })
    }

    fn cross_entropy_multi_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        self.route("cross_entropy_multi_apply", |b| b.cross_entropy_multi_apply(input, target))
    }

    fn cross_entropy_multi_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("cross_entropy_multi_derivative", |b| {
            b.cross_entropy_multi_derivative(input, target, output)
        })
    }

    fn square_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        self.route("square_mean_apply", |b| b.square_mean_apply(input, target))
    }

    fn square_mean_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("square_mean_derivative", |b| b.square_mean_derivative(input, target, output))
    }

    fn abs_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        self.route("abs_mean_apply", |b| b.abs_mean_apply(input, target))
    }

    fn abs_mean_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("abs_mean_derivative", |b| b.abs_mean_derivative(input, target, output))
    }

    fn bias_forward(&self, input: &Tensor<T>, bias: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("bias_forward", |b| b.bias_forward(input, bias, output))
    }

    fn bias_backward_update(&self, input: &Tensor<T>, update: &mut Tensor<T>) -> Result<()> {
        self.route("bias_backward_update", |b| b.bias_backward_update(input, update))
    }

    fn gradient_descent(
        &self,
        momentum_coef: T,
        learning_rate: T,
        decay: T,
        batch_size: usize,
        weight: &mut Tensor<T>,
        gradient: &mut Tensor<T>,
        velocity: &mut Tensor<T>,
    ) -> Result<()> {
        self.route("gradient_descent", |b| {
            b.gradient_descent(momentum_coef, learning_rate, decay, batch_size, weight, gradient, velocity)
        })
    }

    fn matrix_dot(
        &self,
        left: &Tensor<T>,
        right: &Tensor<T>,
        transa: bool,
        transb: bool,
        alpha: T,
        beta: T,
        output: &mut Tensor<T>,
        kernel: GemmKernel,
    ) -> Result<()> {
        self.route("matrix_dot", |b| {
            b.matrix_dot(left, right, transa, transb, alpha, beta, output, kernel)
        })
    }

    fn maximum(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("maximum", |b| b.maximum(left, right, output))
    }

    fn maximum_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        self.route("maximum_scalar", |b| b.maximum_scalar(left, right, output))
    }

    fn minus(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("minus", |b| b.minus(left, right, output))
    }

    fn minus_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        self.route("minus_scalar", |b| b.minus_scalar(left, right, output))
    }

    fn add(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("add", |b| b.add(left, right, output))
    }

    fn multiply(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        self.route("multiply", |b| b.multiply(left, right, output))
    }

    fn multiply_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        self.route("multiply_scalar", |b| b.multiply_scalar(left, right, output))
    }

    fn sum(&self, input: &Tensor<T>) -> Result<T> {
        self.route("sum", |b| b.sum(input))
    }

    fn make_binary_mask(&self, low: T, high: T, keep: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        self.route("make_binary_mask", |b| b.make_binary_mask(low, high, keep, output, rng))
    }

    fn constant_distribution(&self, val: T, output: &mut Tensor<T>) -> Result<()> {
        self.route("constant_distribution", |b| b.constant_distribution(val, output))
    }

    fn uniform_distribution(&self, low: T, high: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        self.route("uniform_distribution", |b| b.uniform_distribution(low, high, output, rng))
    }

    fn normal_distribution(&self, loc: T, scale: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        self.route("normal_distribution", |b| b.normal_distribution(loc, scale, output, rng))
    }

    fn evaluate_classify(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32> {
        self.route("evaluate_classify", |b| b.evaluate_classify(output, target))
    }

    fn evaluate_regress(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32> {
        self.route("evaluate_regress", |b| b.evaluate_regress(output, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn cpu_selection_routes_to_host() {
        let backend = DispatchBackend::new(Device::Cpu);
        assert_eq!(backend.selected(), Device::Cpu);
        let x = tensor!([[1.0, 2.0]]);
        let mut out = x.zeros_like();
        backend.logistic_apply(&x, &mut out).unwrap();
        assert!(out.data().iter().all(|&y| y > 0.5 && y < 1.0));
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn gpu_request_without_feature_falls_back() {
        assert_eq!(DispatchBackend::new(Device::Wgpu).selected(), Device::Cpu);
    }
}
