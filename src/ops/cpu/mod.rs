//! Parallel CPU backend.
//!
//! # CPU Backend
//!
//! [`CpuBackend`] is the always-available implementation of
//! [`Backend`]. It is also the fallback every other device
//! reruns kernels on when the accelerator fails.
//!
//! ## Features
//!
//! - Parallel execution using [`rayon`](https://docs.rs/rayon)
//! - Matrix multiply through `matrixmultiply` or a packed `rayon` kernel
//! - Random fills from `rand_distr`, seeded by the caller's [`RngState`]
//!
//! ## Design Goals
//!
//! - Deterministic results: every reduction sums ordered partials
//! - Modular: each kernel family lives in its own file and is usable as a free
//!   function without a backend value
//!
//! The free functions panic on shape violations; only the trait methods wrap
//! them into `Result`.

pub mod activation;
pub mod bias;
pub mod elementwise;
pub mod evaluate;
pub mod gemm;
pub mod loss;
pub mod optim;
pub mod random;

use crate::backend::{Backend, Device, GemmKernel};
use crate::element::Element;
use crate::error::Result;
use crate::ops::GemmPlan;
use crate::random::RngState;
use crate::tensors::Tensor;
use elementwise::{map_scalar, max, zip_with};

/// Host implementation of every kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuBackend;

impl CpuBackend {
    /// Creates the host backend.
    pub const fn new() -> Self {
        Self
    }
}

impl<T: Element> Backend<T> for CpuBackend {
    fn device(&self) -> Device {
        Device::Cpu
    }

    fn rectlin_apply(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>) -> Result<()> {
        activation::rectlin_apply(input, slope, output);
        Ok(())
    }

    fn rectlin_derivative(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>) -> Result<()> {
        activation::rectlin_derivative(input, slope, output);
        Ok(())
    }

    fn logistic_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        activation::logistic_apply(input, output);
        Ok(())
    }

    fn logistic_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) -> Result<()> {
        activation::logistic_derivative(input, output, short_cut);
        Ok(())
    }

    fn softmax_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        activation::softmax_apply(input, output);
        Ok(())
    }

    fn softmax_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) -> Result<()> {
        activation::softmax_derivative(input, output, short_cut);
        Ok(())
    }

    fn cross_entropy_binary_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        Ok(loss::cross_entropy_binary_apply(input, target))
    }

    fn cross_entropy_binary_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        loss::difference("cross_entropy_binary_derivative", input, target, output);
        Ok(())
    }

    fn cross_entropy_multi_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        Ok(loss::cross_entropy_multi_apply(input, target))
    }

    fn cross_entropy_multi_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        loss::difference("cross_entropy_multi_derivative", input, target, output);
        Ok(())
    }

    fn square_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        Ok(loss::square_mean_apply(input, target))
    }

    fn square_mean_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        loss::difference("square_mean_derivative", input, target, output);
        Ok(())
    }

    fn abs_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        Ok(loss::abs_mean_apply(input, target))
    }

    fn abs_mean_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        loss::abs_mean_derivative(input, target, output);
        Ok(())
    }

    fn bias_forward(&self, input: &Tensor<T>, bias: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        bias::bias_forward(input, bias, output);
        Ok(())
    }

    fn bias_backward_update(&self, input: &Tensor<T>, update: &mut Tensor<T>) -> Result<()> {
        bias::bias_backward_update(input, update);
        Ok(())
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
        optim::gradient_descent(momentum_coef, learning_rate, decay, batch_size, weight, gradient, velocity);
        Ok(())
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
        let plan = GemmPlan::new(left, right, transa, transb, output);
        match kernel {
            GemmKernel::Blas => gemm::blas(&plan, left, right, alpha, beta, output),
            GemmKernel::Asm => gemm::asm(&plan, left, right, alpha, beta, output),
        }
        Ok(())
    }

    fn maximum(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        zip_with("maximum", left, right, output, max);
        Ok(())
    }

    fn maximum_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        map_scalar("maximum_scalar", left, right, output, max);
        Ok(())
    }

    fn minus(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        zip_with("minus", left, right, output, |l, r| l - r);
        Ok(())
    }

    fn minus_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        map_scalar("minus_scalar", left, right, output, |l, r| l - r);
        Ok(())
    }

    fn add(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        zip_with("add", left, right, output, |l, r| l + r);
        Ok(())
    }

    fn multiply(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        zip_with("multiply", left, right, output, |l, r| l * r);
        Ok(())
    }

    fn multiply_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        map_scalar("multiply_scalar", left, right, output, |l, r| l * r);
        Ok(())
    }

    fn sum(&self, input: &Tensor<T>) -> Result<T> {
        Ok(elementwise::sum(input))
    }

    fn make_binary_mask(&self, low: T, high: T, keep: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        random::make_binary_mask(low, high, keep, output, rng)
    }

    fn constant_distribution(&self, val: T, output: &mut Tensor<T>) -> Result<()> {
        random::constant_distribution(val, output);
        Ok(())
    }

    fn uniform_distribution(&self, low: T, high: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        random::uniform_distribution(low, high, output, rng)
    }

    fn normal_distribution(&self, loc: T, scale: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        random::normal_distribution(loc, scale, output, rng)
    }

    fn evaluate_classify(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32> {
        Ok(evaluate::evaluate_classify(output, target))
    }

    fn evaluate_regress(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32> {
        Ok(evaluate::evaluate_regress(output, target))
    }
}
