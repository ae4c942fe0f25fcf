//! Backend abstraction and device selection.
//!
//! This module defines the [`Backend`] kernel set every device implements, the
//! [`Device`] kinds kernels can run on, and the [`GemmKernel`] selector used by
//! matrix multiplication.
//!
//! # Supported Devices
//!
//! - `Cpu`: Pure Rust host kernels parallelised with `rayon` (default).
//! - `Wgpu`: Accelerator kernels written as WGSL compute shaders (`wgpu` feature).
//!
//! The process-wide default device is stored in an `AtomicU8`, so it can be
//! switched at runtime without threading a handle through every call.
//! [`DispatchBackend`](crate::ops::dispatch::DispatchBackend) reads it when it
//! is built with `Default`.
//!
//! # Kernel Contract
//!
//! - Inputs whose element counts disagree are a programming error: the kernel
//!   panics with a message naming the operation.
//! - Kernels read their inputs and write only the designated output (or the
//!   in-place tensors named in their docs).
//! - The `Result` carries device failures and deliberately unimplemented kernels.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::random::RngState;
use crate::tensors::Tensor;
use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};
use serde::Deserialize;

/// Enumeration of supported compute devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Device {
    /// Host processor (default).
    #[default]
    Cpu = 0,
    /// GPU through `wgpu`.
    Wgpu,
}

impl TryFrom<u8> for Device {
    type Error = ();

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Wgpu),
            _ => Err(()),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "host" => Ok(Self::Cpu),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            _ => Err(Error::UnknownDevice(s.to_string())),
        }
    }
}

/// Process-wide default device. Accessed with relaxed ordering; no other
/// memory is published through it.
static GLOBAL_DEFAULT_DEVICE: AtomicU8 = AtomicU8::new(Device::Cpu as u8);

/// Sets the device used by backends built with `Default`.
///
/// # Example
///
/// ```
/// use briny_kernels::backend::{set_default_device, get_default_device, Device};
/// set_default_device(Device::Cpu);
/// assert_eq!(get_default_device(), Device::Cpu);
/// ```
pub fn set_default_device(d: Device) {
    GLOBAL_DEFAULT_DEVICE.store(d as u8, Ordering::Release);
}

/// Returns the current default device.
///
/// If the stored value is invalid, defaults to [`Device::Cpu`].
pub fn get_default_device() -> Device {
    Device::try_from(GLOBAL_DEFAULT_DEVICE.load(Ordering::Acquire)).unwrap_or_default()
}

/// Implementation choice for [`Backend::matrix_dot`].
///
/// Both paths compute the same product; they differ only in how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum GemmKernel {
    /// Portable linear-algebra library path.
    #[default]
    Blas,
    /// Hand-tuned low-level kernel path.
    Asm,
}

impl GemmKernel {
    /// The configuration name of this kernel.
    pub fn name(self) -> &'static str {
        match self {
            Self::Blas => "blas",
            Self::Asm => "asm",
        }
    }
}

impl FromStr for GemmKernel {
    type Err = Error;

    /// Parses `"blas"` or `"asm"` (case-insensitive). Any other name is an
    /// error rather than a silent no-op.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blas" => Ok(Self::Blas),
            "asm" => Ok(Self::Asm),
            _ => Err(Error::UnsupportedKernel(s.to_string())),
        }
    }
}

impl TryFrom<String> for GemmKernel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl core::fmt::Display for GemmKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// The kernel set shared by every device.
///
/// Tensors are borrowed for the duration of one call only. Unless noted
/// otherwise, `output` must hold as many elements as the inputs.
#[allow(clippy::too_many_arguments)]
pub trait Backend<T: Element>: Send + Sync {
    /// Which device this backend runs on.
    fn device(&self) -> Device;

    /// Leaky rectifier: `out = max(x, 0) + slope * min(x, 0)`.
    fn rectlin_apply(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>) -> Result<()>;

    /// In-place chain rule for the leaky rectifier.
    ///
    /// `output` holds the upstream gradient and is multiplied by `1` where
    /// `input > 0` and by `slope` elsewhere.
    fn rectlin_derivative(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>)
    -> Result<()>;

    /// Logistic sigmoid: `out = 1 / (1 + e^-x)`.
    fn logistic_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()>;

    /// In-place chain rule for the sigmoid.
    ///
    /// With `short_cut` the gradient passes through unchanged (the paired
    /// binary cross-entropy derivative already includes the sigmoid term);
    /// otherwise `output *= y * (1 - y)` where `y = logistic(input)`.
    fn logistic_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool)
    -> Result<()>;

    /// Row-wise softmax over a `[num_sample, dim]` view.
    ///
    /// No max-subtraction is performed: inputs large enough to overflow `exp`
    /// must be scaled by the caller.
    fn softmax_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()>;

    /// In-place chain rule for softmax.
    ///
    /// With `short_cut` the gradient passes through unchanged; otherwise each
    /// row becomes `g_i = y_i * (g_i - sum_j g_j * y_j)`.
    fn softmax_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool)
    -> Result<()>;

    /// `sum(-safe_log(x) * t - safe_log(1 - x) * (1 - t)) / shape[0]`.
    fn cross_entropy_binary_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T>;

    /// `out = x - t`.
    fn cross_entropy_binary_derivative(
        &self,
        input: &Tensor<T>,
        target: &Tensor<T>,
        output: &mut Tensor<T>,
    ) -> Result<()>;

    /// `sum(safe_log(x) * t) / shape[0]`.
    fn cross_entropy_multi_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T>;

    /// `out = x - t`.
    fn cross_entropy_multi_derivative(
        &self,
        input: &Tensor<T>,
        target: &Tensor<T>,
        output: &mut Tensor<T>,
    ) -> Result<()>;

    /// `sum((x - t)^2) / (2 * shape[0])`.
    fn square_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T>;

    /// `out = x - t`.
    fn square_mean_derivative(
        &self,
        input: &Tensor<T>,
        target: &Tensor<T>,
        output: &mut Tensor<T>,
    ) -> Result<()>;

    /// `sum(|x - t|) / shape[0]`.
    fn abs_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T>;

    /// `out = sign(x - t)`, zero where equal.
    fn abs_mean_derivative(
        &self,
        input: &Tensor<T>,
        target: &Tensor<T>,
        output: &mut Tensor<T>,
    ) -> Result<()>;

    /// Broadcast bias add: `out[i] = x[i] + bias[i % dim]` with `dim = size / shape[0]`.
    fn bias_forward(&self, input: &Tensor<T>, bias: &Tensor<T>, output: &mut Tensor<T>)
    -> Result<()>;

    /// Column sums over the batch axis: `update[j] = sum_n x[n, j]`.
    fn bias_backward_update(&self, input: &Tensor<T>, update: &mut Tensor<T>) -> Result<()>;

    /// Batch normalisation forward pass. Not provided by any device yet.
    fn batch_norm_forward(
        &self,
        _input: &Tensor<T>,
        _gamma: &Tensor<T>,
        _beta: &Tensor<T>,
        _epsilon: T,
        _input_var: &mut Tensor<T>,
        _input_hat: &mut Tensor<T>,
        _output: &mut Tensor<T>,
    ) -> Result<()> {
        Err(Error::Unimplemented("batch_norm_forward"))
    }

    /// Batch normalisation backward pass. Not provided by any device yet.
    fn batch_norm_backward(
        &self,
        _backward_input: &Tensor<T>,
        _forward_input_hat: &Tensor<T>,
        _forward_input_var: &Tensor<T>,
        _gamma: &Tensor<T>,
        _epsilon: T,
        _gamma_update: &mut Tensor<T>,
        _beta_update: &mut Tensor<T>,
        _output: &mut Tensor<T>,
    ) -> Result<()> {
        Err(Error::Unimplemented("batch_norm_backward"))
    }

    /// Gradient descent with momentum, in place, per element:
    ///
    /// ```text
    /// gradient /= batch_size
    /// velocity  = velocity * momentum_coef - learning_rate * gradient + decay * weight
    /// weight   += velocity
    /// ```
    ///
    /// The decay term is added to the velocity as written.
    fn gradient_descent(
        &self,
        momentum_coef: T,
        learning_rate: T,
        decay: T,
        batch_size: usize,
        weight: &mut Tensor<T>,
        gradient: &mut Tensor<T>,
        velocity: &mut Tensor<T>,
    ) -> Result<()>;

    /// `output = alpha * op(left) * op(right) + beta * output`.
    ///
    /// Each operand is viewed as `[shape[0], size / shape[0]]` in its storage
    /// order; the effective transpose is `trans` XOR "stored column-major".
    /// The output is written row-major.
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
    ) -> Result<()>;

    /// `out = max(l, r)` elementwise.
    fn maximum(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()>;

    /// `out = max(l, r)` against a scalar.
    fn maximum_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()>;

    /// `out = l - r` elementwise.
    fn minus(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()>;

    /// `out = l - r` against a scalar.
    fn minus_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()>;

    /// `out = l + r` elementwise.
    fn add(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()>;

    /// `out = l * r` elementwise.
    fn multiply(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>)
    -> Result<()>;

    /// `out = l * r` against a scalar.
    fn multiply_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()>;

    /// Sum of all elements.
    fn sum(&self, input: &Tensor<T>) -> Result<T>;

    /// Dropout-style mask: uniform draw in `[low, high)`, then `1` where the
    /// draw is below `keep` and `0` elsewhere.
    fn make_binary_mask(
        &self,
        low: T,
        high: T,
        keep: T,
        output: &mut Tensor<T>,
        rng: &mut RngState,
    ) -> Result<()>;

    /// Fills `output` with `val`.
    fn constant_distribution(&self, val: T, output: &mut Tensor<T>) -> Result<()>;

    /// Fills `output` with i.i.d. draws from `U[low, high)`.
    fn uniform_distribution(
        &self,
        low: T,
        high: T,
        output: &mut Tensor<T>,
        rng: &mut RngState,
    ) -> Result<()>;

    /// Fills `output` with i.i.d. draws from `N(loc, scale^2)`.
    fn normal_distribution(
        &self,
        loc: T,
        scale: T,
        output: &mut Tensor<T>,
        rng: &mut RngState,
    ) -> Result<()>;

    /// Fraction of rows whose argmax (first maximum wins) hits a target of
    /// exactly `1.0`.
    fn evaluate_classify(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32>;

    /// Mean over samples of the per-sample squared error.
    fn evaluate_regress(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32>;
}
