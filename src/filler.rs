//! Parameter initialisation policies.

use crate::backend::Backend;
use crate::element::Element;
use crate::error::Result;
use crate::random::RngState;
use crate::tensors::Tensor;
use core::fmt::Debug;
use serde::Deserialize;

/// Fills a freshly allocated parameter tensor.
pub trait Filler<T: Element>: Debug + Send + Sync {
    /// Overwrites every element of `tensor`.
    fn fill(&self, backend: &dyn Backend<T>, rng: &mut RngState, tensor: &mut Tensor<T>) -> Result<()>;
}

/// Every element set to `value`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Constant {
    /// The fill value.
    pub value: f64,
}

impl<T: Element> Filler<T> for Constant {
    fn fill(&self, backend: &dyn Backend<T>, _rng: &mut RngState, tensor: &mut Tensor<T>) -> Result<()> {
        backend.constant_distribution(T::from_f64(self.value), tensor)
    }
}

/// Draws from `U[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Uniform {
    /// Inclusive lower bound.
    pub low: f64,
    /// Exclusive upper bound.
    pub high: f64,
}

impl Default for Uniform {
    fn default() -> Self {
        Self { low: -0.05, high: 0.05 }
    }
}

impl<T: Element> Filler<T> for Uniform {
    fn fill(&self, backend: &dyn Backend<T>, rng: &mut RngState, tensor: &mut Tensor<T>) -> Result<()> {
        backend.uniform_distribution(T::from_f64(self.low), T::from_f64(self.high), tensor, rng)
    }
}

/// Draws from `N(mean, std^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Gaussian {
    /// Mean.
    pub mean: f64,
    /// Standard deviation.
    pub std: f64,
}

impl Default for Gaussian {
    fn default() -> Self {
        Self { mean: 0.0, std: 0.01 }
    }
}

impl<T: Element> Filler<T> for Gaussian {
    fn fill(&self, backend: &dyn Backend<T>, rng: &mut RngState, tensor: &mut Tensor<T>) -> Result<()> {
        backend.normal_distribution(T::from_f64(self.mean), T::from_f64(self.std), tensor, rng)
    }
}

/// Uniform in `±sqrt(3 / fan_in)`, with `fan_in` the leading dimension of the
/// weight (`input_dim` for an `[input_dim, nout]` matrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Xavier;

impl Xavier {
    /// Half-width of the sampling interval for a given fan-in.
    #[allow(clippy::cast_precision_loss)]
    pub fn bound(fan_in: usize) -> f64 {
        (3.0 / fan_in.max(1) as f64).sqrt()
    }
}

impl<T: Element> Filler<T> for Xavier {
    fn fill(&self, backend: &dyn Backend<T>, rng: &mut RngState, tensor: &mut Tensor<T>) -> Result<()> {
        let bound = Self::bound(tensor.rows());
        backend.uniform_distribution(T::from_f64(-bound), T::from_f64(bound), tensor, rng)
    }
}

/// Any of the built-in fillers, as written in configuration.
///
/// ```json
/// { "type": "gaussian", "mean": 0.0, "std": 0.02 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillerKind {
    /// See [`Constant`].
    Constant(Constant),
    /// See [`Uniform`].
    Uniform(Uniform),
    /// See [`Gaussian`].
    Gaussian(Gaussian),
    /// See [`Xavier`].
    Xavier,
}

impl Default for FillerKind {
    fn default() -> Self {
        Self::Xavier
    }
}

impl<T: Element> Filler<T> for FillerKind {
    fn fill(&self, backend: &dyn Backend<T>, rng: &mut RngState, tensor: &mut Tensor<T>) -> Result<()> {
        match self {
            Self::Constant(f) => f.fill(backend, rng, tensor),
            Self::Uniform(f) => f.fill(backend, rng, tensor),
            Self::Gaussian(f) => f.fill(backend, rng, tensor),
            Self::Xavier => Xavier.fill(backend, rng, tensor),
        }
    }
}
