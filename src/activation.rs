//! Activation policies.
//!
//! An [`Activation`] pairs a forward kernel with its in-place chain-rule
//! kernel. Layers own one as a boxed trait object, so policies are chosen at
//! runtime (for example from an [`AffineConfig`](crate::config::AffineConfig)).
//!
//! Parameters are stored as `f64` and converted to the element type at call
//! time, which lets one policy value drive both `f32` and `f64` layers.

use crate::backend::Backend;
use crate::element::Element;
use crate::error::Result;
use crate::tensors::Tensor;
use core::fmt::Debug;
use serde::Deserialize;

/// A differentiable elementwise or row-wise nonlinearity.
pub trait Activation<T: Element>: Debug + Send + Sync {
    /// `output = f(input)`.
    fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()>;

    /// Multiplies the upstream gradient held in `output` by `f'(input)`.
    ///
    /// `input` is the pre-activation value seen by [`apply`](Activation::apply).
    fn derivative(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()>;
}

/// Leaky rectifier. `slope = 0` is the plain ReLU.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Rectlin {
    /// Gradient for negative inputs.
    pub slope: f64,
}

impl<T: Element> Activation<T> for Rectlin {
    fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        backend.rectlin_apply(input, T::from_f64(self.slope), output)
    }

    fn derivative(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        backend.rectlin_derivative(input, T::from_f64(self.slope), output)
    }
}

/// Logistic sigmoid.
///
/// Set `short_cut` when the layer feeds a binary cross-entropy loss: that
/// loss's derivative already contains the sigmoid term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Logistic {
    /// Pass gradients through unchanged.
    pub short_cut: bool,
}

impl<T: Element> Activation<T> for Logistic {
    fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        backend.logistic_apply(input, output)
    }

    fn derivative(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        backend.logistic_derivative(input, output, self.short_cut)
    }
}

/// Row-wise softmax. `short_cut` pairs it with multi-class cross-entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Softmax {
    /// Pass gradients through unchanged.
    pub short_cut: bool,
}

impl<T: Element> Activation<T> for Softmax {
    fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        backend.softmax_apply(input, output)
    }

    fn derivative(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        backend.softmax_derivative(input, output, self.short_cut)
    }
}

/// Any of the built-in activations, as written in configuration.
///
/// ```json
/// { "type": "rectlin", "slope": 0.01 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivationKind {
    /// See [`Rectlin`].
    Rectlin(Rectlin),
    /// See [`Logistic`].
    Logistic(Logistic),
    /// See [`Softmax`].
    Softmax(Softmax),
}

impl Default for ActivationKind {
    fn default() -> Self {
        Self::Rectlin(Rectlin::default())
    }
}

impl<T: Element> Activation<T> for ActivationKind {
    fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        match self {
            Self::Rectlin(a) => a.apply(backend, input, output),
            Self::Logistic(a) => a.apply(backend, input, output),
            Self::Softmax(a) => a.apply(backend, input, output),
        }
    }

    fn derivative(&self, backend: &dyn Backend<T>, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        match self {
            Self::Rectlin(a) => a.derivative(backend, input, output),
            Self::Logistic(a) => a.derivative(backend, input, output),
            Self::Softmax(a) => a.derivative(backend, input, output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::cpu::CpuBackend;
    use crate::tensor;

    #[test]
    fn kind_delegates_to_policy() {
        let x = tensor!([[-1.0, 2.0]]);
        let mut out = x.zeros_like();
        let relu = ActivationKind::Rectlin(Rectlin { slope: 0.0 });
        relu.apply(&CpuBackend, &x, &mut out).unwrap();
        assert_eq!(out.data(), &[0.0, 2.0]);
    }

    #[test]
    fn parses_tagged_json() {
        let kind: ActivationKind = serde_json::from_str(r#"{"type":"softmax","short_cut":true}"#).unwrap();
        assert_eq!(kind, ActivationKind::Softmax(Softmax { short_cut: true }));
        let kind: ActivationKind = serde_json::from_str(r#"{"type":"logistic"}"#).unwrap();
        assert_eq!(kind, ActivationKind::Logistic(Logistic { short_cut: false }));
    }
}
