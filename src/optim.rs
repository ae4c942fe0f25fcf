//! Parameter update rules.

use crate::backend::Backend;
use crate::element::Element;
use crate::error::Result;
use crate::tensors::Tensor;
use core::fmt::Debug;
use serde::Deserialize;

/// Applies accumulated gradients to one parameter tensor.
pub trait Optimizer<T: Element>: Debug + Send + Sync {
    /// Updates `weight` from `gradient`, keeping per-parameter state in `velocity`.
    ///
    /// `gradient` is consumed: implementations may scale it in place.
    fn update(
        &self,
        backend: &dyn Backend<T>,
        batch_size: usize,
        weight: &mut Tensor<T>,
        gradient: &mut Tensor<T>,
        velocity: &mut Tensor<T>,
    ) -> Result<()>;
}

/// Gradient descent with momentum and additive decay.
///
/// Per element, with `g` the summed batch gradient:
///
/// ```text
/// g /= batch_size
/// v  = v * momentum_coef - learning_rate * g + decay * w
/// w += v
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GradientDescent {
    /// Fraction of the previous velocity carried over.
    pub momentum_coef: f64,
    /// Step size.
    pub learning_rate: f64,
    /// Coefficient of the weight term added to the velocity.
    pub decay: f64,
}

impl GradientDescent {
    /// Plain SGD at the given learning rate.
    pub fn with_lr(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            ..Self::default()
        }
    }
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self {
            momentum_coef: 0.0,
            learning_rate: 0.01,
            decay: 0.0,
        }
    }
}

impl<T: Element> Optimizer<T> for GradientDescent {
    fn update(
        &self,
        backend: &dyn Backend<T>,
        batch_size: usize,
        weight: &mut Tensor<T>,
        gradient: &mut Tensor<T>,
        velocity: &mut Tensor<T>,
    ) -> Result<()> {
        backend.gradient_descent(
            T::from_f64(self.momentum_coef),
            T::from_f64(self.learning_rate),
            T::from_f64(self.decay),
            batch_size,
            weight,
            gradient,
            velocity,
        )
    }
}
