//! Loss policies.
//!
//! Every loss reports a scalar normalised by the sample count and a gradient
//! with respect to the network output. Pair [`CrossEntropyBinary`] with a
//! short-cut [`Logistic`](crate::activation::Logistic) and
//! [`CrossEntropyMulti`] with a short-cut
//! [`Softmax`](crate::activation::Softmax): their derivatives are already the
//! gradient with respect to the pre-activation.

use crate::backend::Backend;
use crate::element::Element;
use crate::error::Result;
use crate::tensors::Tensor;
use core::fmt::Debug;
use serde::Deserialize;

/// Scalar objective and its gradient.
pub trait Loss<T: Element>: Debug + Send + Sync {
    /// Loss value for a batch.
    fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, target: &Tensor<T>) -> Result<T>;

    /// Gradient of the loss with respect to `input`, written to `output`.
    fn derivative(
        &self,
        backend: &dyn Backend<T>,
        input: &Tensor<T>,
        target: &Tensor<T>,
        output: &mut Tensor<T>,
    ) -> Result<()>;
}

macro_rules! loss_policy {
    ($(#[$doc:meta])* $name:ident, $apply:ident, $derivative:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
        pub struct $name;

        impl<T: Element> Loss<T> for $name {
            fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
                backend.$apply(input, target)
            }

            fn derivative(
                &self,
                backend: &dyn Backend<T>,
                input: &Tensor<T>,
                target: &Tensor<T>,
                output: &mut Tensor<T>,
            ) -> Result<()> {
                backend.$derivative(input, target, output)
            }
        }
    };
}

loss_policy!(
    /// Binary cross-entropy on probabilities.
    CrossEntropyBinary,
    cross_entropy_binary_apply,
    cross_entropy_binary_derivative
);
loss_policy!(
    /// Multi-class cross-entropy on probability rows, reported as `sum(ln(x) * t) / N`.
    CrossEntropyMulti,
    cross_entropy_multi_apply,
    cross_entropy_multi_derivative
);
loss_policy!(
    /// Half the summed squared error per sample.
    SquareMean,
    square_mean_apply,
    square_mean_derivative
);
loss_policy!(
    /// Summed absolute error per sample.
    AbsMean,
    abs_mean_apply,
    abs_mean_derivative
);

/// Any of the built-in losses, as written in configuration (`"square_mean"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// See [`CrossEntropyBinary`].
    CrossEntropyBinary,
    /// See [`CrossEntropyMulti`].
    CrossEntropyMulti,
    /// See [`SquareMean`].
    #[default]
    SquareMean,
    /// See [`AbsMean`].
    AbsMean,
}

impl LossKind {
    fn policy<T: Element>(self) -> &'static dyn Loss<T> {
        match self {
            Self::CrossEntropyBinary => &CrossEntropyBinary,
            Self::CrossEntropyMulti => &CrossEntropyMulti,
            Self::SquareMean => &SquareMean,
            Self::AbsMean => &AbsMean,
        }
    }
}

impl<T: Element> Loss<T> for LossKind {
    fn apply(&self, backend: &dyn Backend<T>, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        self.policy().apply(backend, input, target)
    }

    fn derivative(
        &self,
        backend: &dyn Backend<T>,
        input: &Tensor<T>,
        target: &Tensor<T>,
        output: &mut Tensor<T>,
    ) -> Result<()> {
        self.policy().derivative(backend, input, target, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::cpu::CpuBackend;
    use crate::tensor;

    #[test]
    fn kind_matches_policy() {
        let x = tensor!([[0.2, 0.8], [0.6, 0.4]]);
        let t = tensor!([[0.0, 1.0], [1.0, 0.0]]);
        let via_kind = LossKind::SquareMean.apply(&CpuBackend, &x, &t).unwrap();
        let direct = SquareMean.apply(&CpuBackend, &x, &t).unwrap();
        assert_eq!(via_kind, direct);
    }

    #[test]
    fn parses_snake_case_names() {
        let kind: LossKind = serde_json::from_str("\"cross_entropy_multi\"").unwrap();
        assert_eq!(kind, LossKind::CrossEntropyMulti);
    }
}
