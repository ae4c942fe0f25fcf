//! Layers built on top of a [`Backend`](crate::backend::Backend).
//!
//! A layer owns its parameters and every buffer derived from them. It never
//! computes anything itself: each step is a sequence of backend kernel calls.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --init--> Initialized --forward_prop--> ForwardPropagated
//!                              ^                             |      ^
//!                              |                     backward_prop  | forward_prop
//!                              |                             v      |
//!                              +----------update------ BackwardPropagated
//! ```
//!
//! `init` may be called again from any state with a new input shape; it
//! reallocates and refills every parameter. Calling a method out of order
//! returns [`Error::LayerState`](crate::error::Error::LayerState).

mod affine;

pub use affine::Affine;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::optim::Optimizer;
use crate::random::RngState;
use crate::tensors::Tensor;

/// Where a layer is in its forward/backward/update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerState {
    /// No parameters allocated yet.
    #[default]
    Uninitialized,
    /// Parameters ready, no batch cached.
    Initialized,
    /// Output of the last batch is cached.
    ForwardPropagated,
    /// Gradients for the last batch are ready.
    BackwardPropagated,
}

impl LayerState {
    /// Lower-case name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::ForwardPropagated => "forward propagated",
            Self::BackwardPropagated => "backward propagated",
        }
    }

    /// `Ok` if the current state is one of `allowed`.
    pub(crate) fn require(self, allowed: &[Self], action: &'static str) -> Result<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(Error::LayerState {
                state: self.name(),
                action,
            })
        }
    }
}

/// A trainable stage of a feed-forward network.
pub trait Layer<T: Element> {
    /// Allocates parameters for inputs of `input_shape` (`[batch, ...]`).
    fn init(&mut self, input_shape: &[usize], rng: &mut RngState) -> Result<()>;

    /// Computes and caches the output for `input`.
    fn forward_prop(&mut self, input: &Tensor<T>) -> Result<&Tensor<T>>;

    /// Turns the gradient with respect to the output into parameter gradients
    /// and returns the gradient with respect to the input. Parameters are not
    /// modified.
    fn backward_prop(&mut self, upstream: Tensor<T>) -> Result<&Tensor<T>>;

    /// Applies the gradients of the last backward pass.
    fn update(&mut self, optimizer: &dyn Optimizer<T>, batch_size: usize) -> Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> LayerState;
}
