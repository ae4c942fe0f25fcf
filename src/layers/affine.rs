//! Fully connected layer: `y = f(x · W + b)`.

use super::{Layer, LayerState};
use crate::activation::Activation;
use crate::backend::{Backend, GemmKernel};
use crate::config::AffineConfig;
use crate::element::Element;
use crate::error::Result;
use crate::filler::Filler;
use crate::optim::Optimizer;
use crate::random::RngState;
use crate::tensors::Tensor;

/// A dense layer with `nout` outputs.
///
/// Inputs of any rank are flattened to `[batch, input_dim]` where
/// `input_dim = product(shape[1..])`. The weight is `[input_dim, nout]` and
/// the bias `[nout]`; gradient and velocity buffers mirror them.
///
/// # Example
/// ```
/// use briny_kernels::activation::Rectlin;
/// use briny_kernels::backend::GemmKernel;
/// use briny_kernels::filler::Xavier;
/// use briny_kernels::layers::{Affine, Layer};
/// use briny_kernels::ops::cpu::CpuBackend;
/// use briny_kernels::optim::GradientDescent;
/// use briny_kernels::random::RngState;
/// use briny_kernels::tensors::Tensor;
///
/// let mut layer = Affine::new(CpuBackend, 3, Rectlin::default(), Xavier, GemmKernel::Blas);
/// layer.init(&[4, 5], &mut RngState::seeded(1)).unwrap();
///
/// let x = Tensor::full(vec![4, 5], 0.1f32);
/// let y = layer.forward_prop(&x).unwrap();
/// assert_eq!(y.shape(), &[4, 3]);
///
/// let upstream = Tensor::full(vec![4, 3], 1.0);
/// layer.backward_prop(upstream).unwrap();
/// layer.update(&GradientDescent::with_lr(0.1), 4).unwrap();
/// ```
#[derive(Debug)]
pub struct Affine<T: Element, B: Backend<T>> {
    backend: B,
    nout: usize,
    kernel: GemmKernel,
    activation: Box<dyn Activation<T>>,
    filler: Box<dyn Filler<T>>,
    state: LayerState,

    weight: Tensor<T>,
    weight_gradient: Tensor<T>,
    weight_velocity: Tensor<T>,
    bias: Tensor<T>,
    bias_gradient: Tensor<T>,
    bias_velocity: Tensor<T>,

    input: Tensor<T>,
    pre_activation: Tensor<T>,
    output: Tensor<T>,
    input_gradient: Tensor<T>,
}

fn empty<T: Element>() -> Tensor<T> {
    Tensor::zeros(vec![0])
}

impl<T: Element, B: Backend<T>> Affine<T, B> {
    /// An uninitialized layer; call [`Layer::init`] before use.
    pub fn new(
        backend: B,
        nout: usize,
        activation: impl Activation<T> + 'static,
        filler: impl Filler<T> + 'static,
        kernel: GemmKernel,
    ) -> Self {
        Self {
            backend,
            nout,
            kernel,
            activation: Box::new(activation),
            filler: Box::new(filler),
            state: LayerState::Uninitialized,
            weight: empty(),
            weight_gradient: empty(),
            weight_velocity: empty(),
            bias: empty(),
            bias_gradient: empty(),
            bias_velocity: empty(),
            input: empty(),
            pre_activation: empty(),
            output: empty(),
            input_gradient: empty(),
        }
    }

    /// Builds a layer from its configuration block, using `default_kernel`
    /// when the block names none.
    pub fn from_config(backend: B, config: &AffineConfig, default_kernel: GemmKernel) -> Self {
        Self::new(
            backend,
            config.nout,
            config.activation,
            config.filler,
            config.kernel_or(default_kernel),
        )
    }

    /// Number of outputs per sample.
    pub fn nout(&self) -> usize {
        self.nout
    }

    /// Features per input sample, `0` before `init`.
    pub fn input_dim(&self) -> usize {
        self.weight.rows()
    }

    /// GEMM path used by this layer.
    pub fn kernel(&self) -> GemmKernel {
        self.kernel
    }

    /// The backend kernels run on.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Output of the last forward pass.
    pub fn output(&self) -> &Tensor<T> {
        &self.output
    }

    /// Gradient with respect to the input from the last backward pass.
    pub fn input_gradient(&self) -> &Tensor<T> {
        &self.input_gradient
    }

    /// `dL/dW` from the last backward pass, `[input_dim, nout]`.
    pub fn weight_gradient(&self) -> &Tensor<T> {
        &self.weight_gradient
    }

    /// `dL/db` from the last backward pass, `[nout]`.
    pub fn bias_gradient(&self) -> &Tensor<T> {
        &self.bias_gradient
    }

    /// Current weight and bias.
    pub fn params(&self) -> (&Tensor<T>, &Tensor<T>) {
        (&self.weight, &self.bias)
    }

    /// Replaces weight and bias, e.g. from a snapshot.
    ///
    /// # Errors
    /// `Error::LayerState` before `init`.
    ///
    /// # Panics
    /// If either shape differs from the allocated parameter.
    pub fn load_params(&mut self, weight: Tensor<T>, bias: Tensor<T>) -> Result<()> {
        self.state.require(
            &[
                LayerState::Initialized,
                LayerState::ForwardPropagated,
                LayerState::BackwardPropagated,
            ],
            "load_params",
        )?;
        self.weight.update(weight);
        self.bias.update(bias);
        Ok(())
    }

    fn resize_caches(&mut self, input_shape: &[usize]) {
        let batch = input_shape.first().copied().unwrap_or(1);
        self.input = Tensor::zeros(input_shape.to_vec());
        self.input_gradient = Tensor::zeros(input_shape.to_vec());
        self.pre_activation = Tensor::zeros(vec![batch, self.nout]);
        self.output = Tensor::zeros(vec![batch, self.nout]);
    }
}

impl<T: Element, B: Backend<T>> Layer<T> for Affine<T, B> {
    fn init(&mut self, input_shape: &[usize], rng: &mut RngState) -> Result<()> {
        assert!(
            !input_shape.is_empty(),
            "affine: input shape must have a batch dimension"
        );
        let input_dim: usize = input_shape[1..].iter().product();
        assert!(
            input_dim != 0 && self.nout != 0,
            "affine: empty layer (input_dim={input_dim}, nout={})",
            self.nout
        );
        tracing::debug!(
            input_dim,
            nout = self.nout,
            kernel = %self.kernel,
            device = ?self.backend.device(),
            "affine init"
        );

        let nout = self.nout;
        self.weight = Tensor::zeros(vec![input_dim, nout]);
        self.filler.fill(&self.backend, rng, &mut self.weight)?;
        self.weight_gradient = Tensor::zeros(vec![input_dim, nout]);
        self.weight_velocity = Tensor::zeros(vec![input_dim, nout]);
        self.bias = Tensor::zeros(vec![nout]);
        self.bias_gradient = Tensor::zeros(vec![nout]);
        self.bias_velocity = Tensor::zeros(vec![nout]);
        self.resize_caches(input_shape);

        self.state = LayerState::Initialized;
        Ok(())
    }

    fn forward_prop(&mut self, input: &Tensor<T>) -> Result<&Tensor<T>> {
        self.state.require(
            &[
                LayerState::Initialized,
                LayerState::ForwardPropagated,
                LayerState::BackwardPropagated,
            ],
            "forward_prop",
        )?;
        let input_dim = self.input_dim();
        assert!(
            input.rows() != 0 && input.row_len() == input_dim,
            "affine: input shape {:?} does not provide {input_dim} features per sample",
            input.shape()
        );
        if self.input.shape() != input.shape() {
            // the batch dimension may change between calls, e.g. a short last batch
            self.resize_caches(input.shape());
        }
        self.input = input.clone();

        // output doubles as scratch for x · W before the bias is added
        self.backend.matrix_dot(
            &self.input,
            &self.weight,
            false,
            false,
            T::ONE,
            T::ZERO,
            &mut self.output,
            self.kernel,
        )?;
        self.backend
            .bias_forward(&self.output, &self.bias, &mut self.pre_activation)?;
        self.activation
            .apply(&self.backend, &self.pre_activation, &mut self.output)?;

        self.state = LayerState::ForwardPropagated;
        Ok(&self.output)
    }

    fn backward_prop(&mut self, mut upstream: Tensor<T>) -> Result<&Tensor<T>> {
        self.state.require(
            &[LayerState::ForwardPropagated, LayerState::BackwardPropagated],
            "backward_prop",
        )?;
        assert_eq!(
            upstream.shape(),
            self.output.shape(),
            "affine: upstream gradient shape does not match output shape"
        );
        assert!(upstream.row_major(), "affine: upstream gradient must be row-major");

        self.activation
            .derivative(&self.backend, &self.pre_activation, &mut upstream)?;
        self.backend.matrix_dot(
            &self.input,
            &upstream,
            true,
            false,
            T::ONE,
            T::ZERO,
            &mut self.weight_gradient,
            self.kernel,
        )?;
        self.backend
            .bias_backward_update(&upstream, &mut self.bias_gradient)?;
        self.backend.matrix_dot(
            &upstream,
            &self.weight,
            false,
            true,
            T::ONE,
            T::ZERO,
            &mut self.input_gradient,
            self.kernel,
        )?;

        self.state = LayerState::BackwardPropagated;
        Ok(&self.input_gradient)
    }

    fn update(&mut self, optimizer: &dyn Optimizer<T>, batch_size: usize) -> Result<()> {
        self.state
            .require(&[LayerState::BackwardPropagated], "update")?;
        optimizer.update(
            &self.backend,
            batch_size,
            &mut self.weight,
            &mut self.weight_gradient,
            &mut self.weight_velocity,
        )?;
        optimizer.update(
            &self.backend,
            batch_size,
            &mut self.bias,
            &mut self.bias_gradient,
            &mut self.bias_velocity,
        )?;
        self.state = LayerState::Initialized;
        Ok(())
    }

    fn state(&self) -> LayerState {
        self.state
    }
}
