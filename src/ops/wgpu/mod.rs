//! GPU kernels using WGPU.
//!
//! This module implements [`Backend`] on the GPU using WGPU + WGSL. It handles
//! GPU context initialization, shader validation and precompilation (via
//! `lazy_static`), and compute dispatch.
//!
//! All shaders are compiled once, the first time any kernel runs. Tensors stay
//! host-resident: each call uploads its operands as `f32`, dispatches, blocks
//! until the queue is idle and reads the results back into the caller's tensor.
//!
//! ## Notes
//!
//! - Scalar reductions (losses, `sum`, `evaluate_*`) compute their per-element
//!   terms on the device and finish the sum on the host, row by row.
//! - Random fills are drawn on the host from the caller's [`RngState`].
//! - Precision is `f32` regardless of the element type.
//! - Failures are returned as [`GpuFailure`] so a caller can rerun on the host;
//!   nothing in this module panics on a missing or lost device.

mod kernels;
mod launch;

use crate::backend::{Backend, Device, GemmKernel};
use crate::element::Element;
use crate::error::Result;
use crate::ops::cpu;
use crate::random::RngState;
use crate::tensors::Tensor;
use briny::prelude::*;
use kernels::{ElementwiseOp, RowOp};

const ELEMENTWISE: &str = include_str!("shaders/elementwise.wgsl");
const ROWS: &str = include_str!("shaders/rows.wgsl");
const GRADIENT_DESCENT: &str = include_str!("shaders/gradient_descent.wgsl");
const GEMM: &str = include_str!("shaders/gemm.wgsl");
const GEMM_TILED: &str = include_str!("shaders/gemm_tiled.wgsl");

/// Failures while acquiring the GPU.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// No suitable adapter.
    #[error("adapter error: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    /// The adapter refused to open a device.
    #[error("device error: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// A kernel that could not run on the GPU.
#[derive(Debug, thiserror::Error)]
pub enum GpuFailure {
    /// The GPU itself could not be acquired.
    #[error("GPU failure: {0}")]
    Gpu(#[from] GpuError),
    /// A shader was rejected before compilation.
    #[error("GPU failure: shader rejected: {0}")]
    Validation(#[from] ValidationError),
    /// Any other failure, described in text.
    #[error("GPU failure: {0}")]
    Message(String),
}

impl From<&str> for GpuFailure {
    fn from(msg: &str) -> Self {
        Self::Message(msg.to_string())
    }
}

impl From<String> for GpuFailure {
    fn from(msg: String) -> Self {
        Self::Message(msg)
    }
}

/// WGSL source that has to pass a few sanity checks before it is compiled.
pub struct WgslSource<'a>(pub &'a str);

impl Validate for WgslSource<'_> {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        let src = self.0;
        if src.len() > 65536 || !src.contains("fn main") {
            return Err(ValidationError);
        }
        let forbidden = ["import", "#include", "asm", "unsafe", "ptr", "std::"];
        if forbidden.iter().any(|bad| src.contains(bad)) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Validates `source` and compiles it into a shader module.
pub fn load_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> core::result::Result<wgpu::ShaderModule, GpuFailure> {
    WgslSource(source).validate()?;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}

fn buffer_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Every compiled kernel, sharing one bind group layout.
pub(crate) struct Pipelines {
    pub layout: wgpu::BindGroupLayout,
    pub elementwise: wgpu::ComputePipeline,
    pub rows: wgpu::ComputePipeline,
    pub gradient_descent: wgpu::ComputePipeline,
    pub gemm: wgpu::ComputePipeline,
    pub gemm_tiled: wgpu::ComputePipeline,
}

impl Pipelines {
    fn create(device: &wgpu::Device) -> core::result::Result<Self, GpuFailure> {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel_bgl"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                buffer_entry(2, wgpu::BufferBindingType::Storage { read_only: true }),
                buffer_entry(3, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kernel_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = |label: &str, source: &str| {
            let module = load_shader(device, label, source)?;
            Ok::<_, GpuFailure>(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                cache: None,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }))
        };
        Ok(Self {
            elementwise: pipeline("elementwise", ELEMENTWISE)?,
            rows: pipeline("rows", ROWS)?,
            gradient_descent: pipeline("gradient_descent", GRADIENT_DESCENT)?,
            gemm: pipeline("gemm", GEMM)?,
            gemm_tiled: pipeline("gemm_tiled", GEMM_TILED)?,
            layout,
        })
    }
}

/// The WGPU device and queue plus every compiled pipeline.
///
/// Initialized once globally and reused for all kernels.
pub struct GpuContext {
    /// The actual GPU device.
    pub device: wgpu::Device,
    /// Submission queue of the device.
    pub queue: wgpu::Queue,
    pub(crate) pipelines: Pipelines,
}

impl GpuContext {
    /// Selects the default adapter, opens a device and compiles every kernel.
    ///
    /// Shader compilation runs inside a validation error scope, so a driver
    /// that rejects a shader produces an error instead of a panic.
    pub fn new() -> core::result::Result<Self, GpuFailure> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .map_err(GpuError::Adapter)?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(GpuError::Device)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipelines = Pipelines::create(&device);
        let scope = pollster::block_on(device.pop_error_scope());
        let pipelines = pipelines?;
        if let Some(err) = scope {
            return Err(GpuFailure::from(format!("pipeline creation failed: {err}")));
        }

        tracing::debug!(adapter = %adapter.get_info().name, "gpu context ready");
        Ok(Self {
            device,
            queue,
            pipelines,
        })
    }
}

lazy_static::lazy_static! {
    static ref GPU_CONTEXT: core::result::Result<GpuContext, String> =
        GpuContext::new().map_err(|e| e.to_string());
}

/// The shared context, created on first use.
///
/// # Errors
/// [`GpuFailure`] if initialization failed; the failure is remembered and
/// reported again on every call.
pub fn context() -> core::result::Result<&'static GpuContext, GpuFailure> {
    match &*GPU_CONTEXT {
        Ok(ctx) => Ok(ctx),
        Err(msg) => Err(GpuFailure::from(msg.clone())),
    }
}

/// `true` when a GPU context could be created.
pub fn is_available() -> bool {
    context().is_ok()
}

/// GPU implementation of [`Backend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WgpuBackend;

impl WgpuBackend {
    /// Creates the backend, initializing the GPU context if needed.
    ///
    /// # Errors
    /// `Error::Gpu` if no usable GPU is present.
    pub fn new() -> Result<Self> {
        context()?;
        Ok(Self)
    }
}

impl<T: Element> Backend<T> for WgpuBackend {
    fn device(&self) -> Device {
        Device::Wgpu
    }

    fn rectlin_apply(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::RectlinApply, input, None, slope.into_f32(), output, false)?;
        Ok(())
    }

    fn rectlin_derivative(&self, input: &Tensor<T>, slope: T, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::RectlinDerivative, input, None, slope.into_f32(), output, true)?;
        Ok(())
    }

    fn logistic_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::LogisticApply, input, None, 0.0, output, false)?;
        Ok(())
    }

    fn logistic_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) -> Result<()> {
        crate::ops::check_same_size("logistic_derivative", input, output);
        if !short_cut {
            kernels::elementwise(ElementwiseOp::LogisticDerivative, input, None, 0.0, output, true)?;
        }
        Ok(())
    }

    fn softmax_apply(&self, input: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::rows(RowOp::Softmax, input, None, output, false)?;
        Ok(())
    }

    fn softmax_derivative(&self, input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) -> Result<()> {
        crate::ops::check_same_size("softmax_derivative", input, output);
        if !short_cut {
            kernels::rows(RowOp::SoftmaxBackward, input, None, output, true)?;
        }
        Ok(())
    }

    fn cross_entropy_binary_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        Ok(kernels::per_sample_sum(ElementwiseOp::CrossEntropyBinaryTerm, input, target)?)
    }

    fn cross_entropy_binary_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Difference, input, Some(target), 0.0, output, false)?;
        Ok(())
    }

    fn cross_entropy_multi_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        Ok(kernels::per_sample_sum(ElementwiseOp::CrossEntropyMultiTerm, input, target)?)
    }

    fn cross_entropy_multi_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Difference, input, Some(target), 0.0, output, false)?;
        Ok(())
    }

    fn square_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        let per_sample = kernels::per_sample_sum(ElementwiseOp::SquaredDifference, input, target)?;
        Ok(per_sample / (T::ONE + T::ONE))
    }

    fn square_mean_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Difference, input, Some(target), 0.0, output, false)?;
        Ok(())
    }

    fn abs_mean_apply(&self, input: &Tensor<T>, target: &Tensor<T>) -> Result<T> {
        Ok(kernels::per_sample_sum(ElementwiseOp::AbsDifference, input, target)?)
    }

    fn abs_mean_derivative(&self, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Sign, input, Some(target), 0.0, output, false)?;
        Ok(())
    }

    fn bias_forward(&self, input: &Tensor<T>, bias: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::bias_forward(input, bias, output)?;
        Ok(())
    }

    fn bias_backward_update(&self, input: &Tensor<T>, update: &mut Tensor<T>) -> Result<()> {
        kernels::bias_backward_update(input, update)?;
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
        kernels::gradient_descent(
            [momentum_coef, learning_rate, decay],
            batch_size,
            weight,
            gradient,
            velocity,
        )?;
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
        let plan = crate::ops::GemmPlan::new(left, right, transa, transb, output);
        kernels::gemm(&plan, left, right, alpha, beta, output, kernel)?;
        Ok(())
    }

    fn maximum(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Maximum, left, Some(right), 0.0, output, false)?;
        Ok(())
    }

    fn maximum_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::MaximumScalar, left, None, right.into_f32(), output, false)?;
        Ok(())
    }

    fn minus(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Difference, left, Some(right), 0.0, output, false)?;
        Ok(())
    }

    fn minus_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::MinusScalar, left, None, right.into_f32(), output, false)?;
        Ok(())
    }

    fn add(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Add, left, Some(right), 0.0, output, false)?;
        Ok(())
    }

    fn multiply(&self, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::Multiply, left, Some(right), 0.0, output, false)?;
        Ok(())
    }

    fn multiply_scalar(&self, left: &Tensor<T>, right: T, output: &mut Tensor<T>) -> Result<()> {
        kernels::elementwise(ElementwiseOp::MultiplyScalar, left, None, right.into_f32(), output, false)?;
        Ok(())
    }

    fn sum(&self, input: &Tensor<T>) -> Result<T> {
        Ok(cpu::elementwise::sum(input))
    }

    fn make_binary_mask(&self, low: T, high: T, keep: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        cpu::random::make_binary_mask(low, high, keep, output, rng)
    }

    fn constant_distribution(&self, val: T, output: &mut Tensor<T>) -> Result<()> {
        cpu::random::constant_distribution(val, output);
        Ok(())
    }

    fn uniform_distribution(&self, low: T, high: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        cpu::random::uniform_distribution(low, high, output, rng)
    }

    fn normal_distribution(&self, loc: T, scale: T, output: &mut Tensor<T>, rng: &mut RngState) -> Result<()> {
        cpu::random::normal_distribution(loc, scale, output, rng)
    }

    fn evaluate_classify(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32> {
        Ok(kernels::evaluate_classify(output, target)?)
    }

    fn evaluate_regress(&self, output: &Tensor<T>, target: &Tensor<T>) -> Result<f32> {
        let total: T = kernels::per_sample_sum(ElementwiseOp::SquaredDifference, output, target)?;
        Ok(total.into_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_shaders_pass_validation() {
        for src in [ELEMENTWISE, ROWS, GRADIENT_DESCENT, GEMM, GEMM_TILED] {
            assert!(WgslSource(src).validate().is_ok());
        }
    }

    #[test]
    fn validation_rejects_inline_assembly_and_includes() {
        assert!(WgslSource("fn main() { asm }").validate().is_err());
        assert!(WgslSource("#include <x>\nfn main() {}").validate().is_err());
        assert!(WgslSource("fn helper() {}").validate().is_err());
    }
}
