//! Host-side drivers for the WGSL kernels.
//!
//! Each driver performs the same shape checks as the host kernels, converts
//! operands to `f32`, launches one shader and stores the results back.

use super::launch::{Launch, Params, groups, word};
use super::{GpuFailure, context};
use crate::backend::GemmKernel;
use crate::element::Element;
use crate::ops::{GemmPlan, check_bias, check_same_size};
use crate::tensors::Tensor;

type GpuResult<T> = core::result::Result<T, GpuFailure>;

const ELEMENTWISE_GROUP: usize = 256;
const ROWS_GROUP: usize = 64;
const GEMM_TILE: usize = 16;

/// Operation codes understood by `elementwise.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum ElementwiseOp {
    RectlinApply = 0,
    RectlinDerivative = 1,
    LogisticApply = 2,
    LogisticDerivative = 3,
    Difference = 4,
    Sign = 5,
    Add = 6,
    Multiply = 7,
    Maximum = 8,
    MinusScalar = 9,
    MultiplyScalar = 10,
    MaximumScalar = 11,
    BiasForward = 12,
    CrossEntropyBinaryTerm = 13,
    CrossEntropyMultiTerm = 14,
    SquaredDifference = 15,
    AbsDifference = 16,
}

impl ElementwiseOp {
    fn name(self) -> &'static str {
        match self {
            Self::RectlinApply => "rectlin_apply",
            Self::RectlinDerivative => "rectlin_derivative",
            Self::LogisticApply => "logistic_apply",
            Self::LogisticDerivative => "logistic_derivative",
            Self::Difference => "difference",
            Self::Sign => "abs_mean_derivative",
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Maximum => "maximum",
            Self::MinusScalar => "minus_scalar",
            Self::MultiplyScalar => "multiply_scalar",
            Self::MaximumScalar => "maximum_scalar",
            Self::BiasForward => "bias_forward",
            Self::CrossEntropyBinaryTerm => "cross_entropy_binary_apply",
            Self::CrossEntropyMultiTerm => "cross_entropy_multi_apply",
            Self::SquaredDifference => "squared_difference",
            Self::AbsDifference => "abs_mean_apply",
        }
    }
}

/// Operation codes understood by `rows.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum RowOp {
    Softmax = 0,
    SoftmaxBackward = 1,
    ColumnSum = 2,
    Classify = 3,
}

fn upload<T: Element>(data: &[T]) -> Vec<f32> {
    data.iter().map(|x| x.into_f32()).collect()
}

fn store<T: Element>(src: &[f32], dst: &mut [T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = T::from_f32(s);
    }
}

fn launch_elementwise(
    op: ElementwiseOp,
    a: &[f32],
    b: &[f32],
    scalar: f32,
    dim: usize,
    out: &mut [f32],
) -> GpuResult<()> {
    let ctx = context()?;
    let params = Params {
        u: [op as u32, word(out.len())?, word(dim)?, 0, 0, 0, 0, 0],
        s: [scalar, 0.0, 0.0, 0.0],
    };
    Launch {
        label: op.name(),
        pipeline: &ctx.pipelines.elementwise,
        params,
        a,
        b,
        groups: (groups(ctx, out.len(), ELEMENTWISE_GROUP)?, 1),
    }
    .run(ctx, out)
}

fn launch_rows(
    op: RowOp,
    a: &[f32],
    b: &[f32],
    invocations: usize,
    dim: usize,
    rows: usize,
    out: &mut [f32],
) -> GpuResult<()> {
    let ctx = context()?;
    let params = Params {
        u: [op as u32, word(invocations)?, word(dim)?, word(rows)?, 0, 0, 0, 0],
        s: [0.0; 4],
    };
    Launch {
        label: "rows",
        pipeline: &ctx.pipelines.rows,
        params,
        a,
        b,
        groups: (groups(ctx, invocations, ROWS_GROUP)?, 1),
    }
    .run(ctx, out)
}

/// One elementwise shader pass into `output`.
///
/// With `in_place` the previous contents of `output` are visible to the shader.
pub(crate) fn elementwise<T: Element>(
    op: ElementwiseOp,
    input: &Tensor<T>,
    other: Option<&Tensor<T>>,
    scalar: f32,
    output: &mut Tensor<T>,
    in_place: bool,
) -> GpuResult<()> {
    check_same_size(op.name(), input, output);
    if let Some(other) = other {
        check_same_size(op.name(), input, other);
    }
    let b = other.map(|t| upload(t.data())).unwrap_or_default();
    let mut out = if in_place {
        upload(output.data())
    } else {
        vec![0.0; output.size()]
    };
    launch_elementwise(op, &upload(input.data()), &b, scalar, 0, &mut out)?;
    store(&out, output.data_mut());
    Ok(())
}

/// Per-element terms on the device, summed row by row on the host and
/// divided by the sample count.
pub(crate) fn per_sample_sum<T: Element>(
    op: ElementwiseOp,
    input: &Tensor<T>,
    target: &Tensor<T>,
) -> GpuResult<T> {
    check_same_size(op.name(), input, target);
    if input.size() == 0 {
        return Ok(T::ZERO);
    }
    let mut terms = vec![0.0; input.size()];
    launch_elementwise(op, &upload(input.data()), &upload(target.data()), 0.0, 0, &mut terms)?;
    let total: T = terms
        .chunks(input.row_len())
        .map(|row| row.iter().map(|&x| T::from_f32(x)).sum::<T>())
        .sum();
    Ok(total / T::from_usize(input.rows()))
}

pub(crate) fn bias_forward<T: Element>(
    input: &Tensor<T>,
    bias: &Tensor<T>,
    output: &mut Tensor<T>,
) -> GpuResult<()> {
    check_same_size("bias_forward", input, output);
    let dim = check_bias("bias_forward", input, bias);
    if dim == 0 {
        return Ok(());
    }
    let mut out = vec![0.0; output.size()];
    launch_elementwise(
        ElementwiseOp::BiasForward,
        &upload(input.data()),
        &upload(bias.data()),
        0.0,
        dim,
        &mut out,
    )?;
    store(&out, output.data_mut());
    Ok(())
}

pub(crate) fn bias_backward_update<T: Element>(input: &Tensor<T>, update: &mut Tensor<T>) -> GpuResult<()> {
    let dim = check_bias("bias_backward_update", input, update);
    if dim == 0 {
        return Ok(());
    }
    let mut out = vec![0.0; dim];
    launch_rows(RowOp::ColumnSum, &upload(input.data()), &[], dim, dim, input.rows(), &mut out)?;
    store(&out, update.data_mut());
    Ok(())
}

/// Softmax forward or backward, one invocation per row.
pub(crate) fn rows<T: Element>(
    op: RowOp,
    input: &Tensor<T>,
    other: Option<&Tensor<T>>,
    output: &mut Tensor<T>,
    in_place: bool,
) -> GpuResult<()> {
    check_same_size("softmax", input, output);
    if input.size() == 0 {
        return Ok(());
    }
    let b = other.map(|t| upload(t.data())).unwrap_or_default();
    let mut out = if in_place {
        upload(output.data())
    } else {
        vec![0.0; output.size()]
    };
    let n = input.rows();
    launch_rows(op, &upload(input.data()), &b, n, input.row_len(), n, &mut out)?;
    store(&out, output.data_mut());
    Ok(())
}

pub(crate) fn evaluate_classify<T: Element>(output: &Tensor<T>, target: &Tensor<T>) -> GpuResult<f32> {
    check_same_size("evaluate_classify", output, target);
    if output.size() == 0 {
        return Ok(0.0);
    }
    let n = output.rows();
    let mut hits = vec![0.0; n];
    launch_rows(
        RowOp::Classify,
        &upload(output.data()),
        &upload(target.data()),
        n,
        output.row_len(),
        n,
        &mut hits,
    )?;
    let count = hits.iter().filter(|&&h| h == 1.0).count();
    #[allow(clippy::cast_precision_loss)]
    let score = count as f32 / n as f32;
    Ok(score)
}

pub(crate) fn gradient_descent<T: Element>(
    [momentum_coef, learning_rate, decay]: [T; 3],
    batch_size: usize,
    weight: &mut Tensor<T>,
    gradient: &mut Tensor<T>,
    velocity: &mut Tensor<T>,
) -> GpuResult<()> {
    check_same_size("gradient_descent", weight, gradient);
    check_same_size("gradient_descent", weight, velocity);
    assert!(batch_size != 0, "gradient_descent: batch_size must be non-zero");
    let len = weight.size();
    if len == 0 {
        return Ok(());
    }

    let mut packed = Vec::with_capacity(3 * len);
    packed.extend(weight.data().iter().map(|x| x.into_f32()));
    packed.extend(gradient.data().iter().map(|x| x.into_f32()));
    packed.extend(velocity.data().iter().map(|x| x.into_f32()));

    let ctx = context()?;
    #[allow(clippy::cast_precision_loss)]
    let batch = batch_size as f32;
    let params = Params {
        u: [0, word(len)?, 0, 0, 0, 0, 0, 0],
        s: [momentum_coef.into_f32(), learning_rate.into_f32(), decay.into_f32(), batch],
    };
    Launch {
        label: "gradient_descent",
        pipeline: &ctx.pipelines.gradient_descent,
        params,
        a: &[],
        b: &[],
        groups: (groups(ctx, len, ELEMENTWISE_GROUP)?, 1),
    }
    .run(ctx, &mut packed)?;

    store(&packed[..len], weight.data_mut());
    store(&packed[len..2 * len], gradient.data_mut());
    store(&packed[2 * len..], velocity.data_mut());
    Ok(())
}

pub(crate) fn gemm<T: Element>(
    plan: &GemmPlan,
    left: &Tensor<T>,
    right: &Tensor<T>,
    alpha: T,
    beta: T,
    output: &mut Tensor<T>,
    kernel: GemmKernel,
) -> GpuResult<()> {
    let ctx = context()?;
    let (label, pipeline) = match kernel {
        GemmKernel::Blas => ("gemm", &ctx.pipelines.gemm),
        GemmKernel::Asm => ("gemm_tiled", &ctx.pipelines.gemm_tiled),
    };
    let flags = u32::from(plan.a.transposed) | (u32::from(plan.b.transposed) << 1);
    let params = Params {
        u: [
            word(plan.m)?,
            word(plan.k)?,
            word(plan.n)?,
            flags,
            word(plan.a.ld)?,
            word(plan.b.ld)?,
            0,
            0,
        ],
        s: [alpha.into_f32(), beta.into_f32(), 0.0, 0.0],
    };
    let mut out = if beta == T::ZERO {
        vec![0.0; output.size()]
    } else {
        upload(output.data())
    };
    Launch {
        label,
        pipeline,
        params,
        a: &upload(left.data()),
        b: &upload(right.data()),
        groups: (groups(ctx, plan.n, GEMM_TILE)?, groups(ctx, plan.m, GEMM_TILE)?),
    }
    .run(ctx, &mut out)?;
    store(&out, output.data_mut());
    Ok(())
}
