//! # Kernel Implementations
//!
//! This module holds the device implementations of [`Backend`](crate::backend::Backend)
//! and the checks they share.
//!
//! ## Submodules
//!
//! - [`cpu`]: Multi-threaded host kernels (always available)
//! - [`wgpu`] *(opt-in)*: GPU compute shader pipelines using `wgpu`
//! - [`dispatch`]: Runtime device selection with host fallback
//!
//! ## Extending the Backend
//!
//! To add a new kernel:
//!
//! 1. Declare it on the `Backend` trait
//! 2. Implement it in [`cpu`] and, where it pays off, in [`wgpu`]
//! 3. Route it in [`dispatch`]
//! 4. Put shape/consistency checks here so every device panics the same way

pub mod cpu;
pub mod dispatch;
#[cfg(feature = "wgpu")]
pub mod wgpu;

use crate::tensors::Tensor;

/// Panics unless `a` and `b` hold the same number of elements.
#[track_caller]
pub(crate) fn check_same_size<T>(op: &str, a: &Tensor<T>, b: &Tensor<T>) {
    assert_eq!(
        a.size(),
        b.size(),
        "{op}: size mismatch ({:?} vs {:?})",
        a.shape(),
        b.shape()
    );
}

/// Panics unless `bias` holds exactly one value per feature of `input`.
#[track_caller]
pub(crate) fn check_bias<T>(op: &str, input: &Tensor<T>, bias: &Tensor<T>) -> usize {
    let dim = if input.rows() == 0 { 0 } else { input.row_len() };
    assert_eq!(
        bias.size(),
        dim,
        "{op}: bias has {} elements, expected {dim}",
        bias.size()
    );
    dim
}

/// Strided view of `op(X)` for one matrix-multiply operand.
///
/// The operand's buffer is first read as a row-major `stored_rows × ld`
/// matrix: `[shape[0], size / shape[0]]` for a row-major tensor, and the
/// swapped pair for a column-major one. `transposed` is the caller's flag
/// XOR "stored column-major".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MatrixView {
    pub rows: usize,
    pub cols: usize,
    pub ld: usize,
    pub transposed: bool,
}

impl MatrixView {
    pub(crate) fn of<T>(tensor: &Tensor<T>, trans: bool) -> Self {
        let lead = tensor.rows();
        let rest = if lead == 0 { 0 } else { tensor.size() / lead };
        let (stored_rows, ld) = if tensor.row_major() {
            (lead, rest)
        } else {
            (rest, lead)
        };
        let transposed = trans ^ !tensor.row_major();
        let (rows, cols) = if transposed {
            (ld, stored_rows)
        } else {
            (stored_rows, ld)
        };
        Self {
            rows,
            cols,
            ld,
            transposed,
        }
    }

    /// `(row_stride, col_stride)` of the view into the buffer.
    pub(crate) fn strides(&self) -> (usize, usize) {
        if self.transposed {
            (1, self.ld)
        } else {
            (self.ld, 1)
        }
    }

    /// Buffer offset of element `(i, j)` of the view.
    #[inline]
    pub(crate) fn at(&self, i: usize, j: usize) -> usize {
        let (rs, cs) = self.strides();
        i * rs + j * cs
    }
}

/// Validated dimensions of `output[m, n] = op(A)[m, k] · op(B)[k, n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GemmPlan {
    pub m: usize,
    pub k: usize,
    pub n: usize,
    pub a: MatrixView,
    pub b: MatrixView,
}

impl GemmPlan {
    /// Resolves both operand views and checks them against `output`.
    ///
    /// # Panics
    /// - If any of `m`, `k`, `n` is zero
    /// - If the common dimensions differ
    /// - If `output` is column-major or does not hold `m * n` elements
    #[track_caller]
    pub(crate) fn new<T>(
        left: &Tensor<T>,
        right: &Tensor<T>,
        transa: bool,
        transb: bool,
        output: &Tensor<T>,
    ) -> Self {
        let a = MatrixView::of(left, transa);
        let b = MatrixView::of(right, transb);
        let (m, k, n) = (a.rows, a.cols, b.cols);
        assert!(
            m != 0 && k != 0 && n != 0,
            "matrix_dot: zero dimension (m={m}, k={k}, n={n})"
        );
        assert_eq!(
            k, b.rows,
            "matrix_dot: common dimension mismatch ({k} vs {})",
            b.rows
        );
        assert!(output.row_major(), "matrix_dot: output must be row-major");
        assert_eq!(
            output.size(),
            m * n,
            "matrix_dot: output has {} elements, expected {m}x{n}",
            output.size()
        );
        tracing::debug!(m, k, n, transa = a.transposed, transb = b.transposed, "gemm");
        Self { m, k, n, a, b }
    }
}
