//! Host matrix multiply.
//!
//! Two interchangeable paths compute `C = alpha * op(A) * op(B) + beta * C`:
//!
//! - [`blas`] hands the strided views to `matrixmultiply`, which packs and
//!   blocks internally.
//! - [`asm`] packs `op(B)` into a contiguous `k × n` panel once, then runs an
//!   `i-k-j` micro-kernel per output row in parallel with `rayon`.
//!
//! With `beta == 0` the previous contents of `C` are ignored, `NaN`s included.

use crate::element::Element;
use crate::ops::GemmPlan;
use crate::tensors::Tensor;
use rayon::prelude::*;

/// Depth of one packed slab of `op(B)` rows handled per pass over an output row.
const KC: usize = 256;

#[allow(clippy::cast_possible_wrap)]
fn strides(view: &crate::ops::MatrixView) -> (isize, isize) {
    let (rs, cs) = view.strides();
    (rs as isize, cs as isize)
}

/// Library path.
pub(crate) fn blas<T: Element>(
    plan: &GemmPlan,
    left: &Tensor<T>,
    right: &Tensor<T>,
    alpha: T,
    beta: T,
    output: &mut Tensor<T>,
) {
    let (rsa, csa) = strides(&plan.a);
    let (rsb, csb) = strides(&plan.b);
    #[allow(clippy::cast_possible_wrap)]
    let rsc = plan.n as isize;
    T::gemm(
        plan.m,
        plan.k,
        plan.n,
        alpha,
        (left.data(), rsa, csa),
        (right.data(), rsb, csb),
        beta,
        (output.data_mut(), rsc, 1),
    );
}

/// Hand-written path: packed `op(B)` panel plus a row-parallel micro-kernel.
pub(crate) fn asm<T: Element>(
    plan: &GemmPlan,
    left: &Tensor<T>,
    right: &Tensor<T>,
    alpha: T,
    beta: T,
    output: &mut Tensor<T>,
) {
    let GemmPlan { k, n, a, b, .. } = *plan;
    let a_data = left.data();
    let b_data = right.data();

    let mut panel = vec![T::ZERO; k * n];
    panel.par_chunks_mut(n).enumerate().for_each(|(l, row)| {
        for (j, p) in row.iter_mut().enumerate() {
            *p = b_data[b.at(l, j)];
        }
    });

    output
        .data_mut()
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, c_row)| {
            if beta == T::ZERO {
                c_row.iter_mut().for_each(|c| *c = T::ZERO);
            } else {
                c_row.iter_mut().for_each(|c| *c *= beta);
            }
            for l0 in (0..k).step_by(KC) {
                for l in l0..(l0 + KC).min(k) {
                    let a_il = alpha * a_data[a.at(i, l)];
                    let b_row = &panel[l * n..(l + 1) * n];
                    for (c, &bv) in c_row.iter_mut().zip(b_row) {
                        *c += a_il * bv;
                    }
                }
            }
        });
}
