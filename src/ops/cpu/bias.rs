//! Bias broadcast and its reduction.

use crate::element::Element;
use crate::ops::{check_bias, check_same_size};
use crate::tensors::Tensor;
use rayon::prelude::*;

/// `out[n, j] = x[n, j] + bias[j]`
pub fn bias_forward<T: Element>(input: &Tensor<T>, bias: &Tensor<T>, output: &mut Tensor<T>) {
    check_same_size("bias_forward", input, output);
    let dim = check_bias("bias_forward", input, bias);
    if dim == 0 {
        return;
    }
    let b = bias.data();
    output
        .data_mut()
        .par_chunks_mut(dim)
        .zip(input.data().par_chunks(dim))
        .for_each(|(out, x)| {
            for ((o, &v), &bj) in out.iter_mut().zip(x).zip(b) {
                *o = v + bj;
            }
        });
}

/// `update[j] = sum_n x[n, j]`, overwriting `update`.
pub fn bias_backward_update<T: Element>(input: &Tensor<T>, update: &mut Tensor<T>) {
    let dim = check_bias("bias_backward_update", input, update);
    let rows = input.rows();
    let x = input.data();
    update
        .data_mut()
        .par_iter_mut()
        .enumerate()
        .for_each(|(j, u)| *u = (0..rows).map(|n| x[n * dim + j]).sum());
}
