//! Activation kernels and their chain-rule counterparts.
//!
//! Every derivative works in place: `output` holds the upstream gradient on
//! entry and the gradient with respect to the activation input on return.

use crate::element::Element;
use crate::ops::check_same_size;
use crate::tensors::Tensor;
use rayon::prelude::*;

#[inline]
fn logistic<T: Element>(x: T) -> T {
    T::ONE / (T::ONE + (-x).exp())
}

/// `out = max(x, 0) + slope * min(x, 0)`
pub fn rectlin_apply<T: Element>(input: &Tensor<T>, slope: T, output: &mut Tensor<T>) {
    check_same_size("rectlin_apply", input, output);
    output
        .data_mut()
        .par_iter_mut()
        .zip(input.data().par_iter())
        .for_each(|(o, &x)| *o = if x > T::ZERO { x } else { slope * x });
}

/// `out *= 1` where `x > 0`, `out *= slope` elsewhere.
pub fn rectlin_derivative<T: Element>(input: &Tensor<T>, slope: T, output: &mut Tensor<T>) {
    check_same_size("rectlin_derivative", input, output);
    output
        .data_mut()
        .par_iter_mut()
        .zip(input.data().par_iter())
        .for_each(|(o, &x)| {
            if x <= T::ZERO {
                *o *= slope;
            }
        });
}

/// `out = 1 / (1 + e^-x)`
pub fn logistic_apply<T: Element>(input: &Tensor<T>, output: &mut Tensor<T>) {
    check_same_size("logistic_apply", input, output);
    output
        .data_mut()
        .par_iter_mut()
        .zip(input.data().par_iter())
        .for_each(|(o, &x)| *o = logistic(x));
}

/// `out *= y * (1 - y)` with `y` recomputed from `input`; identity when `short_cut`.
pub fn logistic_derivative<T: Element>(input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) {
    check_same_size("logistic_derivative", input, output);
    if short_cut {
        return;
    }
    output
        .data_mut()
        .par_iter_mut()
        .zip(input.data().par_iter())
        .for_each(|(o, &x)| {
            let y = logistic(x);
            *o *= y * (T::ONE - y);
        });
}

/// Row-wise `exp(x) / sum(exp(x))` over a `[num_sample, dim]` view.
pub fn softmax_apply<T: Element>(input: &Tensor<T>, output: &mut Tensor<T>) {
    check_same_size("softmax_apply", input, output);
    if input.size() == 0 {
        return;
    }
    let dim = input.row_len();
    output
        .data_mut()
        .par_chunks_mut(dim)
        .zip(input.data().par_chunks(dim))
        .for_each(|(out, x)| {
            let mut total = T::ZERO;
            for (o, &v) in out.iter_mut().zip(x) {
                *o = v.exp();
                total += *o;
            }
            out.iter_mut().for_each(|o| *o /= total);
        });
}

/// Softmax Jacobian-vector product per row, in place; identity when `short_cut`.
pub fn softmax_derivative<T: Element>(input: &Tensor<T>, output: &mut Tensor<T>, short_cut: bool) {
    check_same_size("softmax_derivative", input, output);
    if short_cut || input.size() == 0 {
        return;
    }
    let dim = input.row_len();
    output
        .data_mut()
        .par_chunks_mut(dim)
        .zip(input.data().par_chunks(dim))
        .for_each(|(grad, x)| {
            let exps: Vec<T> = x.iter().map(|v| v.exp()).collect();
            let total: T = exps.iter().copied().sum();
            let y: Vec<T> = exps.into_iter().map(|e| e / total).collect();
            let dot: T = grad.iter().zip(&y).map(|(&g, &yi)| g * yi).sum();
            for (g, &yi) in grad.iter_mut().zip(&y) {
                *g = yi * (*g - dot);
            }
        });
}
