//! Loss kernels.
//!
//! Scalar losses are normalised by the leading (sample) dimension, not by the
//! element count. Each reduction is a per-row partial sum followed by an
//! ordered sum of the partials, so the result is independent of scheduling.

use crate::element::{Element, safe_log};
use crate::ops::check_same_size;
use crate::tensors::Tensor;
use rayon::prelude::*;

/// `sum_i term(x_i, t_i)`, reduced row by row.
pub(crate) fn paired_sum<T, F>(input: &Tensor<T>, target: &Tensor<T>, term: F) -> T
where
    T: Element,
    F: Fn(T, T) -> T + Sync,
{
    if input.size() == 0 {
        return T::ZERO;
    }
    let dim = input.row_len();
    let partials: Vec<T> = input
        .data()
        .par_chunks(dim)
        .zip(target.data().par_chunks(dim))
        .map(|(x, t)| x.iter().zip(t).map(|(&x, &t)| term(x, t)).sum())
        .collect();
    partials.into_iter().sum()
}

fn per_sample<T: Element>(total: T, input: &Tensor<T>) -> T {
    total / T::from_usize(input.rows())
}

/// `out = x - t`, the derivative shared by every loss below except abs-mean.
pub fn difference<T: Element>(op: &str, input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) {
    check_same_size(op, input, target);
    check_same_size(op, input, output);
    output
        .data_mut()
        .par_iter_mut()
        .zip(input.data().par_iter().zip(target.data().par_iter()))
        .for_each(|(o, (&x, &t))| *o = x - t);
}

/// `sum(-safe_log(x) * t - safe_log(1 - x) * (1 - t)) / shape[0]`
pub fn cross_entropy_binary_apply<T: Element>(input: &Tensor<T>, target: &Tensor<T>) -> T {
    check_same_size("cross_entropy_binary_apply", input, target);
    let total = paired_sum(input, target, |x, t| {
        -safe_log(x) * t - safe_log(T::ONE - x) * (T::ONE - t)
    });
    per_sample(total, input)
}

/// `sum(safe_log(x) * t) / shape[0]`
pub fn cross_entropy_multi_apply<T: Element>(input: &Tensor<T>, target: &Tensor<T>) -> T {
    check_same_size("cross_entropy_multi_apply", input, target);
    let total = paired_sum(input, target, |x, t| safe_log(x) * t);
    per_sample(total, input)
}

/// `sum((x - t)^2) / (2 * shape[0])`
pub fn square_mean_apply<T: Element>(input: &Tensor<T>, target: &Tensor<T>) -> T {
    check_same_size("square_mean_apply", input, target);
    let total = paired_sum(input, target, |x, t| (x - t) * (x - t));
    per_sample(total, input) / (T::ONE + T::ONE)
}

/// `sum(|x - t|) / shape[0]`
pub fn abs_mean_apply<T: Element>(input: &Tensor<T>, target: &Tensor<T>) -> T {
    check_same_size("abs_mean_apply", input, target);
    let total = paired_sum(input, target, |x, t| (x - t).abs());
    per_sample(total, input)
}

/// `out = sign(x - t)`, zero where equal.
pub fn abs_mean_derivative<T: Element>(input: &Tensor<T>, target: &Tensor<T>, output: &mut Tensor<T>) {
    check_same_size("abs_mean_derivative", input, target);
    check_same_size("abs_mean_derivative", input, output);
    output
        .data_mut()
        .par_iter_mut()
        .zip(input.data().par_iter().zip(target.data().par_iter()))
        .for_each(|(o, (&x, &t))| {
            *o = if x > t {
                T::ONE
            } else if x < t {
                -T::ONE
            } else {
                T::ZERO
            };
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;
    use approx::assert_abs_diff_eq;

    #[test]
    fn losses_divide_by_sample_count() {
        let x = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let t = tensor!([[0.0, 0.0], [0.0, 0.0]]);
        // (1 + 4 + 9 + 16) / (2 * 2)
        assert_abs_diff_eq!(square_mean_apply(&x, &t), 7.5);
        // (1 + 2 + 3 + 4) / 2
        assert_abs_diff_eq!(abs_mean_apply(&x, &t), 5.0);
    }

    #[test]
    fn multi_class_cross_entropy_keeps_log_sign() {
        let x = tensor!([[0.5, 0.5]]);
        let t = tensor!([[1.0, 0.0]]);
        assert_abs_diff_eq!(cross_entropy_multi_apply(&x, &t), 0.5f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn binary_cross_entropy_is_finite_at_saturation() {
        let x = tensor!([[0.0f64, 1.0]]);
        let t = tensor!([[1.0, 0.0]]);
        let loss = cross_entropy_binary_apply(&x, &t);
        assert!(loss.is_finite());
        assert_abs_diff_eq!(loss, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn abs_mean_derivative_is_a_sign() {
        let x = tensor!([1.0, 2.0, 3.0]);
        let t = tensor!([2.0, 2.0, 2.0]);
        let mut out = x.zeros_like();
        abs_mean_derivative(&x, &t, &mut out);
        assert_eq!(out.data(), &[-1.0, 0.0, 1.0]);
    }

    #[test]
    fn empty_batch_sums_to_zero() {
        let x: Tensor<f32> = Tensor::zeros(vec![0, 3]);
        assert_eq!(paired_sum(&x, &x, |a, b| a + b), 0.0);
    }
}
