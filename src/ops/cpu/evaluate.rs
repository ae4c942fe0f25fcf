//! Evaluation metrics.

use super::loss::paired_sum;
use crate::element::Element;
use crate::ops::check_same_size;
use crate::tensors::Tensor;
use rayon::prelude::*;

/// Index of the first maximum of `row`.
pub(crate) fn argmax<T: Element>(row: &[T]) -> usize {
    let mut best = 0;
    for (i, &x) in row.iter().enumerate().skip(1) {
        if x > row[best] {
            best = i;
        }
    }
    best
}

/// Fraction of samples whose argmax lands on a target equal to exactly `1.0`.
///
/// Returns `0.0` for an empty batch.
pub fn evaluate_classify<T: Element>(output: &Tensor<T>, target: &Tensor<T>) -> f32 {
    check_same_size("evaluate_classify", output, target);
    if output.size() == 0 {
        return 0.0;
    }
    let dim = output.row_len();
    let hits: usize = output
        .data()
        .par_chunks(dim)
        .zip(target.data().par_chunks(dim))
        .filter(|(y, t)| t[argmax(y)] == T::ONE)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let score = hits as f32 / output.rows() as f32;
    score
}

/// `sum((x - t)^2) / shape[0]`
pub fn evaluate_regress<T: Element>(output: &Tensor<T>, target: &Tensor<T>) -> f32 {
    check_same_size("evaluate_regress", output, target);
    if output.size() == 0 {
        return 0.0;
    }
    let total = paired_sum(output, target, |x, t| (x - t) * (x - t));
    (total / T::from_usize(output.rows())).into_f32()
}
