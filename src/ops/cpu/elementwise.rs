//! Elementwise arithmetic and the full-tensor sum.

use crate::element::Element;
use crate::ops::check_same_size;
use crate::tensors::Tensor;
use rayon::prelude::*;

/// Fixed chunk length for [`sum`], so the reduction tree never depends on the pool size.
const SUM_CHUNK: usize = 4096;

/// `out[i] = f(l[i], r[i])`
pub fn zip_with<T, F>(op: &str, left: &Tensor<T>, right: &Tensor<T>, output: &mut Tensor<T>, f: F)
where
    T: Element,
    F: Fn(T, T) -> T + Sync + Send,
{
    check_same_size(op, left, right);
    check_same_size(op, left, output);
    output
        .data_mut()
        .par_iter_mut()
        .zip(left.data().par_iter().zip(right.data().par_iter()))
        .for_each(|(o, (&l, &r))| *o = f(l, r));
}

/// `out[i] = f(l[i], r)`
pub fn map_scalar<T, F>(op: &str, left: &Tensor<T>, right: T, output: &mut Tensor<T>, f: F)
where
    T: Element,
    F: Fn(T, T) -> T + Sync + Send,
{
    check_same_size(op, left, output);
    output
        .data_mut()
        .par_iter_mut()
        .zip(left.data().par_iter())
        .for_each(|(o, &l)| *o = f(l, right));
}

/// Larger of two values; `l` wins ties and unordered pairs.
#[inline]
pub fn max<T: Element>(l: T, r: T) -> T {
    if r > l { r } else { l }
}

/// Sum of every element.
pub fn sum<T: Element>(input: &Tensor<T>) -> T {
    let partials: Vec<T> = input
        .data()
        .par_chunks(SUM_CHUNK)
        .map(|c| c.iter().copied().sum())
        .collect();
    partials.into_iter().sum()
}
