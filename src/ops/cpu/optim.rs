//! In-place gradient descent with momentum.

use crate::element::Element;
use crate::ops::check_same_size;
use crate::tensors::Tensor;
use rayon::prelude::*;

/// Updates `weight`, `gradient` and `velocity` in place, element by element:
///
/// ```text
/// g /= batch_size
/// v  = v * momentum_coef - learning_rate * g + decay * w
/// w += v
/// ```
///
/// # Panics
/// - If the three tensors differ in size
/// - If `batch_size` is zero
pub fn gradient_descent<T: Element>(
    momentum_coef: T,
    learning_rate: T,
    decay: T,
    batch_size: usize,
    weight: &mut Tensor<T>,
    gradient: &mut Tensor<T>,
    velocity: &mut Tensor<T>,
) {
    check_same_size("gradient_descent", weight, gradient);
    check_same_size("gradient_descent", weight, velocity);
    assert!(batch_size != 0, "gradient_descent: batch_size must be non-zero");
    let batch = T::from_usize(batch_size);
    weight
        .data_mut()
        .par_iter_mut()
        .zip(gradient.data_mut().par_iter_mut())
        .zip(velocity.data_mut().par_iter_mut())
        .for_each(|((w, g), v)| {
            *g /= batch;
            *v = *v * momentum_coef - learning_rate * *g + decay * *w;
            *w += *v;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;
    use approx::assert_abs_diff_eq;

    #[test]
    fn momentum_accumulates_across_steps() {
        let mut w = tensor!([1.0]);
        let mut v = tensor!([0.0]);
        for _ in 0..2 {
            let mut g = tensor!([4.0]);
            gradient_descent(0.5, 0.1, 0.0, 2, &mut w, &mut g, &mut v);
        }
        // step 1: v = -0.2, w = 0.8; step 2: v = -0.1 - 0.2 = -0.3, w = 0.5
        assert_abs_diff_eq!(v.data()[0], -0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(w.data()[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn decay_is_added_to_velocity() {
        let mut w = tensor!([2.0]);
        let mut g = tensor!([0.0]);
        let mut v = tensor!([0.0]);
        gradient_descent(0.0, 0.1, 0.25, 1, &mut w, &mut g, &mut v);
        assert_abs_diff_eq!(w.data()[0], 2.5, epsilon = 1e-12);
    }

    #[test]
    #[should_panic(expected = "batch_size must be non-zero")]
    fn zero_batch_is_rejected() {
        let mut w = tensor!([1.0]);
        let mut g = tensor!([1.0]);
        let mut v = tensor!([0.0]);
        gradient_descent(0.0, 0.1, 0.0, 0, &mut w, &mut g, &mut v);
    }
}
