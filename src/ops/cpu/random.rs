//! Random fills.
//!
//! Each call takes one generator from the caller's [`RngState`] and fills the
//! output sequentially, so a seeded state always produces the same tensor.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::random::RngState;
use crate::tensors::Tensor;
use rand_distr::{Distribution, Normal, Uniform};

fn uniform<T: Element>(low: T, high: T) -> Result<Uniform<f64>> {
    Uniform::new(low.into_f64(), high.into_f64())
        .map_err(|e| Error::InvalidDistribution(format!("uniform [{low:?}, {high:?}): {e}")))
}

/// Fills `output` with `val`.
pub fn constant_distribution<T: Element>(val: T, output: &mut Tensor<T>) {
    output.fill(val);
}

/// I.i.d. draws from `U[low, high)`.
///
/// # Errors
/// [`Error::InvalidDistribution`] unless `low < high` and both are finite.
pub fn uniform_distribution<T: Element>(
    low: T,
    high: T,
    output: &mut Tensor<T>,
    rng: &mut RngState,
) -> Result<()> {
    let dist = uniform(low, high)?;
    let mut rng = rng.next_rng();
    output.data_mut().iter_mut().for_each(|x| {
        // narrowing to `T` can round a draw up onto `high`; redraw those
        *x = loop {
            let v = T::from_f64(dist.sample(&mut rng));
            if v < high {
                break v;
            }
        };
    });
    Ok(())
}

/// I.i.d. draws from `N(loc, scale^2)`.
///
/// # Errors
/// [`Error::InvalidDistribution`] if `scale` is negative or not finite.
pub fn normal_distribution<T: Element>(
    loc: T,
    scale: T,
    output: &mut Tensor<T>,
    rng: &mut RngState,
) -> Result<()> {
    let sd = scale.into_f64();
    if !(sd >= 0.0 && sd.is_finite()) {
        return Err(Error::InvalidDistribution(format!(
            "normal({loc:?}, {scale:?}): scale must be finite and non-negative"
        )));
    }
    let dist = Normal::new(loc.into_f64(), sd)
        .map_err(|e| Error::InvalidDistribution(format!("normal({loc:?}, {scale:?}): {e}")))?;
    let mut rng = rng.next_rng();
    output
        .data_mut()
        .iter_mut()
        .for_each(|x| *x = T::from_f64(dist.sample(&mut rng)));
    Ok(())
}

/// `1` where a `U[low, high)` draw falls below `keep`, `0` elsewhere.
pub fn make_binary_mask<T: Element>(
    low: T,
    high: T,
    keep: T,
    output: &mut Tensor<T>,
    rng: &mut RngState,
) -> Result<()> {
    let dist = uniform(low, high)?;
    let keep = keep.into_f64();
    let mut rng = rng.next_rng();
    output.data_mut().iter_mut().for_each(|x| {
        *x = if dist.sample(&mut rng) < keep {
            T::ONE
        } else {
            T::ZERO
        };
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = RngState::seeded(3);
        let mut t: Tensor<f32> = Tensor::zeros(vec![1000]);
        uniform_distribution(-0.5, 0.25, &mut t, &mut rng).unwrap();
        assert!(t.data().iter().all(|&x| (-0.5..0.25).contains(&x)));
    }

    #[test]
    fn narrow_f32_range_never_yields_high() {
        let mut rng = RngState::seeded(5);
        let mut t: Tensor<f32> = Tensor::zeros(vec![4096]);
        let high = 1.0 + f32::EPSILON;
        uniform_distribution(1.0, high, &mut t, &mut rng).unwrap();
        assert!(t.data().iter().all(|&x| x == 1.0), "a draw reached {high}");
    }

    #[test]
    fn empty_range_is_an_error() {
        let mut rng = RngState::seeded(3);
        let mut t: Tensor<f32> = Tensor::zeros(vec![4]);
        let err = uniform_distribution(1.0, 1.0, &mut t, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidDistribution(_)));
    }

    #[test]
    fn negative_scale_is_an_error() {
        let mut rng = RngState::seeded(3);
        let mut t: Tensor<f64> = Tensor::zeros(vec![4]);
        let err = normal_distribution(0.0, -1.0, &mut t, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidDistribution(_)));
    }

    #[test]
    fn non_finite_scale_is_an_error() {
        let mut rng = RngState::seeded(3);
        let mut t: Tensor<f32> = Tensor::zeros(vec![4]);
        assert!(normal_distribution(0.0, f32::NAN, &mut t, &mut rng).is_err());
        assert!(normal_distribution(0.0, f32::INFINITY, &mut t, &mut rng).is_err());
    }

    #[test]
    fn zero_scale_fills_with_loc() {
        let mut rng = RngState::seeded(3);
        let mut t: Tensor<f64> = Tensor::zeros(vec![4]);
        normal_distribution(2.5, 0.0, &mut t, &mut rng).unwrap();
        assert_eq!(t.data(), &[2.5; 4]);
    }

    #[test]
    fn mask_is_binary() {
        let mut rng = RngState::seeded(11);
        let mut t: Tensor<f64> = Tensor::zeros(vec![64]);
        make_binary_mask(0.0, 1.0, 0.5, &mut t, &mut rng).unwrap();
        assert!(t.data().iter().all(|&x| x == 0.0 || x == 1.0));
    }
}
