//! Numeric element types.
//!
//! Kernels are generic over the element type stored in a [`Tensor`](crate::tensors::Tensor).
//! Two element types are supported, `f32` and `f64`. The accelerator computes in
//! 32-bit floats, so every element type also knows how to convert to and from
//! `f32`/`f64` losslessly where possible.

use core::fmt::Debug;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// A floating point type the kernels can operate on.
pub trait Element:
    Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + Sum
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + 'static
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// Convert to `f32`.
    fn into_f32(self) -> f32;
    /// Convert from `f32`.
    fn from_f32(x: f32) -> Self;

    /// Convert to `f64`.
    fn into_f64(self) -> f64;
    /// Convert from `f64`.
    fn from_f64(x: f64) -> Self;

    /// Lossy conversion from a count, used for batch normalisation of sums.
    #[allow(clippy::cast_precision_loss)]
    fn from_usize(n: usize) -> Self {
        Self::from_f64(n as f64)
    }

    /// `e^self`
    fn exp(self) -> Self;
    /// Natural logarithm.
    fn ln(self) -> Self;
    /// Absolute value.
    fn abs(self) -> Self;

    /// General matrix multiply on strided row/column views.
    ///
    /// Computes `c = alpha * a * b + beta * c` where `a` is `m×k`, `b` is `k×n`
    /// and `c` is `m×n`, each addressed through a row stride and a column stride.
    ///
    /// # Panics
    /// Panics if a stride is negative or if a view reaches past the end of
    /// its buffer.
    #[allow(clippy::too_many_arguments)]
    fn gemm(
        m: usize,
        k: usize,
        n: usize,
        alpha: Self,
        a: (&[Self], isize, isize),
        b: (&[Self], isize, isize),
        beta: Self,
        c: (&mut [Self], isize, isize),
    );
}

/// Number of elements a `rows × cols` view with the given strides reaches.
///
/// `None` for negative strides or when the offset overflows.
fn view_span(rows: usize, cols: usize, rs: isize, cs: isize) -> Option<usize> {
    if rows == 0 || cols == 0 {
        return Some(0);
    }
    let rs = usize::try_from(rs).ok()?;
    let cs = usize::try_from(cs).ok()?;
    (rows - 1)
        .checked_mul(rs)?
        .checked_add((cols - 1).checked_mul(cs)?)?
        .checked_add(1)
}

/// Panics unless the strided view fits in a buffer of `len` elements.
fn check_view(len: usize, rows: usize, cols: usize, rs: isize, cs: isize, operand: &str) {
    match view_span(rows, cols, rs, cs) {
        Some(span) => assert!(span <= len, "gemm: {operand} strides exceed buffer"),
        None => panic!("gemm: {operand} strides must be non-negative"),
    }
}

macro_rules! impl_element {
    ($ty:ty, $gemm:path) => {
        impl Element for $ty {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            #[allow(clippy::cast_possible_truncation, clippy::unnecessary_cast)]
            fn into_f32(self) -> f32 {
                self as f32
            }

            #[allow(clippy::unnecessary_cast)]
            fn from_f32(x: f32) -> Self {
                x as Self
            }

            #[allow(clippy::unnecessary_cast)]
            fn into_f64(self) -> f64 {
                self as f64
            }

            #[allow(clippy::cast_possible_truncation, clippy::unnecessary_cast)]
            fn from_f64(x: f64) -> Self {
                x as Self
            }

            fn exp(self) -> Self {
                <$ty>::exp(self)
            }

            fn ln(self) -> Self {
                <$ty>::ln(self)
            }

            fn abs(self) -> Self {
                <$ty>::abs(self)
            }

            fn gemm(
                m: usize,
                k: usize,
                n: usize,
                alpha: Self,
                a: (&[Self], isize, isize),
                b: (&[Self], isize, isize),
                beta: Self,
                c: (&mut [Self], isize, isize),
            ) {
                let (a, rsa, csa) = a;
                let (b, rsb, csb) = b;
                let (c, rsc, csc) = c;
                check_view(a.len(), m, k, rsa, csa, "lhs");
                check_view(b.len(), k, n, rsb, csb, "rhs");
                check_view(c.len(), m, n, rsc, csc, "output");
                // SAFETY: every element the strides can address lies inside
                // its buffer, as checked above, and `c` is uniquely borrowed.
                #[allow(unsafe_code)]
                unsafe {
                    $gemm(
                        m,
                        k,
                        n,
                        alpha,
                        a.as_ptr(),
                        rsa,
                        csa,
                        b.as_ptr(),
                        rsb,
                        csb,
                        beta,
                        c.as_mut_ptr(),
                        rsc,
                        csc,
                    );
                }
            }
        }
    };
}

impl_element!(f32, matrixmultiply::sgemm);
impl_element!(f64, matrixmultiply::dgemm);

/// Lower clamp applied by [`safe_log`], `e^-50`.
pub const SAFE_LOG_FLOOR: f64 = 1.928_749_847_963_918e-22;

/// Logarithm whose argument is clamped to at least [`SAFE_LOG_FLOOR`].
///
/// Zero and negative arguments therefore yield `-50` instead of `-inf`/`NaN`.
#[inline]
pub fn safe_log<T: Element>(x: T) -> T {
    let floor = T::from_f64(SAFE_LOG_FLOOR);
    if x > floor { x.ln() } else { floor.ln() }
}
