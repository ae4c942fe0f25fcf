//! Core tensor data structure.
//!
//! # Tensors
//!
//! A [`Tensor`] owns a flat buffer of elements, its shape, and a storage
//! [`Layout`] flag. The shape is fixed for the lifetime of the tensor: kernels
//! write into caller-supplied outputs and never resize them, and any change of
//! shape means building a new tensor.
//!
//! ## Design Highlights
//! - Generic over the [`Element`] type (`f32` or `f64`)
//! - Shape is a `Vec<usize>`; the element count is its product and is enforced
//!   at construction
//! - Dimension 0 is the batch/sample axis for the 2-D tensors kernels work on
//! - The `tensor!` macro builds row-major tensors from nested literals
//!
//! ## Example
//!
//! ```rust
//! use briny_kernels::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape(), &[2, 3]);
//! assert_eq!(t.size(), 6);
//! ```

use crate::element::Element;

/// Order in which a 2-D view of the buffer is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Consecutive elements of a row are adjacent (the default).
    #[default]
    RowMajor,
    /// Consecutive elements of a column are adjacent.
    ColumnMajor,
}

/// An N-dimensional tensor with a shape and a flat data buffer.
///
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds `product(shape)` elements.
/// - `layout` tells matrix kernels how a 2-D view of `data` is ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
    layout: Layout,
}

impl<T> Tensor<T> {
    /// Creates a new row-major tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self {
            shape,
            data,
            layout: Layout::RowMajor,
        }
    }

    /// Returns the same tensor tagged with another storage layout.
    ///
    /// The buffer is not reordered; only its interpretation changes.
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Extents of every dimension.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total element count.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Extent of the leading (batch) dimension; `1` for scalars.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Elements per leading-dimension entry, i.e. `size / rows`.
    ///
    /// # Panics
    /// Panics if the leading dimension is zero.
    pub fn row_len(&self) -> usize {
        let rows = self.rows();
        assert!(rows != 0, "tensor with shape {:?} has no rows", self.shape);
        self.size() / rows
    }

    /// Storage layout flag.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// `true` unless the tensor is tagged column-major.
    pub fn row_major(&self) -> bool {
        self.layout == Layout::RowMajor
    }

    /// Read-only view of the buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable view of the buffer. The length can never change.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the tensor, returning its buffer.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Replaces this tensor's data and layout with those of `other`.
    ///
    /// The layout travels with the buffer, since it decides how the buffer
    /// is read.
    ///
    /// # Panics
    /// Panics if shapes do not match.
    pub fn update(&mut self, mut other: Self) {
        assert_eq!(self.shape, other.shape, "shape mismatch");
        core::mem::swap(&mut self.data, &mut other.data);
        self.layout = other.layout;
    }
}

impl<T: Element> Tensor<T> {
    /// A zero-filled row-major tensor.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, T::ZERO)
    }

    /// A row-major tensor with every element set to `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let size = shape.iter().product();
        Self::new(shape, vec![value; size])
    }

    /// A zero-filled tensor with the same shape and layout as `self`.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone()).with_layout(self.layout)
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value);
    }
}

/// Defines a row-major tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
/// Innermost lists may contain negative literals.
///
/// # Example
/// ```
/// use briny_kernels::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape(), &[2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $x:literal ),+ $(,)? ]) => {{
        let data = vec![ $( $x ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = children[0].shape().to_vec();
        assert!(children.iter().all(|c| c.shape() == first_shape.as_slice()),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(&first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].size());
        for c in children { data.extend(c.into_data()); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_element_count() {
        let result = std::panic::catch_unwind(|| Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]));
        assert!(result.is_err());
    }

    #[test]
    fn rows_and_row_len_follow_leading_dimension() {
        let t: Tensor<f32> = Tensor::zeros(vec![4, 3, 2]);
        assert_eq!(t.rows(), 4);
        assert_eq!(t.row_len(), 6);
        assert!(t.row_major());
    }

    #[test]
    fn with_layout_keeps_buffer_order() {
        let t = tensor!([[1.0, 2.0], [3.0, 4.0]]).with_layout(Layout::ColumnMajor);
        assert!(!t.row_major());
        assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn zeros_like_copies_shape_and_layout() {
        let t = Tensor::full(vec![2, 5], 3.0f64).with_layout(Layout::ColumnMajor);
        let z = t.zeros_like();
        assert_eq!(z.shape(), t.shape());
        assert_eq!(z.layout(), Layout::ColumnMajor);
        assert!(z.data().iter().all(|&x| x == 0.0));
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn update_rejects_other_shapes() {
        let mut a: Tensor<f32> = Tensor::zeros(vec![2, 2]);
        a.update(Tensor::zeros(vec![4]));
    }

    #[test]
    fn update_takes_data_and_layout() {
        let mut a: Tensor<f64> = Tensor::zeros(vec![2, 2]);
        let b = tensor!([[1.0, 2.0], [3.0, 4.0]]).with_layout(Layout::ColumnMajor);
        a.update(b);
        assert_eq!(a.data(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a.layout(), Layout::ColumnMajor);
    }
}
