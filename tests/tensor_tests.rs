use briny_kernels::tensor;
use briny_kernels::tensors::{Layout, Tensor};

#[test]
fn test_tensor_creation() {
    let t = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.shape(), &[2, 2]);
    assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(t.layout(), Layout::RowMajor);
}

#[test]
fn test_tensor_macro() {
    let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(t.shape(), &[2, 2]);
    assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_tensor_macro_negative_and_nested() {
    let t = tensor!([[[-1.0, 2.0]], [[3.0, -4.0]]]);
    assert_eq!(t.shape(), &[2, 1, 2]);
    assert_eq!(t.data(), &[-1.0, 2.0, 3.0, -4.0]);
    assert_eq!(t.rows(), 2);
    assert_eq!(t.row_len(), 2);
}

#[test]
fn test_scalar_tensor() {
    let t = tensor!(7.5);
    assert!(t.shape().is_empty());
    assert_eq!(t.size(), 1);
    assert_eq!(t.rows(), 1);
}

#[test]
#[should_panic(expected = "ragged tensor literal")]
fn test_ragged_macro_panics() {
    let _ = tensor!([[1.0, 2.0], [3.0]]);
}

#[test]
#[should_panic(expected = "is incompatible with 3 data elements")]
fn test_tensor_shape_mismatch_panics() {
    let _ = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_update_swaps_data() {
    let mut a = tensor!([1.0, 2.0]);
    a.update(tensor!([3.0, 4.0]));
    assert_eq!(a.into_data(), vec![3.0, 4.0]);
}

#[test]
fn test_fill_and_full() {
    let mut t = Tensor::full(vec![3], 2.0f32);
    assert_eq!(t.data(), &[2.0; 3]);
    t.fill(-1.0);
    assert_eq!(t.data(), &[-1.0; 3]);
}
