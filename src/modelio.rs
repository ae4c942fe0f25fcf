//! Saving and loading layer parameters.
//!
//! # `.bpat` Format
//!
//! A `.bpat` file stores one or more tensors:
//!
//! ```text
//! ┌────────────┬────────────────────────────────────┐
//! │ Header     │ Tensor, repeated `count` times     │
//! ├────────────┼────────────────────────────────────┤
//! │ "bpat"[4]  │ u64: ndim                          │
//! │ u8: count  │ [u64; ndim] shape                  │
//! │            │ [f64; prod(shape)] row-major data  │
//! └────────────┴────────────────────────────────────┘
//! ```
//!
//! All integers and floats are little-endian. Data is always written as
//! `f64` regardless of the element type, so a snapshot taken from an `f32`
//! model loads into an `f64` one and back.
//!
//! Every tensor read from disk is wrapped in [`TrustedData`] and only turned
//! into a [`Tensor`] once it validates.
//!
//! ## Limitations
//! - At most 255 tensors per file.
//! - No names or dtypes; callers rely on order.
//!
//! # Example
//!
//! ```no_run
//! use briny_kernels::modelio::{load_tensors, save_tensors};
//! use briny_kernels::tensors::Tensor;
//!
//! fn main() -> briny_kernels::error::Result<()> {
//!     let w = Tensor::new(vec![2, 2], vec![1.0f32, 2.0, 3.0, 4.0]);
//!     save_tensors("model.bpat", &[&w])?;
//!     let back: Vec<Tensor<f32>> = load_tensors("model.bpat")?;
//!     assert_eq!(back[0], w);
//!     Ok(())
//! }
//! ```

use crate::backend::Backend;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::layers::Affine;
use crate::tensors::Tensor;
use briny::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const BPAT_MAGIC: &[u8; 4] = b"bpat";

/// Upper bound on elements preallocated from an untrusted header.
const MAX_PREALLOC: usize = 1 << 20;

/// A tensor as read from disk, before validation.
struct PackedTensor {
    shape: Vec<u64>,
    data: Vec<f64>,
}

impl Validate for PackedTensor {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        let expected = self
            .shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or(ValidationError)?;
        if self.data.len() as u64 != expected {
            return Err(ValidationError);
        }
        if self.data.iter().any(|x| !x.is_finite()) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

fn write_tensor<T: Element>(out: &mut impl Write, tensor: &Tensor<T>) -> Result<()> {
    assert!(tensor.row_major(), "save_tensors: tensors must be row-major");
    out.write_all(&(tensor.shape().len() as u64).to_le_bytes())?;
    for &dim in tensor.shape() {
        out.write_all(&(dim as u64).to_le_bytes())?;
    }
    for &x in tensor.data() {
        out.write_all(&x.into_f64().to_le_bytes())?;
    }
    Ok(())
}

fn read_u64(input: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_tensor<T: Element>(input: &mut impl Read) -> Result<Tensor<T>> {
    let ndim = read_u64(input)?;
    if ndim > 32 {
        return Err(Error::Validation("tensor rank out of range"));
    }
    let shape = (0..ndim).map(|_| read_u64(input)).collect::<Result<Vec<_>>>()?;
    let size = shape
        .iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(Error::Validation("tensor size overflows"))?;

    let mut data = Vec::with_capacity(size.min(MAX_PREALLOC));
    let mut buf = [0u8; 8];
    for _ in 0..size {
        input.read_exact(&mut buf)?;
        data.push(f64::from_le_bytes(buf));
    }

    let trusted = TrustedData::new(PackedTensor { shape, data })
        .map_err(|_| Error::Validation("tensor data does not match its shape or is not finite"))?;
    let packed = trusted.into_inner();
    let shape = packed.shape.iter().map(|&d| d as usize).collect::<Vec<_>>();
    let data = packed.data.into_iter().map(T::from_f64).collect();
    Ok(Tensor::new(shape, data))
}

/// Writes `tensors` to a `.bpat` file, replacing it if it exists.
///
/// # Errors
/// `Error::Io` on any write failure.
///
/// # Panics
/// More than 255 tensors, or a column-major tensor.
pub fn save_tensors<T: Element>(path: impl AsRef<Path>, tensors: &[&Tensor<T>]) -> Result<()> {
    let count = u8::try_from(tensors.len()).unwrap_or_else(|_| {
        panic!("save_tensors: {} tensors exceed the format limit of 255", tensors.len())
    });
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(BPAT_MAGIC)?;
    out.write_all(&[count])?;
    for tensor in tensors {
        write_tensor(&mut out, tensor)?;
    }
    out.flush()?;
    tracing::debug!(path = %path.display(), count, "saved snapshot");
    Ok(())
}

/// Reads every tensor in a `.bpat` file.
///
/// # Errors
/// - `Error::Io` if the file is missing or truncated.
/// - `Error::Validation` on a bad magic header or a tensor whose data
///   disagrees with its shape.
pub fn load_tensors<T: Element>(path: impl AsRef<Path>) -> Result<Vec<Tensor<T>>> {
    let path = path.as_ref();
    let mut input = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if &magic != BPAT_MAGIC {
        return Err(Error::Validation("invalid magic header"));
    }
    let mut count = [0u8; 1];
    input.read_exact(&mut count)?;

    let tensors = (0..count[0])
        .map(|_| read_tensor(&mut input))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(path = %path.display(), count = tensors.len(), "loaded snapshot");
    Ok(tensors)
}

/// Saves the weight and bias of `layers`, in order.
pub fn save_affine<T: Element, B: Backend<T>>(
    path: impl AsRef<Path>,
    layers: &[&Affine<T, B>],
) -> Result<()> {
    let tensors: Vec<&Tensor<T>> = layers
        .iter()
        .flat_map(|layer| {
            let (w, b) = layer.params();
            [w, b]
        })
        .collect();
    save_tensors(path, &tensors)
}

/// Restores parameters written by [`save_affine`] into initialized layers.
///
/// # Errors
/// `Error::Validation` if the file holds a different number of tensors than
/// the layers need, plus any error of [`load_tensors`] or
/// [`Affine::load_params`].
///
/// # Panics
/// If a stored shape differs from the layer's allocated parameter.
pub fn load_affine<T: Element, B: Backend<T>>(
    path: impl AsRef<Path>,
    layers: &mut [&mut Affine<T, B>],
) -> Result<()> {
    let tensors = load_tensors::<T>(path)?;
    if tensors.len() != layers.len() * 2 {
        return Err(Error::Validation("tensor count does not match the layers"));
    }
    let mut tensors = tensors.into_iter();
    for layer in layers.iter_mut() {
        match (tensors.next(), tensors.next()) {
            (Some(weight), Some(bias)) => layer.load_params(weight, bias)?,
            _ => return Err(Error::Validation("tensor count does not match the layers")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("briny_kernels_{}_{name}.bpat", std::process::id()))
    }

    #[test]
    fn round_trip_preserves_shape_and_values() {
        let path = temp_path("round_trip");
        let a = tensor!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let b = tensor!([0.5, -0.5]);
        save_tensors(&path, &[&a, &b]).unwrap();
        let back: Vec<Tensor<f64>> = load_tensors(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(back, vec![a, b]);
    }

    #[test]
    fn f32_snapshot_loads_as_f64() {
        let path = temp_path("widen");
        let a: Tensor<f32> = Tensor::new(vec![2], vec![0.25, 8.0]);
        save_tensors(&path, &[&a]).unwrap();
        let back: Vec<Tensor<f64>> = load_tensors(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(back[0].data(), &[0.25, 8.0]);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let path = temp_path("magic");
        std::fs::write(&path, b"nope\x00").unwrap();
        let err = load_tensors::<f64>(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Validation("invalid magic header")));
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let path = temp_path("truncated");
        let a = tensor!([1.0, 2.0, 3.0]);
        save_tensors(&path, &[&a]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();
        let err = load_tensors::<f64>(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn non_finite_values_fail_validation() {
        let path = temp_path("nan");
        let a = Tensor::new(vec![2], vec![1.0, f64::NAN]);
        save_tensors(&path, &[&a]).unwrap();
        let err = load_tensors::<f64>(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }
}
