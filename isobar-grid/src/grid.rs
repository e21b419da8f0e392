use crate::{GridError, Shape};
use serde::{Deserialize, Serialize};

/// Element type of a grid.
///
/// Values are always held as `f64` in memory; the dtype decides the precision
/// they are reconstructed in and the width of raw values stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Wire tag used by the container header.
    pub fn tag(self) -> u8 {
        match self {
            DType::F32 => 1,
            DType::F64 => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(DType::F32),
            2 => Some(DType::F64),
            _ => None,
        }
    }

    /// Bytes per raw value.
    pub fn width(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Round `v` to this dtype's precision.
    #[inline]
    pub fn round(self, v: f64) -> f64 {
        match self {
            DType::F32 => v as f32 as f64,
            DType::F64 => v,
        }
    }

    /// Append the raw little-endian encoding of `v`.
    #[inline]
    pub fn write_raw(self, v: f64, out: &mut Vec<u8>) {
        match self {
            DType::F32 => out.extend_from_slice(&(v as f32).to_le_bytes()),
            DType::F64 => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// Decode one raw little-endian value. `bytes` must be exactly
    /// [`width`](Self::width) long.
    #[inline]
    pub fn read_raw(self, bytes: &[u8]) -> Option<f64> {
        match self {
            DType::F32 => bytes.try_into().ok().map(|b| f32::from_le_bytes(b) as f64),
            DType::F64 => bytes.try_into().ok().map(f64::from_le_bytes),
        }
    }
}

/// Dense N-dimensional array of scalar values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    shape: Shape,
    dtype: DType,
    values: Vec<f64>,
}

impl Grid {
    /// Build a grid from values already held as `f64`. Each value is rounded to
    /// `dtype` so that an `f32` grid never carries extra precision.
    pub fn from_values(shape: Shape, dtype: DType, mut values: Vec<f64>) -> Result<Self, GridError> {
        if values.len() != shape.len() {
            return Err(GridError::LengthMismatch {
                expected: shape.len(),
                actual: values.len(),
            });
        }
        if dtype == DType::F32 {
            for v in values.iter_mut() {
                *v = dtype.round(*v);
            }
        }
        Ok(Self { shape, dtype, values })
    }

    pub fn from_f32(dims: &[usize], data: &[f32]) -> Result<Self, GridError> {
        let shape = Shape::new(dims)?;
        let values = data.iter().map(|&v| v as f64).collect();
        Self::from_values(shape, DType::F32, values)
    }

    pub fn from_f64(dims: &[usize], data: &[f64]) -> Result<Self, GridError> {
        let shape = Shape::new(dims)?;
        Self::from_values(shape, DType::F64, data.to_vec())
    }

    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let values = vec![0.0; shape.len()];
        Self { shape, dtype, values }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, coord: &[usize]) -> Result<f64, GridError> {
        Ok(self.values[self.shape.index_of(coord)?])
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }

    /// Size of the uncompressed field in bytes.
    pub fn raw_bytes(&self) -> usize {
        self.values.len() * self.dtype.width()
    }
}
