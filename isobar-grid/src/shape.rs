use crate::GridError;
use serde::{Deserialize, Serialize};

/// Extents of a dense grid, outermost dimension first.
///
/// A shape always has at least one dimension, every dimension is positive and
/// the total cell count fits in `usize`. Cells are addressed in row-major
/// order: the last dimension varies fastest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
    strides: Vec<usize>,
    len: usize,
}

impl Shape {
    /// Validate `dims` and build a shape.
    ///
    /// # Errors
    /// [`GridError::InvalidShape`] if `dims` is empty, contains a zero extent,
    /// or the product of extents overflows.
    pub fn new(dims: &[usize]) -> Result<Self, GridError> {
        if dims.is_empty() {
            return Err(GridError::InvalidShape("grid must have at least one dimension".into()));
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(GridError::InvalidShape(format!(
                "dimension {} of {:?} is zero",
                axis, dims
            )));
        }

        let len = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| GridError::InvalidShape(format!("cell count of {:?} overflows", dims)))?;

        let mut strides = vec![1usize; dims.len()];
        for axis in (0..dims.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }

        Ok(Self {
            dims: dims.to_vec(),
            strides,
            len,
        })
    }

    /// Build a shape from signed extents, as produced by array libraries that
    /// use signed sizes. Negative extents are rejected like zero ones.
    pub fn from_signed(dims: &[i64]) -> Result<Self, GridError> {
        let mut unsigned = Vec::with_capacity(dims.len());
        for (axis, &d) in dims.iter().enumerate() {
            if d <= 0 {
                return Err(GridError::InvalidShape(format!(
                    "dimension {} of {:?} is not positive",
                    axis, dims
                )));
            }
            let d = usize::try_from(d)
                .map_err(|_| GridError::InvalidShape(format!("dimension {} too large", axis)))?;
            unsigned.push(d);
        }
        Self::new(&unsigned)
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: a valid shape has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Row-major linear index of `coord`.
    pub fn index_of(&self, coord: &[usize]) -> Result<usize, GridError> {
        if coord.len() != self.dims.len() || coord.iter().zip(&self.dims).any(|(&c, &d)| c >= d) {
            return Err(GridError::OutOfBounds {
                coord: coord.to_vec(),
                dims: self.dims.clone(),
            });
        }
        Ok(coord.iter().zip(&self.strides).map(|(&c, &s)| c * s).sum())
    }

    /// Coordinate of the cell at row-major `index`. Writes into `out` to avoid
    /// an allocation per cell in hot loops.
    pub fn coord_into(&self, mut index: usize, out: &mut [usize]) {
        debug_assert_eq!(out.len(), self.dims.len());
        for (axis, &stride) in self.strides.iter().enumerate() {
            out[axis] = index / stride;
            index %= stride;
        }
    }

    /// Coordinate of the cell at row-major `index`.
    pub fn coord_of(&self, index: usize) -> Result<Vec<usize>, GridError> {
        if index >= self.len {
            return Err(GridError::OutOfBounds {
                coord: vec![index],
                dims: self.dims.clone(),
            });
        }
        let mut coord = vec![0; self.dims.len()];
        self.coord_into(index, &mut coord);
        Ok(coord)
    }
}
