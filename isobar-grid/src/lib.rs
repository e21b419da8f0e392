//! # isobar-grid
//!
//! Dense N-dimensional grids of scientific scalar values.
//!
//! This crate provides:
//! - [`Shape`]: validated extents with row-major coordinate arithmetic
//! - [`DType`]: the element type a grid is stored and reconstructed in
//! - [`Grid`]: an immutable dense array of values held as `f64`
//!
//! Element-wise operations (residuals, error measurement) live in [`ops`].

pub mod grid;
pub mod ops;
pub mod shape;

pub use grid::{DType, Grid};
pub use ops::cell_error;
pub use shape::Shape;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
    #[error("Value count {actual} does not match shape cell count {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),
    #[error("DType mismatch: {0:?} vs {1:?}")]
    DTypeMismatch(DType, DType),
    #[error("Coordinate {coord:?} out of bounds for shape {dims:?}")]
    OutOfBounds { coord: Vec<usize>, dims: Vec<usize> },
}
