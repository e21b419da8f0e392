use crate::{Grid, GridError};

impl Grid {
    fn check_compatible(&self, other: &Self) -> Result<(), GridError> {
        if self.dims() != other.dims() {
            return Err(GridError::ShapeMismatch(
                self.dims().to_vec(),
                other.dims().to_vec(),
            ));
        }
        Ok(())
    }

    /// Element-wise `self - other`.
    pub fn residual(&self, other: &Self) -> Result<Vec<f64>, GridError> {
        self.check_compatible(other)?;
        Ok(self
            .values()
            .iter()
            .zip(other.values())
            .map(|(&a, &b)| a - b)
            .collect())
    }

    /// Largest absolute cell difference. Cells that are bit-identical count as
    /// zero even when non-finite; any other non-finite pairing yields infinity.
    pub fn max_abs_diff(&self, other: &Self) -> Result<f64, GridError> {
        self.check_compatible(other)?;
        Ok(self
            .values()
            .iter()
            .zip(other.values())
            .map(|(&a, &b)| cell_error(a, b))
            .fold(0.0f64, f64::max))
    }

    /// Whether both grids hold bit-identical values.
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.dims() == other.dims()
            && self
                .values()
                .iter()
                .zip(other.values())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// Absolute error between an original and a reconstructed cell.
#[inline]
pub fn cell_error(original: f64, reconstructed: f64) -> f64 {
    if original.to_bits() == reconstructed.to_bits() {
        return 0.0;
    }
    let diff = (original - reconstructed).abs();
    if diff.is_nan() {
        f64::INFINITY
    } else {
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residual() {
        let a = Grid::from_f64(&[3], &[1.0, 2.0, 3.0]).unwrap();
        let b = Grid::from_f64(&[3], &[0.5, 2.5, 3.0]).unwrap();
        assert_eq!(a.residual(&b).unwrap(), vec![0.5, -0.5, 0.0]);
        assert_eq!(a.max_abs_diff(&b).unwrap(), 0.5);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Grid::from_f64(&[2, 2], &[0.0; 4]).unwrap();
        let b = Grid::from_f64(&[4], &[0.0; 4]).unwrap();
        assert!(matches!(a.residual(&b), Err(GridError::ShapeMismatch(_, _))));
    }

    #[test]
    fn test_non_finite_cells() {
        let a = Grid::from_f64(&[2], &[f64::NAN, 1.0]).unwrap();
        assert_eq!(a.max_abs_diff(&a).unwrap(), 0.0);
        let b = Grid::from_f64(&[2], &[0.0, 1.0]).unwrap();
        assert_eq!(a.max_abs_diff(&b).unwrap(), f64::INFINITY);
        assert!(a.bit_eq(&a.clone()));
        assert!(!a.bit_eq(&b));
    }
}
