use crate::mapping::{NodeId, NodeMapping};
use crate::model::NodeValues;
use isobar_grid::{DType, Grid, GridError};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconstructError {
    #[error("Incomplete mapping: node {node} of {num_nodes} has no value")]
    IncompleteMapping { node: NodeId, num_nodes: usize },
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

/// Maps per-node values back onto the dense grid, the inverse of
/// [`GraphBuilder`](crate::GraphBuilder)'s mapping.
pub struct GridReconstructor<'a> {
    mapping: &'a NodeMapping,
}

impl<'a> GridReconstructor<'a> {
    pub fn new(mapping: &'a NodeMapping) -> Self {
        Self { mapping }
    }

    /// Build a grid of the mapping's shape where every cell takes its node's
    /// value, rounded to `dtype`.
    ///
    /// # Errors
    /// [`ReconstructError::IncompleteMapping`] if any node of the mapping is
    /// absent from `values`.
    pub fn reconstruct(&self, values: &NodeValues, dtype: DType) -> Result<Grid, ReconstructError> {
        let num_nodes = self.mapping.num_nodes();
        let dense: Vec<f64> = (0..num_nodes)
            .map(|node| {
                values
                    .get(node)
                    .ok_or(ReconstructError::IncompleteMapping { node, num_nodes })
            })
            .collect::<Result<_, _>>()?;

        // Every cell has exactly one owner in `cell_to_node`, so this writes
        // each cell once.
        let mut out = vec![0.0f64; self.mapping.num_cells()];
        out.par_iter_mut()
            .zip(self.mapping.cell_to_node().par_iter())
            .for_each(|(cell, &node)| *cell = dense[node]);

        Ok(Grid::from_values(self.mapping.shape().clone(), dtype, out)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobar_grid::Shape;

    #[test]
    fn test_every_cell_gets_its_node_value() {
        let shape = Shape::new(&[5, 3]).unwrap();
        let mapping = NodeMapping::new(&shape, &[2, 2]).unwrap();
        let values = NodeValues::from_dense((0..mapping.num_nodes()).map(|n| n as f64).collect());

        let grid = GridReconstructor::new(&mapping)
            .reconstruct(&values, DType::F64)
            .unwrap();
        assert_eq!(grid.dims(), &[5, 3]);
        for cell in 0..grid.len() {
            assert_eq!(grid.values()[cell], mapping.node_of(cell) as f64);
        }
    }

    #[test]
    fn test_missing_node_is_rejected() {
        let shape = Shape::new(&[4]).unwrap();
        let mapping = NodeMapping::new(&shape, &[]).unwrap();
        let values = NodeValues::from_pairs([(0, 1.0), (1, 1.0), (3, 1.0)]);

        let err = GridReconstructor::new(&mapping)
            .reconstruct(&values, DType::F64)
            .unwrap_err();
        assert_eq!(err, ReconstructError::IncompleteMapping { node: 2, num_nodes: 4 });

        let short = NodeValues::from_dense(vec![0.0; 3]);
        assert!(GridReconstructor::new(&mapping).reconstruct(&short, DType::F64).is_err());
    }

    #[test]
    fn test_extra_values_are_ignored() {
        let shape = Shape::new(&[2]).unwrap();
        let mapping = NodeMapping::new(&shape, &[]).unwrap();
        let values = NodeValues::from_dense(vec![1.0, 2.0, 99.0]);
        let grid = GridReconstructor::new(&mapping).reconstruct(&values, DType::F32).unwrap();
        assert_eq!(grid.values(), &[1.0, 2.0]);
    }
}
