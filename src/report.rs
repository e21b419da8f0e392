use isobar_core::Graph;
use isobar_grid::{cell_error, Grid, GridError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reconstruction quality of a decompressed grid against its original.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub cells: usize,
    pub max_abs_error: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Peak signal-to-noise ratio over the original's finite value range, in
    /// dB. Infinite for an exact reconstruction.
    pub psnr: f64,
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    pub compression_ratio: f64,
    pub escapes: usize,
    /// Graph structure of the reconstruction against the original, when
    /// both were built with the same adjacency config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<EdgeConsistency>,
}

/// Edge-set agreement between the graph of an original grid and the graph
/// of its reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeConsistency {
    pub consistent_edges: usize,
    pub original_only: usize,
    pub reconstructed_only: usize,
    /// Jaccard index of the two edge sets; 1.0 when both are empty.
    pub consistency_ratio: f64,
    /// Mean absolute difference of edge weights over the shared edges.
    pub weight_mae: f64,
}

impl EdgeConsistency {
    pub fn compare(original: &Graph, reconstructed: &Graph) -> Self {
        let weights: HashMap<(usize, usize), f32> = original
            .edges()
            .iter()
            .map(|e| ((e.source, e.target), e.weight))
            .collect();

        let (mut consistent, mut weight_err) = (0usize, 0.0f64);
        for e in reconstructed.edges() {
            if let Some(&w) = weights.get(&(e.source, e.target)) {
                consistent += 1;
                weight_err += (w as f64 - e.weight as f64).abs();
            }
        }
        let original_only = original.num_edges() - consistent;
        let reconstructed_only = reconstructed.num_edges() - consistent;
        let union = consistent + original_only + reconstructed_only;

        Self {
            consistent_edges: consistent,
            original_only,
            reconstructed_only,
            consistency_ratio: if union == 0 { 1.0 } else { consistent as f64 / union as f64 },
            weight_mae: if consistent == 0 { 0.0 } else { weight_err / consistent as f64 },
        }
    }
}

impl QualityReport {
    pub fn compute(
        original: &Grid,
        reconstructed: &Grid,
        compressed_bytes: usize,
        escapes: usize,
    ) -> Result<Self, GridError> {
        if original.shape() != reconstructed.shape() {
            return Err(GridError::ShapeMismatch(
                original.dims().to_vec(),
                reconstructed.dims().to_vec(),
            ));
        }
        let cells = original.len();
        let (mut max_abs, mut sum_abs, mut sum_sq) = (0.0f64, 0.0f64, 0.0f64);
        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for (&o, &r) in original.values().iter().zip(reconstructed.values()) {
            let e = cell_error(o, r);
            max_abs = max_abs.max(e);
            sum_abs += e;
            sum_sq += e * e;
            if o.is_finite() {
                lo = lo.min(o);
                hi = hi.max(o);
            }
        }
        let n = cells as f64;
        let mse = sum_sq / n;
        let range = if hi > lo { hi - lo } else { 1.0 };
        let psnr = if mse == 0.0 {
            f64::INFINITY
        } else {
            20.0 * range.log10() - 10.0 * mse.log10()
        };
        let original_bytes = original.raw_bytes();

        Ok(Self {
            cells,
            max_abs_error: max_abs,
            mae: sum_abs / n,
            rmse: mse.sqrt(),
            psnr,
            original_bytes,
            compressed_bytes,
            compression_ratio: original_bytes as f64 / compressed_bytes.max(1) as f64,
            escapes,
            edges: None,
        })
    }

    pub fn with_edges(mut self, edges: EdgeConsistency) -> Self {
        self.edges = Some(edges);
        self
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cells:             {}", self.cells)?;
        writeln!(f, "Original size:     {} bytes", self.original_bytes)?;
        writeln!(f, "Compressed size:   {} bytes", self.compressed_bytes)?;
        writeln!(f, "Compression ratio: {:.2}x", self.compression_ratio)?;
        writeln!(f, "Max abs error:     {:.3e}", self.max_abs_error)?;
        writeln!(f, "MAE:               {:.3e}", self.mae)?;
        writeln!(f, "RMSE:              {:.3e}", self.rmse)?;
        writeln!(f, "PSNR:              {:.2} dB", self.psnr)?;
        write!(f, "Escaped cells:     {}", self.escapes)?;
        if let Some(edges) = &self.edges {
            write!(
                f,
                "\nEdge consistency:  {:.4} ({} shared, {} original-only, {} reconstructed-only)",
                edges.consistency_ratio, edges.consistent_edges, edges.original_only, edges.reconstructed_only
            )?;
            write!(f, "\nEdge weight MAE:   {:.3e}", edges.weight_mae)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobar_core::{AdjacencyConfig, GraphBuilder};

    #[test]
    fn test_exact_reconstruction() {
        let g = Grid::from_f64(&[4], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let report = QualityReport::compute(&g, &g, 8, 0).unwrap();
        assert_eq!(report.max_abs_error, 0.0);
        assert_eq!(report.rmse, 0.0);
        assert!(report.psnr.is_infinite());
        assert_eq!(report.original_bytes, 32);
        assert_eq!(report.compression_ratio, 4.0);
    }

    #[test]
    fn test_error_metrics() {
        let a = Grid::from_f64(&[4], &[0.0, 0.0, 0.0, 10.0]).unwrap();
        let b = Grid::from_f64(&[4], &[1.0, -1.0, 0.0, 10.0]).unwrap();
        let report = QualityReport::compute(&a, &b, 16, 1).unwrap();
        assert_eq!(report.max_abs_error, 1.0);
        assert_eq!(report.mae, 0.5);
        assert!((report.rmse - 0.5f64.sqrt()).abs() < 1e-12);
        // range 10, mse 0.5
        assert!((report.psnr - (20.0 - 10.0 * 0.5f64.log10())).abs() < 1e-9);
        assert_eq!(report.escapes, 1);
    }

    #[test]
    fn test_edge_consistency_same_lattice() {
        let builder = GraphBuilder::default();
        let a = Grid::from_f64(&[2, 2], &[0.0, 1.0, 2.0, 3.0]).unwrap();
        let b = Grid::from_f64(&[2, 2], &[0.0, 1.5, 2.0, 3.0]).unwrap();
        let (ga, _) = builder.build(&a).unwrap();
        let (gb, _) = builder.build(&b).unwrap();

        let edges = EdgeConsistency::compare(&ga, &gb);
        assert_eq!(edges.consistent_edges, 4);
        assert_eq!((edges.original_only, edges.reconstructed_only), (0, 0));
        assert_eq!(edges.consistency_ratio, 1.0);
        // (0,1): 1 vs 1.5, (1,3): 2 vs 1.5, the others unchanged
        assert!((edges.weight_mae - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_edge_consistency_partial_overlap() {
        let grid = Grid::from_f64(&[3, 3], &[1.0; 9]).unwrap();
        let (four, _) = GraphBuilder::default().build(&grid).unwrap();
        let (eight, _) = GraphBuilder::new(AdjacencyConfig::default().with_neighbors(8))
            .build(&grid)
            .unwrap();

        // 12 axis edges, 8 extra diagonals
        let edges = EdgeConsistency::compare(&four, &eight);
        assert_eq!(edges.consistent_edges, 12);
        assert_eq!(edges.original_only, 0);
        assert_eq!(edges.reconstructed_only, 8);
        assert!((edges.consistency_ratio - 0.6).abs() < 1e-12);
        assert_eq!(edges.weight_mae, 0.0);

        let report = QualityReport::compute(&grid, &grid, 8, 0).unwrap().with_edges(edges);
        assert!(report.to_string().contains("Edge consistency:  0.6000"));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Grid::from_f64(&[4], &[0.0; 4]).unwrap();
        let b = Grid::from_f64(&[2, 2], &[0.0; 4]).unwrap();
        assert!(QualityReport::compute(&a, &b, 1, 0).is_err());
    }
}
