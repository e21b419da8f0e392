use crate::config::CompressionConfig;
use crate::error::{IsobarError, Result};
use crate::report::{EdgeConsistency, QualityReport};
use isobar_codec::ErrorBoundCodec;
use isobar_container::{CompressedContainer, ContainerError};
use isobar_core::{GraphBuilder, GridReconstructor, Latent, LatentModel, NodeMapping};
use isobar_grid::{DType, Grid};
use tracing::{debug, info, warn};

/// Grid → container → grid, certified within the configured bound.
///
/// # Compression
/// 1. Build the graph and node mapping from the grid
/// 2. Encode the graph to a latent, then decode it straight back
/// 3. Rebuild the approximate grid from the decoded node values
/// 4. Certify the approximation with the error-bound codec
///
/// # Decompression
/// Rebuilds the node mapping from the header shape and this pipeline's tiling,
/// decodes the latent with the same model and applies the residuals. It never
/// needs the original grid. The latent records the tile it was encoded with;
/// a pipeline configured with a different tiling is rejected rather than
/// producing a grid outside the bound. Corrupt latents and residual streams
/// surface as [`ContainerError::ContainerFormat`].
pub struct Pipeline {
    config: CompressionConfig,
    builder: GraphBuilder,
    codec: ErrorBoundCodec,
    model: Box<dyn LatentModel>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("model", &self.model.id())
            .finish()
    }
}

impl Pipeline {
    pub fn new(config: CompressionConfig, model: impl LatentModel + 'static) -> Result<Self> {
        config.validate()?;
        let codec = ErrorBoundCodec::new(config.codec.block_size)?;
        Ok(Self {
            builder: GraphBuilder::new(config.graph.clone()),
            codec,
            model: Box::new(model),
            config,
        })
    }

    /// Pipeline using the model selected in `config.model`.
    pub fn from_config(config: CompressionConfig) -> Result<Self> {
        let model = config.model.build()?;
        Self::new(config, model)
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn LatentModel {
        self.model.as_ref()
    }

    pub fn compress(&self, grid: &Grid) -> Result<CompressedContainer> {
        let (graph, mapping) = self.builder.build(grid)?;
        let latent = self.model.encode(&graph)?;
        debug!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            model = %latent.model,
            "Encoded graph"
        );

        let approx = self.approximate(&latent, &mapping, grid.dtype())?;
        let eps = self.config.codec.error_bound;
        let stream = self.codec.compress(grid, &approx, eps, self.config.quantum())?;

        let stats = stream.stats();
        let escape_fraction = stats.escapes as f64 / grid.len() as f64;
        if escape_fraction > self.config.codec.max_escape_fraction {
            warn!(
                escapes = stats.escapes,
                cells = grid.len(),
                fraction = escape_fraction,
                "High escape fraction; the latent model approximates this field poorly"
            );
        }

        let latent = latent.with_tile(mapping.tile());
        let container =
            CompressedContainer::new(grid.shape().clone(), grid.dtype(), latent.to_bytes()?, stream);
        info!(
            dims = ?grid.dims(),
            error_bound = eps,
            latent_bytes = container.latent().len(),
            residual_bytes = stats.payload_bytes,
            ratio = grid.raw_bytes() as f64 / container.encoded_len() as f64,
            "Compressed grid"
        );
        Ok(container)
    }

    pub fn decompress(&self, container: &CompressedContainer) -> Result<Grid> {
        let header = container.header();
        let mapping = self.builder.mapping_for(&header.shape)?;
        let latent = Latent::from_bytes(container.latent()).map_err(corrupt)?;
        let approx = self.approximate(&latent, &mapping, header.dtype)?;
        let grid = self
            .codec
            .decompress(&approx, container.residual())
            .map_err(corrupt)?;
        info!(dims = ?grid.dims(), error_bound = header.error_bound, "Decompressed grid");
        Ok(grid)
    }

    /// Compress, decompress and measure the result against `grid`, including
    /// how well the reconstruction's graph matches the original's.
    pub fn compress_with_report(&self, grid: &Grid) -> Result<(CompressedContainer, QualityReport)> {
        let container = self.compress(grid)?;
        let restored = self.decompress(&container)?;
        let (original_graph, _) = self.builder.build(grid)?;
        let (restored_graph, _) = self.builder.build(&restored)?;
        let report = QualityReport::compute(
            grid,
            &restored,
            container.encoded_len(),
            container.residual().stats().escapes,
        )?
        .with_edges(EdgeConsistency::compare(&original_graph, &restored_graph));
        Ok((container, report))
    }

    /// Decode `latent` into a dense grid over `mapping`.
    fn approximate(&self, latent: &Latent, mapping: &NodeMapping, dtype: DType) -> Result<Grid> {
        if latent.num_nodes != mapping.num_nodes() {
            return Err(IsobarError::IncompleteMapping {
                expected: mapping.num_nodes(),
                found: latent.num_nodes,
            });
        }
        // Same node count is not enough: [2, 1] and [1, 2] tile a square
        // grid into equally many, differently shaped nodes.
        if latent.tile != mapping.tile() {
            return Err(IsobarError::TilingMismatch {
                expected: mapping.tile().to_vec(),
                found: latent.tile.clone(),
            });
        }
        let values = self.model.decode(latent)?;
        Ok(GridReconstructor::new(mapping).reconstruct(&values, dtype)?)
    }
}

fn corrupt(err: impl std::fmt::Display) -> IsobarError {
    IsobarError::Container(ContainerError::ContainerFormat(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobar_core::AdjacencyConfig;
    use isobar_models::{MeanFieldModel, PropagationModel};

    fn field() -> Grid {
        let data: Vec<f64> = (0..12 * 10)
            .map(|i| {
                let (r, c) = ((i / 10) as f64, (i % 10) as f64);
                250.0 + (r * 0.3).sin() * 5.0 + (c * 0.2).cos() * 3.0
            })
            .collect();
        Grid::from_f64(&[12, 10], &data).unwrap()
    }

    #[test]
    fn test_roundtrip_within_bound() {
        let grid = field();
        let pipeline = Pipeline::new(CompressionConfig::default(), MeanFieldModel::new()).unwrap();
        let (container, report) = pipeline.compress_with_report(&grid).unwrap();
        assert!(report.max_abs_error <= 1e-3);
        assert_eq!(container.header().shape, *grid.shape());

        let edges = report.edges.unwrap();
        assert_eq!(edges.consistency_ratio, 1.0);
        assert_eq!(edges.original_only + edges.reconstructed_only, 0);
        // each edge weight is a difference of two cells, each within ε
        assert!(edges.weight_mae <= 2e-3 + 1e-6);
    }

    #[test]
    fn test_tiled_propagation() {
        let grid = field();
        let mut config = CompressionConfig::default();
        config.graph = AdjacencyConfig::default().with_tile(&[3, 2]).with_neighbors(8);
        config.codec.error_bound = 0.05;
        let pipeline = Pipeline::new(config, PropagationModel::default()).unwrap();

        let container = pipeline.compress(&grid).unwrap();
        let restored = pipeline.decompress(&container).unwrap();
        assert!(restored.max_abs_diff(&grid).unwrap() <= 0.05);
    }

    #[test]
    fn test_mismatched_tiling_detected() {
        let grid = field();
        let mut config = CompressionConfig::default();
        config.graph = AdjacencyConfig::default().with_tile(&[2, 2]);
        let container = Pipeline::new(config, MeanFieldModel::new())
            .unwrap()
            .compress(&grid)
            .unwrap();

        let other = Pipeline::new(CompressionConfig::default(), MeanFieldModel::new()).unwrap();
        let err = other.decompress(&container).unwrap_err();
        assert!(matches!(
            err,
            IsobarError::IncompleteMapping {
                expected: 120,
                found: 30
            }
        ));
    }

    #[test]
    fn test_transposed_tiling_detected() {
        let data: Vec<f64> = (0..16).map(|i| (i * i) as f64 * 0.25).collect();
        let grid = Grid::from_f64(&[4, 4], &data).unwrap();
        let tiled = |tile: &[usize]| {
            let mut config = CompressionConfig::default();
            config.graph = AdjacencyConfig::default().with_tile(tile);
            Pipeline::new(config, MeanFieldModel::new()).unwrap()
        };

        let container = tiled(&[2, 1]).compress(&grid).unwrap();
        let err = tiled(&[1, 2]).decompress(&container).unwrap_err();
        match err {
            IsobarError::TilingMismatch { expected, found } => {
                assert_eq!(expected, vec![1, 2]);
                assert_eq!(found, vec![2, 1]);
            }
            other => panic!("expected TilingMismatch, got {other:?}"),
        }

        let restored = tiled(&[2, 1]).decompress(&container).unwrap();
        assert!(restored.max_abs_diff(&grid).unwrap() <= 1e-3);
    }

    #[test]
    fn test_decode_ignores_configured_propagation_weights() {
        let data: Vec<f64> = (0..64)
            .map(|i| ((i % 8) as f64 * 0.7).sin() * 4.0 + (i / 8) as f64)
            .collect();
        let grid = Grid::from_f64(&[8, 8], &data).unwrap();
        let propagation = |ws, wn| {
            let model = PropagationModel::new(ws, wn).unwrap();
            Pipeline::new(CompressionConfig::default(), model).unwrap()
        };
        let (writer, reader) = (propagation(0.5, 0.5), propagation(0.9, 0.1));

        let container = writer.compress(&grid).unwrap();
        let restored = reader.decompress(&container).unwrap();
        assert!(restored.max_abs_diff(&grid).unwrap() <= 1e-3);
        assert_eq!(restored, writer.decompress(&container).unwrap());
    }

    #[test]
    fn test_corrupt_latent_is_format_error() {
        let grid = field();
        let pipeline = Pipeline::new(CompressionConfig::default(), MeanFieldModel::new()).unwrap();
        let container = pipeline.compress(&grid).unwrap();
        let truncated = container.latent()[..4].to_vec();
        let broken = CompressedContainer::new(
            container.header().shape.clone(),
            container.header().dtype,
            truncated,
            container.residual().clone(),
        );
        assert!(matches!(
            pipeline.decompress(&broken),
            Err(IsobarError::Container(ContainerError::ContainerFormat(_)))
        ));
    }

    #[test]
    fn test_wrong_model_rejected() {
        let grid = field();
        let container = Pipeline::new(CompressionConfig::default(), MeanFieldModel::new())
            .unwrap()
            .compress(&grid)
            .unwrap();
        let other = Pipeline::new(CompressionConfig::default(), PropagationModel::default()).unwrap();
        assert!(matches!(
            other.decompress(&container),
            Err(IsobarError::Model(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CompressionConfig::default();
        config.codec.block_size = 0;
        assert!(matches!(
            Pipeline::from_config(config),
            Err(IsobarError::Config(_))
        ));
    }
}
