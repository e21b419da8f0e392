//! # isobar
//!
//! Lossy compression of N-dimensional scientific grids with a hard point-wise
//! error bound.
//!
//! A grid is turned into a graph, compressed by a [`LatentModel`] and
//! decoded back into an approximation. The error-bound codec then stores the
//! residual between the original and that approximation so that every cell of
//! the decompressed grid is within ε of the original, regardless of how good
//! the model is.
//!
//! Workspace crates:
//! - `isobar-grid`: shapes, dtypes and dense grids
//! - `isobar-core`: graph construction, node mapping, model trait, reconstruction
//! - `isobar-codec`: block-adaptive residual quantization with escapes
//! - `isobar-models`: reference latent models
//! - `isobar-container`: the binary artifact
//!
//! This crate ties them together behind [`Pipeline`], configured by
//! [`CompressionConfig`].
//!
//! ```no_run
//! use isobar::{CompressionConfig, Pipeline};
//! use isobar::grid::Grid;
//!
//! let grid = Grid::from_f32(&[64, 64], &vec![1.0; 64 * 64])?;
//! let pipeline = Pipeline::from_config(CompressionConfig::default())?;
//! let container = pipeline.compress(&grid)?;
//! container.save("field.isbr")?;
//! let restored = pipeline.decompress(&container)?;
//! assert!(restored.max_abs_diff(&grid)? <= 1e-3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;

pub use config::{CodecConfig, CompressionConfig, ConfigError, LogFormat, LoggingConfig};
pub use error::{IsobarError, Result};
pub use pipeline::Pipeline;
pub use report::{EdgeConsistency, QualityReport};

pub use isobar_codec as codec;
pub use isobar_container as container;
pub use isobar_core as graph;
pub use isobar_grid as grid;
pub use isobar_models as models;

pub use isobar_container::CompressedContainer;
pub use isobar_core::LatentModel;
