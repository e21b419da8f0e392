use crate::config::ConfigError;
use isobar_codec::CodecError;
use isobar_container::ContainerError;
use isobar_core::{GraphError, ModelError, ReconstructError};
use isobar_grid::GridError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IsobarError {
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Reconstruction error: {0}")]
    Reconstruct(#[from] ReconstructError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Latent covers {found} nodes, node mapping has {expected}")]
    IncompleteMapping { expected: usize, found: usize },
    #[error("Latent was encoded with tile {found:?}, node mapping uses {expected:?}")]
    TilingMismatch { expected: Vec<usize>, found: Vec<usize> },
}

impl IsobarError {
    /// Whether the failure came from a corrupt, truncated or unsupported artifact.
    ///
    /// `Pipeline::decompress` reports stream and latent corruption as
    /// `ContainerFormat`; the other arms cover the lower-level entry points.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            IsobarError::Container(ContainerError::ContainerFormat(_))
                | IsobarError::Codec(CodecError::MalformedBlock { .. })
                | IsobarError::Codec(CodecError::MalformedStream(_))
                | IsobarError::Model(ModelError::Serialization(_))
                | IsobarError::Model(ModelError::MalformedLatent(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, IsobarError>;
