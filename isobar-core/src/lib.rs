//! # isobar-core
//!
//! Graph abstractions for isobar's learned, error-bounded grid compression.
//!
//! This crate defines:
//! - [`GraphBuilder`]: deterministic grid → graph conversion (k-NN adjacency)
//! - [`NodeMapping`]: the explicit node ↔ cell bijection shared by both sides
//! - [`LatentModel`]: the encode/decode capability a learned model provides
//! - [`GridReconstructor`]: node values → dense grid, the inverse of the mapping
//!
//! The mapping is always passed explicitly from the builder to the
//! reconstructor; nothing here keeps global state between calls.

pub mod graph;
pub mod mapping;
pub mod model;
pub mod reconstruct;

pub use graph::{AdjacencyConfig, Edge, FeatureStats, Graph, GraphBuilder, GraphError, Node};
pub use mapping::{NodeId, NodeMapping};
pub use model::{Latent, LatentModel, ModelError, ModelId, NodeValues};
pub use reconstruct::{GridReconstructor, ReconstructError};
