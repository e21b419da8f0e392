use crate::graph::Graph;
use crate::mapping::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Latent produced by model {found}, expected {expected}")]
    ModelMismatch { expected: ModelId, found: ModelId },
    #[error("Malformed latent: {0}")]
    MalformedLatent(String),
    #[error("Latent serialization error: {0}")]
    Serialization(String),
    #[error("Model failure: {0}")]
    Model(String),
}

/// Identity of the model that produced a latent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId {
    pub name: String,
    pub version: u32,
}

impl ModelId {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

/// Per-node latent vectors of fixed length `dim`, row-major by node id.
///
/// The core treats the contents as opaque. `params` carries model-level
/// scalars (normalization, weights) the model needs to decode.
///
/// `tile` records the tiling of the node mapping the latent was encoded
/// over, so a decoder can refuse to spread node values over a different
/// partition of the grid. Models leave it empty; the caller stamps it with
/// [`with_tile`](Self::with_tile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latent {
    pub model: ModelId,
    pub dim: usize,
    pub num_nodes: usize,
    pub tile: Vec<usize>,
    pub params: Vec<f64>,
    pub data: Vec<f32>,
}

impl Latent {
    pub fn new(
        model: ModelId,
        dim: usize,
        num_nodes: usize,
        params: Vec<f64>,
        data: Vec<f32>,
    ) -> Result<Self, ModelError> {
        let expected = dim
            .checked_mul(num_nodes)
            .ok_or_else(|| ModelError::MalformedLatent("latent size overflows".into()))?;
        if data.len() != expected {
            return Err(ModelError::MalformedLatent(format!(
                "{} values for {} nodes of dim {}",
                data.len(),
                num_nodes,
                dim
            )));
        }
        Ok(Self {
            model,
            dim,
            num_nodes,
            tile: Vec::new(),
            params,
            data,
        })
    }

    pub fn with_tile(mut self, tile: &[usize]) -> Self {
        self.tile = tile.to_vec();
        self
    }

    /// Latent vector of `node`.
    pub fn vector(&self, node: NodeId) -> &[f32] {
        &self.data[node * self.dim..(node + 1) * self.dim]
    }

    /// Serialize to the opaque blob stored in a container.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        bincode::serialize(self).map_err(|e| ModelError::Serialization(e.to_string()))
    }

    /// Deserialize a blob, re-checking the size invariant.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let latent: Latent =
            bincode::deserialize(bytes).map_err(|e| ModelError::Serialization(e.to_string()))?;
        let tile = latent.tile;
        Ok(Latent::new(latent.model, latent.dim, latent.num_nodes, latent.params, latent.data)?
            .with_tile(&tile))
    }
}

/// Node → value mapping returned by [`LatentModel::decode`].
///
/// A node with no entry is "absent"; the reconstructor rejects mappings with
/// absent nodes rather than guessing a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeValues {
    values: Vec<Option<f64>>,
}

impl NodeValues {
    /// Empty mapping with room for `num_nodes` entries.
    pub fn with_nodes(num_nodes: usize) -> Self {
        Self {
            values: vec![None; num_nodes],
        }
    }

    /// Every node `0..values.len()` present.
    pub fn from_dense(values: Vec<f64>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (NodeId, f64)>) -> Self {
        let mut out = Self::default();
        for (node, value) in pairs {
            out.insert(node, value);
        }
        out
    }

    pub fn insert(&mut self, node: NodeId, value: f64) {
        if node >= self.values.len() {
            self.values.resize(node + 1, None);
        }
        self.values[node] = Some(value);
    }

    #[inline]
    pub fn get(&self, node: NodeId) -> Option<f64> {
        self.values.get(node).copied().flatten()
    }

    /// Number of node slots (present or absent).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First node in `0..num_nodes` without a value.
    pub fn first_missing(&self, num_nodes: usize) -> Option<NodeId> {
        (0..num_nodes).find(|&n| self.get(n).is_none())
    }
}

/// Learned representation capability: graph → latent → approximate node values.
///
/// Contract:
/// - `encode` and `decode` are deterministic for fixed model parameters
/// - neither carries an error guarantee; the codec certifies the bound
/// - `decode` must refuse latents tagged with another model's [`ModelId`]
///
/// Each call is a single blocking batch over all nodes.
pub trait LatentModel: Send + Sync {
    fn id(&self) -> ModelId;

    fn encode(&self, graph: &Graph) -> Result<Latent, ModelError>;

    fn decode(&self, latent: &Latent) -> Result<NodeValues, ModelError>;

    /// Reject latents produced by a different model or version.
    fn check_latent(&self, latent: &Latent) -> Result<(), ModelError> {
        let expected = self.id();
        if latent.model != expected {
            return Err(ModelError::ModelMismatch {
                expected,
                found: latent.model.clone(),
            });
        }
        Ok(())
    }
}

impl<M: LatentModel + ?Sized> LatentModel for Box<M> {
    fn id(&self) -> ModelId {
        (**self).id()
    }

    fn encode(&self, graph: &Graph) -> Result<Latent, ModelError> {
        (**self).encode(graph)
    }

    fn decode(&self, latent: &Latent) -> Result<NodeValues, ModelError> {
        (**self).decode(latent)
    }
}
