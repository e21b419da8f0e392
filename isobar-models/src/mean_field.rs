use crate::normalization;
use isobar_core::{Graph, Latent, LatentModel, ModelError, ModelId, NodeValues};

/// Stores each node's normalized value as `f32`.
///
/// Encode: `z_i = (v_i − mean) / std`
/// Decode: `v̂_i = z_i · std + mean`
///
/// The loss comes from tile averaging and `f32` rounding of `z_i`.
#[derive(Debug, Clone, Default)]
pub struct MeanFieldModel;

impl MeanFieldModel {
    pub const NAME: &'static str = "mean-field";
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self
    }
}

impl LatentModel for MeanFieldModel {
    fn id(&self) -> ModelId {
        ModelId::new(Self::NAME, Self::VERSION)
    }

    fn encode(&self, graph: &Graph) -> Result<Latent, ModelError> {
        let stats = graph.stats();
        let data = graph
            .nodes()
            .iter()
            .map(|n| stats.normalize(n.value) as f32)
            .collect();
        Latent::new(self.id(), 1, graph.num_nodes(), vec![stats.mean, stats.std], data)
    }

    fn decode(&self, latent: &Latent) -> Result<NodeValues, ModelError> {
        self.check_latent(latent)?;
        if latent.dim != 1 {
            return Err(ModelError::MalformedLatent(format!("expected dim 1, got {}", latent.dim)));
        }
        let (mean, std) = normalization(&latent.params)?;
        Ok(NodeValues::from_dense(
            latent.data.iter().map(|&z| z as f64 * std + mean).collect(),
        ))
    }
}
