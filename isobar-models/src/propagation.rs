use crate::normalization;
use isobar_core::{Graph, Latent, LatentModel, ModelError, ModelId, NodeValues};
use rayon::prelude::*;

/// One round of mean-aggregation message passing with fixed weights.
///
/// Encode: `[x_i, m_i]` where `x_i` is the normalized node value and
/// `m_i = mean_{j ∈ N(i)} x_j` (`m_i = x_i` for isolated nodes), both `f32`.
///
/// Decode: `v̂_i = denorm(w_self · x_i + w_nbr · m_i)`
///
/// Weights are normalized to sum to 1, so a constant field decodes exactly
/// up to `f32` rounding. They travel in the latent's `params` as
/// `[mean, std, w_self, w_nbr]`, and decoding always uses the stored pair.
#[derive(Debug, Clone)]
pub struct PropagationModel {
    self_weight: f64,
    neighbor_weight: f64,
}

impl Default for PropagationModel {
    fn default() -> Self {
        Self {
            self_weight: 0.5,
            neighbor_weight: 0.5,
        }
    }
}

impl PropagationModel {
    pub const NAME: &'static str = "propagation";
    pub const VERSION: u32 = 1;

    pub fn new(self_weight: f64, neighbor_weight: f64) -> Result<Self, ModelError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        let total = self_weight + neighbor_weight;
        if !valid(self_weight) || !valid(neighbor_weight) || total <= 0.0 {
            return Err(ModelError::Model(format!(
                "weights must be non-negative with a positive sum, got ({}, {})",
                self_weight, neighbor_weight
            )));
        }
        Ok(Self {
            self_weight: self_weight / total,
            neighbor_weight: neighbor_weight / total,
        })
    }

    pub fn weights(&self) -> (f64, f64) {
        (self.self_weight, self.neighbor_weight)
    }
}

impl LatentModel for PropagationModel {
    fn id(&self) -> ModelId {
        ModelId::new(Self::NAME, Self::VERSION)
    }

    fn encode(&self, graph: &Graph) -> Result<Latent, ModelError> {
        let stats = graph.stats();
        let x: Vec<f64> = graph.nodes().iter().map(|n| stats.normalize(n.value)).collect();

        let data: Vec<f32> = (0..graph.num_nodes())
            .into_par_iter()
            .flat_map_iter(|i| {
                let nbrs = graph.neighbors(i);
                let m = if nbrs.is_empty() {
                    x[i]
                } else {
                    nbrs.iter().map(|&j| x[j]).sum::<f64>() / nbrs.len() as f64
                };
                [x[i] as f32, m as f32]
            })
            .collect();

        let params = vec![stats.mean, stats.std, self.self_weight, self.neighbor_weight];
        Latent::new(self.id(), 2, graph.num_nodes(), params, data)
    }

    fn decode(&self, latent: &Latent) -> Result<NodeValues, ModelError> {
        self.check_latent(latent)?;
        if latent.dim != 2 {
            return Err(ModelError::MalformedLatent(format!("expected dim 2, got {}", latent.dim)));
        }
        let (mean, std, ws, wn) = match latent.params[..] {
            [mean, std, ws, wn] => {
                normalization(&[mean, std])?;
                let weights = Self::new(ws, wn)
                    .map_err(|e| ModelError::MalformedLatent(format!("stored weights: {}", e)))?;
                (mean, std, weights.self_weight, weights.neighbor_weight)
            }
            _ => {
                return Err(ModelError::MalformedLatent(format!(
                    "expected [mean, std, w_self, w_nbr] parameters, got {:?}",
                    latent.params
                )))
            }
        };
        let values = latent
            .data
            .par_chunks_exact(2)
            .map(|z| (ws * z[0] as f64 + wn * z[1] as f64) * std + mean)
            .collect();
        Ok(NodeValues::from_dense(values))
    }
}
