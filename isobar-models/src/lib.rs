//! # isobar-models
//!
//! Reference [`LatentModel`](isobar_core::LatentModel) implementations. They are
//! fixed-parameter stand-ins for a trained graph autoencoder: deterministic,
//! lossy, and cheap enough to run on every call.
//!
//! Key types:
//! - [`MeanFieldModel`]: one normalized value per node (`f32`)
//! - [`PropagationModel`]: one round of mean-aggregation message passing
//! - [`ModelKind`]: serde-selectable model choice for configuration files

pub mod mean_field;
pub mod propagation;

pub use mean_field::MeanFieldModel;
pub use propagation::PropagationModel;

use isobar_core::{LatentModel, ModelError};
use serde::{Deserialize, Serialize};

/// Model selector for configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModelKind {
    /// Per-node normalized mean, see [`MeanFieldModel`].
    MeanField,
    /// Self/neighbor blend, see [`PropagationModel`].
    Propagation {
        #[serde(default = "default_weight")]
        self_weight: f64,
        #[serde(default = "default_weight")]
        neighbor_weight: f64,
    },
}

fn default_weight() -> f64 {
    0.5
}

impl Default for ModelKind {
    fn default() -> Self {
        ModelKind::MeanField
    }
}

impl ModelKind {
    pub fn build(&self) -> Result<Box<dyn LatentModel>, ModelError> {
        match self {
            ModelKind::MeanField => Ok(Box::new(MeanFieldModel::new())),
            ModelKind::Propagation {
                self_weight,
                neighbor_weight,
            } => Ok(Box::new(PropagationModel::new(*self_weight, *neighbor_weight)?)),
        }
    }

    pub fn description(&self) -> String {
        match self {
            ModelKind::MeanField => "MeanField".to_string(),
            ModelKind::Propagation {
                self_weight,
                neighbor_weight,
            } => format!("Propagation (self={:.2}, neighbor={:.2})", self_weight, neighbor_weight),
        }
    }
}

/// Split `[mean, std]` model parameters out of a latent.
pub(crate) fn normalization(params: &[f64]) -> Result<(f64, f64), ModelError> {
    match params {
        [mean, std] if mean.is_finite() && std.is_finite() => Ok((*mean, *std)),
        _ => Err(ModelError::MalformedLatent(format!(
            "expected [mean, std] parameters, got {:?}",
            params
        ))),
    }
}
