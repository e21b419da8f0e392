use isobar_codec::error_bounded::DEFAULT_BLOCK_SIZE;
use isobar_core::AdjacencyConfig;
use isobar_models::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub const ENV_ERROR_BOUND: &str = "ISOBAR_ERROR_BOUND";
pub const ENV_BLOCK_SIZE: &str = "ISOBAR_BLOCK_SIZE";
pub const ENV_NEIGHBORS: &str = "ISOBAR_NEIGHBORS";
pub const ENV_LOG_LEVEL: &str = "ISOBAR_LOG_LEVEL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default)]
    pub graph: AdjacencyConfig,
    #[serde(default)]
    pub model: ModelKind,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Point-wise bound ε. `0` is lossless.
    #[serde(default = "default_error_bound")]
    pub error_bound: f64,
    /// Quantization step; defaults to just under `2ε`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantum: Option<f64>,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Escaped cell fraction above which compression logs a warning.
    #[serde(default = "default_max_escape_fraction")]
    pub max_escape_fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `isobar=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_error_bound() -> f64 {
    1e-3
}
fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}
fn default_max_escape_fraction() -> f64 {
    0.05
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            error_bound: default_error_bound(),
            quantum: None,
            block_size: default_block_size(),
            max_escape_fraction: default_max_escape_fraction(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}

impl CompressionConfig {
    /// Load config from a TOML file, falling back to defaults.
    /// Precedence: env var > TOML file > defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Apply `ISOBAR_*` overrides from `lookup` (the process environment in
    /// [`load`](Self::load)).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_ERROR_BOUND) {
            self.codec.error_bound = parse_env(ENV_ERROR_BOUND, v)?;
        }
        if let Some(v) = lookup(ENV_BLOCK_SIZE) {
            self.codec.block_size = parse_env(ENV_BLOCK_SIZE, v)?;
        }
        if let Some(v) = lookup(ENV_NEIGHBORS) {
            self.graph.neighbors = Some(parse_env(ENV_NEIGHBORS, v)?);
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = v;
        }
        Ok(())
    }

    /// Effective quantization step for the configured bound.
    pub fn quantum(&self) -> f64 {
        self.codec
            .quantum
            .unwrap_or_else(|| isobar_codec::default_quantum(self.codec.error_bound))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let eps = self.codec.error_bound;
        if !eps.is_finite() || eps < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "codec.error_bound must be finite and >= 0, got {}",
                eps
            )));
        }
        let q = self.quantum();
        let quantum_ok = if eps == 0.0 {
            q == 0.0
        } else {
            q.is_finite() && q > 0.0 && q <= 2.0 * eps
        };
        if !quantum_ok {
            return Err(ConfigError::Invalid(format!(
                "codec.quantum {} incompatible with error bound {}",
                q, eps
            )));
        }
        if self.codec.block_size == 0 || self.codec.block_size > u16::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "codec.block_size must be in 1..={}, got {}",
                u16::MAX,
                self.codec.block_size
            )));
        }
        let f = self.codec.max_escape_fraction;
        if !(0.0..=1.0).contains(&f) {
            return Err(ConfigError::Invalid(format!(
                "codec.max_escape_fraction must be in [0, 1], got {}",
                f
            )));
        }
        if self.graph.tile.iter().any(|&t| t == 0) {
            return Err(ConfigError::Invalid(format!(
                "graph.tile extents must be positive, got {:?}",
                self.graph.tile
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = CompressionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.codec.block_size, 4096);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.model, ModelKind::MeanField);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = CompressionConfig::from_toml(
            r#"
            [graph]
            neighbors = 8
            tile = [2, 2]

            [model]
            kind = "propagation"
            self_weight = 0.75

            [codec]
            error_bound = 0.5

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.graph.neighbors, Some(8));
        assert_eq!(config.graph.tile, vec![2, 2]);
        assert_eq!(
            config.model,
            ModelKind::Propagation {
                self_weight: 0.75,
                neighbor_weight: 0.5
            }
        );
        assert_eq!(config.codec.error_bound, 0.5);
        assert_eq!(config.codec.block_size, 4096);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = CompressionConfig::default();
        config.graph = AdjacencyConfig::default().with_neighbors(6).with_tile(&[4, 4, 1]);
        config.codec.quantum = Some(1e-3);
        config.model = ModelKind::Propagation {
            self_weight: 0.25,
            neighbor_weight: 0.75,
        };
        let text = config.to_toml().unwrap();
        assert_eq!(CompressionConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_ERROR_BOUND, "0.25"),
            (ENV_BLOCK_SIZE, "512"),
            (ENV_NEIGHBORS, "3"),
            (ENV_LOG_LEVEL, "isobar=debug"),
        ]
        .into_iter()
        .collect();
        let mut config = CompressionConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.codec.error_bound, 0.25);
        assert_eq!(config.codec.block_size, 512);
        assert_eq!(config.graph.neighbors, Some(3));
        assert_eq!(config.logging.level, "isobar=debug");

        let err = config
            .apply_overrides(|k| (k == ENV_BLOCK_SIZE).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: ENV_BLOCK_SIZE, .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CompressionConfig::default();
        config.codec.error_bound = -1.0;
        assert!(config.validate().is_err());

        let mut config = CompressionConfig::default();
        config.codec.quantum = Some(1.0);
        assert!(config.validate().is_err());

        let mut config = CompressionConfig::default();
        config.codec.error_bound = 0.0;
        config.validate().unwrap();
        config.codec.quantum = Some(0.1);
        assert!(config.validate().is_err());

        let mut config = CompressionConfig::default();
        config.codec.block_size = 70_000;
        assert!(config.validate().is_err());

        let mut config = CompressionConfig::default();
        config.graph.tile = vec![2, 0];
        assert!(config.validate().is_err());

        let mut config = CompressionConfig::default();
        config.codec.max_escape_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = CompressionConfig::load(Some(Path::new("/nonexistent/isobar.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
