//! Run configuration loaded from `weightlab.toml`.
//!
//! Every field has a default, so an empty file is a valid config. The run id
//! is a BLAKE3 hash of the serialized config: two runs with identical configs
//! share an id, and the default seed is derived from it.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use weightlab_core::PipelineConfig;

/// Content-addressable identifier of a run configuration.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the inputs live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `<SYMBOL>.csv` bar files.
    pub bars_dir: PathBuf,
    /// JSON object: symbol → snapshot fields.
    pub snapshot: PathBuf,
    /// JSON array of position records.
    pub portfolio: PathBuf,
    /// Symbols to allocate across. Empty means every CSV in `bars_dir`.
    pub symbols: Vec<String>,
    /// Fill missing ETF snapshot fields from their ETF equivalents.
    pub fill_etf_fields: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            bars_dir: PathBuf::from("data/bars"),
            snapshot: PathBuf::from("data/snapshot.json"),
            portfolio: PathBuf::from("data/portfolio.json"),
            symbols: Vec::new(),
            fill_etf_fields: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

/// Complete configuration of an allocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Cash to allocate.
    pub budget: f64,
    /// Evaluation date. Defaults to today.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    /// Master seed for the Markov sampling. Defaults to one derived from the
    /// run id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub data: DataConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            budget: 100.0,
            as_of: None,
            seed: None,
            data: DataConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load and validate a config file.
    ///
    /// Relative data and output paths are resolved against the config file's
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.budget.is_finite() || self.budget <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "budget must be positive, got {}",
                self.budget
            )));
        }
        let minimum = self.pipeline.allocation.minimum_allocation;
        if self.budget < minimum {
            return Err(ConfigError::Invalid(format!(
                "budget {} is below the minimum allocation {minimum}",
                self.budget
            )));
        }
        self.pipeline
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.data.bars_dir,
            &mut self.data.snapshot,
            &mut self.data.portfolio,
            &mut self.output.dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Deterministic hash of this configuration.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    /// Configured seed, or one derived from the run id.
    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            let json = serde_json::to_vec(self).unwrap_or_default();
            let hash = blake3::hash(&json);
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&hash.as_bytes()[..8]);
            u64::from_le_bytes(bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.pipeline.allocation.minimum_allocation, 5.0);
        assert_eq!(config.pipeline.technical.rsi_period, 14);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = RunConfig::from_toml(
            r#"
budget = 250.0
as_of = "2024-06-03"
seed = 9

[pipeline.diversity]
discount = 0.5

[logging]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.budget, 250.0);
        assert_eq!(config.as_of, NaiveDate::from_ymd_opt(2024, 6, 3));
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.pipeline.diversity.discount, 0.5);
        assert_eq!(config.pipeline.diversity.balance, 0.3);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_budget_below_floor() {
        let err = RunConfig::from_toml("budget = 2.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unparseable_toml() {
        assert!(matches!(
            RunConfig::from_toml("budget = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn toml_round_trip() {
        let config = RunConfig {
            budget: 321.0,
            seed: Some(4),
            ..RunConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(RunConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn run_id_tracks_content() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        assert_eq!(a.run_id(), b.run_id());
        b.budget = 101.0;
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.run_id().len(), 64);
    }

    #[test]
    fn explicit_seed_wins() {
        let config = RunConfig {
            seed: Some(77),
            ..RunConfig::default()
        };
        assert_eq!(config.effective_seed(), 77);
        assert_eq!(
            RunConfig::default().effective_seed(),
            RunConfig::default().effective_seed()
        );
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut config = RunConfig::default();
        config.resolve_paths(Path::new("/srv/alloc"));
        assert_eq!(config.data.bars_dir, PathBuf::from("/srv/alloc/data/bars"));
        assert_eq!(config.output.dir, PathBuf::from("/srv/alloc/output"));
    }
}
