//! Configuration loading and validation for ratefit.
//!
//! This module handles:
//! - The TOML config file layout (`[data]`, `[split]`, `[fit]`, `[optimizer]`)
//! - Config resolution order (CLI flag / `RATEFIT_CONFIG` > XDG > defaults)
//! - Semantic validation (positive bin size, ordered bounds, finite start)
//!
//! Every field is optional; the defaults reproduce the daily-bin
//! analysis: 24-row bins, 638 training bins, start at `(20.0, 0.0)`.

use clap::ValueEnum;
use rf_math::{Bound, OptimizeOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "ratefit";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_COUNT_COLUMN: usize = 1;
pub const DEFAULT_BIN_SIZE: usize = 24;
pub const DEFAULT_TRAIN_SIZE: usize = 638;
pub const DEFAULT_INITIAL_THETA: [f64; 2] = [20.0, 0.0];

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl From<ConfigError> for rf_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { .. } => rf_common::Error::Config(err.to_string()),
            ConfigError::IoError { path, source } => rf_common::Error::FileRead { path, source },
            ConfigError::ParseError { path, source } => rf_common::Error::ConfigParse {
                path,
                message: source.to_string(),
            },
            ConfigError::Invalid { field, message } => {
                rf_common::Error::InvalidValue { field, message }
            }
        }
    }
}

/// Which part of the series the likelihood is summed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitScope {
    /// Every bin, train and test alike
    #[default]
    All,
    /// Only the training bins
    Train,
}

impl std::fmt::Display for FitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitScope::All => write!(f, "all"),
            FitScope::Train => write!(f, "train"),
        }
    }
}

/// CSV input layout and binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Zero-based column holding the hourly count.
    pub count_column: usize,
    /// Rows per bin.
    pub bin_size: usize,
    /// Whether the first row is a header.
    pub has_header: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            count_column: DEFAULT_COUNT_COLUMN,
            bin_size: DEFAULT_BIN_SIZE,
            has_header: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    /// Leading bins assigned to the training partition.
    pub train_size: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_size: DEFAULT_TRAIN_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// Starting point `(theta_0, theta_1)`.
    pub initial_theta: [f64; 2],
    pub scope: FitScope,
    /// Empty, or exactly one bound per parameter.
    pub bounds: Vec<Bound>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            initial_theta: DEFAULT_INITIAL_THETA,
            scope: FitScope::All,
            bounds: Vec::new(),
        }
    }
}

/// Complete ratefit configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data: DataConfig,
    pub split: SplitConfig,
    pub fit: FitConfig,
    pub optimizer: OptimizeOptions,
}

/// Command-line overrides applied on top of the loaded file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub count_column: Option<usize>,
    pub bin_size: Option<usize>,
    pub train_size: Option<usize>,
    pub scope: Option<FitScope>,
    pub theta0: Option<f64>,
    pub theta1: Option<f64>,
}

impl Config {
    /// Parse a TOML document. `path` is only used for error messages.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            field: "config".to_string(),
            message: e.to_string(),
        })
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(column) = overrides.count_column {
            self.data.count_column = column;
        }
        if let Some(size) = overrides.bin_size {
            self.data.bin_size = size;
        }
        if let Some(size) = overrides.train_size {
            self.split.train_size = size;
        }
        if let Some(scope) = overrides.scope {
            self.fit.scope = scope;
        }
        if let Some(theta0) = overrides.theta0 {
            self.fit.initial_theta[0] = theta0;
        }
        if let Some(theta1) = overrides.theta1 {
            self.fit.initial_theta[1] = theta1;
        }
    }

    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.bin_size == 0 {
            return Err(invalid("data.bin_size", "must be at least 1"));
        }
        if let Some(i) = self.fit.initial_theta.iter().position(|v| !v.is_finite()) {
            return Err(invalid(
                &format!("fit.initial_theta[{i}]"),
                &format!("must be finite, got {}", self.fit.initial_theta[i]),
            ));
        }
        if !self.fit.bounds.is_empty() && self.fit.bounds.len() != 2 {
            return Err(invalid(
                "fit.bounds",
                &format!("expected 2 entries (one per parameter), got {}", self.fit.bounds.len()),
            ));
        }
        for (i, bound) in self.fit.bounds.iter().enumerate() {
            let nan = bound.lower.is_some_and(f64::is_nan) || bound.upper.is_some_and(f64::is_nan);
            let inverted = matches!((bound.lower, bound.upper), (Some(lo), Some(hi)) if lo > hi);
            if nan || inverted {
                return Err(invalid(
                    &format!("fit.bounds[{i}]"),
                    &format!("lower={:?} must not exceed upper={:?}", bound.lower, bound.upper),
                ));
            }
        }
        self.optimizer
            .validate()
            .map_err(|e| invalid("optimizer", &e.to_string()))?;
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Where the resolved configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// `--config` flag or `RATEFIT_CONFIG`.
    Explicit(PathBuf),
    /// `<config_dir>/ratefit/config.toml`.
    ConfigDir(PathBuf),
    /// Built-in defaults.
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit(path) => write!(f, "explicit: {}", path.display()),
            ConfigSource::ConfigDir(path) => write!(f, "config dir: {}", path.display()),
            ConfigSource::Defaults => write!(f, "defaults"),
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
    /// Overrides the XDG config directory (used by tests).
    pub config_dir: Option<PathBuf>,
}

/// Resolved configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub source: ConfigSource,
}

/// Default config directory: `$XDG_CONFIG_HOME/ratefit` or platform equivalent.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME))
}

/// Load configuration following the resolution order. The result is
/// validated.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let resolved = if let Some(path) = &options.config_path {
        if !path.exists() {
            return Err(ConfigError::NotFound { path: path.clone() });
        }
        ResolvedConfig {
            config: read_config_file(path)?,
            source: ConfigSource::Explicit(path.clone()),
        }
    } else {
        let dir = options.config_dir.clone().or_else(default_config_dir);
        match dir.map(|d| d.join(CONFIG_FILE_NAME)).filter(|p| p.exists()) {
            Some(path) => ResolvedConfig {
                config: read_config_file(&path)?,
                source: ConfigSource::ConfigDir(path),
            },
            None => ResolvedConfig {
                config: Config::default(),
                source: ConfigSource::Defaults,
            },
        }
    };

    tracing::debug!(source = %resolved.source, "configuration resolved");
    resolved.config.validate()?;
    Ok(resolved)
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_reproduce_daily_analysis() {
        let config = Config::default();
        assert_eq!(config.data.bin_size, 24);
        assert_eq!(config.data.count_column, 1);
        assert!(config.data.has_header);
        assert_eq!(config.split.train_size, 638);
        assert_eq!(config.fit.initial_theta, [20.0, 0.0]);
        assert_eq!(config.fit.scope, FitScope::All);
        assert!(config.fit.bounds.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let text = r#"
            [data]
            bin_size = 12

            [optimizer]
            pgtol = 1e-8
        "#;
        let config = Config::from_toml(text, Path::new("test.toml")).unwrap();
        assert_eq!(config.data.bin_size, 12);
        assert_eq!(config.data.count_column, 1);
        assert_eq!(config.optimizer.pgtol, 1e-8);
        assert_eq!(config.optimizer.memory, 10);
        assert_eq!(config.split.train_size, 638);
    }

    #[test]
    fn bounds_parse_from_array_of_tables() {
        let text = r#"
            [fit]
            scope = "train"

            [[fit.bounds]]
            lower = 0.0

            [[fit.bounds]]
            lower = -1.0
            upper = 1.0
        "#;
        let config = Config::from_toml(text, Path::new("test.toml")).unwrap();
        assert_eq!(config.fit.scope, FitScope::Train);
        assert_eq!(config.fit.bounds[0], Bound::new(Some(0.0), None));
        assert_eq!(config.fit.bounds[1], Bound::new(Some(-1.0), Some(1.0)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = Config::from_toml("[data]\nbinsize = 3\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn zero_bin_size_is_invalid() {
        let mut config = Config::default();
        config.data.bin_size = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "data.bin_size"));
    }

    #[test]
    fn wrong_bound_count_is_invalid() {
        let mut config = Config::default();
        config.fit.bounds = vec![Bound::UNBOUNDED];
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_bound_is_invalid() {
        let mut config = Config::default();
        config.fit.bounds = vec![Bound::new(Some(2.0), Some(1.0)), Bound::UNBOUNDED];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fit.bounds[0]"));
    }

    #[test]
    fn non_finite_start_is_invalid() {
        let mut config = Config::default();
        config.fit.initial_theta = [f64::NAN, 0.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_optimizer_options_are_invalid() {
        let mut config = Config::default();
        config.optimizer.memory = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "optimizer"));
    }

    #[test]
    fn overrides_apply_on_top() {
        let mut config = Config::default();
        config.apply(&Overrides {
            bin_size: Some(6),
            scope: Some(FitScope::Train),
            theta0: Some(1.5),
            ..Overrides::default()
        });
        assert_eq!(config.data.bin_size, 6);
        assert_eq!(config.fit.scope, FitScope::Train);
        assert_eq!(config.fit.initial_theta, [1.5, 0.0]);
        assert_eq!(config.split.train_size, 638);
    }

    #[test]
    fn toml_round_trip_of_defaults() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[data]"));
        assert!(text.contains("bin_size = 24"));
        let parsed = Config::from_toml(&text, Path::new("roundtrip.toml")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn explicit_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let options = ConfigOptions {
            config_path: Some(dir.path().join("nope.toml")),
            config_dir: Some(dir.path().to_path_buf()),
        };
        let err = load_config(&options).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn config_dir_file_is_used_when_present() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[split]\ntrain_size = 10\n").unwrap();
        let options = ConfigOptions {
            config_path: None,
            config_dir: Some(dir.path().to_path_buf()),
        };
        let resolved = load_config(&options).unwrap();
        assert_eq!(resolved.config.split.train_size, 10);
        assert!(matches!(resolved.source, ConfigSource::ConfigDir(_)));
    }

    #[test]
    fn empty_config_dir_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let options = ConfigOptions {
            config_path: None,
            config_dir: Some(dir.path().to_path_buf()),
        };
        let resolved = load_config(&options).unwrap();
        assert_eq!(resolved.source, ConfigSource::Defaults);
        assert_eq!(resolved.config, Config::default());
    }

    #[test]
    fn invalid_file_fails_validation_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[data]\nbin_size = 0\n").unwrap();
        let options = ConfigOptions {
            config_path: Some(path),
            config_dir: None,
        };
        assert!(matches!(
            load_config(&options),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn config_error_maps_to_common_error() {
        let err: rf_common::Error = invalid("data.bin_size", "must be at least 1").into();
        assert_eq!(err.category(), rf_common::ErrorCategory::Config);
        assert_eq!(err.code(), 12);
    }
}
