//! Application configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional JSON
//! file, environment variables. CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClassifierError, Result};
use crate::inference::InferenceConfig;
use crate::preprocessing::PreprocessingConfig;
use crate::server::ServerConfig;
use crate::tracking::TrackingConfig;

/// Full configuration snapshot of the service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub preprocessing: PreprocessingConfig,
    pub inference: InferenceConfig,
    pub tracking: TrackingConfig,
}

impl AppConfig {
    /// Read a JSON config file. Missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ClassifierError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay environment-style variables resolved through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_var("API_PORT", &port)?;
        }
        if let Some(size) = lookup("MAX_UPLOAD_SIZE") {
            self.server.max_upload_size = parse_var("MAX_UPLOAD_SIZE", &size)?;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = Some(origin).filter(|o| !o.trim().is_empty());
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.inference.model_path = PathBuf::from(path);
        }
        if let Some(output) = lookup("MODEL_OUTPUT") {
            self.inference.output_convention = output.parse()?;
        }
        if let Some(dir) = lookup("TRACKING_DIR") {
            self.tracking.tracking_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("EXPERIMENT_NAME") {
            self.tracking.experiment_name = name;
        }
        if let Some(enabled) = lookup("TRACKING_ENABLED") {
            self.tracking.enabled = parse_bool("TRACKING_ENABLED", &enabled)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.preprocessing.validate()?;
        self.inference.validate()?;
        self.tracking.validate()?;
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ClassifierError::ConfigError(format!("{}='{}': {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClassifierError::ConfigError(format!(
            "{}='{}' is not a boolean",
            key, value
        ))),
    }
}
