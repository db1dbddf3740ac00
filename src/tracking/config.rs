//! Tracking configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};

/// When the experiment record is written relative to the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDispatch {
    /// Written on a blocking worker; the response does not wait for it
    Background,
    /// Written before the response is returned, still failure-isolated
    Inline,
}

/// Configuration for experiment tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Record every inference
    pub enabled: bool,

    /// Root directory of the tracking store
    pub tracking_dir: PathBuf,

    /// Experiment that inference runs are recorded under
    pub experiment_name: String,

    /// Persist the uploaded image as a run artifact
    pub store_artifacts: bool,

    pub dispatch: LogDispatch,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tracking_dir: PathBuf::from("./mlruns"),
            experiment_name: "cat_dog_classifier".to_string(),
            store_artifacts: true,
            dispatch: LogDispatch::Background,
        }
    }
}

impl TrackingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the store root
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = dir.into();
        self
    }

    /// Builder method to set the experiment name
    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Builder method to set the dispatch mode
    pub fn with_dispatch(mut self, dispatch: LogDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Builder method to disable tracking entirely
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.experiment_name.trim();
        if name.is_empty() {
            return Err(ClassifierError::ConfigError("experiment_name must not be empty".to_string()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ClassifierError::ConfigError(format!(
                "experiment_name '{}' must be a plain directory name",
                name
            )));
        }
        Ok(())
    }
}
