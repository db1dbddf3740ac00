//! Inference configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};

use super::Label;

/// How the model's output head encodes class evidence.
///
/// Pinned once per deployment; never inferred per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputConvention {
    /// One sigmoid scalar, read as P(dog)
    Sigmoid,
    /// Two unnormalised logits `[cat, dog]`, normalised with softmax
    Softmax,
    /// Two class probabilities `[cat, dog]` from a softmax head
    Probabilities,
}

impl OutputConvention {
    /// Number of values the model must emit per image
    pub fn expected_width(self) -> usize {
        match self {
            OutputConvention::Sigmoid => 1,
            OutputConvention::Softmax | OutputConvention::Probabilities => 2,
        }
    }
}

impl std::fmt::Display for OutputConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputConvention::Sigmoid => "sigmoid",
            OutputConvention::Softmax => "softmax",
            OutputConvention::Probabilities => "probabilities",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OutputConvention {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(OutputConvention::Sigmoid),
            "softmax" | "logits" => Ok(OutputConvention::Softmax),
            "probabilities" | "proba" => Ok(OutputConvention::Probabilities),
            other => Err(ClassifierError::ConfigError(format!(
                "unknown output convention '{}', expected sigmoid, softmax or probabilities",
                other
            ))),
        }
    }
}

/// Configuration for the model runtime and result interpretation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Path to the ONNX model artifact
    pub model_path: PathBuf,

    /// Output head convention of the model
    pub output_convention: OutputConvention,

    /// Label returned when both probabilities are equal within `tie_tolerance`
    pub tie_label: Label,

    /// Absolute tolerance for treating the two probabilities as equal
    pub tie_tolerance: f32,

    /// Run one all-zero tensor through the model before reporting ready
    pub warmup: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/cats_dogs.onnx"),
            output_convention: OutputConvention::Sigmoid,
            tie_label: Label::Dog,
            tie_tolerance: 1e-6,
            warmup: true,
        }
    }
}

impl InferenceConfig {
    /// Create a new inference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the model path
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Builder method to set the output convention
    pub fn with_output_convention(mut self, convention: OutputConvention) -> Self {
        self.output_convention = convention;
        self
    }

    /// Builder method to set the tie-break label
    pub fn with_tie_label(mut self, label: Label) -> Self {
        self.tie_label = label;
        self
    }

    /// Builder method to enable or disable warmup
    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ClassifierError::ConfigError("model_path must not be empty".to_string()));
        }
        if !(0.0..0.5).contains(&self.tie_tolerance) {
            return Err(ClassifierError::ConfigError(format!(
                "tie_tolerance must be in [0, 0.5), got {}",
                self.tie_tolerance
            )));
        }
        Ok(())
    }
}
