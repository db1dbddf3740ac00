//! Experiment and run records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inference::ClassificationResult;

/// Experiment metadata, created once per store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Request metadata recorded alongside the classification
#[derive(Debug, Clone)]
pub struct InferenceContext {
    pub model_path: String,
    /// Declared content type of the upload
    pub image_format: String,
    pub filename: Option<String>,
}

/// One logged inference. Appended once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub run_id: String,
    pub run_name: String,
    pub timestamp: DateTime<Utc>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Artifact paths relative to the experiment directory
    pub artifacts: Vec<String>,
}

impl ExperimentRecord {
    /// Build the record for one classification
    pub fn for_inference(result: &ClassificationResult, context: &InferenceContext) -> Self {
        let timestamp = Utc::now();
        let run_id = Uuid::new_v4().simple().to_string();
        let run_name = format!(
            "classification_{}_{}",
            timestamp.format("%Y%m%d_%H%M%S"),
            &run_id[..8]
        );

        let response = result.to_response();
        let mut params = BTreeMap::new();
        params.insert("classified_class".to_string(), result.label().to_string());
        params.insert("model_path".to_string(), context.model_path.clone());
        params.insert("image_format".to_string(), context.image_format.clone());
        params.insert(
            "filename".to_string(),
            context.filename.clone().unwrap_or_else(|| "unknown".to_string()),
        );
        params.insert("timestamp".to_string(), timestamp.to_rfc3339());

        let mut metrics = BTreeMap::new();
        metrics.insert("confidence".to_string(), response.confidence);
        metrics.insert("cat_probability".to_string(), response.probabilities.cat);
        metrics.insert("dog_probability".to_string(), response.probabilities.dog);

        Self {
            run_id,
            run_name,
            timestamp,
            params,
            metrics,
            artifacts: Vec::new(),
        }
    }
}
