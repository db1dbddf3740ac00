//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::monitoring::ServiceMetrics;
use crate::pipeline::ClassificationPipeline;

use super::ServerConfig;

/// Application state shared across handlers.
///
/// `pipeline` is `None` when the service started without a usable model;
/// readiness stays false for the lifetime of the process in that case.
pub struct AppState {
    pub config: ServerConfig,
    pipeline: Option<Arc<ClassificationPipeline>>,
    load_error: Option<String>,
    metrics: Arc<ServiceMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State of a service that loaded its model
    pub fn ready(config: ServerConfig, pipeline: Arc<ClassificationPipeline>) -> Self {
        let metrics = Arc::clone(pipeline.metrics());
        Self {
            config,
            pipeline: Some(pipeline),
            load_error: None,
            metrics,
            started_at: Utc::now(),
        }
    }

    /// State of a service that is up but cannot classify
    pub fn degraded(config: ServerConfig, metrics: Arc<ServiceMetrics>, reason: impl Into<String>) -> Self {
        Self {
            config,
            pipeline: None,
            load_error: Some(reason.into()),
            metrics,
            started_at: Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn pipeline(&self) -> Option<&Arc<ClassificationPipeline>> {
        self.pipeline.as_ref()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }
}
