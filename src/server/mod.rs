//! HTTP service
//!
//! Thin axum layer over [`ClassificationPipeline`]: one multipart upload
//! endpoint plus health, readiness and stats.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{ClassifierError, Result};
use crate::monitoring::ServiceMetrics;
use crate::pipeline::ClassificationPipeline;
use crate::tracking::ExperimentLogger;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_upload_size: usize,
    /// Restrict CORS to a single origin; all origins when unset
    pub cors_origin: Option<String>,
    /// Refuse to start when the model cannot be loaded
    pub require_model: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_size: 10 * 1024 * 1024,
            cors_origin: None,
            require_model: true,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClassifierError::ConfigError("host must not be empty".to_string()));
        }
        if self.max_upload_size == 0 {
            return Err(ClassifierError::ConfigError(
                "max_upload_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load the model and tracking store and build the shared state.
///
/// A model that fails to load is fatal unless `require_model` is off, in
/// which case the state comes up degraded and never reaches a runtime.
pub fn initialize(config: &AppConfig) -> Result<AppState> {
    config.validate()?;

    let metrics = Arc::new(ServiceMetrics::default());
    let logger = Arc::new(ExperimentLogger::local(config.tracking.clone(), Arc::clone(&metrics)));
    logger.bootstrap();

    match ClassificationPipeline::from_config(config, logger, Arc::clone(&metrics)) {
        Ok(pipeline) => Ok(AppState::ready(config.server.clone(), Arc::new(pipeline))),
        Err(ClassifierError::ModelUnavailable(reason)) if !config.server.require_model => {
            warn!(
                model_path = %config.inference.model_path.display(),
                reason = %reason,
                "Model unavailable, serving in degraded mode"
            );
            Ok(AppState::degraded(config.server.clone(), metrics, reason))
        }
        Err(e) => Err(e),
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    let state = Arc::new(initialize(&config)?);
    let app = create_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(
        address = %addr,
        model_loaded = state.is_ready(),
        output_convention = %config.inference.output_convention,
        max_upload_size_mb = config.server.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        "Cat/dog classifier starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
