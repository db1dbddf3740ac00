//! Cat/dog classifier - single-image inference service
//!
//! Accepts an uploaded image, classifies it as cat or dog with a pretrained
//! ONNX model, and records every inference as an experiment run.
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Upload validation, decoding, resize/normalise
//! - [`inference`] - Load-once model runtime and result interpretation
//! - [`tracking`] - Append-only experiment store and best-effort logger
//! - [`pipeline`] - End-to-end request flow
//!
//! ## Services
//! - [`server`] - HTTP API
//! - [`cli`] - Command-line interface
//! - [`monitoring`] - Request counters and latency

pub mod error;
pub mod config;

pub mod preprocessing;
pub mod inference;
pub mod tracking;
pub mod pipeline;

pub mod monitoring;
pub mod server;
pub mod cli;

pub use error::{ClassifierError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ClassifierError, Result};
    pub use crate::config::AppConfig;

    pub use crate::preprocessing::{ImageDecoder, ImagePreprocessor, PreprocessingConfig, RawImage};

    pub use crate::inference::{
        ClassificationResponse, ClassificationResult, InferenceConfig, Label, ModelBackend,
        ModelRuntime, OutputConvention,
    };

    pub use crate::tracking::{ExperimentLogger, LocalStorage, TrackingConfig, TrackingStore};

    pub use crate::pipeline::ClassificationPipeline;
    pub use crate::monitoring::{InferenceStats, ServiceMetrics};
}
