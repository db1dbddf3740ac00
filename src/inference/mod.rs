//! Inference module
//!
//! Provides single-image model inference with:
//! - Load-once model runtime shared across concurrent requests
//! - Pluggable backends (ONNX via tract, test fixtures)
//! - Startup validation of the output convention against the model head
//! - Warmup before the runtime reports ready
//! - Deterministic score interpretation with a fixed tie-break label

mod backend;
mod config;
mod interpret;
mod runtime;

pub use backend::{ModelBackend, OnnxBackend};
pub use config::{InferenceConfig, OutputConvention};
pub use interpret::{
    ClassProbabilities, ClassificationResponse, ClassificationResult, Label, ResultInterpreter,
};
pub use runtime::{ModelRuntime, RawScores};
