//! Model runtime
//!
//! Owns the loaded model for the lifetime of the process. The lifecycle is
//! explicit: [`ModelRuntime::load`] (or [`ModelRuntime::from_backend`]) runs
//! once at startup and either returns a ready handle or fails with
//! [`ClassifierError::ModelUnavailable`]; the handle is shared behind an
//! `Arc` and the weights are released when the last handle is dropped.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{ClassifierError, Result};
use crate::preprocessing::InputTensor;

use super::backend::{ModelBackend, OnnxBackend};
use super::{InferenceConfig, OutputConvention};

/// Unnormalised class evidence for `{cat, dog}`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawScores {
    /// Single sigmoid output
    Scalar(f32),
    /// Ordered `[cat, dog]` pair
    Pair([f32; 2]),
}

impl RawScores {
    /// Shape the flat model output according to the pinned convention
    pub fn from_output(values: &[f32], convention: OutputConvention) -> Result<Self> {
        match (convention.expected_width(), values) {
            (1, [p]) => Ok(RawScores::Scalar(*p)),
            (2, [cat, dog]) => Ok(RawScores::Pair([*cat, *dog])),
            (expected, _) => Err(ClassifierError::ShapeError {
                expected: format!("{} output value(s) for {} convention", expected, convention),
                actual: format!("{} value(s)", values.len()),
            }),
        }
    }

    /// Number of scores carried
    pub fn width(&self) -> usize {
        match self {
            RawScores::Scalar(_) => 1,
            RawScores::Pair(_) => 2,
        }
    }
}

/// Process-wide owner of the loaded model
pub struct ModelRuntime {
    backend: Arc<dyn ModelBackend>,
    config: InferenceConfig,
    input_shape: [usize; 4],
}

impl std::fmt::Debug for ModelRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRuntime")
            .field("backend", &self.backend.describe())
            .field("model_path", &self.config.model_path)
            .field("output_convention", &self.config.output_convention)
            .field("input_shape", &self.input_shape)
            .finish()
    }
}

impl ModelRuntime {
    /// Load the ONNX artifact at `config.model_path`
    pub fn load(config: InferenceConfig, input_shape: [usize; 4]) -> Result<Self> {
        config.validate()?;
        let started = Instant::now();
        let backend = OnnxBackend::load(&config.model_path, input_shape)?;
        let runtime = Self::from_backend(Arc::new(backend), config, input_shape)?;
        info!(
            model_path = %runtime.config.model_path.display(),
            output_convention = %runtime.config.output_convention,
            load_ms = started.elapsed().as_millis() as u64,
            "Model runtime ready"
        );
        Ok(runtime)
    }

    /// Wrap an already-loaded backend, validating its output against the
    /// configured convention before the runtime accepts any call
    pub fn from_backend(
        backend: Arc<dyn ModelBackend>,
        config: InferenceConfig,
        input_shape: [usize; 4],
    ) -> Result<Self> {
        let expected = config.output_convention.expected_width();

        if let Some(width) = backend.output_width() {
            if width != expected {
                return Err(ClassifierError::ModelUnavailable(format!(
                    "model emits {} value(s) per image but output convention '{}' expects {}",
                    width, config.output_convention, expected
                )));
            }
        }

        let runtime = Self {
            backend,
            config,
            input_shape,
        };

        if runtime.config.warmup {
            runtime.warmup()?;
        }

        Ok(runtime)
    }

    /// Run one all-zero tensor to prove the model accepts the pinned shape
    fn warmup(&self) -> Result<()> {
        let started = Instant::now();
        let tensor = InputTensor::zeros(self.input_shape)?;
        self.predict(&tensor).map_err(|e| {
            ClassifierError::ModelUnavailable(format!("warmup inference failed: {}", e))
        })?;
        debug!(warmup_ms = started.elapsed().as_millis() as u64, "Model warmup complete");
        Ok(())
    }

    /// Evaluate one tensor. Shape mismatches are contract violations and
    /// surface as [`ClassifierError::InferenceError`].
    pub fn predict(&self, tensor: &InputTensor) -> Result<RawScores> {
        if tensor.shape() != &self.input_shape[..] {
            return Err(ClassifierError::InferenceError(format!(
                "input tensor shape {:?} does not match model input {:?}",
                tensor.shape(),
                self.input_shape
            )));
        }

        let values = self.backend.predict(tensor)?;
        RawScores::from_output(&values, self.config.output_convention)
            .map_err(|e| ClassifierError::InferenceError(e.to_string()))
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }
}
