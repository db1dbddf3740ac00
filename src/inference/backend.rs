//! Model backends
//!
//! A backend owns the loaded weights and evaluates one tensor at a time.
//! Implementations must be read-only during `predict` so a single instance
//! can serve concurrent requests without locking.

use std::path::{Path, PathBuf};

use tract_onnx::prelude::*;
use tracing::info;

use crate::error::{ClassifierError, Result};
use crate::preprocessing::InputTensor;

/// A loaded model that maps one input tensor to a flat vector of scores
pub trait ModelBackend: Send + Sync {
    /// Short human-readable description (format, origin)
    fn describe(&self) -> String;

    /// Number of values emitted per image, when known statically
    fn output_width(&self) -> Option<usize>;

    /// Evaluate the model on a single tensor
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>>;
}

/// ONNX model executed with tract (pure Rust, CPU)
pub struct OnnxBackend {
    path: PathBuf,
    plan: TypedRunnableModel<TypedModel>,
    output_width: Option<usize>,
}

impl std::fmt::Debug for OnnxBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxBackend")
            .field("path", &self.path)
            .field("output_width", &self.output_width)
            .finish()
    }
}

impl OnnxBackend {
    /// Load, type-check and optimise the model for a fixed NHWC input shape
    pub fn load(path: &Path, input_shape: [usize; 4]) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifierError::ModelUnavailable(format!(
                "model file {} not found",
                path.display()
            )));
        }

        let unavailable =
            |e: TractError| ClassifierError::ModelUnavailable(format!("{}: {:#}", path.display(), e));

        let typed = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(
                        input_shape[0],
                        input_shape[1],
                        input_shape[2],
                        input_shape[3]
                    )),
                )
            })
            .and_then(|model| model.into_optimized())
            .map_err(unavailable)?;

        let output_width = typed
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().map(|dims| dims.iter().product::<usize>()));

        let plan = typed.into_runnable().map_err(unavailable)?;

        info!(
            path = %path.display(),
            input_shape = ?input_shape,
            output_width = ?output_width,
            "ONNX model loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            plan,
            output_width,
        })
    }
}

impl ModelBackend for OnnxBackend {
    fn describe(&self) -> String {
        format!("onnx (tract) {}", self.path.display())
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>> {
        let tensor = Tensor::from_shape::<f32>(input.shape(), &input.to_vec())
            .map_err(|e| ClassifierError::InferenceError(format!("tensor conversion: {:#}", e)))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::InferenceError(format!("model run: {:#}", e)))?;

        let first = outputs
            .first()
            .ok_or_else(|| ClassifierError::InferenceError("model produced no outputs".to_string()))?;

        let values = first
            .as_slice::<f32>()
            .map_err(|e| ClassifierError::InferenceError(format!("output extraction: {:#}", e)))?;

        Ok(values.to_vec())
    }
}
