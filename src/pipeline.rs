//! Classification pipeline
//!
//! bytes -> decode -> preprocess -> predict -> interpret, with the
//! experiment logger hanging off the end as an isolated side branch.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::error::{ClassifierError, Result};
use crate::inference::{ClassificationResult, ModelRuntime, ResultInterpreter};
use crate::monitoring::ServiceMetrics;
use crate::preprocessing::{ImageDecoder, ImagePreprocessor, PreprocessingConfig, RawImage};
use crate::tracking::{ExperimentLogger, InferenceContext, LogDispatch, LogOutcome};

/// Outcome of the synchronous part of a request
#[derive(Debug, Clone, Copy)]
pub struct Classified {
    pub result: ClassificationResult,
    /// File extension of the detected image format
    pub extension: &'static str,
}

/// Wires the components of one classification request together
pub struct ClassificationPipeline {
    decoder: ImageDecoder,
    preprocessor: ImagePreprocessor,
    runtime: Arc<ModelRuntime>,
    interpreter: ResultInterpreter,
    logger: Arc<ExperimentLogger>,
    metrics: Arc<ServiceMetrics>,
}

impl std::fmt::Debug for ClassificationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationPipeline")
            .field("runtime", &self.runtime)
            .field("preprocessing", self.preprocessor.config())
            .finish_non_exhaustive()
    }
}

impl ClassificationPipeline {
    /// Assemble a pipeline around an already-loaded runtime.
    ///
    /// Fails if the preprocessor would produce tensors the runtime rejects.
    pub fn new(
        runtime: Arc<ModelRuntime>,
        preprocessing: PreprocessingConfig,
        logger: Arc<ExperimentLogger>,
        metrics: Arc<ServiceMetrics>,
    ) -> Result<Self> {
        preprocessing.validate()?;
        let preprocessor = ImagePreprocessor::new(preprocessing);
        if preprocessor.output_shape() != runtime.input_shape() {
            return Err(ClassifierError::ConfigError(format!(
                "preprocessor emits {:?} but the model runtime expects {:?}",
                preprocessor.output_shape(),
                runtime.input_shape()
            )));
        }

        Ok(Self {
            decoder: ImageDecoder::new(preprocessor.config()),
            preprocessor,
            interpreter: ResultInterpreter::new(runtime.config()),
            runtime,
            logger,
            metrics,
        })
    }

    /// Load the ONNX model named by `config` and build the pipeline around it
    pub fn from_config(
        config: &AppConfig,
        logger: Arc<ExperimentLogger>,
        metrics: Arc<ServiceMetrics>,
    ) -> Result<Self> {
        let runtime = ModelRuntime::load(
            config.inference.clone(),
            config.preprocessing.tensor_shape(),
        )?;
        Self::new(Arc::new(runtime), config.preprocessing.clone(), logger, metrics)
    }

    pub fn runtime(&self) -> &ModelRuntime {
        &self.runtime
    }

    pub fn logger(&self) -> &ExperimentLogger {
        &self.logger
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// Decode, preprocess, predict and interpret one upload.
    ///
    /// Invalid uploads are rejected before the runtime is touched. Any
    /// other failure is reported as [`ClassifierError::InferenceError`].
    pub fn classify(&self, raw: &RawImage) -> Result<Classified> {
        let started = Instant::now();

        let decoded = self.decoder.decode(raw).map_err(|e| {
            self.metrics.record_rejected();
            debug!(error = %e, "Rejected upload");
            e
        })?;

        let outcome = self
            .preprocessor
            .transform(&decoded.pixels)
            .and_then(|tensor| self.runtime.predict(&tensor))
            .and_then(|scores| self.interpreter.interpret(&scores));

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.metrics.record_inference_failure();
                error!(error = %e, "Classification failed");
                return Err(match e {
                    ClassifierError::InferenceError(_) => e,
                    other => ClassifierError::InferenceError(other.to_string()),
                });
            }
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_classified(latency_ms);
        debug!(
            label = %result.label(),
            confidence = result.confidence(),
            latency_ms = latency_ms,
            "Classified upload"
        );

        Ok(Classified {
            result,
            extension: decoded.extension(),
        })
    }

    /// Write the experiment record for a classified upload
    pub fn record(&self, raw: &RawImage, classified: &Classified) -> LogOutcome {
        let context = InferenceContext {
            model_path: self.runtime.config().model_path.display().to_string(),
            image_format: raw.content_type().to_string(),
            filename: raw.filename().map(str::to_string),
        };
        self.logger
            .log(&classified.result, &context, raw.bytes(), classified.extension)
    }

    /// Classify and record on the calling thread
    pub fn classify_and_record(&self, raw: &RawImage) -> Result<(ClassificationResult, LogOutcome)> {
        let classified = self.classify(raw)?;
        let outcome = self.record(raw, &classified);
        Ok((classified.result, outcome))
    }

    /// Run a request off the async executor.
    ///
    /// The record is written according to the configured [`LogDispatch`];
    /// its outcome never changes the returned result.
    pub async fn classify_upload(self: &Arc<Self>, raw: RawImage) -> Result<ClassificationResult> {
        let raw = Arc::new(raw);

        let pipeline = Arc::clone(self);
        let input = Arc::clone(&raw);
        let classified = tokio::task::spawn_blocking(move || pipeline.classify(&input))
            .await
            .map_err(|e| {
                self.metrics.record_inference_failure();
                ClassifierError::InferenceError(format!("classification task failed: {}", e))
            })??;

        if self.logger.config().enabled {
            self.dispatch_record(raw, classified).await;
        }

        Ok(classified.result)
    }

    async fn dispatch_record(self: &Arc<Self>, raw: Arc<RawImage>, classified: Classified) {
        let pipeline = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || pipeline.record(&raw, &classified));

        match self.logger.config().dispatch {
            LogDispatch::Background => drop(task),
            LogDispatch::Inline => {
                if let Err(e) = task.await {
                    self.metrics.record_logging_failure();
                    warn!(error = %e, "Logging task did not complete");
                }
            }
        }
    }
}
