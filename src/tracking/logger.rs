//! Experiment logger
//!
//! Records one run per classification. Every failure on this path, panics
//! included, is caught here and turned into a warning plus a counter; the
//! caller only ever sees a [`LogOutcome`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::inference::ClassificationResult;
use crate::monitoring::ServiceMetrics;

use super::config::TrackingConfig;
use super::record::{Experiment, ExperimentRecord, InferenceContext};
use super::storage::{Artifact, LocalStorage, TrackingStore};

/// What happened to the experiment record of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Recorded { run_id: String },
    Failed(String),
    Disabled,
}

/// Best-effort writer of experiment records
pub struct ExperimentLogger {
    store: Arc<dyn TrackingStore>,
    config: TrackingConfig,
    metrics: Arc<ServiceMetrics>,
}

impl std::fmt::Debug for ExperimentLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExperimentLogger {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        config: TrackingConfig,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self { store, config, metrics }
    }

    /// Logger backed by the local file store at `config.tracking_dir`
    pub fn local(config: TrackingConfig, metrics: Arc<ServiceMetrics>) -> Self {
        let store = Arc::new(LocalStorage::new(config.tracking_dir.clone()));
        Self::new(store, config, metrics)
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Make sure the experiment exists. Failure is reported, never fatal.
    pub fn bootstrap(&self) -> Option<Experiment> {
        if !self.config.enabled {
            debug!("Experiment tracking disabled");
            return None;
        }

        let name = self.config.experiment_name.as_str();
        match isolate(|| self.store.ensure_experiment(name)) {
            Ok(experiment) => {
                info!(
                    experiment = %experiment.name,
                    experiment_id = %experiment.experiment_id,
                    tracking_dir = %self.config.tracking_dir.display(),
                    "Experiment tracking ready"
                );
                Some(experiment)
            }
            Err(message) => {
                warn!(experiment = name, error = %message, "Could not set up experiment, runs may not be recorded");
                None
            }
        }
    }

    /// Append the run for one classification, persisting `image` as its artifact
    pub fn log(
        &self,
        result: &ClassificationResult,
        context: &InferenceContext,
        image: &[u8],
        extension: &str,
    ) -> LogOutcome {
        if !self.config.enabled {
            return LogOutcome::Disabled;
        }

        let record = ExperimentRecord::for_inference(result, context);
        let run_id = record.run_id.clone();
        let artifact = self.config.store_artifacts.then(|| Artifact {
            file_name: format!("input.{}", extension),
            bytes: image,
        });

        let experiment = self.config.experiment_name.as_str();
        match isolate(|| self.store.append(experiment, record, artifact)) {
            Ok(stored) => {
                self.metrics.record_run_logged();
                debug!(run_id = %stored.run_id, run_name = %stored.run_name, "Logged inference run");
                LogOutcome::Recorded { run_id: stored.run_id }
            }
            Err(message) => {
                self.metrics.record_logging_failure();
                warn!(run_id = %run_id, error = %message, "Failed to log inference run");
                LogOutcome::Failed(message)
            }
        }
    }
}

/// Run a store call, folding errors and panics into a message
fn isolate<T>(call: impl FnOnce() -> Result<T>) -> std::result::Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("tracking store panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("tracking store panicked: {}", s)
    } else {
        "tracking store panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use crate::inference::{InferenceConfig, RawScores, ResultInterpreter};

    struct BrokenStore {
        panic: bool,
    }

    impl TrackingStore for BrokenStore {
        fn ensure_experiment(&self, _name: &str) -> Result<Experiment> {
            Err(ClassifierError::LoggingFailure("store offline".to_string()))
        }

        fn append(
            &self,
            _experiment: &str,
            _record: ExperimentRecord,
            _artifact: Option<Artifact<'_>>,
        ) -> Result<ExperimentRecord> {
            if self.panic {
                panic!("disk on fire");
            }
            Err(ClassifierError::LoggingFailure("disk full".to_string()))
        }
    }

    fn result() -> ClassificationResult {
        ResultInterpreter::new(&InferenceConfig::default())
            .interpret(&RawScores::Scalar(0.8))
            .unwrap()
    }

    fn context() -> InferenceContext {
        InferenceContext {
            model_path: "models/cats_dogs.onnx".to_string(),
            image_format: "image/png".to_string(),
            filename: Some("rex.png".to_string()),
        }
    }

    #[test]
    fn test_log_to_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(ServiceMetrics::default());
        let config = TrackingConfig::new().with_dir(dir.path());
        let logger = ExperimentLogger::local(config, metrics.clone());

        assert!(logger.bootstrap().is_some());
        let outcome = logger.log(&result(), &context(), b"png-bytes", "png");

        let LogOutcome::Recorded { run_id } = outcome else {
            panic!("expected a recorded run, got {:?}", outcome);
        };
        let records = LocalStorage::new(dir.path())
            .load_records("cat_dog_classifier")
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].run_id, run_id);
        assert_eq!(records[0].params["filename"], "rex.png");
        assert_eq!(
            records[0].artifacts,
            vec![format!("artifacts/{}/input_images/input.png", run_id)]
        );
        assert_eq!(metrics.runs_logged(), 1);
    }

    #[test]
    fn test_store_error_is_swallowed() {
        let metrics = Arc::new(ServiceMetrics::default());
        let logger = ExperimentLogger::new(
            Arc::new(BrokenStore { panic: false }),
            TrackingConfig::default(),
            metrics.clone(),
        );

        assert!(logger.bootstrap().is_none());
        let outcome = logger.log(&result(), &context(), b"bytes", "png");
        assert!(matches!(outcome, LogOutcome::Failed(ref m) if m.contains("disk full")));
        assert_eq!(metrics.logging_failures(), 1);
    }

    #[test]
    fn test_store_panic_is_contained() {
        let metrics = Arc::new(ServiceMetrics::default());
        let logger = ExperimentLogger::new(
            Arc::new(BrokenStore { panic: true }),
            TrackingConfig::default(),
            metrics.clone(),
        );

        let outcome = logger.log(&result(), &context(), b"bytes", "png");
        assert!(matches!(outcome, LogOutcome::Failed(ref m) if m.contains("disk on fire")));
        assert_eq!(metrics.logging_failures(), 1);
    }

    #[test]
    fn test_disabled_logger_skips_store() {
        let metrics = Arc::new(ServiceMetrics::default());
        let logger = ExperimentLogger::new(
            Arc::new(BrokenStore { panic: true }),
            TrackingConfig::default().disabled(),
            metrics.clone(),
        );

        assert_eq!(logger.log(&result(), &context(), b"", "png"), LogOutcome::Disabled);
        assert_eq!(metrics.logging_failures(), 0);
    }
}
