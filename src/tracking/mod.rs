//! Experiment tracking
//!
//! Every classification becomes an immutable run record appended to a
//! file-based store, with the uploaded image kept as a run artifact.

mod config;
mod logger;
mod record;
mod storage;

pub use config::{LogDispatch, TrackingConfig};
pub use logger::{ExperimentLogger, LogOutcome};
pub use record::{Experiment, ExperimentRecord, InferenceContext};
pub use storage::{Artifact, LocalStorage, TrackingStore};
