//! Storage backends for experiment tracking
//!
//! Layout of the local backend:
//!
//! ```text
//! <root>/<experiment>/experiment.json
//! <root>/<experiment>/runs.jsonl
//! <root>/<experiment>/artifacts/<run_id>/input_images/<file>
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{ClassifierError, Result};

use super::record::{Experiment, ExperimentRecord};

const EXPERIMENT_FILE: &str = "experiment.json";
const RUNS_FILE: &str = "runs.jsonl";
const ARTIFACT_SUBDIR: &str = "input_images";

/// Blob persisted with a run
#[derive(Debug, Clone)]
pub struct Artifact<'a> {
    pub file_name: String,
    pub bytes: &'a [u8],
}

/// Append-only system of record for inference runs
pub trait TrackingStore: Send + Sync {
    /// Create the experiment if it does not exist yet and return its metadata
    fn ensure_experiment(&self, name: &str) -> Result<Experiment>;

    /// Persist the artifact (if any) and append the record.
    ///
    /// Returns the record as stored, with artifact paths filled in.
    fn append(
        &self,
        experiment: &str,
        record: ExperimentRecord,
        artifact: Option<Artifact<'_>>,
    ) -> Result<ExperimentRecord>;
}

/// Local file system storage backend
#[derive(Debug)]
pub struct LocalStorage {
    base_dir: PathBuf,
    append_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new local storage backend. Directories are created lazily.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            append_lock: Mutex::new(()),
        }
    }

    fn experiment_dir(&self, experiment: &str) -> PathBuf {
        self.base_dir.join(experiment)
    }

    fn runs_file(&self, experiment: &str) -> PathBuf {
        self.experiment_dir(experiment).join(RUNS_FILE)
    }

    /// Read back every record of an experiment, oldest first
    pub fn load_records(&self, experiment: &str) -> Result<Vec<ExperimentRecord>> {
        let path = self.runs_file(experiment);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    fn write_artifact(&self, experiment: &str, run_id: &str, artifact: &Artifact<'_>) -> Result<String> {
        let file_name = sanitize_file_name(&artifact.file_name);
        let relative = Path::new("artifacts").join(run_id).join(ARTIFACT_SUBDIR).join(&file_name);
        let absolute = self.experiment_dir(experiment).join(&relative);

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClassifierError::LoggingFailure(format!("create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(&absolute, artifact.bytes).map_err(|e| {
            ClassifierError::LoggingFailure(format!("write {}: {}", absolute.display(), e))
        })?;

        Ok(relative.to_string_lossy().replace('\\', "/"))
    }
}

impl TrackingStore for LocalStorage {
    fn ensure_experiment(&self, name: &str) -> Result<Experiment> {
        let dir = self.experiment_dir(name);
        let meta_path = dir.join(EXPERIMENT_FILE);

        let _guard = self.append_lock.lock();
        if meta_path.exists() {
            let contents = fs::read_to_string(&meta_path)?;
            return Ok(serde_json::from_str(&contents)?);
        }

        fs::create_dir_all(&dir).map_err(|e| {
            ClassifierError::LoggingFailure(format!("create {}: {}", dir.display(), e))
        })?;
        let experiment = Experiment::new(name);
        fs::write(&meta_path, serde_json::to_vec_pretty(&experiment)?)?;
        Ok(experiment)
    }

    fn append(
        &self,
        experiment: &str,
        mut record: ExperimentRecord,
        artifact: Option<Artifact<'_>>,
    ) -> Result<ExperimentRecord> {
        if let Some(artifact) = artifact {
            let path = self.write_artifact(experiment, &record.run_id, &artifact)?;
            record.artifacts.push(path);
        }

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.runs_file(experiment);
        let _guard = self.append_lock.lock();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClassifierError::LoggingFailure(format!("create {}: {}", parent.display(), e))
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ClassifierError::LoggingFailure(format!("open {}: {}", path.display(), e)))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ClassifierError::LoggingFailure(format!("append {}: {}", path.display(), e)))?;

        Ok(record)
    }
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "input".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn record(run_id: &str) -> ExperimentRecord {
        ExperimentRecord {
            run_id: run_id.to_string(),
            run_name: format!("classification_20260101_000000_{}", &run_id[..8]),
            timestamp: chrono::Utc::now(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_ensure_experiment_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let first = storage.ensure_experiment("cat_dog_classifier").unwrap();
        let second = storage.ensure_experiment("cat_dog_classifier").unwrap();

        assert_eq!(first.experiment_id, second.experiment_id);
        assert!(dir.path().join("cat_dog_classifier").join(EXPERIMENT_FILE).exists());
    }

    #[test]
    fn test_append_with_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let artifact = Artifact {
            file_name: "input.png".to_string(),
            bytes: b"\x89PNG fake",
        };
        let stored = storage
            .append("exp", record("0123456789abcdef"), Some(artifact))
            .unwrap();

        assert_eq!(stored.artifacts, vec!["artifacts/0123456789abcdef/input_images/input.png"]);
        let on_disk = fs::read(dir.path().join("exp").join(&stored.artifacts[0])).unwrap();
        assert_eq!(on_disk, b"\x89PNG fake");

        let records = storage.load_records("exp").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].run_id, "0123456789abcdef");
    }

    #[test]
    fn test_appends_never_rewrite_previous_records() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.append("exp", record("aaaaaaaa0000"), None).unwrap();
        storage.append("exp", record("bbbbbbbb0000"), None).unwrap();

        let ids: Vec<String> = storage
            .load_records("exp")
            .unwrap()
            .into_iter()
            .map(|r| r.run_id)
            .collect();
        assert_eq!(ids, vec!["aaaaaaaa0000", "bbbbbbbb0000"]);
    }

    #[test]
    fn test_concurrent_appends_keep_lines_intact() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let storage = Arc::clone(&storage);
                std::thread::spawn(move || {
                    let id = format!("{:08x}{:04}", i, i);
                    storage.append("exp", record(&id), None).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(storage.load_records("exp").unwrap().len(), 16);
    }

    #[test]
    fn test_load_records_missing_experiment() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.load_records("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cat photo.JPG"), "cat_photo.JPG");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "input");
    }
}
