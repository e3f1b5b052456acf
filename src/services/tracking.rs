//! Local experiment tracking.
//!
//! The tracking URI follows the MLflow environment convention. Only local
//! stores (`file://` URIs or bare paths) are written; any remote scheme is
//! reported once and every run against it becomes a no-op.

use crate::models::ParamScalar;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";
pub const EXPERIMENT_ENV: &str = "MLFLOW_EXPERIMENT_NAME";
pub const DEFAULT_TRACKING_URI: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingBackend {
    LocalStore(Utf8PathBuf),
    Unavailable(String),
}

impl TrackingBackend {
    pub fn from_uri(uri: &str) -> Self {
        if let Some(path) = uri.strip_prefix("file://") {
            Self::LocalStore(Utf8PathBuf::from(path))
        } else if uri.contains("://") {
            Self::Unavailable(uri.to_string())
        } else {
            Self::LocalStore(Utf8PathBuf::from(uri))
        }
    }
}

#[derive(Debug)]
pub struct ExperimentTracker {
    backend: TrackingBackend,
    experiment: String,
    warned: AtomicBool,
}

impl ExperimentTracker {
    pub fn new(uri: &str, experiment: impl Into<String>) -> Self {
        Self {
            backend: TrackingBackend::from_uri(uri),
            experiment: experiment.into(),
            warned: AtomicBool::new(false),
        }
    }

    /// Build from `MLFLOW_TRACKING_URI` and `MLFLOW_EXPERIMENT_NAME`.
    pub fn from_env(default_experiment: &str) -> Self {
        let uri = std::env::var(TRACKING_URI_ENV)
            .unwrap_or_else(|_| DEFAULT_TRACKING_URI.to_string());
        let experiment =
            std::env::var(EXPERIMENT_ENV).unwrap_or_else(|_| default_experiment.to_string());
        Self::new(&uri, experiment)
    }

    pub fn backend(&self) -> &TrackingBackend {
        &self.backend
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, TrackingBackend::LocalStore(_))
    }

    pub fn start_run(&self, run_name: &str) -> TrackedRun {
        let run_id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(12).collect();
        let dir = match &self.backend {
            TrackingBackend::LocalStore(root) => Some(
                root.join(&self.experiment)
                    .join(format!("{}_{}", run_name, run_id)),
            ),
            TrackingBackend::Unavailable(uri) => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "Tracking server {} is not supported, runs will not be recorded",
                        uri
                    );
                }
                None
            }
        };

        TrackedRun {
            dir,
            record: RunRecord {
                run_id,
                run_name: run_name.to_string(),
                experiment: self.experiment.clone(),
                start_time: Utc::now().to_rfc3339(),
                end_time: None,
                params: IndexMap::new(),
                metrics: IndexMap::new(),
                artifacts: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub params: IndexMap<String, ParamScalar>,
    pub metrics: IndexMap<String, f64>,
    pub artifacts: Vec<String>,
}

/// An open run. Nothing touches disk until [`TrackedRun::finish`].
#[derive(Debug)]
pub struct TrackedRun {
    dir: Option<Utf8PathBuf>,
    record: RunRecord,
}

impl TrackedRun {
    pub fn is_recording(&self) -> bool {
        self.dir.is_some()
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn log_param(&mut self, key: &str, value: ParamScalar) {
        self.record.params.insert(key.to_string(), value);
    }

    pub fn log_params(&mut self, params: &IndexMap<String, ParamScalar>) {
        for (k, v) in params {
            self.log_param(k, v.clone());
        }
    }

    pub fn log_metric(&mut self, key: &str, value: f64) {
        self.record.metrics.insert(key.to_string(), value);
    }

    pub fn log_artifact(&mut self, path: &Utf8Path) {
        self.record.artifacts.push(path.to_string());
    }

    /// Write `run.json` and copy the logged artifacts into the run directory.
    ///
    /// # Returns
    /// The run directory, or `None` when the backend is unavailable
    pub fn finish(mut self) -> Result<Option<Utf8PathBuf>> {
        let Some(dir) = self.dir.take() else {
            return Ok(None);
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create tracking run directory: {}", dir))?;

        for artifact in &self.record.artifacts {
            let src = Utf8Path::new(artifact);
            if let Some(name) = src.file_name() {
                fs::copy(src, dir.join(name))
                    .with_context(|| format!("Failed to copy artifact {}", src))?;
            }
        }

        self.record.end_time = Some(Utc::now().to_rfc3339());
        let path = dir.join("run.json");
        let json = serde_json::to_string_pretty(&self.record).context("Failed to serialize run")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path))?;
        tracing::debug!("Recorded run {} in {}", self.record.run_name, dir);
        Ok(Some(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backend_from_uri() {
        assert_eq!(
            TrackingBackend::from_uri("file:///tmp/runs"),
            TrackingBackend::LocalStore("/tmp/runs".into())
        );
        assert_eq!(
            TrackingBackend::from_uri("mlruns"),
            TrackingBackend::LocalStore("mlruns".into())
        );
        assert!(matches!(
            TrackingBackend::from_uri(DEFAULT_TRACKING_URI),
            TrackingBackend::Unavailable(_)
        ));
    }

    #[test]
    fn test_local_store_writes_run() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let artifact = root.join("cv.csv");
        fs::write(&artifact, "a,b\n1,2\n").unwrap();

        let tracker = ExperimentTracker::new(&format!("file://{}", root.join("store")), "exp");
        let mut run = tracker.start_run("svc");
        run.log_param("C", ParamScalar::Float(1.0));
        run.log_metric("best_score", 0.9);
        run.log_artifact(&artifact);
        let run_dir = run.finish().unwrap().unwrap();

        assert!(run_dir.starts_with(root.join("store").join("exp")));
        assert!(run_dir.join("cv.csv").exists());
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(run_dir.join("run.json")).unwrap()).unwrap();
        assert_eq!(json["metrics"]["best_score"], 0.9);
        assert_eq!(json["params"]["C"], 1.0);
    }

    #[test]
    fn test_unavailable_backend_is_noop() {
        let tracker = ExperimentTracker::new("http://localhost:8080", "exp");
        assert!(!tracker.is_available());
        let run = tracker.start_run("a");
        assert!(!run.is_recording());
        assert!(run.finish().unwrap().is_none());
        assert!(tracker.start_run("b").finish().unwrap().is_none());
    }
}
