use crate::models::frame::{Frame, Series};
use crate::models::pipeline_spec::ParamScalar;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Outcome of one evaluated pipeline spec. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub name: String,

    /// `"grid"` for classic specs, the AutoML library name otherwise.
    pub kind: String,

    pub best_params: IndexMap<String, ParamScalar>,

    pub best_score: f64,

    pub refit_metric: String,

    /// Held-out score; AutoML runs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_score: Option<f64>,

    pub elapsed_sec: f64,

    pub cv_results_path: Utf8PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_pipeline: Option<Utf8PathBuf>,
}

/// Directories and allow-list the file stage worked with.
#[derive(Debug, Clone, Serialize)]
pub struct FileMeta {
    pub data_dir: Utf8PathBuf,
    pub in_dir: Utf8PathBuf,
    pub out_dir: Utf8PathBuf,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileOutput {
    pub found: bool,
    pub file: Option<Utf8PathBuf>,
    pub saved_copy: Option<Utf8PathBuf>,
    pub saved_copy_compressed: Option<Utf8PathBuf>,
    pub data: Option<Frame>,
    pub meta: FileMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataMetadata {
    pub n_features: usize,
    pub n_samples: usize,
    pub has_target: bool,
    pub target_column: Option<String>,
    pub n_classes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DataOutput {
    pub x: Frame,
    pub y: Option<Series>,
    pub metadata: DataMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub n_samples: usize,
    pub n_features: usize,
}

/// JSON statistical summary written by the EDA stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdaSummary {
    pub shape: Shape,
    pub na_top10: IndexMap<String, usize>,
    pub duplicates: usize,
    pub numeric_features: usize,
    pub max_abs_corr_offdiag: f64,
    pub y_distribution: Option<IndexMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdaFlags {
    pub needs_scaling: bool,
    pub high_dimensional: bool,
    pub class_imbalance: bool,
    pub high_collinearity: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdaOutput {
    pub profile_html: Utf8PathBuf,
    pub summary_json: Utf8PathBuf,
    pub summary: EdaSummary,
    pub flags: EdaFlags,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelinesOutput {
    pub results: Vec<RunResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    pub report_id: String,
    pub artifacts: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    File,
    Data,
    Example,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    Complete,
    Partial,
}

/// Error captured at a stage boundary.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: &'static str,
    pub error: anyhow::Error,
}

/// Result of one attempted stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Completed(T),
    Failed(StageFailure),
}

impl<T> StageOutcome<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }

    fn status(&self) -> serde_json::Value {
        match self {
            StageOutcome::Completed(_) => serde_json::json!({"status": "completed"}),
            StageOutcome::Failed(failure) => serde_json::json!({
                "status": "failed",
                "error": format!("{:#}", failure.error),
            }),
        }
    }
}

/// Aggregate of every stage attempted during one run.
///
/// `None` in a stage slot means the stage was not attempted.
#[derive(Debug)]
pub struct RunOutcome {
    pub mode: RunMode,
    pub file: Option<StageOutcome<FileOutput>>,
    pub data: Option<StageOutcome<DataOutput>>,
    pub eda: Option<StageOutcome<EdaOutput>>,
    pub pipelines: Option<StageOutcome<PipelinesOutput>>,
    pub report: Option<StageOutcome<ReportOutput>>,
    pub completion: Completion,
}

impl RunOutcome {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            file: None,
            data: None,
            eda: None,
            pipelines: None,
            report: None,
            completion: Completion::Complete,
        }
    }

    /// Compact JSON view: per-stage status plus report artifacts.
    pub fn summary(&self) -> serde_json::Value {
        fn slot<T>(outcome: &Option<StageOutcome<T>>) -> serde_json::Value {
            outcome
                .as_ref()
                .map(StageOutcome::status)
                .unwrap_or_else(|| serde_json::json!({"status": "skipped"}))
        }

        let artifacts: Vec<String> = self
            .report
            .as_ref()
            .and_then(StageOutcome::completed)
            .map(|r| r.artifacts.iter().map(|p| p.to_string()).collect())
            .unwrap_or_default();

        serde_json::json!({
            "mode": self.mode,
            "completion": self.completion,
            "stages": {
                "file": slot(&self.file),
                "data": slot(&self.data),
                "eda": slot(&self.eda),
                "pipelines": slot(&self.pipelines),
                "report": slot(&self.report),
            },
            "report_artifacts": artifacts,
        })
    }
}
