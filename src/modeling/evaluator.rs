use crate::models::{CvConfig, Frame, ParamScalar, PipelineSpec, RunResult, Series};
use crate::modeling::automl::{AutoMlOutcome, AutoMlSearch};
use crate::modeling::cv::StratifiedKFold;
use crate::modeling::factory::{BuiltModel, ParamGrid, PipelineFactory};
use crate::modeling::metrics::Scoring;
use crate::modeling::pipeline::Pipeline;
use crate::modeling::search::GridSearch;
use crate::modeling::LabelEncoder;
use crate::services::ExperimentTracker;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use ndarray::Array2;
use std::fs;
use std::time::Instant;

/// Kind recorded on results of classic grid-searched specs.
pub const GRID_KIND: &str = "grid";

/// Evaluates one pipeline spec against features and target.
#[cfg_attr(test, mockall::automock)]
pub trait Evaluate {
    fn evaluate(
        &self,
        x: &Frame,
        y: &Series,
        spec: &PipelineSpec,
        cv: &CvConfig,
    ) -> Result<RunResult>;
}

/// Feature matrix and encoded target shared by both evaluation paths.
#[derive(Debug)]
struct Encoded {
    x: Array2<f64>,
    labels: Vec<usize>,
    n_classes: usize,
}

impl Encoded {
    fn new(x: &Frame, y: &Series) -> Result<Self> {
        let matrix = x.to_matrix()?;
        let (encoder, labels) = LabelEncoder::fit_transform(y)?;
        Ok(Self {
            x: matrix,
            labels,
            n_classes: encoder.n_classes(),
        })
    }
}

/// Grid search or AutoML evaluation with CSV persistence and optional
/// experiment tracking.
#[derive(Debug)]
pub struct PipelineEvaluator {
    out_dir: Utf8PathBuf,
    factory: PipelineFactory,
    random_state: u64,
    tracker: Option<ExperimentTracker>,
}

impl PipelineEvaluator {
    /// # Arguments
    /// * `out_dir` - Directory receiving `cv_<name>_<epoch>.csv` files
    /// * `random_state` - Seed for folds, splits and estimators
    /// * `tracker` - Optional experiment tracker
    pub fn new(
        out_dir: impl AsRef<Utf8Path>,
        random_state: u64,
        tracker: Option<ExperimentTracker>,
    ) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            factory: PipelineFactory::new(random_state),
            random_state,
            tracker,
        }
    }

    pub fn out_dir(&self) -> &Utf8Path {
        &self.out_dir
    }

    fn results_path(&self, name: &str) -> Utf8PathBuf {
        self.out_dir
            .join(format!("cv_{}_{}.csv", name, Utc::now().timestamp()))
    }

    fn grid_search(
        &self,
        spec: &PipelineSpec,
        pipeline: &Pipeline,
        grid: &ParamGrid,
        cv: &CvConfig,
        data: &Encoded,
    ) -> Result<RunResult> {
        let started = Instant::now();
        let scoring = Scoring::resolve(&cv.scoring, cv.refit.as_deref())?;
        let folds =
            StratifiedKFold::new(cv.cv_folds, true, self.random_state)?.split(&data.labels)?;
        let outcome = GridSearch::new(pipeline, grid, &scoring, &folds).run(
            &data.x,
            &data.labels,
            data.n_classes,
        )?;

        let path = self.results_path(&spec.name);
        outcome.table.write_csv(&path)?;

        Ok(RunResult {
            name: spec.name.clone(),
            kind: GRID_KIND.to_string(),
            best_params: outcome.best_params,
            best_score: outcome.best_score,
            refit_metric: outcome.refit.name().to_string(),
            test_score: None,
            elapsed_sec: started.elapsed().as_secs_f64(),
            cv_results_path: path,
            exported_pipeline: None,
        })
    }

    fn automl(
        &self,
        spec: &PipelineSpec,
        search: &AutoMlSearch,
        data: &Encoded,
    ) -> Result<RunResult> {
        let started = Instant::now();
        let outcome = search.fit(&data.x, &data.labels, data.n_classes)?;

        let path = self.results_path(&spec.name);
        outcome.leaderboard.write_csv(&path)?;

        let exported_pipeline = if search.config().export_best_pipeline {
            match self.export(spec, search, &outcome) {
                Ok(exported) => Some(exported),
                Err(e) => {
                    tracing::warn!(
                        "Failed to export best pipeline for {}: {:#}",
                        spec.name,
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        let mut best_params = outcome.best_params;
        best_params.insert(
            "pipeline".to_string(),
            ParamScalar::Text(outcome.best_description),
        );

        Ok(RunResult {
            name: spec.name.clone(),
            kind: outcome.library.name().to_string(),
            best_params,
            best_score: outcome.best_cv_score,
            refit_metric: outcome.metric.name().to_string(),
            test_score: Some(outcome.test_score),
            elapsed_sec: started.elapsed().as_secs_f64(),
            cv_results_path: path,
            exported_pipeline,
        })
    }

    /// Write the winning pipeline as a reusable spec.
    fn export(
        &self,
        spec: &PipelineSpec,
        search: &AutoMlSearch,
        outcome: &AutoMlOutcome,
    ) -> Result<Utf8PathBuf> {
        let name = search
            .config()
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_best", spec.name));
        let exported = PipelineSpec::classic(name, outcome.best_steps.clone());
        let path = self.out_dir.join(&search.config().export_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent))?;
        }
        let yaml = serde_yaml_ng::to_string(&exported).context("Failed to serialize pipeline")?;
        fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path))?;
        tracing::info!("Exported best pipeline to {}", path);
        Ok(path)
    }

    fn track(&self, result: &RunResult) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        let mut run = tracker.start_run(&result.name);
        run.log_params(&result.best_params);
        run.log_param("refit_metric", ParamScalar::Text(result.refit_metric.clone()));
        run.log_metric(&format!("best_{}", result.refit_metric), result.best_score);
        if let Some(test_score) = result.test_score {
            run.log_metric(&format!("test_{}", result.refit_metric), test_score);
        }
        run.log_artifact(&result.cv_results_path);
        if let Err(e) = run.finish() {
            tracing::warn!("Failed to record tracking run for {}: {:#}", result.name, e);
        }
    }
}

impl Evaluate for PipelineEvaluator {
    fn evaluate(
        &self,
        x: &Frame,
        y: &Series,
        spec: &PipelineSpec,
        cv: &CvConfig,
    ) -> Result<RunResult> {
        let (model, grid) = self.factory.build(spec)?;
        let data = Encoded::new(x, y)?;

        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create directory {}", self.out_dir))?;

        let result = match &model {
            BuiltModel::Pipeline(pipeline) => self.grid_search(spec, pipeline, &grid, cv, &data)?,
            BuiltModel::AutoMl(search) => self.automl(spec, search, &data)?,
        };
        self.track(&result);
        Ok(result)
    }
}
