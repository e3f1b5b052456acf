use crate::error::ModelingError;
use crate::models::ParamScalar;
use crate::modeling::cv::Fold;
use crate::modeling::factory::{ParamGrid, expand_grid};
use crate::modeling::metrics::{Metric, Scoring};
use crate::modeling::pipeline::Pipeline;
use anyhow::{Context, Result};
use camino::Utf8Path;
use indexmap::IndexMap;
use ndarray::{Array2, Axis};
use std::time::Instant;

/// Column-oriented results table persisted as CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultsTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|h| h == header)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Write the table, creating parent directories as needed.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create results file {}", path))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write results file {}", path))?;
        Ok(())
    }
}

/// Per-fold measurements of one parameter combination.
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub params: IndexMap<String, ParamScalar>,
    pub fit_times: Vec<f64>,
    pub score_times: Vec<f64>,
    /// `fold_scores[m][i]`: metric `m` (in scoring order) on fold `i`.
    /// NaN marks a failed fit.
    pub fold_scores: Vec<Vec<f64>>,
}

impl CandidateResult {
    pub fn mean_score(&self, metric_index: usize) -> f64 {
        mean_std(&self.fold_scores[metric_index]).0
    }
}

/// Population mean and standard deviation; NaN if any value is NaN.
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Competition ranks, 1 = best. Equal scores share the lowest rank and NaN
/// ranks last.
pub(crate) fn rank_desc(scores: &[f64]) -> Vec<usize> {
    let valid = scores.iter().filter(|s| !s.is_nan()).count();
    scores
        .iter()
        .map(|&s| {
            if s.is_nan() {
                valid + 1
            } else {
                1 + scores.iter().filter(|&&o| !o.is_nan() && o > s).count()
            }
        })
        .collect()
}

/// Fit `pipeline` with `params` on every fold and score the held-out part.
///
/// A fold whose fit or prediction fails scores NaN on every metric.
pub fn cross_validate(
    pipeline: &Pipeline,
    params: &IndexMap<String, ParamScalar>,
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    folds: &[Fold],
    scoring: &Scoring,
) -> CandidateResult {
    let metrics = scoring.metrics();
    let mut result = CandidateResult {
        params: params.clone(),
        fit_times: Vec::with_capacity(folds.len()),
        score_times: Vec::with_capacity(folds.len()),
        fold_scores: vec![Vec::with_capacity(folds.len()); metrics.len()],
    };

    for (i, fold) in folds.iter().enumerate() {
        let x_train = x.select(Axis(0), &fold.train);
        let y_train: Vec<usize> = fold.train.iter().map(|&j| y[j]).collect();
        let x_test = x.select(Axis(0), &fold.test);
        let y_test: Vec<usize> = fold.test.iter().map(|&j| y[j]).collect();

        let started = Instant::now();
        let mut model = pipeline.clone();
        let fitted = model
            .set_params(params)
            .and_then(|_| model.fit(&x_train, &y_train, n_classes));
        result.fit_times.push(started.elapsed().as_secs_f64());

        let started = Instant::now();
        let scores = fitted.and_then(|_| {
            let y_pred = model.predict(&x_test)?;
            metrics
                .iter()
                .map(|m| m.score(&y_test, &y_pred, n_classes))
                .collect::<Result<Vec<f64>, ModelingError>>()
        });
        result.score_times.push(started.elapsed().as_secs_f64());

        match scores {
            Ok(scores) => {
                for (m, score) in scores.into_iter().enumerate() {
                    result.fold_scores[m].push(score);
                }
            }
            Err(e) => {
                tracing::warn!("Fit failed on fold {} with params {:?}: {}", i, params, e);
                for fold_scores in &mut result.fold_scores {
                    fold_scores.push(f64::NAN);
                }
            }
        }
    }
    result
}

/// Outcome of an exhaustive grid search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_index: usize,
    pub best_score: f64,
    pub best_params: IndexMap<String, ParamScalar>,
    pub refit: Metric,
    pub table: ResultsTable,
}

/// Exhaustive search over a parameter grid with k-fold scoring.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pipeline: Pipeline,
    candidates: Vec<IndexMap<String, ParamScalar>>,
    scoring: Scoring,
    folds: Vec<Fold>,
}

impl GridSearch {
    pub fn new(pipeline: &Pipeline, grid: &ParamGrid, scoring: &Scoring, folds: &[Fold]) -> Self {
        Self {
            pipeline: pipeline.clone(),
            candidates: expand_grid(grid),
            scoring: scoring.clone(),
            folds: folds.to_vec(),
        }
    }

    pub fn n_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Evaluate every candidate on every fold and pick the best by the
    /// refit metric (lowest rank, first wins).
    ///
    /// # Errors
    /// Fails when no candidate produced a finite refit score.
    pub fn run(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<SearchOutcome, ModelingError> {
        tracing::info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            self.folds.len(),
            self.candidates.len(),
            self.folds.len() * self.candidates.len()
        );
        let results: Vec<CandidateResult> = self
            .candidates
            .iter()
            .map(|params| {
                cross_validate(
                    &self.pipeline,
                    params,
                    x,
                    y,
                    n_classes,
                    &self.folds,
                    &self.scoring,
                )
            })
            .collect();

        let metrics = self.scoring.metrics();
        let refit_idx = metrics
            .iter()
            .position(|m| *m == self.scoring.refit())
            .unwrap_or_default();
        let ranks: Vec<Vec<usize>> = (0..metrics.len())
            .map(|m| rank_desc(&results.iter().map(|r| r.mean_score(m)).collect::<Vec<_>>()))
            .collect();

        let best_index = (0..results.len())
            .filter(|&i| !results[i].mean_score(refit_idx).is_nan())
            .min_by_key(|&i| (ranks[refit_idx][i], i))
            .ok_or_else(|| {
                ModelingError::InvalidInput(format!(
                    "All {} fits failed",
                    results.len() * self.folds.len()
                ))
            })?;

        Ok(SearchOutcome {
            best_index,
            best_score: results[best_index].mean_score(refit_idx),
            best_params: results[best_index].params.clone(),
            refit: self.scoring.refit(),
            table: self.results_table(&results, &ranks),
        })
    }

    fn results_table(&self, results: &[CandidateResult], ranks: &[Vec<usize>]) -> ResultsTable {
        let mut param_keys: Vec<&String> = self.candidates.iter().flat_map(|c| c.keys()).collect();
        param_keys.sort();
        param_keys.dedup();

        let mut headers: Vec<String> = [
            "mean_fit_time",
            "std_fit_time",
            "mean_score_time",
            "std_score_time",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();
        headers.extend(param_keys.iter().map(|k| format!("param_{}", k)));
        headers.push("params".to_string());
        for &metric in self.scoring.metrics() {
            let key = self.scoring.column_key(metric);
            headers.extend((0..self.folds.len()).map(|i| format!("split{}_test_{}", i, key)));
            headers.push(format!("mean_test_{}", key));
            headers.push(format!("std_test_{}", key));
            headers.push(format!("rank_test_{}", key));
        }

        let mut table = ResultsTable::new(headers);
        for (c, result) in results.iter().enumerate() {
            let (mean_fit, std_fit) = mean_std(&result.fit_times);
            let (mean_score, std_score) = mean_std(&result.score_times);
            let mut row = vec![
                mean_fit.to_string(),
                std_fit.to_string(),
                mean_score.to_string(),
                std_score.to_string(),
            ];
            row.extend(
                param_keys
                    .iter()
                    .map(|k| result.params.get(*k).map(|v| v.to_string()).unwrap_or_default()),
            );
            row.push(serde_json::to_string(&result.params).unwrap_or_default());
            for (m, scores) in result.fold_scores.iter().enumerate() {
                let (mean, std) = mean_std(scores);
                row.extend(scores.iter().map(|s| s.to_string()));
                row.push(mean.to_string());
                row.push(std.to_string());
                row.push(ranks[m][c].to_string());
            }
            table.push_row(row);
        }
        table
    }
}
