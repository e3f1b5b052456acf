use crate::error::DataError;
use crate::models::{EdaFlags, EdaSummary, Frame, Series, Shape};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;

pub const FILE_PREFIX: &str = "eda_summary_";
pub const HIGH_CORR_THRESHOLD: f64 = 0.95;
pub const IMBALANCE_THRESHOLD: f64 = 0.8;
/// High-dimensional when rows < ratio * features.
pub const HIGH_DIM_N_RATIO: usize = 5;

/// Pearson correlation over pairwise complete observations.
///
/// NaN when fewer than two complete pairs exist or either side is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Numeric columns as float vectors, missing values as NaN.
pub fn numeric_columns(x: &Frame) -> IndexMap<String, Vec<f64>> {
    x.columns()
        .filter(|s| x.is_numeric(s.name()))
        .filter_map(|s| Some((s.name().to_string(), s.to_f64().ok()?)))
        .collect()
}

/// Largest finite |r| between two distinct numeric columns, 0.0 if none.
pub fn max_abs_corr_offdiag(x: &Frame) -> f64 {
    let columns: Vec<Vec<f64>> = numeric_columns(x).into_values().collect();
    let mut max = f64::NAN;
    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let r = pearson(&columns[i], &columns[j]).abs();
            if r.is_finite() && (max.is_nan() || r > max) {
                max = r;
            }
        }
    }
    if max.is_nan() { 0.0 } else { max }
}

/// Statistical summary and policy flags of a feature frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdaSummarizer;

impl EdaSummarizer {
    /// Compute the summary and flags without touching the filesystem.
    pub fn compute(x: &Frame, y: Option<&Series>) -> Result<(EdaSummary, EdaFlags), DataError> {
        let (n, p) = x.shape();

        let mut na_counts: Vec<(String, usize)> = x.null_counts().into_iter().collect();
        na_counts.sort_by(|a, b| b.1.cmp(&a.1));
        let na_top10: IndexMap<String, usize> = na_counts.into_iter().take(10).collect();

        let max_offdiag = max_abs_corr_offdiag(x);

        let y_distribution: Option<IndexMap<String, f64>> = y
            .map(|y| y.value_counts(true))
            .transpose()?
            .map(|counts| {
                counts
                    .into_iter()
                    .map(|(class, share)| (class.to_string(), share))
                    .collect()
            });
        let class_imbalance = y_distribution
            .as_ref()
            .and_then(|d| d.values().next().copied())
            .map(|top| top >= IMBALANCE_THRESHOLD)
            .unwrap_or(false);

        let summary = EdaSummary {
            shape: Shape {
                n_samples: n,
                n_features: p,
            },
            na_top10,
            duplicates: x.duplicated_count()?,
            numeric_features: x.numeric_columns().len(),
            max_abs_corr_offdiag: max_offdiag,
            y_distribution,
        };

        // TODO: derive needs_scaling from feature ranges once a scale-spread heuristic is agreed
        let flags = EdaFlags {
            needs_scaling: true,
            high_dimensional: n < HIGH_DIM_N_RATIO * p,
            class_imbalance,
            high_collinearity: max_offdiag >= HIGH_CORR_THRESHOLD,
        };

        Ok((summary, flags))
    }

    /// Compute and persist `eda_summary_<ts>.json` under `out_dir`.
    ///
    /// # Returns
    /// The written path, the summary and the flags
    pub fn summarize(
        x: &Frame,
        y: Option<&Series>,
        out_dir: &Utf8Path,
    ) -> Result<(Utf8PathBuf, EdaSummary, EdaFlags)> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create EDA directory: {}", out_dir))?;

        let (summary, flags) = Self::compute(x, y)?;

        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = out_dir.join(format!("{}{}.json", FILE_PREFIX, ts));
        let json =
            serde_json::to_string_pretty(&summary).context("Failed to serialize EDA summary")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path))?;

        Ok((path, summary, flags))
    }
}
