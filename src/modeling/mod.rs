//! Modeling module - the numeric kernel of the pipelines stage.
//!
//! Everything here works on dense `ndarray` matrices and class indices
//! produced by [`LabelEncoder`]. Transformers and estimators are plain
//! enums so a [`Pipeline`] can be cloned per grid candidate and per fold.
//!
//! # Components
//!
//! - [`preprocessing`]: median imputation and standard scaling
//! - [`selection`]: variance threshold and ANOVA-F based selectors
//! - [`reduction`]: PCA
//! - [`estimators`]: support vector and random forest classifiers
//! - [`Pipeline`] / [`PipelineFactory`]: declarative spec to fitted model
//! - [`metrics`], [`cv`], [`search`]: scoring, fold splitting, grid search
//! - [`automl`]: evolutionary and random pipeline search
//! - [`PipelineEvaluator`]: the [`Evaluate`] seam used by the orchestrator

pub mod automl;
pub mod cv;
pub mod estimators;
pub mod evaluator;
pub mod factory;
pub mod metrics;
pub mod pipeline;
pub mod preprocessing;
pub mod reduction;
pub mod search;
pub mod selection;

pub use automl::{AutoMlLibrary, AutoMlSearch};
pub use cv::StratifiedKFold;
pub use estimators::Estimator;
pub use evaluator::{Evaluate, PipelineEvaluator};
pub use factory::{BuiltModel, ParamGrid, PipelineFactory};
pub use metrics::{Metric, Scoring};
pub use pipeline::{Pipeline, Transform};
pub use search::{GridSearch, SearchOutcome};

use crate::error::{DataError, ModelingError};
use crate::models::{Cell, ParamScalar, Series};
use ndarray::Array2;

/// Maps target values to dense class indices `0..n_classes`, ordered by
/// [`Cell`] ordering so the greatest label is the last class.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<Cell>,
}

impl LabelEncoder {
    /// Fit on `y` and return the encoded labels.
    pub fn fit_transform(y: &Series) -> Result<(Self, Vec<usize>), DataError> {
        if y.null_count() > 0 {
            return Err(DataError::MissingTargetValues(y.name().to_string()));
        }
        let classes = y.classes()?;
        let encoded = y
            .cells()?
            .iter()
            .map(|v| classes.binary_search(v).unwrap_or_default())
            .collect();
        Ok((Self { classes }, encoded))
    }

    pub fn classes(&self) -> &[Cell] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

/// Reject NaN/inf input to steps that cannot handle missing values.
pub(crate) fn ensure_finite(x: &Array2<f64>, step: &str) -> Result<(), ModelingError> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ModelingError::InvalidInput(format!(
            "Input to {} contains NaN or infinity",
            step
        )))
    }
}

pub(crate) fn invalid_param(step: &str, param: &str, reason: impl Into<String>) -> ModelingError {
    ModelingError::InvalidParameter {
        step: step.to_string(),
        param: param.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn param_f64(
    step: &str,
    param: &str,
    value: &ParamScalar,
) -> Result<f64, ModelingError> {
    value
        .as_f64()
        .ok_or_else(|| invalid_param(step, param, format!("expected a number, got {}", value)))
}

pub(crate) fn param_usize(
    step: &str,
    param: &str,
    value: &ParamScalar,
) -> Result<usize, ModelingError> {
    value
        .as_i64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            invalid_param(step, param, format!("expected a non-negative integer, got {}", value))
        })
}

pub(crate) fn param_bool(
    step: &str,
    param: &str,
    value: &ParamScalar,
) -> Result<bool, ModelingError> {
    value
        .as_bool()
        .ok_or_else(|| invalid_param(step, param, format!("expected a boolean, got {}", value)))
}

/// Population variance of the finite values of a column; 0.0 when empty.
pub(crate) fn nan_variance(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let xs: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}
