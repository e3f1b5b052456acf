use crate::error::ModelingError;
use crate::models::{
    FeatureSelectionConfig, ParamScalar, PipelineSpec, PreprocessConfig, ReductionConfig,
    StepsConfig,
};
use crate::modeling::automl::AutoMlSearch;
use crate::modeling::estimators::Estimator;
use crate::modeling::pipeline::{
    PARAM_SEP, Pipeline, PipelineStep, STEP_ESTIMATOR, STEP_FEAT_SEL, STEP_PREPROCESS,
    STEP_REDUCTION, Transform,
};
use crate::modeling::preprocessing::{SimpleImputer, StandardScaler};
use crate::modeling::reduction::Pca;
use crate::modeling::selection::{SelectKBest, SelectPercentile, VarianceThreshold};
use indexmap::IndexMap;

pub const IMPUTER_SIMPLE: &str = "simple";
pub const SCALER_STANDARD: &str = "standard";
pub const REDUCER_PCA: &str = "pca";
pub const REDUCER_UMAP: &str = "umap";

/// Grid-search axes keyed by `<step>__<param>`.
pub type ParamGrid = IndexMap<String, Vec<ParamScalar>>;

/// What a spec builds into.
#[derive(Debug, Clone)]
pub enum BuiltModel {
    Pipeline(Pipeline),
    AutoMl(AutoMlSearch),
}

/// Builds pipelines and parameter grids from declarative specs.
#[derive(Debug, Clone, Copy)]
pub struct PipelineFactory {
    random_state: u64,
}

impl PipelineFactory {
    pub fn new(random_state: u64) -> Self {
        Self { random_state }
    }

    /// Build the model described by `spec`.
    ///
    /// An `automl` block takes precedence and yields an empty grid.
    ///
    /// # Returns
    /// The model and its parameter grid
    pub fn build(&self, spec: &PipelineSpec) -> Result<(BuiltModel, ParamGrid), ModelingError> {
        if let Some(automl) = &spec.automl {
            let search = AutoMlSearch::new(automl, self.random_state)?;
            return Ok((BuiltModel::AutoMl(search), ParamGrid::new()));
        }
        let default_steps = StepsConfig::default();
        let (pipeline, grid) =
            self.build_pipeline(spec.steps.as_ref().unwrap_or(&default_steps))?;
        Ok((BuiltModel::Pipeline(pipeline), grid))
    }

    /// Build a classic pipeline: optional preprocess, feature selection and
    /// reduction stages, then the mandatory estimator.
    ///
    /// The grid only holds entries for stages that were built.
    pub fn build_pipeline(
        &self,
        steps: &StepsConfig,
    ) -> Result<(Pipeline, ParamGrid), ModelingError> {
        let mut stages = Vec::new();
        if let Some(step) = steps.preprocess.as_ref().and_then(Self::preprocess) {
            stages.push(step);
        }
        let selector = steps
            .feature_selection
            .as_ref()
            .map(Self::selector)
            .transpose()?
            .flatten();
        if let Some(selector) = selector {
            stages.push(PipelineStep::new(STEP_FEAT_SEL, vec![selector]));
        }
        let reducer = steps.reduction.as_ref().map(Self::reducer).transpose()?.flatten();
        let has_reducer = reducer.is_some();
        if let Some(reducer) = reducer {
            stages.push(PipelineStep::new(STEP_REDUCTION, vec![reducer]));
        }

        let estimator_cfg = steps.estimator.as_ref();
        let kind = estimator_cfg.map(|e| e.kind.as_str()).unwrap_or("None");
        let estimator = Estimator::from_kind(kind, self.random_state)?;
        let pipeline = Pipeline::new(stages, estimator);

        let mut grid = ParamGrid::new();
        if let Some(params) = steps.reduction.as_ref().and_then(|r| r.params.as_ref()) {
            if has_reducer {
                for (k, v) in params {
                    grid.insert(format!("{}{}{}", STEP_REDUCTION, PARAM_SEP, k), v.to_grid());
                }
            } else {
                tracing::warn!("Ignoring reduction params, no reducer was built");
            }
        }
        if let Some(params) = estimator_cfg.and_then(|e| e.params.as_ref()) {
            for (k, v) in params {
                grid.insert(format!("{}{}{}", STEP_ESTIMATOR, PARAM_SEP, k), v.to_grid());
            }
        }

        validate_grid(&pipeline, &grid)?;
        Ok((pipeline, grid))
    }

    fn preprocess(cfg: &PreprocessConfig) -> Option<PipelineStep> {
        let mut transforms = Vec::new();
        match cfg.imputer.as_deref() {
            Some(IMPUTER_SIMPLE) => transforms.push(Transform::Imputer(SimpleImputer::new())),
            Some(other) => tracing::warn!("Unknown imputer '{}', skipping", other),
            None => {}
        }
        match cfg.scaler.as_deref() {
            Some(SCALER_STANDARD) => transforms.push(Transform::Scaler(StandardScaler::new())),
            Some(other) => tracing::warn!("Unknown scaler '{}', skipping", other),
            None => {}
        }
        (!transforms.is_empty()).then(|| PipelineStep::new(STEP_PREPROCESS, transforms))
    }

    fn selector(cfg: &FeatureSelectionConfig) -> Result<Option<Transform>, ModelingError> {
        if let Some(threshold) = cfg.variance_threshold {
            return Ok(Some(Transform::VarianceThreshold(VarianceThreshold::new(threshold)?)));
        }
        if let Some(k) = cfg.select_k_best {
            return Ok(Some(Transform::SelectKBest(SelectKBest::new(k)?)));
        }
        if let Some(p) = cfg.select_percentile {
            return Ok(Some(Transform::SelectPercentile(SelectPercentile::new(p)?)));
        }
        Ok(None)
    }

    fn reducer(cfg: &ReductionConfig) -> Result<Option<Transform>, ModelingError> {
        match cfg.kind.as_deref() {
            None => Ok(None),
            Some(REDUCER_PCA) => Ok(Some(Transform::Pca(Pca::new()))),
            Some(REDUCER_UMAP) => Err(ModelingError::MissingDependency(
                "UMAP not installed".to_string(),
            )),
            Some(other) => {
                tracing::warn!("Unknown reducer '{}', using passthrough", other);
                Ok(None)
            }
        }
    }
}

/// Every candidate combination of a grid, keys sorted, last key varying
/// fastest. An empty grid yields one empty combination.
pub fn expand_grid(grid: &ParamGrid) -> Vec<IndexMap<String, ParamScalar>> {
    let mut keys: Vec<&String> = grid.keys().collect();
    keys.sort();

    let mut combos: Vec<IndexMap<String, ParamScalar>> = vec![IndexMap::new()];
    for key in keys {
        let values = &grid[key];
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                values.iter().map(move |v| {
                    let mut next = combo.clone();
                    next.insert(key.clone(), v.clone());
                    next
                })
            })
            .collect();
    }
    combos
}

/// Reject unknown parameter names and invalid values before any fitting.
fn validate_grid(pipeline: &Pipeline, grid: &ParamGrid) -> Result<(), ModelingError> {
    let mut candidate = pipeline.clone();
    for (key, values) in grid {
        if values.is_empty() {
            return Err(crate::modeling::invalid_param("grid", key, "empty candidate list"));
        }
        for value in values {
            candidate.set_param(key, value)?;
        }
    }
    Ok(())
}
