use crate::error::ModelingError;
use crate::models::ParamScalar;
use crate::modeling::estimators::Estimator;
use crate::modeling::preprocessing::{SimpleImputer, StandardScaler};
use crate::modeling::reduction::Pca;
use crate::modeling::selection::{SelectKBest, SelectPercentile, VarianceThreshold};
use crate::modeling::{invalid_param, param_f64, param_usize};
use indexmap::IndexMap;
use ndarray::Array2;

pub const STEP_PREPROCESS: &str = "preprocess";
pub const STEP_FEAT_SEL: &str = "feat_sel";
pub const STEP_REDUCTION: &str = "reduction";
pub const STEP_ESTIMATOR: &str = "estimator";

/// Separator between step and parameter names in grid keys.
pub const PARAM_SEP: &str = "__";

/// A fittable feature transformation.
#[derive(Debug, Clone)]
pub enum Transform {
    Imputer(SimpleImputer),
    Scaler(StandardScaler),
    VarianceThreshold(VarianceThreshold),
    SelectKBest(SelectKBest),
    SelectPercentile(SelectPercentile),
    Pca(Pca),
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Imputer(_) => "imputer",
            Transform::Scaler(_) => "scaler",
            Transform::VarianceThreshold(_) => "variance_threshold",
            Transform::SelectKBest(_) => "select_k_best",
            Transform::SelectPercentile(_) => "select_percentile",
            Transform::Pca(_) => "pca",
        }
    }

    pub fn set_param(&mut self, param: &str, value: &ParamScalar) -> Result<(), ModelingError> {
        let name = self.name();
        match (self, param) {
            (Transform::Pca(p), _) => p.set_param(param, value),
            (Transform::VarianceThreshold(t), "threshold") => {
                *t = VarianceThreshold::new(param_f64(name, param, value)?)?;
                Ok(())
            }
            (Transform::SelectKBest(t), "k") => {
                *t = SelectKBest::new(param_usize(name, param, value)?)?;
                Ok(())
            }
            (Transform::SelectPercentile(t), "percentile") => {
                *t = SelectPercentile::new(param_f64(name, param, value)?)?;
                Ok(())
            }
            _ => Err(invalid_param(name, param, "unknown parameter")),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), ModelingError> {
        match self {
            Transform::Imputer(t) => t.fit(x),
            Transform::Scaler(t) => t.fit(x),
            Transform::VarianceThreshold(t) => t.fit(x)?,
            Transform::SelectKBest(t) => t.fit(x, y),
            Transform::SelectPercentile(t) => t.fit(x, y),
            Transform::Pca(t) => t.fit(x)?,
        }
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        match self {
            Transform::Imputer(t) => t.transform(x),
            Transform::Scaler(t) => t.transform(x),
            Transform::VarianceThreshold(t) => t.transform(x),
            Transform::SelectKBest(t) => t.transform(x),
            Transform::SelectPercentile(t) => t.transform(x),
            Transform::Pca(t) => t.transform(x),
        }
    }
}

/// A named pipeline stage made of one or more transforms applied in order.
#[derive(Debug, Clone)]
pub struct PipelineStep {
    pub name: String,
    pub transforms: Vec<Transform>,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, transforms: Vec<Transform>) -> Self {
        Self {
            name: name.into(),
            transforms,
        }
    }

    /// `param` is either `<transform>__<param>` or, for single-transform
    /// steps, the bare parameter name.
    fn set_param(&mut self, param: &str, value: &ParamScalar) -> Result<(), ModelingError> {
        if let Some((sub, rest)) = param.split_once(PARAM_SEP) {
            let transform = self
                .transforms
                .iter_mut()
                .find(|t| t.name() == sub)
                .ok_or_else(|| {
                    ModelingError::UnknownStep(format!("{}{}{}", self.name, PARAM_SEP, sub))
                })?;
            return transform.set_param(rest, value);
        }
        match self.transforms.as_mut_slice() {
            [single] => single.set_param(param, value),
            _ => Err(invalid_param(&self.name, param, "ambiguous for a multi-transform step")),
        }
    }
}

/// Ordered transform steps followed by a final estimator named `estimator`.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    estimator: Estimator,
    n_classes: usize,
}

impl Pipeline {
    pub fn new(steps: Vec<PipelineStep>, estimator: Estimator) -> Self {
        Self {
            steps,
            estimator,
            n_classes: 0,
        }
    }

    /// Step names in execution order; the last one is always `estimator`.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|s| s.name.as_str())
            .chain(std::iter::once(STEP_ESTIMATOR))
            .collect()
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.step_names().contains(&name)
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Apply one `<step>__<param>` setting.
    pub fn set_param(&mut self, key: &str, value: &ParamScalar) -> Result<(), ModelingError> {
        let (step, param) = key
            .split_once(PARAM_SEP)
            .ok_or_else(|| invalid_param("pipeline", key, "expected <step>__<param>"))?;
        if step == STEP_ESTIMATOR {
            return self.estimator.set_param(param, value);
        }
        self.steps
            .iter_mut()
            .find(|s| s.name == step)
            .ok_or_else(|| ModelingError::UnknownStep(step.to_string()))?
            .set_param(param, value)
    }

    pub fn set_params(
        &mut self,
        params: &IndexMap<String, ParamScalar>,
    ) -> Result<(), ModelingError> {
        for (key, value) in params {
            self.set_param(key, value)?;
        }
        Ok(())
    }

    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<(), ModelingError> {
        let mut current = x.clone();
        for step in &mut self.steps {
            for transform in &mut step.transforms {
                transform.fit(&current, y)?;
                current = transform.transform(&current)?;
            }
        }
        if current.ncols() == 0 {
            return Err(ModelingError::InvalidInput(
                "No features left after transformation".to_string(),
            ));
        }
        self.estimator.fit(&current, y, n_classes)?;
        self.n_classes = n_classes;
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let mut current = x.clone();
        for step in &self.steps {
            for transform in &step.transforms {
                current = transform.transform(&current)?;
            }
        }
        Ok(current)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelingError> {
        self.estimator.predict(&self.transform(x)?)
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            vec![
                PipelineStep::new(
                    STEP_PREPROCESS,
                    vec![
                        Transform::Imputer(SimpleImputer::new()),
                        Transform::Scaler(StandardScaler::new()),
                    ],
                ),
                PipelineStep::new(STEP_REDUCTION, vec![Transform::Pca(Pca::new())]),
            ],
            Estimator::from_kind("svc", 0).unwrap(),
        )
    }

    #[test]
    fn test_step_names_end_with_estimator() {
        assert_eq!(
            pipeline().step_names(),
            vec![STEP_PREPROCESS, STEP_REDUCTION, STEP_ESTIMATOR]
        );
    }

    #[test]
    fn test_set_param_routing() {
        let mut p = pipeline();
        p.set_param("estimator__C", &ParamScalar::Float(2.0)).unwrap();
        p.set_param("reduction__n_components", &ParamScalar::Int(1)).unwrap();
        assert!(matches!(
            p.set_param("feat_sel__k", &ParamScalar::Int(1)),
            Err(ModelingError::UnknownStep(_))
        ));
        assert!(p.set_param("preprocess__with_mean", &ParamScalar::Bool(true)).is_err());
        assert!(p.set_param("nosep", &ParamScalar::Int(1)).is_err());
    }

    #[test]
    fn test_fit_predict_with_missing_values() {
        let x = array![
            [0.0, 0.0],
            [0.1, f64::NAN],
            [0.2, 0.1],
            [4.0, 4.0],
            [4.1, f64::NAN],
            [4.2, 4.1],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let mut p = pipeline();
        p.set_param("estimator__kernel", &ParamScalar::Text("linear".into())).unwrap();
        p.fit(&x, &y, 2).unwrap();
        assert_eq!(p.predict(&x).unwrap(), y);
    }
}
