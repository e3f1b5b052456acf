pub mod forest;
pub mod svc;

pub use forest::RandomForest;
pub use svc::Svc;

use crate::error::ModelingError;
use crate::models::ParamScalar;
use ndarray::Array2;

pub const SVC: &str = "svc";
pub const RANDOM_FOREST: &str = "random_forest";

/// Final step of a pipeline.
#[derive(Debug, Clone)]
pub enum Estimator {
    Svc(Svc),
    RandomForest(RandomForest),
}

impl Estimator {
    /// Instantiate an estimator from its registry name.
    ///
    /// # Errors
    /// [`ModelingError::UnknownEstimator`] for anything but `svc` and
    /// `random_forest`
    pub fn from_kind(kind: &str, random_state: u64) -> Result<Self, ModelingError> {
        match kind {
            SVC => Ok(Estimator::Svc(Svc::new(random_state))),
            RANDOM_FOREST => Ok(Estimator::RandomForest(RandomForest::new(random_state))),
            other => Err(ModelingError::UnknownEstimator(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::Svc(_) => SVC,
            Estimator::RandomForest(_) => RANDOM_FOREST,
        }
    }

    /// Parameter names are matched case-insensitively (`C` and `c` are the
    /// same parameter).
    pub fn set_param(&mut self, name: &str, value: &ParamScalar) -> Result<(), ModelingError> {
        let name = name.to_ascii_lowercase();
        match self {
            Estimator::Svc(m) => m.set_param(&name, value),
            Estimator::RandomForest(m) => m.set_param(&name, value),
        }
    }

    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<(), ModelingError> {
        match self {
            Estimator::Svc(m) => m.fit(x, y, n_classes),
            Estimator::RandomForest(m) => m.fit(x, y, n_classes),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelingError> {
        match self {
            Estimator::Svc(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry() {
        assert_eq!(Estimator::from_kind("svc", 0).unwrap().kind(), SVC);
        assert_eq!(
            Estimator::from_kind("random_forest", 0).unwrap().kind(),
            RANDOM_FOREST
        );
        let err = Estimator::from_kind("xgboost", 0).unwrap_err();
        assert_eq!(err.to_string(), "Unknown estimator xgboost");
    }

    #[test]
    fn test_param_names_are_case_insensitive() {
        let mut est = Estimator::from_kind("svc", 0).unwrap();
        assert!(est.set_param("C", &ParamScalar::Float(10.0)).is_ok());
        assert!(est.set_param("Kernel", &ParamScalar::Text("linear".into())).is_ok());
    }
}
