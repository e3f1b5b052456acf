use indexmap::IndexMap;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A single hyperparameter value as written in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamScalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamScalar {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamScalar::Int(v) => Some(*v as f64),
            ParamScalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value; floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamScalar::Int(v) => Some(*v),
            ParamScalar::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamScalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamScalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamScalar::Null)
    }
}

impl fmt::Display for ParamScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamScalar::Null => write!(f, "None"),
            ParamScalar::Bool(b) => write!(f, "{}", b),
            ParamScalar::Int(v) => write!(f, "{}", v),
            ParamScalar::Float(v) => write!(f, "{}", v),
            ParamScalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for ParamScalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamScalar::Null => serializer.serialize_none(),
            ParamScalar::Bool(b) => serializer.serialize_bool(*b),
            ParamScalar::Int(v) => serializer.serialize_i64(*v),
            ParamScalar::Float(v) => serializer.serialize_f64(*v),
            ParamScalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = ParamScalar;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a null, boolean, number or string")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ParamScalar::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ParamScalar::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(ParamScalar::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(ParamScalar::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(ParamScalar::Int)
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(ParamScalar::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ParamScalar::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(ParamScalar::Text(v))
    }
}

impl<'de> Deserialize<'de> for ParamScalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// A hyperparameter as declared in a pipeline spec: either a literal or a
/// sequence of candidates for grid search.
#[derive(Debug, Clone, PartialEq)]
pub enum HyperParam {
    One(ParamScalar),
    Many(Vec<ParamScalar>),
}

impl HyperParam {
    /// Normalize into a grid axis: literals become singleton lists, sequences
    /// pass through unchanged.
    pub fn to_grid(&self) -> Vec<ParamScalar> {
        match self {
            HyperParam::One(v) => vec![v.clone()],
            HyperParam::Many(vs) => vs.clone(),
        }
    }
}

impl Serialize for HyperParam {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HyperParam::One(v) => v.serialize(serializer),
            HyperParam::Many(vs) => vs.serialize(serializer),
        }
    }
}

struct HyperParamVisitor;

impl<'de> Visitor<'de> for HyperParamVisitor {
    type Value = HyperParam;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar hyperparameter or a list of candidates")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(HyperParam::One(ParamScalar::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(HyperParam::One(ParamScalar::Null))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        ScalarVisitor.visit_bool(v).map(HyperParam::One)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        ScalarVisitor.visit_i64(v).map(HyperParam::One)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        ScalarVisitor.visit_u64(v).map(HyperParam::One)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        ScalarVisitor.visit_f64(v).map(HyperParam::One)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        ScalarVisitor.visit_str(v).map(HyperParam::One)
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        ScalarVisitor.visit_string(v).map(HyperParam::One)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut values = Vec::new();
        while let Some(value) = seq.next_element::<ParamScalar>()? {
            values.push(value);
        }
        Ok(HyperParam::Many(values))
    }
}

impl<'de> Deserialize<'de> for HyperParam {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(HyperParamVisitor)
    }
}

/// Ordered hyperparameter map of one step.
pub type ParamMap = IndexMap<String, HyperParam>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PreprocessConfig {
    /// `"simple"` enables the median imputer.
    #[serde(default)]
    pub imputer: Option<String>,

    /// `"standard"` enables standard scaling.
    #[serde(default)]
    pub scaler: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureSelectionConfig {
    #[serde(default)]
    pub variance_threshold: Option<f64>,

    #[serde(default)]
    pub select_k_best: Option<usize>,

    #[serde(default)]
    pub select_percentile: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReductionConfig {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub params: Option<ParamMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstimatorConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub params: Option<ParamMap>,
}

/// Classic pipeline steps, all optional except the estimator at build time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepsConfig {
    #[serde(default)]
    pub preprocess: Option<PreprocessConfig>,

    #[serde(default)]
    pub feature_selection: Option<FeatureSelectionConfig>,

    #[serde(default)]
    pub reduction: Option<ReductionConfig>,

    #[serde(default)]
    pub estimator: Option<EstimatorConfig>,
}

/// AutoML block of a pipeline spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoMlConfig {
    #[serde(alias = "type")]
    pub library: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_automl_scoring")]
    pub scoring: String,

    #[serde(default = "default_automl_cv")]
    pub cv: usize,

    #[serde(default = "default_test_size")]
    pub test_size: f64,

    #[serde(default)]
    pub random_state: Option<u64>,

    #[serde(default = "default_generations")]
    pub generations: usize,

    #[serde(default = "default_population_size")]
    pub population_size: usize,

    #[serde(default)]
    pub max_time_mins: Option<f64>,

    #[serde(default = "default_time_left")]
    pub time_left_for_this_task: u64,

    #[serde(default = "default_per_run_limit")]
    pub per_run_time_limit: u64,

    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,

    #[serde(default)]
    pub export_best_pipeline: bool,

    #[serde(default = "default_export_path")]
    pub export_path: String,
}

impl AutoMlConfig {
    pub fn new(library: &str) -> Self {
        Self {
            library: library.to_string(),
            name: None,
            scoring: default_automl_scoring(),
            cv: default_automl_cv(),
            test_size: default_test_size(),
            random_state: None,
            generations: default_generations(),
            population_size: default_population_size(),
            max_time_mins: None,
            time_left_for_this_task: default_time_left(),
            per_run_time_limit: default_per_run_limit(),
            max_evaluations: default_max_evaluations(),
            export_best_pipeline: false,
            export_path: default_export_path(),
        }
    }
}

fn default_automl_scoring() -> String {
    "f1".to_string()
}

fn default_automl_cv() -> usize {
    5
}

fn default_test_size() -> f64 {
    0.2
}

fn default_generations() -> usize {
    5
}

fn default_population_size() -> usize {
    20
}

fn default_time_left() -> u64 {
    300
}

fn default_per_run_limit() -> u64 {
    60
}

fn default_max_evaluations() -> usize {
    50
}

fn default_export_path() -> String {
    "automl_best_pipeline.yaml".to_string()
}

/// Declarative description of one model pipeline.
///
/// Exactly one of `steps` and `automl` drives construction; this is enforced
/// by [`AppConfig::validate`](crate::models::AppConfig::validate).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<StepsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automl: Option<AutoMlConfig>,
}

impl PipelineSpec {
    /// Spec with classic steps only.
    pub fn classic(name: impl Into<String>, steps: StepsConfig) -> Self {
        Self {
            name: name.into(),
            steps: Some(steps),
            automl: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_wrapped_in_singleton() {
        let p = HyperParam::One(ParamScalar::Float(0.5));
        assert_eq!(p.to_grid(), vec![ParamScalar::Float(0.5)]);
    }

    #[test]
    fn test_sequence_passes_through() {
        let p = HyperParam::Many(vec![ParamScalar::Int(1), ParamScalar::Int(10)]);
        assert_eq!(p.to_grid().len(), 2);
    }

    #[test]
    fn test_deserialize_mixed_params() {
        let yaml = r#"
kernel: [linear, rbf]
C: 1
gamma: 0.5
max_depth: [null, 3]
bootstrap: false
"#;
        let params: ParamMap = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(
            params["kernel"],
            HyperParam::Many(vec![
                ParamScalar::Text("linear".into()),
                ParamScalar::Text("rbf".into())
            ])
        );
        assert_eq!(params["C"], HyperParam::One(ParamScalar::Int(1)));
        assert_eq!(params["gamma"], HyperParam::One(ParamScalar::Float(0.5)));
        assert_eq!(
            params["max_depth"],
            HyperParam::Many(vec![ParamScalar::Null, ParamScalar::Int(3)])
        );
        assert_eq!(params["bootstrap"], HyperParam::One(ParamScalar::Bool(false)));
    }

    #[test]
    fn test_automl_accepts_type_alias() {
        let cfg: AutoMlConfig = serde_yaml_ng::from_str("type: tpot\ngenerations: 2").unwrap();
        assert_eq!(cfg.library, "tpot");
        assert_eq!(cfg.generations, 2);
        assert_eq!(cfg.population_size, 20);
    }

    #[test]
    fn test_spec_round_trips_through_yaml() {
        let spec = PipelineSpec::classic(
            "rf",
            StepsConfig {
                estimator: Some(EstimatorConfig {
                    kind: "random_forest".into(),
                    params: None,
                }),
                ..Default::default()
            },
        );
        let yaml = serde_yaml_ng::to_string(&spec).unwrap();
        let back: PipelineSpec = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, spec);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_scalar_becomes_singleton_axis(v in any::<i64>()) {
                let param: HyperParam = serde_yaml_ng::from_str(&v.to_string()).unwrap();
                prop_assert_eq!(param.to_grid(), vec![ParamScalar::Int(v)]);
            }

            #[test]
            fn prop_sequence_keeps_order(values in prop::collection::vec(any::<i64>(), 0..8)) {
                let param: HyperParam = serde_yaml_ng::from_str(&format!("{:?}", values)).unwrap();
                let expected: Vec<ParamScalar> = values.into_iter().map(ParamScalar::Int).collect();
                prop_assert_eq!(param.to_grid(), expected);
            }
        }
    }
}
