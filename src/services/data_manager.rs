use crate::error::DataError;
use crate::models::{Cell, DataConfig, Frame, MissingStrategy, RawData, Series};
use crate::services::file_manager::json_kind;
use indexmap::IndexMap;
use polars::prelude::DataType;
use serde::Serialize;
use serde_json::Value;

/// Unique-value ratio under which a numeric column counts as categorical.
pub const CATEGORICAL_THRESHOLD: f64 = 0.1;

/// Conventional target column names, matched case-sensitively.
pub const TARGET_CANDIDATES: [&str; 6] = ["target", "label", "class", "y", "Target", "Label"];

/// Minimum number of samples accepted for modeling.
pub const MIN_SAMPLES_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Pure data transformations used to prepare a dataset for modeling.
#[derive(Debug, Clone, Default)]
pub struct DataManager {
    config: DataConfig,
}

impl DataManager {
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Normalize raw input into a frame.
    ///
    /// A JSON object becomes a single record and an array of objects becomes
    /// one record per element. Any other JSON shape is rejected.
    pub fn load_from_raw(&self, raw: &RawData) -> Result<Frame, DataError> {
        match raw {
            RawData::Frame(frame) => Ok(frame.clone()),
            RawData::Json(Value::Object(map)) => {
                let record: IndexMap<String, Cell> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                    .collect();
                Frame::from_records(&[record])
            }
            RawData::Json(Value::Array(items)) => {
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    let Value::Object(map) = item else {
                        return Err(DataError::UnsupportedRawData(format!(
                            "array of {}",
                            json_kind(item)
                        )));
                    };
                    records.push(
                        map.iter()
                            .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                            .collect::<IndexMap<_, _>>(),
                    );
                }
                Frame::from_records(&records)
            }
            RawData::Json(other) => {
                Err(DataError::UnsupportedRawData(json_kind(other).to_string()))
            }
        }
    }

    /// Configured target column if present, else the first column whose name
    /// is a conventional target name.
    pub fn infer_target_column(&self, frame: &Frame) -> Option<String> {
        if let Some(target) = &self.config.target_column {
            if frame.has_column(target) {
                return Some(target.clone());
            }
        }
        frame
            .column_names()
            .into_iter()
            .find(|name| TARGET_CANDIDATES.contains(&name.as_str()))
    }

    /// Drop duplicate rows, apply the missing-value strategy, then drop the
    /// configured columns.
    pub fn clean_data(&self, frame: &Frame) -> Result<Frame, DataError> {
        let deduped = frame.drop_duplicates()?;
        if deduped.n_rows() < frame.n_rows() {
            tracing::debug!(
                "Dropped {} duplicate row(s)",
                frame.n_rows() - deduped.n_rows()
            );
        }

        let handled = match self.config.missing_strategy {
            MissingStrategy::Auto => deduped,
            MissingStrategy::Drop => deduped.dropna()?,
            MissingStrategy::Fill => fill_missing(deduped)?,
        };

        handled.drop_columns(&self.config.drop_columns)
    }

    /// Numeric columns with few distinct values count as categorical; every
    /// non-numeric column is categorical.
    pub fn infer_column_types(&self, frame: &Frame) -> IndexMap<String, ColumnKind> {
        let n = frame.n_rows();
        frame
            .column_names()
            .into_iter()
            .map(|name| {
                let kind = if frame.is_numeric(&name) {
                    let ratio = if n > 0 {
                        frame.nunique(&name) as f64 / n as f64
                    } else {
                        0.0
                    };
                    if ratio < CATEGORICAL_THRESHOLD {
                        ColumnKind::Categorical
                    } else {
                        ColumnKind::Numeric
                    }
                } else {
                    ColumnKind::Categorical
                };
                (name, kind)
            })
            .collect()
    }

    pub fn split_features_target(
        &self,
        frame: &Frame,
    ) -> Result<(Frame, Option<Series>), DataError> {
        match self.infer_target_column(frame) {
            Some(target) => {
                let (x, y) = frame.split_target(&target)?;
                Ok((x, Some(y)))
            }
            None => Ok((frame.clone(), None)),
        }
    }

    pub fn validate_data(&self, x: &Frame, y: Option<&Series>) -> Result<(), DataError> {
        if x.n_rows() < MIN_SAMPLES_THRESHOLD {
            return Err(DataError::InsufficientSamples {
                found: x.n_rows(),
                required: MIN_SAMPLES_THRESHOLD,
            });
        }
        if let Some(y) = y {
            if y.len() != x.n_rows() {
                return Err(DataError::LengthMismatch {
                    features: x.n_rows(),
                    target: y.len(),
                });
            }
        }
        Ok(())
    }

    /// load, clean, split, validate.
    pub fn prepare_for_ml(&self, raw: &RawData) -> Result<(Frame, Option<Series>), DataError> {
        let frame = self.load_from_raw(raw)?;
        let cleaned = self.clean_data(&frame)?;
        let (x, y) = self.split_features_target(&cleaned)?;
        self.validate_data(&x, y.as_ref())?;
        Ok((x, y))
    }
}

/// Median for numeric columns, mode for the rest. Integer columns stay
/// integer when the median is whole.
fn fill_missing(frame: Frame) -> Result<Frame, DataError> {
    let mut filled = frame.clone();
    for series in frame.columns().filter(|s| s.null_count() > 0) {
        let fill = if frame.is_numeric(series.name()) {
            let integral = series.as_polars().dtype().is_integer();
            series
                .as_polars()
                .cast(&DataType::Float64)?
                .median()
                .map(|m| {
                    if integral && m.fract() == 0.0 {
                        Cell::Int(m as i64)
                    } else {
                        Cell::Float(m)
                    }
                })
        } else {
            series
                .value_counts(false)?
                .into_iter()
                .next()
                .map(|(mode, _)| mode)
        };

        if let Some(fill) = fill {
            let cells = series
                .cells()?
                .into_iter()
                .map(|c| if c.is_null() { fill.clone() } else { c })
                .collect();
            filled = filled.with_column(series.name(), cells)?;
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(cols: Vec<(&str, Vec<Cell>)>) -> Frame {
        Frame::from_columns(cols.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
            .unwrap()
    }

    fn numeric_frame(rows: usize) -> Frame {
        frame(vec![
            ("x1", (0..rows as i64).map(Cell::Int).collect()),
            ("label", (0..rows as i64).map(|i| Cell::Int(i % 2)).collect()),
        ])
    }

    #[test]
    fn test_load_from_raw_json_shapes() {
        let dm = DataManager::default();
        let single = dm
            .load_from_raw(&RawData::Json(json!({"a": 1, "b": "x"})))
            .unwrap();
        assert_eq!(single.shape(), (1, 2));

        let many = dm
            .load_from_raw(&RawData::Json(json!([{"a": 1}, {"a": 2}, {"a": 3}])))
            .unwrap();
        assert_eq!(many.shape(), (3, 1));

        assert!(matches!(
            dm.load_from_raw(&RawData::Json(json!("text"))),
            Err(DataError::UnsupportedRawData(_))
        ));
        assert!(matches!(
            dm.load_from_raw(&RawData::Json(json!([1, 2]))),
            Err(DataError::UnsupportedRawData(_))
        ));
    }

    #[test]
    fn test_infer_target_prefers_configured_column() {
        let f = frame(vec![
            ("y", vec![Cell::Int(0)]),
            ("outcome", vec![Cell::Int(1)]),
        ]);
        let auto = DataManager::default();
        assert_eq!(auto.infer_target_column(&f), Some("y".to_string()));

        let configured = DataManager::new(DataConfig {
            target_column: Some("outcome".into()),
            ..Default::default()
        });
        assert_eq!(configured.infer_target_column(&f), Some("outcome".to_string()));

        let absent = DataManager::new(DataConfig {
            target_column: Some("missing".into()),
            ..Default::default()
        });
        assert_eq!(absent.infer_target_column(&f), Some("y".to_string()));
    }

    #[test]
    fn test_target_candidates_are_case_sensitive() {
        let f = frame(vec![("LABEL", vec![Cell::Int(0)])]);
        assert_eq!(DataManager::default().infer_target_column(&f), None);
    }

    #[test]
    fn test_clean_drop_strategy() {
        let f = frame(vec![
            ("a", vec![Cell::Int(1), Cell::Int(1), Cell::Null, Cell::Int(4)]),
            ("b", vec![Cell::Int(1), Cell::Int(1), Cell::Int(3), Cell::Int(4)]),
        ]);
        let dm = DataManager::new(DataConfig {
            missing_strategy: MissingStrategy::Drop,
            drop_columns: vec!["b".into(), "ghost".into()],
            ..Default::default()
        });
        let cleaned = dm.clean_data(&f).unwrap();
        assert_eq!(cleaned.shape(), (2, 1));
    }

    #[test]
    fn test_clean_fill_strategy() {
        let f = frame(vec![
            ("num", vec![Cell::Int(1), Cell::Null, Cell::Int(3), Cell::Int(10)]),
            (
                "cat",
                vec![Cell::from("a"), Cell::from("b"), Cell::Null, Cell::from("b")],
            ),
        ]);
        let dm = DataManager::new(DataConfig {
            missing_strategy: MissingStrategy::Fill,
            ..Default::default()
        });
        let cleaned = dm.clean_data(&f).unwrap();
        assert_eq!(cleaned.column("num").unwrap()[1], Cell::Int(3));
        assert_eq!(cleaned.column("cat").unwrap()[2], Cell::from("b"));
    }

    #[test]
    fn test_infer_column_types() {
        let mut f = numeric_frame(20);
        f = f.with_column("txt", vec![Cell::from("x"); 20]).unwrap();
        let types = DataManager::default().infer_column_types(&f);
        assert_eq!(types["x1"], ColumnKind::Numeric);
        assert_eq!(types["label"], ColumnKind::Numeric);
        assert_eq!(types["txt"], ColumnKind::Categorical);

        let f = numeric_frame(40);
        let types = DataManager::default().infer_column_types(&f);
        assert_eq!(types["label"], ColumnKind::Categorical);
    }

    #[test]
    fn test_validate_thresholds() {
        let dm = DataManager::default();
        let ok = numeric_frame(10);
        assert!(dm.validate_data(&ok, None).is_ok());

        let small = numeric_frame(9);
        assert!(matches!(
            dm.validate_data(&small, None),
            Err(DataError::InsufficientSamples { found: 9, required: 10 })
        ));

        let y = Series::new("y", vec![Cell::Int(0); 3]);
        assert!(matches!(
            dm.validate_data(&ok, Some(&y)),
            Err(DataError::LengthMismatch { features: 10, target: 3 })
        ));
    }

    #[test]
    fn test_prepare_for_ml_splits_target() {
        let dm = DataManager::default();
        let (x, y) = dm.prepare_for_ml(&RawData::Frame(numeric_frame(12))).unwrap();
        assert_eq!(x.column_names(), vec!["x1".to_string()]);
        assert_eq!(y.unwrap().name(), "label");
    }
}
