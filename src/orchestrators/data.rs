use crate::logging::LogLevel;
use crate::messages::MessageOrchestrator;
use crate::messages::taxonomy::{domain, data as events};
use crate::models::{DataConfig, DataMetadata, DataOutput, Frame, RawData, Series};
use crate::services::{ColumnKind, DataManager};
use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Quick look at raw data before preparation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataAnalysis {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<String>,
    pub column_types: IndexMap<String, ColumnKind>,
    pub missing: IndexMap<String, usize>,
    pub target_column: Option<String>,
}

/// Wraps [`DataManager`] with events and the stage output shape.
#[derive(Debug)]
pub struct DataOrchestrator {
    manager: DataManager,
    messages: Arc<MessageOrchestrator>,
}

impl DataOrchestrator {
    pub fn new(config: &DataConfig, messages: Arc<MessageOrchestrator>) -> Self {
        messages.emit(
            domain::DATA,
            events::INIT,
            LogLevel::Debug,
            json!({
                "target_column": config.target_column,
                "missing_strategy": config.missing_strategy,
            }),
        );
        Self {
            manager: DataManager::new(config.clone()),
            messages,
        }
    }

    pub fn manager(&self) -> &DataManager {
        &self.manager
    }

    pub fn analyze_raw_data(&self, raw: &RawData) -> Result<DataAnalysis> {
        let frame = match self.manager.load_from_raw(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.messages.emit(
                    domain::DATA,
                    events::ANALYSIS_FAILED,
                    LogLevel::Error,
                    json!({"error": e.to_string()}),
                );
                return Err(e.into());
            }
        };
        let (n_rows, n_cols) = frame.shape();
        Ok(DataAnalysis {
            n_rows,
            n_cols,
            columns: frame.column_names(),
            column_types: self.manager.infer_column_types(&frame),
            missing: frame.null_counts(),
            target_column: self.manager.infer_target_column(&frame),
        })
    }

    /// Analyze then prepare: clean, split off the target and validate.
    pub fn process_data(&self, raw: &RawData) -> Result<(Frame, Option<Series>)> {
        self.messages
            .emit(domain::DATA, events::PROCESSING_START, LogLevel::Info, json!({}));

        let analysis = self.analyze_raw_data(raw)?;
        self.messages.emit(
            domain::DATA,
            events::ANALYSIS_COMPLETE,
            LogLevel::Info,
            json!({
                "rows": analysis.n_rows,
                "cols": analysis.n_cols,
                "target_found": analysis.target_column.is_some(),
            }),
        );

        match self.manager.prepare_for_ml(raw) {
            Ok((x, y)) => {
                self.messages.emit(
                    domain::DATA,
                    events::PROCESSING_COMPLETE,
                    LogLevel::Info,
                    json!({
                        "n_samples": x.n_rows(),
                        "n_features": x.n_cols(),
                        "has_target": y.is_some(),
                    }),
                );
                Ok((x, y))
            }
            Err(e) => {
                self.messages.emit(
                    domain::DATA,
                    events::PROCESSING_FAILED,
                    LogLevel::Error,
                    json!({"error": e.to_string()}),
                );
                Err(e.into())
            }
        }
    }

    pub fn run(&self, raw: &RawData) -> Result<DataOutput> {
        let (x, y) = self.process_data(raw)?;
        let metadata = DataMetadata {
            n_features: x.n_cols(),
            n_samples: x.n_rows(),
            has_target: y.is_some(),
            target_column: y.as_ref().map(|s| s.name().to_string()),
            n_classes: y.as_ref().map(Series::nunique),
        };
        Ok(DataOutput { x, y, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::models::{Cell, MissingStrategy};
    use crate::orchestrators::test_messages;

    fn frame(n: usize) -> Frame {
        let mut columns = IndexMap::new();
        columns.insert("x1".to_string(), (0..n).map(|i| Cell::Int(i as i64)).collect());
        columns.insert(
            "x2".to_string(),
            (0..n).map(|i| if i == 3 { Cell::Null } else { Cell::Float(i as f64 * 0.5) }).collect(),
        );
        columns.insert("label".to_string(), (0..n).map(|i| Cell::Int((i % 2) as i64)).collect());
        Frame::from_columns(columns).unwrap()
    }

    #[test]
    fn test_analysis_reports_target_and_missing() {
        let orch = DataOrchestrator::new(&DataConfig::default(), test_messages());
        let analysis = orch.analyze_raw_data(&RawData::Frame(frame(12))).unwrap();
        assert_eq!(analysis.n_rows, 12);
        assert_eq!(analysis.target_column.as_deref(), Some("label"));
        assert_eq!(analysis.missing["x2"], 1);
        assert_eq!(analysis.column_types["x1"], ColumnKind::Numeric);
    }

    #[test]
    fn test_run_builds_metadata() {
        let config = DataConfig {
            missing_strategy: MissingStrategy::Drop,
            ..DataConfig::default()
        };
        let orch = DataOrchestrator::new(&config, test_messages());
        let output = orch.run(&RawData::Frame(frame(12))).unwrap();
        assert_eq!(output.metadata.n_samples, 11);
        assert_eq!(output.metadata.n_features, 2);
        assert_eq!(output.metadata.n_classes, Some(2));
        assert_eq!(output.y.unwrap().name(), "label");
    }

    #[test]
    fn test_too_few_samples_fails() {
        let orch = DataOrchestrator::new(&DataConfig::default(), test_messages());
        let err = orch.run(&RawData::Frame(frame(5))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::InsufficientSamples { found: 5, .. })
        ));
    }

    #[test]
    fn test_unsupported_raw_data() {
        let orch = DataOrchestrator::new(&DataConfig::default(), test_messages());
        assert!(orch.run(&RawData::Json(json!(42))).is_err());
    }
}
