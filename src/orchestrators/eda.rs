use crate::logging::LogLevel;
use crate::messages::MessageOrchestrator;
use crate::messages::taxonomy::{domain, eda as events};
use crate::models::{EdaConfig, EdaOutput, Frame, Series};
use crate::services::{EdaProfiler, EdaSummarizer};
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::sync::Arc;

/// Column name the target gets in the profiled frame.
pub const TARGET_COLUMN: &str = "target";

#[derive(Debug)]
pub struct EdaOrchestrator {
    config: EdaConfig,
    out_dir: Utf8PathBuf,
    messages: Arc<MessageOrchestrator>,
}

impl EdaOrchestrator {
    pub fn new(
        config: &EdaConfig,
        out_dir: impl AsRef<Utf8Path>,
        messages: Arc<MessageOrchestrator>,
    ) -> Self {
        Self {
            config: config.clone(),
            out_dir: out_dir.as_ref().to_path_buf(),
            messages,
        }
    }

    /// Write the HTML profile and the JSON summary, both always.
    pub fn run(&self, x: &Frame, y: Option<&Series>) -> Result<EdaOutput> {
        self.messages.emit(
            domain::EDA,
            events::START,
            LogLevel::Info,
            json!({
                "n_samples": x.n_rows(),
                "n_features": x.n_cols(),
                "minimal": self.config.profile.minimal,
            }),
        );

        let profiled = match y {
            Some(y) if !x.has_column(TARGET_COLUMN) => {
                x.clone().with_series(y.clone().with_name(TARGET_COLUMN))?
            }
            Some(y) => {
                let name = format!("{}_{}", TARGET_COLUMN, y.name());
                x.clone().with_series(y.clone().with_name(&name))?
            }
            None => x.clone(),
        };
        let profile_html = EdaProfiler::generate_profile(
            &profiled,
            &self.out_dir,
            self.config.profile.minimal,
            &self.config.profile.title,
        )?;
        let (summary_json, summary, flags) = EdaSummarizer::summarize(x, y, &self.out_dir)?;

        self.messages.emit(
            domain::EDA,
            events::DONE,
            LogLevel::Info,
            json!({"profile": profile_html, "summary": summary_json, "flags": flags}),
        );

        Ok(EdaOutput {
            profile_html,
            summary_json,
            summary,
            flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use crate::orchestrators::test_messages;
    use indexmap::IndexMap;
    use tempfile::TempDir;

    #[test]
    fn test_run_writes_both_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = Utf8PathBuf::try_from(temp_dir.path().join("eda")).unwrap();
        let orch = EdaOrchestrator::new(&EdaConfig::default(), &out_dir, test_messages());

        let mut columns = IndexMap::new();
        columns.insert("a".to_string(), (0..20).map(|i| Cell::Float(i as f64)).collect());
        let x = Frame::from_columns(columns).unwrap();
        let y = Series::new("label", (0..20).map(|i| Cell::Int(i % 2)).collect());

        let output = orch.run(&x, Some(&y)).unwrap();
        assert!(output.profile_html.exists());
        assert!(output.summary_json.exists());
        assert_eq!(output.summary.shape.n_features, 1);
        assert!(!output.flags.class_imbalance);

        let html = std::fs::read_to_string(&output.profile_html).unwrap();
        assert!(html.contains(TARGET_COLUMN));
    }

    #[test]
    fn test_run_without_target() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let orch = EdaOrchestrator::new(&EdaConfig::default(), &out_dir, test_messages());
        let mut columns = IndexMap::new();
        columns.insert("a".to_string(), vec![Cell::Int(1), Cell::Int(2)]);
        let output = orch.run(&Frame::from_columns(columns).unwrap(), None).unwrap();
        assert!(output.summary.y_distribution.is_none());
    }
}
