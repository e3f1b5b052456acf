use crate::logging::LogLevel;
use crate::messages::MessageOrchestrator;
use crate::messages::taxonomy::{domain, report as events};
use crate::models::{EdaOutput, ReportConfig, ReportOutput, RunResult};
use crate::services::ReportRenderer;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::sync::Arc;

pub struct ReportOrchestrator {
    config: ReportConfig,
    renderer: ReportRenderer,
    out_dir: Utf8PathBuf,
    project_name: String,
    messages: Arc<MessageOrchestrator>,
}

impl ReportOrchestrator {
    /// # Arguments
    /// * `templates_dir` - Resolved templates directory
    /// * `out_dir` - Directory receiving `report_<id>.<ext>` files
    pub fn new(
        config: &ReportConfig,
        templates_dir: impl AsRef<Utf8Path>,
        out_dir: impl AsRef<Utf8Path>,
        project_name: &str,
        messages: Arc<MessageOrchestrator>,
    ) -> Self {
        Self {
            config: config.clone(),
            renderer: ReportRenderer::new(templates_dir),
            out_dir: out_dir.as_ref().to_path_buf(),
            project_name: project_name.to_string(),
            messages,
        }
    }

    /// Render every configured format. Either input may be empty.
    pub fn run(&self, eda: Option<&EdaOutput>, results: &[RunResult]) -> Result<ReportOutput> {
        self.messages.emit(
            domain::REPORT,
            events::START,
            LogLevel::Info,
            json!({
                "formats": self.config.formats,
                "has_eda": eda.is_some(),
                "n_results": results.len(),
            }),
        );

        let output = self
            .renderer
            .render(&self.out_dir, &self.project_name, &self.config.formats, eda, results)
            .with_context(|| {
                format!("Failed to render report from {}", self.renderer.templates_dir())
            })?;

        self.messages.emit(
            domain::REPORT,
            events::DONE,
            LogLevel::Info,
            json!({"report_id": output.report_id, "artifacts": output.artifacts}),
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::orchestrators::test_messages;
    use tempfile::TempDir;

    #[test]
    fn test_missing_templates_fail() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let orch = ReportOrchestrator::new(
            &ReportConfig::default(),
            root.join("no_templates"),
            root.join("reports"),
            "demo",
            test_messages(),
        );
        let err = orch.run(None, &[]).unwrap_err();
        assert!(err.downcast_ref::<ReportError>().is_some());
    }

    #[test]
    fn test_renders_with_empty_inputs() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("templates")).unwrap();
        std::fs::write(
            root.join("templates").join("report.html.jinja"),
            "<h1>{{ project_name }}</h1>{% if not eda.summary %}no eda{% endif %}",
        )
        .unwrap();
        let orch = ReportOrchestrator::new(
            &ReportConfig::default(),
            root.join("templates"),
            root.join("reports"),
            "demo",
            test_messages(),
        );
        let output = orch.run(None, &[]).unwrap();
        assert_eq!(output.artifacts.len(), 1);
        let body = std::fs::read_to_string(&output.artifacts[0]).unwrap();
        assert_eq!(body, "<h1>demo</h1>no eda");
    }
}
