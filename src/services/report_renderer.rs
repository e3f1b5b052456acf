use crate::error::ReportError;
use crate::models::{EdaFlags, EdaOutput, EdaSummary, ReportOutput, RunResult};
use camino::{Utf8Path, Utf8PathBuf};
use minijinja::{AutoEscape, Environment, path_loader};
use serde::Serialize;
use std::fs;

pub const HTML_TEMPLATE: &str = "report.html.jinja";
pub const MD_TEMPLATE: &str = "report.md.jinja";

#[derive(Debug, Clone, Serialize)]
pub struct EdaContext {
    pub summary: Option<EdaSummary>,
    pub flags: Option<EdaFlags>,
    pub profile_path: Option<String>,
}

impl EdaContext {
    pub fn from_output(eda: Option<&EdaOutput>) -> Self {
        match eda {
            Some(eda) => Self {
                summary: Some(eda.summary.clone()),
                flags: Some(eda.flags),
                profile_path: Some(eda.profile_html.to_string()),
            },
            None => Self {
                summary: None,
                flags: None,
                profile_path: None,
            },
        }
    }
}

/// Normalized context every report template receives.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub project_name: String,
    pub generated_at: String,
    pub eda: EdaContext,
    pub results: Vec<RunResult>,
}

/// Renders report templates from a directory, one artifact per format.
///
/// `*.html.jinja` templates are HTML-escaped, everything else is rendered
/// verbatim.
pub struct ReportRenderer {
    env: Environment<'static>,
    templates_dir: Utf8PathBuf,
}

impl ReportRenderer {
    pub fn new(templates_dir: impl AsRef<Utf8Path>) -> Self {
        let templates_dir = templates_dir.as_ref().to_path_buf();
        let mut env = Environment::new();
        env.set_loader(path_loader(templates_dir.as_std_path()));
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|name| {
            if name.ends_with(".html.jinja") || name.ends_with(".html") {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });
        Self { env, templates_dir }
    }

    pub fn templates_dir(&self) -> &Utf8Path {
        &self.templates_dir
    }

    pub fn build_context(
        &self,
        project_name: &str,
        eda: Option<&EdaOutput>,
        results: &[RunResult],
    ) -> ReportContext {
        ReportContext {
            project_name: project_name.to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            eda: EdaContext::from_output(eda),
            results: results.to_vec(),
        }
    }

    /// Render every requested format into `out_dir/report_<id>.<ext>`.
    ///
    /// All artifacts of one call share an 8-character report id. Unknown
    /// formats are skipped; a missing template fails the whole render.
    pub fn render(
        &self,
        out_dir: &Utf8Path,
        project_name: &str,
        formats: &[String],
        eda: Option<&EdaOutput>,
        results: &[RunResult],
    ) -> Result<ReportOutput, ReportError> {
        fs::create_dir_all(out_dir)?;
        let report_id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let context = self.build_context(project_name, eda, results);

        let mut artifacts = Vec::new();
        let mut rendered: Vec<&str> = Vec::new();
        for format in formats {
            let (template_name, ext) = match format.as_str() {
                "html" => (HTML_TEMPLATE, "html"),
                "md" => (MD_TEMPLATE, "md"),
                other => {
                    tracing::warn!("Skipping unsupported report format '{}'", other);
                    continue;
                }
            };
            if rendered.contains(&ext) {
                continue;
            }
            let body = self.env.get_template(template_name)?.render(&context)?;
            let path = out_dir.join(format!("report_{}.{}", report_id, ext));
            fs::write(&path, body)?;
            tracing::debug!("Rendered {} report to {}", ext, path);
            rendered.push(ext);
            artifacts.push(path);
        }

        Ok(ReportOutput {
            report_id,
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn templates(dir: &Utf8Path) {
        fs::write(
            dir.join("base.html.jinja"),
            "<html><body>{% block content %}{% endblock %}</body></html>",
        )
        .unwrap();
        fs::write(
            dir.join(HTML_TEMPLATE),
            concat!(
                "{% extends \"base.html.jinja\" %}",
                "{% block content %}<h1>{{ project_name }}</h1>{% endblock %}",
            ),
        )
        .unwrap();
        fs::write(dir.join(MD_TEMPLATE), "# {{ project_name }}\n").unwrap();
    }

    fn root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_html_is_escaped_markdown_is_not() {
        let (_dir, root) = root();
        templates(&root);
        let renderer = ReportRenderer::new(&root);
        let out = renderer
            .render(
                &root.join("reports"),
                "a<b>",
                &["html".to_string(), "md".to_string()],
                None,
                &[],
            )
            .unwrap();

        assert_eq!(out.report_id.len(), 8);
        let html = fs::read_to_string(&out.artifacts[0]).unwrap();
        let md = fs::read_to_string(&out.artifacts[1]).unwrap();
        assert!(html.contains("<h1>a&lt;b&gt;</h1>"));
        assert_eq!(md, "# a<b>\n");
    }

    #[test]
    fn test_unknown_format_skipped() {
        let (_dir, root) = root();
        templates(&root);
        let out = ReportRenderer::new(&root)
            .render(&root.join("r"), "p", &["pdf".to_string(), "md".to_string()], None, &[])
            .unwrap();
        assert_eq!(out.artifacts.len(), 1);
    }

    #[test]
    fn test_missing_template_fails() {
        let (_dir, root) = root();
        let err = ReportRenderer::new(&root)
            .render(&root.join("r"), "p", &["html".to_string()], None, &[])
            .unwrap_err();
        assert!(matches!(err, ReportError::Template(_)));
    }
}
