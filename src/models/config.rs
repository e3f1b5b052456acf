use crate::models::pipeline_spec::PipelineSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root validated configuration.
///
/// Loaded by [`ConfigManager`](crate::config::ConfigManager); must validate
/// before any orchestrator runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub project: ProjectConfig,

    pub orchestrators: OrchestratorsConfig,

    #[serde(default)]
    pub logger: LoggerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,

    #[serde(default = "default_random_state")]
    pub random_state: u64,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_random_state() -> u64 {
    42
}

fn default_output_dir() -> String {
    "outputs".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorsConfig {
    /// Optional: projects without file intake simply omit the section.
    #[serde(default)]
    pub file: Option<FileConfig>,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub eda: EdaConfig,

    #[serde(default)]
    pub pipelines: PipelinesConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_in_dir")]
    pub in_dir: String,

    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_true")]
    pub save_input_file: bool,

    #[serde(default)]
    pub save_input_file_compression: bool,

    /// Remove the uncompressed copy once the gzip archive is complete.
    #[serde(default = "default_true")]
    pub delete_uncompressed: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: default_data_dir(),
            in_dir: default_in_dir(),
            out_dir: default_out_dir(),
            extensions: default_extensions(),
            save_input_file: true,
            save_input_file_compression: false,
            delete_uncompressed: true,
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_in_dir() -> String {
    "in".to_string()
}

fn default_out_dir() -> String {
    "out".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".csv".to_string(), ".xlsx".to_string(), ".json".to_string()]
}

/// Missing-value policy applied by the data stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingStrategy {
    /// Leave missing values as they are.
    #[default]
    Auto,
    /// Drop every row holding a missing value.
    Drop,
    /// Median for numeric columns, mode for the others.
    Fill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub target_column: Option<String>,

    #[serde(default)]
    pub missing_strategy: MissingStrategy,

    #[serde(default)]
    pub drop_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_column: None,
            missing_strategy: MissingStrategy::Auto,
            drop_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub minimal: bool,

    #[serde(default = "default_profile_title")]
    pub title: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            minimal: false,
            title: default_profile_title(),
        }
    }
}

fn default_profile_title() -> String {
    "EDA Profile".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub profile: ProfileConfig,
}

impl Default for EdaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            profile: ProfileConfig::default(),
        }
    }
}

/// Scoring as written in config: one metric name or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoringConfig {
    One(String),
    Many(Vec<String>),
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig::Many(vec!["f1".to_string()])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvConfig {
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Explicit refit metric; overrides whatever the scoring list implies.
    #[serde(default)]
    pub refit: Option<String>,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            cv_folds: default_cv_folds(),
            scoring: ScoringConfig::default(),
            refit: None,
        }
    }
}

fn default_cv_folds() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_experiment")]
    pub experiment: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            experiment: default_experiment(),
        }
    }
}

fn default_experiment() -> String {
    "mlp-experiments".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub cv: CvConfig,

    #[serde(default)]
    pub pipelines: Vec<PipelineSpec>,

    #[serde(default)]
    pub tracking: TrackingConfig,
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cv: CvConfig::default(),
            pipelines: Vec::new(),
            tracking: TrackingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            formats: default_formats(),
            templates_dir: default_templates_dir(),
        }
    }
}

fn default_formats() -> Vec<String> {
    vec!["html".to_string()]
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

pub const SUPPORTED_REPORT_FORMATS: [&str; 2] = ["html", "md"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_locales_dir")]
    pub locales_dir: String,

    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: default_locale(),
            locales_dir: default_locales_dir(),
            domains: default_domains(),
        }
    }
}

fn default_locale() -> String {
    "fr".to_string()
}

fn default_locales_dir() -> String {
    "i18n/locales".to_string()
}

fn default_domains() -> Vec<String> {
    ["general", "config", "file", "data", "eda", "pipelines", "report"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

/// Logger section as written in config. Resolved into a
/// [`LoggerBaseConfig`](crate::logging::LoggerBaseConfig) by the config manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerSettings {
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json_mode: bool,

    #[serde(default)]
    pub file_path: Option<String>,

    #[serde(default = "default_file_max_bytes")]
    pub file_max_bytes: u64,

    #[serde(default = "default_file_backup_count")]
    pub file_backup_count: usize,

    #[serde(default)]
    pub default_fields: IndexMap<String, serde_json::Value>,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            app_name: None,
            level: default_level(),
            json_mode: false,
            file_path: None,
            file_max_bytes: default_file_max_bytes(),
            file_backup_count: default_file_backup_count(),
            default_fields: IndexMap::new(),
        }
    }
}

fn default_backend() -> String {
    "basic".to_string()
}

fn default_level() -> String {
    "INFO".to_string()
}

fn default_file_max_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_file_backup_count() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Semantic checks serde cannot express. Returns every issue found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.project.name.trim().is_empty() {
            issues.push("project.name must not be empty".to_string());
        }

        if let Some(file) = &self.orchestrators.file {
            if file.extensions.is_empty() {
                issues.push("orchestrators.file.extensions must not be empty".to_string());
            }
        }

        let pipelines = &self.orchestrators.pipelines;
        if pipelines.cv.cv_folds < 2 {
            issues.push(format!(
                "orchestrators.pipelines.cv.cv_folds must be >= 2 (got {})",
                pipelines.cv.cv_folds
            ));
        }

        let mut seen = HashSet::new();
        for spec in &pipelines.pipelines {
            if !seen.insert(spec.name.as_str()) {
                issues.push(format!("duplicate pipeline name '{}'", spec.name));
            }
            match (&spec.steps, &spec.automl) {
                (Some(_), Some(_)) => issues.push(format!(
                    "pipeline '{}' declares both steps and automl",
                    spec.name
                )),
                (None, None) => issues.push(format!(
                    "pipeline '{}' declares neither steps nor automl",
                    spec.name
                )),
                _ => {}
            }
        }

        for format in &self.orchestrators.report.formats {
            if !SUPPORTED_REPORT_FORMATS.contains(&format.as_str()) {
                issues.push(format!("unsupported report format '{}'", format));
            }
        }

        if crate::logging::LogLevel::parse(&self.logger.level).is_none() {
            issues.push(format!("unknown logger level '{}'", self.logger.level));
        }
        if crate::logging::LogBackend::parse(&self.logger.backend).is_none() {
            issues.push(format!("unknown logger backend '{}'", self.logger.backend));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pipeline_spec::{AutoMlConfig, StepsConfig};

    fn minimal() -> AppConfig {
        serde_yaml_ng::from_str(
            r#"
project:
  name: demo
orchestrators: {}
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = minimal();
        assert_eq!(cfg.project.random_state, 42);
        assert_eq!(cfg.project.output_dir, "outputs");
        assert!(cfg.orchestrators.file.is_none());
        assert!(cfg.orchestrators.eda.enabled);
        assert_eq!(cfg.orchestrators.pipelines.cv.cv_folds, 5);
        assert_eq!(cfg.orchestrators.report.formats, vec!["html"]);
        assert_eq!(cfg.orchestrators.messages.locale, "fr");
        assert_eq!(cfg.logger.file_max_bytes, 5 * 1024 * 1024);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn test_scoring_accepts_string_or_list() {
        let one: CvConfig = serde_yaml_ng::from_str("scoring: accuracy").unwrap();
        assert_eq!(one.scoring, ScoringConfig::One("accuracy".into()));
        let many: CvConfig = serde_yaml_ng::from_str("scoring: [f1, accuracy]").unwrap();
        assert_eq!(
            many.scoring,
            ScoringConfig::Many(vec!["f1".into(), "accuracy".into()])
        );
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let mut cfg = minimal();
        cfg.project.name = " ".into();
        cfg.orchestrators.pipelines.cv.cv_folds = 1;
        cfg.orchestrators.report.formats = vec!["pdf".into()];
        cfg.logger.level = "LOUD".into();
        let issues = cfg.validate();
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn test_validate_pipeline_specs() {
        let mut cfg = minimal();
        let both = PipelineSpec {
            name: "a".into(),
            steps: Some(StepsConfig::default()),
            automl: Some(AutoMlConfig::new("tpot")),
        };
        let dup = PipelineSpec::classic("a", StepsConfig::default());
        let neither = PipelineSpec {
            name: "b".into(),
            steps: None,
            automl: None,
        };
        cfg.orchestrators.pipelines.pipelines = vec![both, dup, neither];
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.contains("both")));
        assert!(issues.iter().any(|i| i.contains("duplicate")));
        assert!(issues.iter().any(|i| i.contains("neither")));
    }

    #[test]
    fn test_missing_strategy_lowercase() {
        let cfg: DataConfig = serde_yaml_ng::from_str("missing_strategy: fill").unwrap();
        assert_eq!(cfg.missing_strategy, MissingStrategy::Fill);
    }
}
