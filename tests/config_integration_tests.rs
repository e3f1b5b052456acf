//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Loading the shipped configuration
//! - Schema defaults and validation issues
//! - Logger settings derivation
//! - Round-trip of output dir and enabled flags for arbitrary documents

use camino::Utf8PathBuf;
use mlp::ConfigManager;
use mlp::error::ConfigurationError;
use mlp::logging::{LogBackend, LogLevel};
use mlp::models::ScoringConfig;
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn create_test_root() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

fn manifest_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

const MINIMAL: &str = r#"
project:
  name: demo
orchestrators:
  eda:
    enabled: true
"#;

#[test]
fn test_shipped_config_is_valid() {
    let manager = ConfigManager::from_file("conf/config.yaml", manifest_dir());
    let config = manager.load().unwrap();

    assert_eq!(config.project.name, "mlp_demo");
    assert_eq!(config.orchestrators.pipelines.pipelines.len(), 3);
    assert_eq!(config.orchestrators.report.formats, vec!["html", "md"]);
    assert_eq!(config.orchestrators.pipelines.cv.refit.as_deref(), Some("f1"));
}

#[test]
fn test_minimal_document_gets_defaults() {
    let (_temp_dir, root) = create_test_root();
    let config = ConfigManager::from_yaml_str(MINIMAL, &root).load().unwrap();

    assert_eq!(config.project.random_state, 42);
    assert_eq!(config.project.output_dir, "outputs");
    assert!(config.orchestrators.file.is_none());
    assert!(config.orchestrators.data.enabled);
    assert!(config.orchestrators.eda.enabled);
    assert_eq!(config.orchestrators.pipelines.cv.cv_folds, 5);
    assert_eq!(
        config.orchestrators.pipelines.cv.scoring,
        ScoringConfig::Many(vec!["f1".to_string()])
    );
    assert_eq!(config.orchestrators.messages.locale, "fr");
}

#[test]
fn test_missing_project_section_fails() {
    let (_temp_dir, root) = create_test_root();
    let err = ConfigManager::from_yaml_str("orchestrators:\n  eda: {enabled: true}\n", &root)
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::Source(_)));
}

#[test]
fn test_validation_collects_every_issue() {
    let (_temp_dir, root) = create_test_root();
    let yaml = r#"
project:
  name: demo
orchestrators:
  pipelines:
    cv:
      cv_folds: 1
    pipelines:
      - name: twice
        steps:
          estimator: {type: svc}
      - name: twice
        steps:
          estimator: {type: svc}
  report:
    formats: [pdf]
"#;
    let err = ConfigManager::from_yaml_str(yaml, &root).load().unwrap_err();
    let ConfigurationError::Invalid(issues) = err else {
        panic!("expected validation issues");
    };
    assert!(issues.iter().any(|i| i.contains("cv_folds")));
    assert!(issues.iter().any(|i| i.contains("duplicate pipeline name 'twice'")));
    assert!(issues.iter().any(|i| i.contains("pdf")));
}

#[test]
fn test_scoring_accepts_string_or_list() {
    let (_temp_dir, root) = create_test_root();
    let yaml = r#"
project:
  name: demo
orchestrators:
  pipelines:
    cv:
      scoring: accuracy
"#;
    let config = ConfigManager::from_yaml_str(yaml, &root).load().unwrap();
    assert_eq!(
        config.orchestrators.pipelines.cv.scoring,
        ScoringConfig::One("accuracy".to_string())
    );
}

#[test]
fn test_config_file_relative_to_root() {
    let (_temp_dir, root) = create_test_root();
    fs::create_dir_all(root.join("conf")).unwrap();
    fs::write(root.join("conf").join("config.yaml"), MINIMAL).unwrap();

    let manager = ConfigManager::from_file("conf/config.yaml", &root);
    assert_eq!(manager.load().unwrap().project.name, "demo");
}

#[test]
fn test_logger_settings_resolution() {
    let (_temp_dir, root) = create_test_root();
    let yaml = r#"
project:
  name: demo
orchestrators:
  eda: {enabled: true}
logger:
  backend: structlog
  level: debug
  default_fields:
    service: test
"#;
    let manager = ConfigManager::from_yaml_str(yaml, &root);
    let config = manager.load().unwrap();
    let settings = manager.build_logger_settings(&config).unwrap();

    assert_eq!(settings.app_name, "demo");
    assert_eq!(settings.level, LogLevel::Debug);
    assert_eq!(settings.backend, LogBackend::Structured);
    assert_eq!(settings.file_path, Some(root.join("logs").join("app.log")));
    assert_eq!(settings.default_fields["service"], "test");
}

#[test]
fn test_unknown_logger_level_rejected() {
    let (_temp_dir, root) = create_test_root();
    let yaml = concat!(
        "project: {name: demo}\n",
        "orchestrators:\n  eda: {enabled: true}\n",
        "logger: {level: loud}\n",
    );
    let err = ConfigManager::from_yaml_str(yaml, &root).load().unwrap_err();
    assert!(err.to_string().contains("unknown logger level 'loud'"));
}

proptest! {
    #[test]
    fn prop_output_dir_and_flags_round_trip(
        output_dir in "[a-z][a-z0-9_]{0,12}",
        data in any::<bool>(),
        eda in any::<bool>(),
        pipelines in any::<bool>(),
        report in any::<bool>(),
    ) {
        let (_temp_dir, root) = create_test_root();
        let yaml = format!(
            "project:\n  name: demo\n  output_dir: \"{output_dir}\"\n\
             orchestrators:\n  data: {{enabled: {data}}}\n  eda: {{enabled: {eda}}}\n\
             \x20 pipelines: {{enabled: {pipelines}}}\n  report: {{enabled: {report}}}\n"
        );
        let config = ConfigManager::from_yaml_str(&yaml, &root).load().unwrap();

        prop_assert_eq!(&config.project.output_dir, &output_dir);
        prop_assert_eq!(config.orchestrators.data.enabled, data);
        prop_assert_eq!(config.orchestrators.eda.enabled, eda);
        prop_assert_eq!(config.orchestrators.pipelines.enabled, pipelines);
        prop_assert_eq!(config.orchestrators.report.enabled, report);
    }

    #[test]
    fn prop_cv_folds_threshold(folds in 0usize..12) {
        let (_temp_dir, root) = create_test_root();
        let yaml = format!(
            "project: {{name: demo}}\norchestrators:\n  pipelines:\n    cv: {{cv_folds: {folds}}}\n"
        );
        let result = ConfigManager::from_yaml_str(&yaml, &root).load();
        prop_assert_eq!(result.is_ok(), folds >= 2);
    }
}
