//! End-to-end tests for the stage sequence
//!
//! These tests verify:
//! - Example mode runs every stage and renders both report formats
//! - File mode goes from a CSV drop to a report
//! - Caller-supplied data bypasses intake and keeps its target
//! - A failing pipeline spec leaves the run complete with a report

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use mlp::logging::{LoggerBaseConfig, LoggerManager};
use mlp::models::{Cell, Completion, Frame, RunMode, Series, StageOutcome};
use mlp::{AppConfig, ConfigManager, GeneralOrchestrator, RunInput};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_root() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

fn manifest_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Config with a two-candidate linear SVC grid and shared assets taken from
/// the crate directory. `extra` is spliced into the `orchestrators` section.
fn config_yaml(extra: &str, estimator: &str) -> String {
    let manifest = manifest_dir();
    format!(
        r#"
project:
  name: e2e
  random_state: 3
orchestrators:
{extra}
  eda:
    enabled: true
    profile:
      minimal: true
  pipelines:
    enabled: true
    cv:
      cv_folds: 3
      scoring: [f1, accuracy]
      refit: accuracy
    pipelines:
      - name: linear_svc
        steps:
          preprocess:
            scaler: standard
          estimator:
            type: {estimator}
            params:
              C: [0.5, 1.0]
              kernel: linear
  report:
    formats: [html, md]
    templates_dir: "{templates}"
  messages:
    locale: en
    locales_dir: "{locales}"
"#,
        templates = manifest.join("templates"),
        locales = manifest.join("i18n").join("locales"),
    )
}

fn load(yaml: &str, root: &Utf8PathBuf) -> AppConfig {
    ConfigManager::from_yaml_str(yaml, root).load().unwrap()
}

fn orchestrator(config: &AppConfig, root: &Utf8PathBuf) -> GeneralOrchestrator {
    let manager = Arc::new(LoggerManager::new(LoggerBaseConfig::default()));
    GeneralOrchestrator::new(config, root, manager).unwrap()
}

#[test]
fn test_example_mode_runs_every_stage() {
    let (_temp_dir, root) = create_test_root();
    let config = load(&config_yaml("", "svc"), &root);
    let orch = orchestrator(&config, &root);

    let outcome = orch.run(RunInput::Auto);
    assert_eq!(outcome.mode, RunMode::Example);
    assert_eq!(outcome.completion, Completion::Complete);

    let pipelines = outcome.pipelines.as_ref().and_then(StageOutcome::completed).unwrap();
    assert_eq!(pipelines.results.len(), 1);
    let result = &pipelines.results[0];
    assert_eq!(result.name, "linear_svc");
    assert_eq!(result.refit_metric, "accuracy");
    assert!(result.cv_results_path.starts_with(orch.project_dir().join("pipelines")));
    assert!(result.cv_results_path.exists());

    let report = outcome.report.as_ref().and_then(StageOutcome::completed).unwrap();
    assert_eq!(report.artifacts.len(), 2);
    let md = fs::read_to_string(&report.artifacts[1]).unwrap();
    assert!(md.contains("| linear_svc | grid | accuracy |"));

    let summary = outcome.summary();
    assert_eq!(summary["completion"], "complete");
    assert_eq!(summary["stages"]["file"]["status"], "skipped");
    assert_eq!(summary["report_artifacts"].as_array().unwrap().len(), 2);
}

#[test]
fn test_file_mode_from_csv_drop() {
    let (_temp_dir, root) = create_test_root();
    let extra = "  file:\n    enabled: true\n  data:\n    target_column: label\n";
    let config = load(&config_yaml(extra, "svc"), &root);
    let orch = orchestrator(&config, &root);

    let in_dir = root.join("data").join("in");
    fs::create_dir_all(&in_dir).unwrap();
    let mut csv = String::from("f1,f2,label\n");
    for i in 0..24 {
        let label = i % 2;
        let shift = if label == 1 { 5.0 } else { 0.0 };
        let (a, b) = (shift + i as f64 * 0.1, shift - i as f64 * 0.05);
        csv.push_str(&format!("{},{},{}\n", a, b, label));
    }
    fs::write(in_dir.join("train.csv"), csv).unwrap();

    let outcome = orch.run(RunInput::Auto);
    assert_eq!(outcome.mode, RunMode::File);
    assert_eq!(outcome.completion, Completion::Complete);

    let file = outcome.file.as_ref().and_then(StageOutcome::completed).unwrap();
    assert!(file.found);
    assert!(file.saved_copy.as_ref().unwrap().exists());

    let data = outcome.data.as_ref().and_then(StageOutcome::completed).unwrap();
    assert_eq!(data.metadata.target_column.as_deref(), Some("label"));
    assert_eq!(data.metadata.n_features, 2);
    assert_eq!(data.metadata.n_samples, 24);

    let pipelines = outcome.pipelines.as_ref().and_then(StageOutcome::completed).unwrap();
    assert!(pipelines.results[0].best_score >= 0.9);
    assert!(outcome.report.as_ref().unwrap().completed().is_some());
}

#[test]
fn test_supplied_data_keeps_target() {
    let (_temp_dir, root) = create_test_root();
    let config = load(&config_yaml("", "svc"), &root);
    let orch = orchestrator(&config, &root);

    let mut columns = IndexMap::new();
    columns.insert(
        "x".to_string(),
        (0..30)
            .map(|i| {
                let sign = if i % 2 == 0 { -1.0 } else { 1.0 };
                Cell::Float(sign * (1.0 + i as f64 / 30.0))
            })
            .collect(),
    );
    let x = Frame::from_columns(columns).unwrap();
    let y = Series::new("y", (0..30).map(|i| Cell::Int(i % 2)).collect());

    let outcome = orch.run(RunInput::Data { x, y: Some(y) });
    assert_eq!(outcome.mode, RunMode::Data);
    assert_eq!(outcome.completion, Completion::Complete);
    let data = outcome.data.as_ref().and_then(StageOutcome::completed).unwrap();
    assert!(data.metadata.has_target);
    assert_eq!(data.metadata.n_classes, Some(2));
    assert!(outcome.pipelines.as_ref().unwrap().completed().is_some());
}

#[test]
fn test_failing_spec_still_reports() {
    let (_temp_dir, root) = create_test_root();
    let config = load(&config_yaml("", "gradient_boosting"), &root);
    let orch = orchestrator(&config, &root);

    let outcome = orch.run(RunInput::Auto);
    assert_eq!(outcome.completion, Completion::Complete);
    match outcome.pipelines.as_ref().unwrap() {
        StageOutcome::Failed(failure) => {
            assert_eq!(failure.stage, "pipelines");
            assert!(format!("{:#}", failure.error).contains("gradient_boosting"));
        }
        StageOutcome::Completed(_) => panic!("unknown estimator should fail the stage"),
    }
    assert!(outcome.eda.as_ref().unwrap().completed().is_some());
    assert_eq!(
        outcome.report.as_ref().and_then(StageOutcome::completed).unwrap().artifacts.len(),
        2
    );
}
