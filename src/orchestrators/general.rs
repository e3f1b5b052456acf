use crate::config::resolve_against;
use crate::logging::{LogLevel, LoggerManager};
use crate::messages::MessageOrchestrator;
use crate::messages::taxonomy::{config as config_events, domain, general as events};
use crate::metrics::RunMetrics;
use crate::models::{
    AppConfig, Completion, DataMetadata, DataOutput, Frame, RawData, RunMode, RunOutcome, Series,
    StageFailure, StageOutcome,
};
use crate::orchestrators::{
    DataOrchestrator, EDA_DIR, EdaOrchestrator, FileOrchestrator, PIPELINES_DIR,
    PipelineOrchestrator, REPORTS_DIR, ReportOrchestrator,
};
use crate::services::example_dataset;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

/// Column holding the label in the bundled example dataset.
const EXAMPLE_TARGET: &str = "target";

/// What a run starts from.
#[derive(Debug, Clone, Default)]
pub enum RunInput {
    /// File intake when enabled, the example dataset otherwise.
    #[default]
    Auto,
    /// Prepared features and optional target, bypassing file and data stages.
    Data { x: Frame, y: Option<Series> },
}

/// Top-level sequencer for File -> Data -> EDA -> Pipelines -> Report.
///
/// Every stage runs behind a boundary that turns its error into a
/// [`StageFailure`]. A failure in the file-mode prefix ends the run as
/// [`Completion::Partial`]; failures in EDA or pipelines never prevent the
/// report from being attempted.
pub struct GeneralOrchestrator {
    config: AppConfig,
    project_root: Utf8PathBuf,
    project_dir: Utf8PathBuf,
    messages: Arc<MessageOrchestrator>,
}

impl GeneralOrchestrator {
    /// Create `<output_dir>/<project>` and the shared message emitter.
    ///
    /// # Arguments
    /// * `config` - Validated application configuration
    /// * `project_root` - Directory relative config paths resolve against
    /// * `logger_manager` - Shared logger manager, configured on first use
    ///
    /// # Errors
    /// Fails when the project output directory cannot be created.
    pub fn new(
        config: &AppConfig,
        project_root: impl AsRef<Utf8Path>,
        logger_manager: Arc<LoggerManager>,
    ) -> Result<Self> {
        let project_root = project_root.as_ref().to_path_buf();
        let project_dir =
            resolve_against(&project_root, &config.project.output_dir).join(&config.project.name);
        fs::create_dir_all(&project_dir)
            .with_context(|| format!("Failed to create project directory: {}", project_dir))?;

        let messages_config = &config.orchestrators.messages;
        let messages = Arc::new(MessageOrchestrator::new(
            messages_config,
            resolve_against(&project_root, &messages_config.locales_dir),
            &logger_manager,
        ));
        messages.emit(
            domain::CONFIG,
            config_events::READY,
            LogLevel::Debug,
            json!({"project": config.project.name}),
        );
        messages.run();
        messages.emit(
            domain::GENERAL,
            events::INIT,
            LogLevel::Info,
            json!({"project_dir": project_dir}),
        );

        Ok(Self {
            config: config.clone(),
            project_root,
            project_dir,
            messages,
        })
    }

    pub fn project_dir(&self) -> &Utf8Path {
        &self.project_dir
    }

    /// Pick the run mode and drive every enabled stage.
    ///
    /// File mode wins when file intake is enabled and no data was given;
    /// given data runs directly; otherwise the seeded example dataset is
    /// used.
    pub fn run(&self, input: RunInput) -> RunOutcome {
        let metrics = RunMetrics::new();
        let file_enabled = self
            .config
            .orchestrators
            .file
            .as_ref()
            .is_some_and(|f| f.enabled);

        let outcome = match input {
            RunInput::Auto if file_enabled => self.run_from_files(&metrics),
            RunInput::Data { x, y } => {
                self.messages.emit(
                    domain::GENERAL,
                    events::START_FROM_DATA,
                    LogLevel::Info,
                    json!({"shape": [x.n_rows(), x.n_cols()]}),
                );
                self.run_from_data(RunMode::Data, x, y, &metrics)
            }
            RunInput::Auto => {
                self.messages
                    .emit(domain::GENERAL, events::USING_EXAMPLE_DATA, LogLevel::Info, json!({}));
                let frame = example_dataset(self.config.project.random_state);
                match frame.split_target(EXAMPLE_TARGET) {
                    Ok((x, y)) => self.run_from_data(RunMode::Example, x, Some(y), &metrics),
                    Err(e) => {
                        let mut outcome = RunOutcome::new(RunMode::Example);
                        outcome.data = Some(self.failed(
                            "data",
                            events::DATA_ORCH_FAILED,
                            e.into(),
                            &metrics,
                        ));
                        outcome.completion = Completion::Partial;
                        outcome
                    }
                }
            }
        };

        metrics.log_summary();
        outcome
    }

    fn run_from_files(&self, metrics: &RunMetrics) -> RunOutcome {
        let mut outcome = RunOutcome::new(RunMode::File);
        self.messages
            .emit(domain::GENERAL, events::START_FROM_FILES, LogLevel::Info, json!({}));

        let Some(file_config) = self.config.orchestrators.file.as_ref() else {
            outcome.completion = Completion::Partial;
            return outcome;
        };

        let file_stage = self.stage("file", events::FILE_ORCH_FAILED, metrics, || {
            FileOrchestrator::new(file_config, &self.project_root, Arc::clone(&self.messages))?
                .process_input()
        });
        let frame = match &file_stage {
            StageOutcome::Completed(output) => output.data.clone(),
            StageOutcome::Failed(_) => None,
        };
        let file_failed = file_stage.is_failed();
        outcome.file = Some(file_stage);

        let Some(frame) = frame else {
            if !file_failed {
                self.messages.emit(
                    domain::GENERAL,
                    events::NO_INPUT_FILES_FOUND,
                    LogLevel::Warn,
                    json!({}),
                );
            }
            outcome.completion = Completion::Partial;
            return outcome;
        };

        let data_config = &self.config.orchestrators.data;
        let (x, y) = if data_config.enabled {
            let data_stage = self.stage("data", events::DATA_ORCH_FAILED, metrics, || {
                DataOrchestrator::new(data_config, Arc::clone(&self.messages))
                    .run(&RawData::Frame(frame))
            });
            let prepared = data_stage.completed().map(|d| (d.x.clone(), d.y.clone()));
            outcome.data = Some(data_stage);
            match prepared {
                Some(prepared) => prepared,
                None => {
                    outcome.completion = Completion::Partial;
                    return outcome;
                }
            }
        } else if frame.n_cols() == 0 {
            metrics.record_stage_skipped();
            self.messages.emit(
                domain::GENERAL,
                events::DATA_ORCH_DISABLED_NOT_FRAME,
                LogLevel::Error,
                json!({"rows": frame.n_rows()}),
            );
            outcome.completion = Completion::Partial;
            return outcome;
        } else {
            metrics.record_stage_skipped();
            (frame, None)
        };

        self.run_ml_stages(&x, y.as_ref(), &mut outcome, metrics);
        outcome
    }

    fn run_from_data(
        &self,
        mode: RunMode,
        x: Frame,
        y: Option<Series>,
        metrics: &RunMetrics,
    ) -> RunOutcome {
        let mut outcome = RunOutcome::new(mode);
        let metadata = DataMetadata {
            n_features: x.n_cols(),
            n_samples: x.n_rows(),
            has_target: y.is_some(),
            target_column: y.as_ref().map(|s| s.name().to_string()),
            n_classes: y.as_ref().map(Series::nunique),
        };
        outcome.data = Some(StageOutcome::Completed(DataOutput {
            x: x.clone(),
            y: y.clone(),
            metadata,
        }));

        self.run_ml_stages(&x, y.as_ref(), &mut outcome, metrics);
        outcome
    }

    fn run_ml_stages(
        &self,
        x: &Frame,
        y: Option<&Series>,
        outcome: &mut RunOutcome,
        metrics: &RunMetrics,
    ) {
        let orchestrators = &self.config.orchestrators;

        if orchestrators.eda.enabled {
            outcome.eda = Some(self.stage("eda", events::EDA_ORCH_FAILED, metrics, || {
                EdaOrchestrator::new(
                    &orchestrators.eda,
                    self.project_dir.join(EDA_DIR),
                    Arc::clone(&self.messages),
                )
                .run(x, y)
            }));
        } else {
            metrics.record_stage_skipped();
        }

        match (orchestrators.pipelines.enabled, y) {
            (true, Some(y)) => {
                let stage = self.stage("pipelines", events::PIPES_ORCH_FAILED, metrics, || {
                    PipelineOrchestrator::with_default_evaluator(
                        &orchestrators.pipelines,
                        self.project_dir.join(PIPELINES_DIR),
                        self.config.project.random_state,
                        Arc::clone(&self.messages),
                    )
                    .run(x, y)
                });
                if let Some(output) = stage.completed() {
                    metrics.record_pipelines_evaluated(output.results.len());
                }
                outcome.pipelines = Some(stage);
            }
            (true, None) => {
                metrics.record_stage_skipped();
                self.messages.emit(
                    domain::GENERAL,
                    events::PIPES_SKIPPED_NO_TARGET,
                    LogLevel::Warn,
                    json!({}),
                );
            }
            (false, _) => metrics.record_stage_skipped(),
        }

        if orchestrators.report.enabled {
            let eda = outcome.eda.as_ref().and_then(StageOutcome::completed);
            let results = outcome
                .pipelines
                .as_ref()
                .and_then(StageOutcome::completed)
                .map(|p| p.results.as_slice())
                .unwrap_or(&[]);
            let stage = self.stage("report", events::REPORT_ORCH_FAILED, metrics, || {
                ReportOrchestrator::new(
                    &orchestrators.report,
                    resolve_against(&self.project_root, &orchestrators.report.templates_dir),
                    self.project_dir.join(REPORTS_DIR),
                    &self.config.project.name,
                    Arc::clone(&self.messages),
                )
                .run(eda, results)
            });
            outcome.report = Some(stage);
        } else {
            metrics.record_stage_skipped();
        }

        let artifacts = outcome
            .report
            .as_ref()
            .and_then(StageOutcome::completed)
            .map(|r| r.artifacts.clone());
        self.messages.emit(
            domain::GENERAL,
            events::DONE,
            LogLevel::Info,
            json!({"report_artifacts": artifacts}),
        );
    }

    /// Run `f` behind a stage boundary, timing it and recording the outcome.
    fn stage<T>(
        &self,
        name: &'static str,
        failed_event: &str,
        metrics: &RunMetrics,
        f: impl FnOnce() -> Result<T>,
    ) -> StageOutcome<T> {
        let started = Instant::now();
        let result = f();
        metrics.record_stage_time(name, started.elapsed());
        match result {
            Ok(value) => {
                metrics.record_stage_completed();
                StageOutcome::Completed(value)
            }
            Err(error) => self.failed(name, failed_event, error, metrics),
        }
    }

    fn failed<T>(
        &self,
        name: &'static str,
        failed_event: &str,
        error: anyhow::Error,
        metrics: &RunMetrics,
    ) -> StageOutcome<T> {
        metrics.record_stage_failed();
        self.messages.emit(
            domain::GENERAL,
            failed_event,
            LogLevel::Error,
            json!({"stage": name, "error": format!("{:#}", error)}),
        );
        StageOutcome::Failed(StageFailure { stage: name, error })
    }
}
