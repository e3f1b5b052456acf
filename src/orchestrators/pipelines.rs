use crate::logging::LogLevel;
use crate::messages::MessageOrchestrator;
use crate::messages::taxonomy::{domain, pipelines as events};
use crate::modeling::{Evaluate, PipelineEvaluator};
use crate::models::{Frame, PipelinesConfig, PipelinesOutput, Series};
use crate::services::ExperimentTracker;
use anyhow::Result;
use camino::Utf8Path;
use serde_json::json;
use std::sync::Arc;

/// Evaluates every declared pipeline spec in declaration order.
///
/// Specs are not isolated from each other: the first evaluation error
/// ends the stage and is returned to the caller.
pub struct PipelineOrchestrator<E: Evaluate = PipelineEvaluator> {
    config: PipelinesConfig,
    evaluator: E,
    messages: Arc<MessageOrchestrator>,
}

impl PipelineOrchestrator<PipelineEvaluator> {
    /// Orchestrator backed by the default [`PipelineEvaluator`].
    ///
    /// Tracking is wired from the environment only when enabled in config.
    pub fn with_default_evaluator(
        config: &PipelinesConfig,
        out_dir: impl AsRef<Utf8Path>,
        random_state: u64,
        messages: Arc<MessageOrchestrator>,
    ) -> Self {
        let tracker = config
            .tracking
            .enabled
            .then(|| ExperimentTracker::from_env(&config.tracking.experiment));
        let evaluator = PipelineEvaluator::new(out_dir, random_state, tracker);
        Self::new(config, evaluator, messages)
    }
}

impl<E: Evaluate> PipelineOrchestrator<E> {
    pub fn new(
        config: &PipelinesConfig,
        evaluator: E,
        messages: Arc<MessageOrchestrator>,
    ) -> Self {
        Self {
            config: config.clone(),
            evaluator,
            messages,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn run(&self, x: &Frame, y: &Series) -> Result<PipelinesOutput> {
        if !self.config.enabled {
            self.messages
                .emit(domain::PIPELINES, events::DISABLED, LogLevel::Info, json!({}));
            return Ok(PipelinesOutput::default());
        }

        self.messages.emit(
            domain::PIPELINES,
            events::START,
            LogLevel::Info,
            json!({"count": self.config.pipelines.len()}),
        );

        let mut results = Vec::with_capacity(self.config.pipelines.len());
        for spec in &self.config.pipelines {
            self.messages.emit(
                domain::PIPELINES,
                events::EVAL_START,
                LogLevel::Info,
                json!({"name": spec.name}),
            );
            let result = self.evaluator.evaluate(x, y, spec, &self.config.cv)?;
            self.messages.emit(
                domain::PIPELINES,
                events::EVAL_DONE,
                LogLevel::Info,
                json!({
                    "name": result.name,
                    "refit": result.refit_metric,
                    "best_score": result.best_score,
                    "csv": result.cv_results_path,
                }),
            );
            results.push(result);
        }

        self.messages.emit(
            domain::PIPELINES,
            events::DONE,
            LogLevel::Info,
            json!({"count": results.len()}),
        );
        Ok(PipelinesOutput { results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::evaluator::MockEvaluate;
    use crate::models::{Cell, EstimatorConfig, PipelineSpec, RunResult, StepsConfig};
    use crate::orchestrators::test_messages;
    use camino::Utf8PathBuf;
    use indexmap::IndexMap;
    use mockall::predicate::*;

    fn spec(name: &str) -> PipelineSpec {
        PipelineSpec::classic(
            name,
            StepsConfig {
                estimator: Some(EstimatorConfig {
                    kind: "svc".to_string(),
                    params: None,
                }),
                ..StepsConfig::default()
            },
        )
    }

    fn result_for(spec: &PipelineSpec) -> RunResult {
        RunResult {
            name: spec.name.clone(),
            kind: "grid".to_string(),
            best_params: IndexMap::new(),
            best_score: 0.9,
            refit_metric: "accuracy".to_string(),
            test_score: None,
            elapsed_sec: 0.1,
            cv_results_path: Utf8PathBuf::from(format!("cv_{}.csv", spec.name)),
            exported_pipeline: None,
        }
    }

    fn data() -> (Frame, Series) {
        let mut columns = IndexMap::new();
        columns.insert("a".to_string(), (0..10).map(Cell::Int).collect());
        let y = Series::new("y", (0..10).map(|i| Cell::Int(i % 2)).collect());
        (Frame::from_columns(columns).unwrap(), y)
    }

    #[test]
    fn test_disabled_never_evaluates() {
        let config = PipelinesConfig {
            enabled: false,
            pipelines: vec![spec("svc")],
            ..PipelinesConfig::default()
        };
        let mut evaluator = MockEvaluate::new();
        evaluator.expect_evaluate().never();

        let orch = PipelineOrchestrator::new(&config, evaluator, test_messages());
        let (x, y) = data();
        let output = orch.run(&x, &y).unwrap();
        assert!(output.results.is_empty());
    }

    #[test]
    fn test_specs_evaluated_in_order() {
        let config = PipelinesConfig {
            pipelines: vec![spec("first"), spec("second")],
            ..PipelinesConfig::default()
        };
        let mut evaluator = MockEvaluate::new();
        evaluator
            .expect_evaluate()
            .times(2)
            .returning(|_, _, spec, _| Ok(result_for(spec)));

        let orch = PipelineOrchestrator::new(&config, evaluator, test_messages());
        let (x, y) = data();
        let names: Vec<String> = orch
            .run(&x, &y)
            .unwrap()
            .results
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_first_failure_stops_stage() {
        let config = PipelinesConfig {
            pipelines: vec![spec("broken"), spec("never")],
            ..PipelinesConfig::default()
        };
        let mut evaluator = MockEvaluate::new();
        evaluator
            .expect_evaluate()
            .with(
                always(),
                always(),
                function(|s: &PipelineSpec| s.name == "broken"),
                always(),
            )
            .times(1)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("fit exploded")));

        let orch = PipelineOrchestrator::new(&config, evaluator, test_messages());
        let (x, y) = data();
        let err = orch.run(&x, &y).unwrap_err();
        assert_eq!(err.to_string(), "fit exploded");
    }
}
