//! Automated pipeline search.
//!
//! Both libraries explore the same search space: a median imputer, an
//! optional standard scaler, an optional selector, optional PCA, and an
//! SVC or random forest with sampled hyperparameters. Candidates are
//! scored by mean k-fold score on the training split.
//!
//! - `tpot`: generational search with elitism, crossover and mutation
//! - `autosklearn`: time-boxed random search

use crate::error::ModelingError;
use crate::models::{
    AutoMlConfig, EstimatorConfig, FeatureSelectionConfig, HyperParam, ParamMap, ParamScalar,
    PreprocessConfig, ReductionConfig, StepsConfig,
};
use crate::modeling::cv::{Fold, StratifiedKFold, train_test_split};
use crate::modeling::estimators::{RANDOM_FOREST, SVC};
use crate::modeling::factory::{
    IMPUTER_SIMPLE, PipelineFactory, REDUCER_PCA, SCALER_STANDARD, expand_grid,
};
use crate::modeling::metrics::{Metric, Scoring};
use crate::modeling::search::{ResultsTable, cross_validate, mean_std};
use indexmap::IndexMap;
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const TPOT: &str = "tpot";
pub const AUTOSKLEARN: &str = "autosklearn";

const MUTATION_RATE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMlLibrary {
    Tpot,
    AutoSklearn,
}

impl AutoMlLibrary {
    pub fn parse(name: &str) -> Result<Self, ModelingError> {
        match name {
            TPOT => Ok(AutoMlLibrary::Tpot),
            AUTOSKLEARN => Ok(AutoMlLibrary::AutoSklearn),
            other => Err(ModelingError::UnknownAutoMl(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AutoMlLibrary::Tpot => TPOT,
            AutoMlLibrary::AutoSklearn => AUTOSKLEARN,
        }
    }

    /// Whether the library was compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            AutoMlLibrary::Tpot => cfg!(feature = "tpot"),
            AutoMlLibrary::AutoSklearn => cfg!(feature = "autosklearn"),
        }
    }

    fn ensure_available(&self) -> Result<(), ModelingError> {
        if self.is_available() {
            return Ok(());
        }
        let label = match self {
            AutoMlLibrary::Tpot => "TPOT",
            AutoMlLibrary::AutoSklearn => "auto-sklearn",
        };
        Err(ModelingError::MissingDependency(format!("{} not installed", label)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SelectorGene {
    None,
    Variance,
    Percentile(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EstimatorGene {
    Svc {
        kernel: &'static str,
        c: f64,
    },
    Forest {
        n_estimators: i64,
        max_depth: Option<i64>,
        max_features: &'static str,
    },
}

/// One point of the search space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Genome {
    scaler: bool,
    selector: SelectorGene,
    pca: Option<f64>,
    estimator: EstimatorGene,
}

impl Genome {
    fn random(rng: &mut ChaCha8Rng) -> Self {
        Self {
            scaler: rng.gen_bool(0.5),
            selector: Self::random_selector(rng),
            pca: Self::random_pca(rng),
            estimator: Self::random_estimator(rng),
        }
    }

    fn random_selector(rng: &mut ChaCha8Rng) -> SelectorGene {
        match rng.gen_range(0..5) {
            0 | 1 => SelectorGene::None,
            2 => SelectorGene::Variance,
            _ => SelectorGene::Percentile(*[25.0, 50.0, 75.0].choose(rng).unwrap_or(&50.0)),
        }
    }

    fn random_pca(rng: &mut ChaCha8Rng) -> Option<f64> {
        if rng.gen_bool(0.5) {
            None
        } else {
            [0.8, 0.9, 0.95].choose(rng).copied()
        }
    }

    fn random_estimator(rng: &mut ChaCha8Rng) -> EstimatorGene {
        if rng.gen_bool(0.5) {
            EstimatorGene::Svc {
                kernel: if rng.gen_bool(0.5) { "linear" } else { "rbf" },
                c: 10f64.powf(rng.gen_range(-2.0..=2.0)),
            }
        } else {
            EstimatorGene::Forest {
                n_estimators: *[10, 25, 50].choose(rng).unwrap_or(&25),
                max_depth: *[None, Some(3), Some(5), Some(8)].choose(rng).unwrap_or(&None),
                max_features: if rng.gen_bool(0.5) { "sqrt" } else { "log2" },
            }
        }
    }

    /// Resample one gene.
    fn mutate(mut self, rng: &mut ChaCha8Rng) -> Self {
        match rng.gen_range(0..4) {
            0 => self.scaler = !self.scaler,
            1 => self.selector = Self::random_selector(rng),
            2 => self.pca = Self::random_pca(rng),
            _ => self.estimator = Self::random_estimator(rng),
        }
        self
    }

    /// Uniform crossover: each gene comes from either parent.
    fn crossover(&self, other: &Genome, rng: &mut ChaCha8Rng) -> Self {
        Self {
            scaler: if rng.gen_bool(0.5) { self.scaler } else { other.scaler },
            selector: if rng.gen_bool(0.5) { self.selector } else { other.selector },
            pca: if rng.gen_bool(0.5) { self.pca } else { other.pca },
            estimator: if rng.gen_bool(0.5) { self.estimator } else { other.estimator },
        }
    }

    fn describe(&self) -> String {
        let mut parts = vec![IMPUTER_SIMPLE.to_string()];
        if self.scaler {
            parts.push(SCALER_STANDARD.to_string());
        }
        match self.selector {
            SelectorGene::None => {}
            SelectorGene::Variance => parts.push("variance_threshold(0)".to_string()),
            SelectorGene::Percentile(p) => parts.push(format!("select_percentile({})", p)),
        }
        if let Some(f) = self.pca {
            parts.push(format!("pca({})", f));
        }
        parts.push(match self.estimator {
            EstimatorGene::Svc { kernel, c } => format!("svc(kernel={}, C={:.4})", kernel, c),
            EstimatorGene::Forest {
                n_estimators,
                max_depth,
                max_features,
            } => format!(
                "random_forest(n_estimators={}, max_depth={}, max_features={})",
                n_estimators,
                max_depth.map_or("None".to_string(), |d| d.to_string()),
                max_features
            ),
        });
        parts.join(" -> ")
    }

    fn to_steps(self) -> StepsConfig {
        let one = |v: ParamScalar| HyperParam::One(v);
        let (kind, params) = match self.estimator {
            EstimatorGene::Svc { kernel, c } => {
                let mut params = ParamMap::new();
                params.insert("kernel".into(), one(ParamScalar::Text(kernel.into())));
                params.insert("C".into(), one(ParamScalar::Float(c)));
                (SVC, params)
            }
            EstimatorGene::Forest {
                n_estimators,
                max_depth,
                max_features,
            } => {
                let mut params = ParamMap::new();
                params.insert("n_estimators".into(), one(ParamScalar::Int(n_estimators)));
                params.insert(
                    "max_depth".into(),
                    one(max_depth.map_or(ParamScalar::Null, ParamScalar::Int)),
                );
                params.insert("max_features".into(), one(ParamScalar::Text(max_features.into())));
                (RANDOM_FOREST, params)
            }
        };

        StepsConfig {
            preprocess: Some(PreprocessConfig {
                imputer: Some(IMPUTER_SIMPLE.to_string()),
                scaler: self.scaler.then(|| SCALER_STANDARD.to_string()),
            }),
            feature_selection: match self.selector {
                SelectorGene::None => None,
                SelectorGene::Variance => Some(FeatureSelectionConfig {
                    variance_threshold: Some(0.0),
                    ..Default::default()
                }),
                SelectorGene::Percentile(p) => Some(FeatureSelectionConfig {
                    select_percentile: Some(p),
                    ..Default::default()
                }),
            },
            reduction: self.pca.map(|f| {
                let mut params = ParamMap::new();
                params.insert("n_components".into(), one(ParamScalar::Float(f)));
                ReductionConfig {
                    kind: Some(REDUCER_PCA.to_string()),
                    params: Some(params),
                }
            }),
            estimator: Some(EstimatorConfig {
                kind: kind.to_string(),
                params: Some(params),
            }),
        }
    }
}

#[derive(Debug, Clone)]
struct Evaluated {
    genome: Genome,
    mean: f64,
    std: f64,
    fit_time: f64,
}

/// Result of a finished AutoML search.
#[derive(Debug, Clone)]
pub struct AutoMlOutcome {
    pub library: AutoMlLibrary,
    pub metric: Metric,
    /// Mean CV score of the winner on the training split.
    pub best_cv_score: f64,
    /// Score of the refitted winner on the held-out split.
    pub test_score: f64,
    /// Winner's hyperparameters keyed by `<step>__<param>`.
    pub best_params: IndexMap<String, ParamScalar>,
    /// Winner as declarative steps, ready for export.
    pub best_steps: StepsConfig,
    pub best_description: String,
    pub leaderboard: ResultsTable,
    pub evaluated: usize,
}

/// Configured AutoML search, built by the pipeline factory.
#[derive(Debug, Clone)]
pub struct AutoMlSearch {
    library: AutoMlLibrary,
    config: AutoMlConfig,
    metric: Metric,
    seed: u64,
}

impl AutoMlSearch {
    /// # Errors
    /// - [`ModelingError::UnknownAutoMl`] for an unrecognized library
    /// - [`ModelingError::MissingDependency`] if the library is compiled out
    /// - [`ModelingError::UnknownMetric`] for an unknown scoring name
    pub fn new(config: &AutoMlConfig, default_seed: u64) -> Result<Self, ModelingError> {
        let library = AutoMlLibrary::parse(&config.library)?;
        library.ensure_available()?;
        Ok(Self {
            library,
            metric: Metric::parse(&config.scoring)?,
            seed: config.random_state.unwrap_or(default_seed),
            config: config.clone(),
        })
    }

    pub fn library(&self) -> AutoMlLibrary {
        self.library
    }

    pub fn config(&self) -> &AutoMlConfig {
        &self.config
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Split, search on the training part, refit the winner and score it on
    /// the held-out part.
    pub fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<AutoMlOutcome, ModelingError> {
        let split = train_test_split(y, self.config.test_size, self.seed)?;
        let x_train = x.select(Axis(0), &split.train);
        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
        let folds = StratifiedKFold::new(self.config.cv, true, self.seed)?.split(&y_train)?;

        let mut ctx = SearchContext {
            factory: PipelineFactory::new(self.seed),
            x: &x_train,
            y: &y_train,
            n_classes,
            folds: &folds,
            scoring: Scoring::single(self.metric),
            cache: HashMap::new(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        match self.library {
            AutoMlLibrary::Tpot => self.evolve(&mut ctx, &mut rng),
            AutoMlLibrary::AutoSklearn => self.random_search(&mut ctx, &mut rng),
        }

        let mut entries: Vec<Evaluated> = ctx.cache.into_values().collect();
        entries.sort_by(|a, b| {
            b.mean
                .total_cmp(&a.mean)
                .then_with(|| a.genome.describe().cmp(&b.genome.describe()))
        });
        entries.retain(|e| !e.mean.is_nan());
        let best = entries.first().cloned().ok_or_else(|| {
            ModelingError::InvalidInput("AutoML search found no valid pipeline".to_string())
        })?;

        let best_steps = best.genome.to_steps();
        let (mut pipeline, grid) = PipelineFactory::new(self.seed).build_pipeline(&best_steps)?;
        let best_params = expand_grid(&grid).into_iter().next().unwrap_or_default();
        pipeline.set_params(&best_params)?;
        pipeline.fit(&x_train, &y_train, n_classes)?;

        let x_test = x.select(Axis(0), &split.test);
        let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();
        let test_score = self.metric.score(&y_test, &pipeline.predict(&x_test)?, n_classes)?;

        tracing::info!(
            "{} finished: {} pipelines evaluated, best {} = {:.4} (test {:.4})",
            self.library.name(),
            entries.len(),
            self.metric,
            best.mean,
            test_score
        );

        Ok(AutoMlOutcome {
            library: self.library,
            metric: self.metric,
            best_cv_score: best.mean,
            test_score,
            best_params,
            best_steps,
            best_description: best.genome.describe(),
            leaderboard: leaderboard(&entries),
            evaluated: entries.len(),
        })
    }

    fn evolve(&self, ctx: &mut SearchContext<'_>, rng: &mut ChaCha8Rng) {
        let deadline = self
            .config
            .max_time_mins
            .map(|m| Instant::now() + Duration::from_secs_f64(m.max(0.0) * 60.0));
        let size = self.config.population_size.max(2);
        let mut population: Vec<Genome> = (0..size).map(|_| Genome::random(rng)).collect();

        for generation in 0..self.config.generations.max(1) {
            let mut scored: Vec<(Genome, f64)> = Vec::with_capacity(population.len());
            for genome in &population {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    tracing::warn!("max_time_mins reached during generation {}", generation);
                    return;
                }
                let score = ctx.evaluate(genome).map_or(f64::NAN, |e| e.mean);
                scored.push((*genome, score));
            }
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            scored.sort_by_key(|(_, s)| s.is_nan());

            let elites: Vec<Genome> =
                scored.iter().take(size.div_ceil(2)).map(|(g, _)| *g).collect();
            tracing::debug!("Generation {} best score {:.4}", generation, scored[0].1);

            let mut next = elites.clone();
            while next.len() < size {
                let a = elites.choose(rng).copied().unwrap_or_else(|| Genome::random(rng));
                let b = elites.choose(rng).copied().unwrap_or_else(|| Genome::random(rng));
                let mut child = a.crossover(&b, rng);
                if rng.gen_bool(MUTATION_RATE) || child == a {
                    child = child.mutate(rng);
                }
                next.push(child);
            }
            population = next;
        }
    }

    fn random_search(&self, ctx: &mut SearchContext<'_>, rng: &mut ChaCha8Rng) {
        let started = Instant::now();
        let budget = Duration::from_secs(self.config.time_left_for_this_task);
        let per_run = Duration::from_secs(self.config.per_run_time_limit);

        for i in 0..self.config.max_evaluations {
            if started.elapsed() >= budget {
                tracing::warn!("time_left_for_this_task exhausted after {} evaluations", i);
                break;
            }
            let genome = Genome::random(rng);
            let key = genome.describe();
            if let Some(result) = ctx.evaluate(&genome) {
                if Duration::from_secs_f64(result.fit_time) > per_run {
                    tracing::warn!("Discarding {}, exceeded per_run_time_limit", key);
                    ctx.cache.remove(&key);
                }
            }
        }
    }
}

struct SearchContext<'a> {
    factory: PipelineFactory,
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    folds: &'a [Fold],
    scoring: Scoring,
    cache: HashMap<String, Evaluated>,
}

impl SearchContext<'_> {
    /// Cross-validate a genome once; repeated genomes come from the cache.
    fn evaluate(&mut self, genome: &Genome) -> Option<Evaluated> {
        let key = genome.describe();
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit.clone());
        }
        let (pipeline, grid) = match self.factory.build_pipeline(&genome.to_steps()) {
            Ok(built) => built,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", key, e);
                return None;
            }
        };
        let params = expand_grid(&grid).into_iter().next().unwrap_or_default();
        let started = Instant::now();
        let result = cross_validate(
            &pipeline,
            &params,
            self.x,
            self.y,
            self.n_classes,
            self.folds,
            &self.scoring,
        );
        let (mean, std) = mean_std(&result.fold_scores[0]);
        let evaluated = Evaluated {
            genome: *genome,
            mean,
            std,
            fit_time: started.elapsed().as_secs_f64(),
        };
        self.cache.insert(key, evaluated.clone());
        Some(evaluated)
    }
}

fn leaderboard(entries: &[Evaluated]) -> ResultsTable {
    let mut table = ResultsTable::new(
        ["rank", "pipeline", "mean_test_score", "std_test_score", "fit_time", "params"]
            .iter()
            .map(|h| h.to_string())
            .collect(),
    );
    for (i, entry) in entries.iter().enumerate() {
        let params = serde_json::to_string(&entry.genome.to_steps()).unwrap_or_default();
        table.push_row(vec![
            (i + 1).to_string(),
            entry.genome.describe(),
            entry.mean.to_string(),
            entry.std.to_string(),
            entry.fit_time.to_string(),
            params,
        ]);
    }
    table
}
