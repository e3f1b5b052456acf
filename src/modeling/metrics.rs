use crate::error::ModelingError;
use crate::models::ScoringConfig;
use std::fmt;

/// Classification scoring metrics.
///
/// Binary metrics treat the greatest label as the positive class and reject
/// multiclass targets. Any zero division scores 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Accuracy,
    BalancedAccuracy,
    Precision,
    Recall,
    F1,
    PrecisionMacro,
    RecallMacro,
    F1Macro,
    F1Weighted,
}

#[derive(Debug, Clone, Copy, Default)]
struct ClassCounts {
    tp: usize,
    fp: usize,
    fn_: usize,
    support: usize,
}

impl ClassCounts {
    fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn class_counts(y_true: &[usize], y_pred: &[usize], class: usize) -> ClassCounts {
    let mut c = ClassCounts::default();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == class, p == class) {
            (true, true) => c.tp += 1,
            (false, true) => c.fp += 1,
            (true, false) => c.fn_ += 1,
            (false, false) => {}
        }
        if t == class {
            c.support += 1;
        }
    }
    c
}

/// Sorted labels present in either vector.
fn present_labels(y_true: &[usize], y_pred: &[usize]) -> Vec<usize> {
    let mut labels: Vec<usize> = y_true.iter().chain(y_pred).copied().collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Accuracy,
        Metric::BalancedAccuracy,
        Metric::Precision,
        Metric::Recall,
        Metric::F1,
        Metric::PrecisionMacro,
        Metric::RecallMacro,
        Metric::F1Macro,
        Metric::F1Weighted,
    ];

    pub fn parse(name: &str) -> Result<Self, ModelingError> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| ModelingError::UnknownMetric(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::BalancedAccuracy => "balanced_accuracy",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1 => "f1",
            Metric::PrecisionMacro => "precision_macro",
            Metric::RecallMacro => "recall_macro",
            Metric::F1Macro => "f1_macro",
            Metric::F1Weighted => "f1_weighted",
        }
    }

    fn is_binary(&self) -> bool {
        matches!(self, Metric::Precision | Metric::Recall | Metric::F1)
    }

    /// Score predictions against the truth.
    ///
    /// # Arguments
    /// * `n_classes` - Number of classes in the full target, used to reject
    ///   binary metrics on multiclass problems
    pub fn score(
        &self,
        y_true: &[usize],
        y_pred: &[usize],
        n_classes: usize,
    ) -> Result<f64, ModelingError> {
        if y_true.len() != y_pred.len() {
            return Err(ModelingError::InvalidInput(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if self.is_binary() && n_classes > 2 {
            return Err(ModelingError::InvalidInput(format!(
                "Target is multiclass, use a macro or weighted metric instead of '{}'",
                self.name()
            )));
        }

        let positive = n_classes.saturating_sub(1);
        let labels = present_labels(y_true, y_pred);
        let counts = |class| class_counts(y_true, y_pred, class);

        Ok(match self {
            Metric::Accuracy => ratio(
                y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count(),
                y_true.len(),
            ),
            Metric::BalancedAccuracy => mean(
                labels
                    .iter()
                    .map(|&c| counts(c))
                    .filter(|c| c.support > 0)
                    .map(|c| c.recall()),
            ),
            Metric::Precision => counts(positive).precision(),
            Metric::Recall => counts(positive).recall(),
            Metric::F1 => counts(positive).f1(),
            Metric::PrecisionMacro => mean(labels.iter().map(|&c| counts(c).precision())),
            Metric::RecallMacro => mean(labels.iter().map(|&c| counts(c).recall())),
            Metric::F1Macro => mean(labels.iter().map(|&c| counts(c).f1())),
            Metric::F1Weighted => {
                let per_class: Vec<ClassCounts> = labels.iter().map(|&c| counts(c)).collect();
                let total: usize = per_class.iter().map(|c| c.support).sum();
                if total == 0 {
                    0.0
                } else {
                    per_class
                        .iter()
                        .map(|c| c.f1() * c.support as f64)
                        .sum::<f64>()
                        / total as f64
                }
            }
        })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved scoring policy of a grid search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoring {
    metrics: Vec<Metric>,
    refit: Metric,
}

impl Scoring {
    pub fn single(metric: Metric) -> Self {
        Self {
            metrics: vec![metric],
            refit: metric,
        }
    }

    /// Resolve the configured scoring and optional refit override.
    ///
    /// A single metric (string or one-element list) is single-metric scoring.
    /// Longer lists score every metric and refit on the override or the
    /// first entry. An override missing from the list is appended to it.
    pub fn resolve(scoring: &ScoringConfig, refit: Option<&str>) -> Result<Self, ModelingError> {
        let names: Vec<&str> = match scoring {
            ScoringConfig::One(name) => vec![name.as_str()],
            ScoringConfig::Many(names) => names.iter().map(String::as_str).collect(),
        };
        if names.is_empty() {
            return Err(ModelingError::InvalidScoring("empty scoring list".to_string()));
        }
        let mut metrics = Vec::with_capacity(names.len() + 1);
        for name in names {
            let metric = Metric::parse(name)?;
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }
        let refit = match refit {
            Some(name) => {
                let metric = Metric::parse(name)?;
                if !metrics.contains(&metric) {
                    metrics.push(metric);
                }
                metric
            }
            None => metrics[0],
        };
        Ok(Self { metrics, refit })
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn refit(&self) -> Metric {
        self.refit
    }

    pub fn is_multi(&self) -> bool {
        self.metrics.len() > 1
    }

    /// Column suffix used in results tables: `score` for single-metric
    /// scoring, the metric name otherwise.
    pub fn column_key(&self, metric: Metric) -> &'static str {
        if self.is_multi() { metric.name() } else { "score" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_metrics() {
        let t = [0, 0, 1, 1, 1];
        let p = [0, 1, 1, 1, 0];
        assert_eq!(Metric::Accuracy.score(&t, &p, 2).unwrap(), 0.6);
        assert!((Metric::Precision.score(&t, &p, 2).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((Metric::Recall.score(&t, &p, 2).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((Metric::F1.score(&t, &p, 2).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        let balanced = Metric::BalancedAccuracy.score(&t, &p, 2).unwrap();
        assert!((balanced - (0.5 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_scores_zero() {
        let t = [0, 0, 1];
        let p = [0, 0, 0];
        assert_eq!(Metric::Precision.score(&t, &p, 2).unwrap(), 0.0);
        assert_eq!(Metric::F1.score(&t, &p, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_multiclass_requires_averaged_metric() {
        let t = [0, 1, 2, 2];
        let p = [0, 2, 2, 2];
        assert!(Metric::F1.score(&t, &p, 3).is_err());
        let macro_f1 = Metric::F1Macro.score(&t, &p, 3).unwrap();
        // per class f1: 1.0, 0.0, 0.8
        assert!((macro_f1 - 0.6).abs() < 1e-12);
        let weighted = Metric::F1Weighted.score(&t, &p, 3).unwrap();
        assert!((weighted - (1.0 + 0.0 + 1.6) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_scoring_resolution() {
        let single = Scoring::resolve(&ScoringConfig::One("accuracy".into()), None).unwrap();
        assert!(!single.is_multi());
        assert_eq!(single.column_key(Metric::Accuracy), "score");

        let list_of_one = Scoring::resolve(&ScoringConfig::Many(vec!["f1".into()]), None).unwrap();
        assert_eq!(list_of_one, Scoring::single(Metric::F1));

        let multi = Scoring::resolve(
            &ScoringConfig::Many(vec!["f1".into(), "accuracy".into()]),
            None,
        )
        .unwrap();
        assert_eq!(multi.refit(), Metric::F1);
        assert_eq!(multi.column_key(Metric::Accuracy), "accuracy");

        let appended = Scoring::resolve(
            &ScoringConfig::Many(vec!["f1".into(), "accuracy".into()]),
            Some("recall"),
        )
        .unwrap();
        assert_eq!(appended.refit(), Metric::Recall);
        assert_eq!(appended.metrics().len(), 3);

        assert!(matches!(
            Scoring::resolve(&ScoringConfig::Many(vec![]), None),
            Err(ModelingError::InvalidScoring(_))
        ));
        assert!(matches!(
            Scoring::resolve(&ScoringConfig::One("roc".into()), None),
            Err(ModelingError::UnknownMetric(_))
        ));
    }
}
