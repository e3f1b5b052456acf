use crate::error::ModelingError;
use crate::models::ParamScalar;
use crate::modeling::preprocessing::check_width;
use crate::modeling::{ensure_finite, invalid_param, param_bool, param_usize};
use ndarray::{Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const STEP: &str = "random_forest";
/// Minimum impurity decrease for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    Count(usize),
    Fraction(f64),
    All,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let p = n_features as f64;
        let k = match self {
            MaxFeatures::Sqrt => p.sqrt().floor() as usize,
            MaxFeatures::Log2 => p.log2().floor() as usize,
            MaxFeatures::Count(k) => k,
            MaxFeatures::Fraction(f) => (f * p).floor() as usize,
            MaxFeatures::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<f64>),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn proba(&self, row: ArrayView1<f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(p) => return p,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn leaf(&self, samples: &[usize]) -> Node {
        let mut counts = vec![0.0; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += 1.0;
        }
        let total = samples.len().max(1) as f64;
        Node::Leaf(counts.into_iter().map(|c| c / total).collect())
    }

    fn best_split(&self, samples: &[usize], rng: &mut ChaCha8Rng) -> Option<(usize, f64)> {
        let n = samples.len();
        let mut parent = vec![0usize; self.n_classes];
        for &i in samples {
            parent[self.y[i]] += 1;
        }
        let parent_impurity = gini(&parent, n);
        if parent_impurity == 0.0 {
            return None;
        }

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<(usize, f64, f64)> = None;
        for &f in features.iter().take(self.max_features) {
            let mut sorted: Vec<(f64, usize)> =
                samples.iter().map(|&i| (self.x[[i, f]], self.y[i])).collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent.clone();
            for pos in 0..n - 1 {
                let (value, class) = sorted[pos];
                left[class] += 1;
                right[class] -= 1;
                let next = sorted[pos + 1].0;
                if next <= value {
                    continue;
                }
                let (nl, nr) = (pos + 1, n - pos - 1);
                let impurity =
                    (nl as f64 * gini(&left, nl) + nr as f64 * gini(&right, nr)) / n as f64;
                if best.is_none_or(|b| impurity < b.2) {
                    best = Some((f, (value + next) / 2.0, impurity));
                }
            }
        }

        best.filter(|b| parent_impurity - b.2 > MIN_GAIN)
            .map(|(f, t, _)| (f, t))
    }

    fn build(&mut self, samples: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf(Vec::new()));

        let depth_reached = self.max_depth.is_some_and(|d| depth >= d);
        let split = if depth_reached || samples.len() < self.min_samples_split {
            None
        } else {
            self.best_split(&samples, rng)
        };

        match split {
            None => self.nodes[idx] = self.leaf(&samples),
            Some((feature, threshold)) => {
                let (l, r): (Vec<usize>, Vec<usize>) = samples
                    .into_iter()
                    .partition(|&i| self.x[[i, feature]] <= threshold);
                let left = self.build(l, depth + 1, rng);
                let right = self.build(r, depth + 1, rng);
                self.nodes[idx] = Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                };
            }
        }
        idx
    }
}

#[derive(Debug, Clone)]
struct ForestFit {
    trees: Vec<Tree>,
    n_classes: usize,
    n_features: usize,
}

/// Bagged CART classifiers with gini impurity. Class probabilities are
/// averaged across trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: MaxFeatures,
    bootstrap: bool,
    random_state: u64,
    fitted: Option<ForestFit>,
}

impl RandomForest {
    pub fn new(random_state: u64) -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state,
            fitted: None,
        }
    }

    pub fn set_param(&mut self, name: &str, value: &ParamScalar) -> Result<(), ModelingError> {
        match name {
            "n_estimators" => {
                let n = param_usize(STEP, name, value)?;
                if n == 0 {
                    return Err(invalid_param(STEP, name, "must be at least 1"));
                }
                self.n_estimators = n;
            }
            "max_depth" => {
                self.max_depth = match value {
                    ParamScalar::Null => None,
                    other => Some(param_usize(STEP, name, other)?.max(1)),
                }
            }
            "min_samples_split" => self.min_samples_split = param_usize(STEP, name, value)?.max(2),
            "max_features" => {
                self.max_features = match value {
                    ParamScalar::Null => MaxFeatures::All,
                    ParamScalar::Text(s) if s == "sqrt" => MaxFeatures::Sqrt,
                    ParamScalar::Text(s) if s == "log2" => MaxFeatures::Log2,
                    ParamScalar::Int(k) if *k >= 1 => MaxFeatures::Count(*k as usize),
                    ParamScalar::Float(f) if *f > 0.0 && *f <= 1.0 => MaxFeatures::Fraction(*f),
                    other => {
                        return Err(invalid_param(
                            STEP,
                            name,
                            format!("expected sqrt, log2, a count or a fraction, got {}", other),
                        ));
                    }
                }
            }
            "bootstrap" => self.bootstrap = param_bool(STEP, name, value)?,
            "random_state" => self.random_state = param_usize(STEP, name, value)? as u64,
            other => return Err(invalid_param(STEP, other, "unknown parameter")),
        }
        Ok(())
    }

    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<(), ModelingError> {
        ensure_finite(x, STEP)?;
        if x.nrows() != y.len() || y.is_empty() {
            return Err(ModelingError::InvalidInput(format!(
                "random_forest got {} samples and {} labels",
                x.nrows(),
                y.len()
            )));
        }
        let n = x.nrows();
        let n_classes = n_classes.max(y.iter().max().map_or(0, |m| m + 1));
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let trees = (0..self.n_estimators)
            .map(|_| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.r#gen());
                let samples: Vec<usize> = if self.bootstrap {
                    (0..n).map(|_| tree_rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let mut builder = TreeBuilder {
                    x,
                    y,
                    n_classes,
                    max_depth: self.max_depth,
                    min_samples_split: self.min_samples_split,
                    max_features: self.max_features.resolve(x.ncols()),
                    nodes: Vec::new(),
                };
                builder.build(samples, 0, &mut tree_rng);
                Tree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        self.fitted = Some(ForestFit {
            trees,
            n_classes,
            n_features: x.ncols(),
        });
        Ok(())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let fit = self.fitted.as_ref().ok_or(ModelingError::NotFitted(STEP))?;
        check_width(fit.n_features, x.ncols(), STEP)?;
        ensure_finite(x, STEP)?;

        let mut out = Array2::<f64>::zeros((x.nrows(), fit.n_classes));
        for (r, row) in x.rows().into_iter().enumerate() {
            for tree in &fit.trees {
                for (c, p) in tree.proba(row).iter().enumerate() {
                    out[[r, c]] += p;
                }
            }
        }
        out /= fit.trees.len() as f64;
        Ok(out)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelingError> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
                        if *p > best.1 { (i, *p) } else { best }
                    })
                    .0
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [1.0, 10.0],
            [2.0, 11.0],
            [3.0, 9.0],
            [4.0, 10.5],
            [6.0, 10.0],
            [7.0, 9.5],
            [8.0, 11.0],
            [9.0, 10.0],
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    #[test]
    fn test_single_tree_fits_training_data() {
        let (x, y) = data();
        let mut rf = RandomForest::new(0);
        rf.set_param("n_estimators", &ParamScalar::Int(1)).unwrap();
        rf.set_param("bootstrap", &ParamScalar::Bool(false)).unwrap();
        rf.set_param("max_features", &ParamScalar::Null).unwrap();
        rf.fit(&x, &y, 2).unwrap();
        assert_eq!(rf.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_forest_is_seeded() {
        let (x, y) = data();
        let mut a = RandomForest::new(7);
        a.set_param("n_estimators", &ParamScalar::Int(10)).unwrap();
        let mut b = a.clone();
        a.fit(&x, &y, 2).unwrap();
        b.fit(&x, &y, 2).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = data();
        let mut rf = RandomForest::new(1);
        rf.set_param("n_estimators", &ParamScalar::Int(5)).unwrap();
        rf.fit(&x, &y, 2).unwrap();
        for row in rf.predict_proba(&x).unwrap().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_depth_limited_forest_predicts() {
        let (x, y) = data();
        let mut rf = RandomForest::new(0);
        rf.set_param("max_depth", &ParamScalar::Int(1)).unwrap();
        rf.set_param("n_estimators", &ParamScalar::Int(3)).unwrap();
        rf.fit(&x, &y, 2).unwrap();
        assert_eq!(rf.predict(&x).unwrap().len(), 8);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(10), 3);
        assert_eq!(MaxFeatures::Count(50).resolve(10), 10);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
    }
}
