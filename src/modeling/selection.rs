use crate::error::ModelingError;
use crate::modeling::preprocessing::check_width;
use crate::modeling::{invalid_param, nan_variance};
use ndarray::{Array2, Axis};

/// ANOVA F statistic of each feature against the class labels.
///
/// Features with an undefined statistic (constant within every class, or a
/// single class) score 0.
pub fn f_classif(x: &Array2<f64>, y: &[usize]) -> Vec<f64> {
    let n_classes = y.iter().max().map(|m| m + 1).unwrap_or(0);
    let present: Vec<usize> = (0..n_classes).filter(|c| y.contains(c)).collect();
    let k = present.len();
    let n = y.len();

    x.axis_iter(Axis(1))
        .map(|col| {
            if k < 2 || n <= k {
                return 0.0;
            }
            let grand = col.sum() / n as f64;
            let (mut ssb, mut ssw) = (0.0, 0.0);
            for &class in &present {
                let members: Vec<f64> = col
                    .iter()
                    .zip(y)
                    .filter(|(_, c)| **c == class)
                    .map(|(v, _)| *v)
                    .collect();
                let mean = members.iter().sum::<f64>() / members.len() as f64;
                ssb += members.len() as f64 * (mean - grand).powi(2);
                ssw += members.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
            }
            let f = (ssb / (k - 1) as f64) / (ssw / (n - k) as f64);
            if f.is_finite() { f } else { 0.0 }
        })
        .collect()
}

/// Indices of the `count` best scores, kept in column order.
fn top_indices(scores: &[f64], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
    let mut keep: Vec<usize> = order.into_iter().take(count).collect();
    keep.sort_unstable();
    keep
}

fn select_columns(x: &Array2<f64>, support: &[usize]) -> Array2<f64> {
    x.select(Axis(1), support)
}

#[derive(Debug, Clone)]
pub struct VarianceThreshold {
    threshold: f64,
    support: Option<Vec<usize>>,
    n_features_in: usize,
}

impl VarianceThreshold {
    pub fn new(threshold: f64) -> Result<Self, ModelingError> {
        if threshold < 0.0 || !threshold.is_finite() {
            return Err(invalid_param(
                "variance_threshold",
                "threshold",
                "must be a non-negative number",
            ));
        }
        Ok(Self {
            threshold,
            support: None,
            n_features_in: 0,
        })
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<(), ModelingError> {
        let support: Vec<usize> = x
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| nan_variance(col.iter().copied()).1 > self.threshold)
            .map(|(j, _)| j)
            .collect();
        if support.is_empty() {
            return Err(ModelingError::InvalidInput(format!(
                "No feature meets the variance threshold {}",
                self.threshold
            )));
        }
        self.n_features_in = x.ncols();
        self.support = Some(support);
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let support = self
            .support
            .as_ref()
            .ok_or(ModelingError::NotFitted("variance_threshold"))?;
        check_width(self.n_features_in, x.ncols(), "variance_threshold")?;
        Ok(select_columns(x, support))
    }
}

#[derive(Debug, Clone)]
pub struct SelectKBest {
    k: usize,
    support: Option<Vec<usize>>,
    n_features_in: usize,
}

impl SelectKBest {
    pub fn new(k: usize) -> Result<Self, ModelingError> {
        if k == 0 {
            return Err(invalid_param("select_k_best", "k", "must be at least 1"));
        }
        Ok(Self {
            k,
            support: None,
            n_features_in: 0,
        })
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize]) {
        let k = if self.k > x.ncols() {
            tracing::warn!(
                "select_k_best k={} exceeds {} features, keeping all",
                self.k,
                x.ncols()
            );
            x.ncols()
        } else {
            self.k
        };
        self.support = Some(top_indices(&f_classif(x, y), k));
        self.n_features_in = x.ncols();
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let support = self
            .support
            .as_ref()
            .ok_or(ModelingError::NotFitted("select_k_best"))?;
        check_width(self.n_features_in, x.ncols(), "select_k_best")?;
        Ok(select_columns(x, support))
    }
}

/// Keeps the best `percentile` percent of features (rounded, at least one).
#[derive(Debug, Clone)]
pub struct SelectPercentile {
    percentile: f64,
    support: Option<Vec<usize>>,
    n_features_in: usize,
}

impl SelectPercentile {
    pub fn new(percentile: f64) -> Result<Self, ModelingError> {
        if !(percentile > 0.0 && percentile <= 100.0) {
            return Err(invalid_param(
                "select_percentile",
                "percentile",
                "must be in (0, 100]",
            ));
        }
        Ok(Self {
            percentile,
            support: None,
            n_features_in: 0,
        })
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize]) {
        let p = x.ncols();
        let count = ((p as f64) * self.percentile / 100.0).round().max(1.0) as usize;
        self.support = Some(top_indices(&f_classif(x, y), count.min(p)));
        self.n_features_in = p;
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let support = self
            .support
            .as_ref()
            .ok_or(ModelingError::NotFitted("select_percentile"))?;
        check_width(self.n_features_in, x.ncols(), "select_percentile")?;
        Ok(select_columns(x, support))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Vec<usize>) {
        // col 0 separates the classes, col 1 is noise, col 2 is constant
        let x = array![
            [0.0, 1.0, 7.0],
            [0.1, 3.0, 7.0],
            [0.2, 2.0, 7.0],
            [5.0, 2.5, 7.0],
            [5.1, 1.5, 7.0],
            [5.2, 2.0, 7.0],
        ];
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_f_classif_ranks_informative_feature() {
        let (x, y) = data();
        let f = f_classif(&x, &y);
        assert!(f[0] > 100.0);
        assert!(f[1] < 1.0);
        assert_eq!(f[2], 0.0);
    }

    #[test]
    fn test_variance_threshold_drops_constant() {
        let (x, _) = data();
        let mut vt = VarianceThreshold::new(0.0).unwrap();
        vt.fit(&x).unwrap();
        assert_eq!(vt.transform(&x).unwrap().ncols(), 2);

        let mut strict = VarianceThreshold::new(1e6).unwrap();
        assert!(strict.fit(&x).is_err());
    }

    #[test]
    fn test_k_best_clamps_and_keeps_order() {
        let (x, y) = data();
        let mut kb = SelectKBest::new(2).unwrap();
        kb.fit(&x, &y);
        let out = kb.transform(&x).unwrap();
        assert_eq!(out.column(0), x.column(0));
        assert_eq!(out.column(1), x.column(1));

        let mut big = SelectKBest::new(10).unwrap();
        big.fit(&x, &y);
        assert_eq!(big.transform(&x).unwrap().ncols(), 3);
    }

    #[test]
    fn test_percentile_keeps_at_least_one() {
        let (x, y) = data();
        let mut sp = SelectPercentile::new(10.0).unwrap();
        sp.fit(&x, &y);
        let out = sp.transform(&x).unwrap();
        assert_eq!(out.ncols(), 1);
        assert_eq!(out.column(0), x.column(0));
        assert!(SelectPercentile::new(0.0).is_err());
    }
}
