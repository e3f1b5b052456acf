use crate::error::ModelingError;
use crate::models::ParamScalar;
use crate::modeling::preprocessing::check_width;
use crate::modeling::{ensure_finite, invalid_param, param_bool};
use ndarray::{Array1, Array2, Axis};

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOL: f64 = 1e-12;

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// # Returns
/// Eigenvalues in descending order and the matching eigenvectors as columns
pub fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |j| *j != i).map(move |j| (i, j)))
            .map(|(i, j)| m[[i, j]].powi(2))
            .sum();
        if off.sqrt() < JACOBI_TOL {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if m[[p, q]].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * m[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (mkp, mkq) = (m[[k, p]], m[[k, q]]);
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let (mpk, mqk) = (m[[p, k]], m[[q, k]]);
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| m[[*b, *b]].total_cmp(&m[[*a, *a]]));
    let values = Array1::from_iter(order.iter().map(|&i| m[[i, i]].max(0.0)));
    let vectors = v.select(Axis(1), &order);
    (values, vectors)
}

/// Requested dimensionality of a [`Pca`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Components {
    All,
    Count(usize),
    /// Smallest count reaching this explained-variance fraction.
    Fraction(f64),
}

#[derive(Debug, Clone)]
struct PcaFit {
    mean: Array1<f64>,
    components: Array2<f64>,
    explained_variance: Array1<f64>,
}

/// Principal component analysis on the sample covariance matrix.
///
/// Component signs are fixed so the largest absolute loading is positive.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: Components,
    whiten: bool,
    fitted: Option<PcaFit>,
}

impl Default for Pca {
    fn default() -> Self {
        Self {
            n_components: Components::All,
            whiten: false,
            fitted: None,
        }
    }
}

impl Pca {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_param(&mut self, name: &str, value: &ParamScalar) -> Result<(), ModelingError> {
        match name {
            "n_components" => {
                self.n_components = match value {
                    ParamScalar::Null => Components::All,
                    ParamScalar::Int(n) if *n >= 1 => Components::Count(*n as usize),
                    ParamScalar::Float(f) if *f > 0.0 && *f < 1.0 => Components::Fraction(*f),
                    other => {
                        return Err(invalid_param(
                            "pca",
                            name,
                            format!(
                                "expected a positive integer or a fraction in (0, 1), got {}",
                                other
                            ),
                        ));
                    }
                };
            }
            "whiten" => self.whiten = param_bool("pca", name, value)?,
            // ignored, the decomposition is deterministic
            "random_state" => {}
            other => return Err(invalid_param("pca", other, "unknown parameter")),
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<(), ModelingError> {
        ensure_finite(x, "pca")?;
        let (n, p) = x.dim();
        if n < 2 {
            return Err(ModelingError::InvalidInput(
                "PCA needs at least 2 samples".to_string(),
            ));
        }
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / (n - 1) as f64;
        let (values, mut vectors) = symmetric_eigen(&cov);

        for mut col in vectors.axis_iter_mut(Axis(1)) {
            let pivot = col
                .iter()
                .copied()
                .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                col.mapv_inplace(|v| -v);
            }
        }

        let max_rank = n.min(p);
        let keep = match self.n_components {
            Components::All => max_rank,
            Components::Count(k) if k <= max_rank => k,
            Components::Count(k) => {
                return Err(invalid_param(
                    "pca",
                    "n_components",
                    format!("{} exceeds min(n_samples, n_features) = {}", k, max_rank),
                ));
            }
            Components::Fraction(frac) => {
                let total: f64 = values.sum();
                let mut acc = 0.0;
                let mut keep = max_rank;
                for (i, v) in values.iter().take(max_rank).enumerate() {
                    acc += v;
                    if total <= 0.0 || acc / total >= frac {
                        keep = i + 1;
                        break;
                    }
                }
                keep
            }
        };

        let components: Vec<usize> = (0..keep).collect();
        self.fitted = Some(PcaFit {
            mean,
            components: vectors.select(Axis(1), &components),
            explained_variance: values.select(Axis(0), &components),
        });
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let fit = self.fitted.as_ref().ok_or(ModelingError::NotFitted("pca"))?;
        check_width(fit.mean.len(), x.ncols(), "pca")?;
        ensure_finite(x, "pca")?;
        let mut projected = (x - &fit.mean).dot(&fit.components);
        if self.whiten {
            let scale = fit
                .explained_variance
                .mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 });
            projected /= &scale;
        }
        Ok(projected)
    }

    pub fn n_components_fitted(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.components.ncols())
    }

    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.explained_variance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_eigen_of_diagonal_matrix() {
        let (values, vectors) = symmetric_eigen(&array![[1.0, 0.0], [0.0, 3.0]]);
        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 1.0).abs() < 1e-12);
        assert!((vectors[[1, 0]].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_eigen_reconstructs_symmetric_matrix() {
        let a = array![[4.0, 1.0, 2.0], [1.0, 3.0, 0.5], [2.0, 0.5, 5.0]];
        let (values, vectors) = symmetric_eigen(&a);
        let rebuilt = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        for (a, b) in a.iter().zip(rebuilt.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pca_fraction_picks_dominant_axis() {
        let x = array![[1.0, 1.01], [2.0, 1.98], [3.0, 3.02], [4.0, 3.99]];
        let mut pca = Pca::new();
        pca.set_param("n_components", &ParamScalar::Float(0.95)).unwrap();
        pca.fit(&x).unwrap();
        assert_eq!(pca.n_components_fitted(), Some(1));
        assert_eq!(pca.transform(&x).unwrap().dim(), (4, 1));
    }

    #[test]
    fn test_pca_rejects_too_many_components() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 0.0]];
        let mut pca = Pca::new();
        pca.set_param("n_components", &ParamScalar::Int(3)).unwrap();
        assert!(matches!(pca.fit(&x), Err(ModelingError::InvalidParameter { .. })));
    }

    #[test]
    fn test_pca_unknown_param() {
        assert!(Pca::new().set_param("solver", &ParamScalar::Text("full".into())).is_err());
    }
}
