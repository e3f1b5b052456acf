use crate::error::ModelingError;
use crate::models::ParamScalar;
use crate::modeling::preprocessing::check_width;
use crate::modeling::{ensure_finite, invalid_param, param_f64, param_usize};
use ndarray::{Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

const STEP: &str = "svc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Linear,
    Rbf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gamma {
    /// `1 / (n_features * var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
    Value(f64),
}

#[derive(Debug, Clone)]
struct SvcFit {
    train: Array2<f64>,
    gamma: f64,
    /// One dual coefficient vector (alpha_i * s_i) per binary machine.
    machines: Vec<Vec<f64>>,
    n_classes: usize,
    /// Set when training saw a single class.
    constant: Option<usize>,
}

/// Support vector classifier trained by dual coordinate descent on the
/// hinge loss. The bias is folded into the kernel as `K(x, z) + 1`.
/// Binary targets use one machine; more classes use one-vs-rest.
#[derive(Debug, Clone)]
pub struct Svc {
    kernel: Kernel,
    c: f64,
    gamma: Gamma,
    max_iter: usize,
    tol: f64,
    random_state: u64,
    fitted: Option<SvcFit>,
}

impl Svc {
    pub fn new(random_state: u64) -> Self {
        Self {
            kernel: Kernel::Rbf,
            c: 1.0,
            gamma: Gamma::Scale,
            max_iter: 200,
            tol: 1e-3,
            random_state,
            fitted: None,
        }
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    pub fn set_param(&mut self, name: &str, value: &ParamScalar) -> Result<(), ModelingError> {
        match name {
            "kernel" => {
                self.kernel = match value.as_str() {
                    Some("linear") => Kernel::Linear,
                    Some("rbf") => Kernel::Rbf,
                    _ => {
                        return Err(invalid_param(
                            STEP,
                            name,
                            format!("unsupported kernel {}", value),
                        ))
                    }
                }
            }
            "c" => {
                let c = param_f64(STEP, name, value)?;
                if c <= 0.0 {
                    return Err(invalid_param(STEP, name, "must be positive"));
                }
                self.c = c;
            }
            "gamma" => {
                self.gamma = match value {
                    ParamScalar::Text(s) if s == "scale" => Gamma::Scale,
                    ParamScalar::Text(s) if s == "auto" => Gamma::Auto,
                    other => {
                        let g = param_f64(STEP, name, other)?;
                        if g <= 0.0 {
                            return Err(invalid_param(STEP, name, "must be positive"));
                        }
                        Gamma::Value(g)
                    }
                }
            }
            "max_iter" => self.max_iter = param_usize(STEP, name, value)?.max(1),
            "tol" => self.tol = param_f64(STEP, name, value)?,
            "random_state" => self.random_state = param_usize(STEP, name, value)? as u64,
            other => return Err(invalid_param(STEP, other, "unknown parameter")),
        }
        Ok(())
    }

    fn resolve_gamma(&self, x: &Array2<f64>) -> f64 {
        let p = x.ncols().max(1) as f64;
        match self.gamma {
            Gamma::Value(g) => g,
            Gamma::Auto => 1.0 / p,
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 { 1.0 / (p * var) } else { 1.0 }
            }
        }
    }

    fn kernel_value(&self, gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let k = match self.kernel {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf => {
                let d2: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v).powi(2)).sum();
                (-gamma * d2).exp()
            }
        };
        k + 1.0
    }

    /// Dual coordinate descent for one binary problem with labels `s`.
    fn train_machine(&self, gram: &Array2<f64>, s: &[f64], rng: &mut ChaCha8Rng) -> Vec<f64> {
        let n = s.len();
        let mut alpha = vec![0.0_f64; n];
        // grad[i] = sum_j Q_ij alpha_j, with Q_ij = s_i s_j K_ij
        let mut grad = vec![0.0_f64; n];
        let mut order: Vec<usize> = (0..n).collect();

        for _ in 0..self.max_iter {
            order.shuffle(rng);
            let mut max_pg: f64 = 0.0;
            for &i in &order {
                let g = grad[i] - 1.0;
                let pg = if alpha[i] <= 0.0 {
                    g.min(0.0)
                } else if alpha[i] >= self.c {
                    g.max(0.0)
                } else {
                    g
                };
                max_pg = max_pg.max(pg.abs());
                if pg.abs() <= 1e-12 {
                    continue;
                }
                let qii = gram[[i, i]];
                let new = (alpha[i] - g / qii).clamp(0.0, self.c);
                let delta = new - alpha[i];
                if delta != 0.0 {
                    alpha[i] = new;
                    for j in 0..n {
                        grad[j] += delta * s[i] * s[j] * gram[[i, j]];
                    }
                }
            }
            if max_pg < self.tol {
                break;
            }
        }

        alpha.iter().zip(s).map(|(a, si)| a * si).collect()
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
                "svc got {} samples and {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let gamma = self.resolve_gamma(x);
        let mut seen: Vec<usize> = y.to_vec();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() == 1 {
            self.fitted = Some(SvcFit {
                train: x.clone(),
                gamma,
                machines: Vec::new(),
                n_classes,
                constant: Some(seen[0]),
            });
            return Ok(());
        }

        let n = x.nrows();
        let mut gram = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let k = self.kernel_value(gamma, x.row(i), x.row(j));
                gram[[i, j]] = k;
                gram[[j, i]] = k;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let positives: Vec<usize> = if n_classes == 2 { vec![1] } else { (0..n_classes).collect() };
        let machines = positives
            .iter()
            .map(|&class| {
                let s: Vec<f64> = y.iter().map(|&c| if c == class { 1.0 } else { -1.0 }).collect();
                self.train_machine(&gram, &s, &mut rng)
            })
            .collect();

        self.fitted = Some(SvcFit {
            train: x.clone(),
            gamma,
            machines,
            n_classes,
            constant: None,
        });
        Ok(())
    }

    /// Raw decision values, one column per binary machine.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let fit = self.fitted.as_ref().ok_or(ModelingError::NotFitted(STEP))?;
        check_width(fit.train.ncols(), x.ncols(), STEP)?;
        ensure_finite(x, STEP)?;

        let mut out = Array2::<f64>::zeros((x.nrows(), fit.machines.len()));
        for (r, row) in x.axis_iter(Axis(0)).enumerate() {
            let kernel_row: Vec<f64> = fit
                .train
                .axis_iter(Axis(0))
                .map(|t| self.kernel_value(fit.gamma, t, row))
                .collect();
            for (m, coef) in fit.machines.iter().enumerate() {
                out[[r, m]] = coef.iter().zip(&kernel_row).map(|(c, k)| c * k).sum();
            }
        }
        Ok(out)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelingError> {
        let fit = self.fitted.as_ref().ok_or(ModelingError::NotFitted(STEP))?;
        if let Some(class) = fit.constant {
            check_width(fit.train.ncols(), x.ncols(), STEP)?;
            return Ok(vec![class; x.nrows()]);
        }
        let decision = self.decision_function(x)?;
        Ok(decision
            .axis_iter(Axis(0))
            .map(|row| {
                if fit.n_classes == 2 {
                    usize::from(row[0] > 0.0)
                } else {
                    row.iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
                            if *v > best.1 { (i, *v) } else { best }
                        })
                        .0
                }
            })
            .collect())
    }
}
