use crate::error::ModelingError;
use crate::modeling::nan_variance;
use ndarray::{Array1, Array2, Axis};

/// Replaces missing values with the per-column median seen during fit.
/// A column with no observed value imputes 0.
#[derive(Debug, Clone, Default)]
pub struct SimpleImputer {
    medians: Option<Array1<f64>>,
}

impl SimpleImputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &Array2<f64>) {
        let medians = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mut values: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
                if values.is_empty() {
                    return 0.0;
                }
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            })
            .collect();
        self.medians = Some(medians);
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let medians = self.medians.as_ref().ok_or(ModelingError::NotFitted("imputer"))?;
        check_width(medians.len(), x.ncols(), "imputer")?;
        let mut out = x.clone();
        for (mut col, median) in out.axis_iter_mut(Axis(1)).zip(medians.iter()) {
            col.mapv_inplace(|v| if v.is_finite() { v } else { *median });
        }
        Ok(out)
    }
}

/// Centers each column on its mean and scales to unit variance.
/// Zero-variance columns are only centered.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &Array2<f64>) {
        let (mean, scale): (Vec<f64>, Vec<f64>) = x
            .axis_iter(Axis(1))
            .map(|col| {
                let (mean, var) = nan_variance(col.iter().copied());
                let std = var.sqrt();
                (mean, if std > 0.0 { std } else { 1.0 })
            })
            .unzip();
        self.mean = Some(Array1::from(mean));
        self.scale = Some(Array1::from(scale));
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelingError> {
        let (Some(mean), Some(scale)) = (&self.mean, &self.scale) else {
            return Err(ModelingError::NotFitted("scaler"));
        };
        check_width(mean.len(), x.ncols(), "scaler")?;
        Ok((x - mean) / scale)
    }
}

pub(crate) fn check_width(fitted: usize, got: usize, step: &str) -> Result<(), ModelingError> {
    if fitted == got {
        Ok(())
    } else {
        Err(ModelingError::InvalidInput(format!(
            "{} was fitted on {} features, got {}",
            step, fitted, got
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_imputer_uses_median() {
        let x = array![[1.0, f64::NAN], [f64::NAN, f64::NAN], [3.0, f64::NAN], [10.0, f64::NAN]];
        let mut imp = SimpleImputer::new();
        imp.fit(&x);
        let out = imp.transform(&x).unwrap();
        assert_eq!(out[[1, 0]], 3.0);
        assert_eq!(out[[0, 1]], 0.0);
    }

    #[test]
    fn test_scaler_standardizes_columns() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let mut sc = StandardScaler::new();
        sc.fit(&x);
        let out = sc.transform(&x).unwrap();
        assert_eq!(out, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let x = array![[1.0]];
        assert!(matches!(
            StandardScaler::new().transform(&x),
            Err(ModelingError::NotFitted("scaler"))
        ));
    }
}
