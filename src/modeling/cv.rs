use crate::error::ModelingError;
use crate::modeling::invalid_param;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Train/test sample indices of one split, both sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn members_by_class(y: &[usize]) -> Vec<Vec<usize>> {
    let n_classes = y.iter().max().map_or(0, |m| m + 1);
    let mut members = vec![Vec::new(); n_classes];
    for (i, &c) in y.iter().enumerate() {
        members[c].push(i);
    }
    members.retain(|m| !m.is_empty());
    members
}

/// K-fold splitter that keeps class proportions in every fold.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: u64) -> Result<Self, ModelingError> {
        if n_splits < 2 {
            return Err(invalid_param(
                "cv",
                "n_splits",
                format!("must be at least 2, got {}", n_splits),
            ));
        }
        Ok(Self {
            n_splits,
            shuffle,
            seed,
        })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Deal each class's members round-robin over the folds, continuing the
    /// rotation across classes so fold sizes stay balanced.
    pub fn split(&self, y: &[usize]) -> Result<Vec<Fold>, ModelingError> {
        if self.n_splits > y.len() {
            return Err(ModelingError::InvalidInput(format!(
                "Cannot have n_splits={} greater than the number of samples {}",
                self.n_splits,
                y.len()
            )));
        }

        let mut classes = members_by_class(y);
        if let Some(smallest) = classes.iter().map(Vec::len).min() {
            if smallest < self.n_splits {
                tracing::warn!(
                    "The least populated class has only {} members, fewer than n_splits={}",
                    smallest,
                    self.n_splits
                );
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; y.len()];
        let mut offset = 0;
        for members in &mut classes {
            if self.shuffle {
                members.shuffle(&mut rng);
            }
            for (k, &i) in members.iter().enumerate() {
                assignment[i] = (offset + k) % self.n_splits;
            }
            offset += members.len();
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| assignment[i] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

/// Stratified single train/test split.
///
/// The test set holds `ceil(test_size * n)` samples drawn evenly through
/// every class.
pub fn train_test_split(y: &[usize], test_size: f64, seed: u64) -> Result<Fold, ModelingError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(invalid_param("split", "test_size", "must be in (0, 1)"));
    }
    let n = y.len();
    let n_test = ((n as f64) * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ModelingError::InvalidInput(format!(
            "test_size={} leaves no training or test samples out of {}",
            test_size, n
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut keyed: Vec<(f64, usize, usize)> = Vec::with_capacity(n);
    for (class, mut members) in members_by_class(y).into_iter().enumerate() {
        members.shuffle(&mut rng);
        let count = members.len() as f64;
        for (k, i) in members.into_iter().enumerate() {
            keyed.push(((k as f64 + 0.5) / count, class, i));
        }
    }
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut test: Vec<usize> = keyed.iter().take(n_test).map(|k| k.2).collect();
    let mut train: Vec<usize> = keyed.iter().skip(n_test).map(|k| k.2).collect();
    test.sort_unstable();
    train.sort_unstable();
    Ok(Fold { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_partition_samples() {
        let y: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let folds = StratifiedKFold::new(5, true, 42).unwrap().split(&y).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.test.len(), 4);
            assert_eq!(fold.train.len(), 16);
            let positives = fold.test.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(positives, 2);
        }
    }

    #[test]
    fn test_split_is_seeded() {
        let y: Vec<usize> = (0..30).map(|i| i % 3).collect();
        let a = StratifiedKFold::new(3, true, 1).unwrap().split(&y).unwrap();
        let b = StratifiedKFold::new(3, true, 1).unwrap().split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_split_counts() {
        assert!(StratifiedKFold::new(1, false, 0).is_err());
        let kf = StratifiedKFold::new(5, false, 0).unwrap();
        assert!(matches!(kf.split(&[0, 1, 0]), Err(ModelingError::InvalidInput(_))));
    }

    #[test]
    fn test_train_test_split_stratifies() {
        let y: Vec<usize> = (0..50).map(|i| usize::from(i >= 40)).collect();
        let fold = train_test_split(&y, 0.2, 7).unwrap();
        assert_eq!(fold.test.len(), 10);
        assert_eq!(fold.train.len(), 40);
        assert_eq!(fold.test.iter().filter(|&&i| y[i] == 1).count(), 2);
        assert!(train_test_split(&y, 1.5, 0).is_err());
    }
}
