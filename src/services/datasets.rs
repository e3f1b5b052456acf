use crate::models::{Cell, Frame};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const EXAMPLE_ROWS: usize = 200;
pub const EXAMPLE_FEATURES: usize = 6;
/// Features that carry class signal; the rest are noise.
const INFORMATIVE: usize = 3;
const CLASS_SEPARATION: f64 = 1.5;

/// Standard normal draw via Box-Muller.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Seeded, balanced two-class dataset with `feature_0..feature_5` and an
/// integer `target` column. The same seed always yields the same frame.
pub fn example_dataset(seed: u64) -> Frame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut labels: Vec<i64> = (0..EXAMPLE_ROWS).map(|i| (i % 2) as i64).collect();
    labels.shuffle(&mut rng);

    let mut columns: IndexMap<String, Vec<Cell>> = IndexMap::new();
    for j in 0..EXAMPLE_FEATURES {
        let values = labels
            .iter()
            .map(|&label| {
                let shift = if j < INFORMATIVE && label == 1 {
                    CLASS_SEPARATION
                } else {
                    0.0
                };
                Cell::Float(standard_normal(&mut rng) + shift)
            })
            .collect();
        columns.insert(format!("feature_{}", j), values);
    }
    columns.insert("target".to_string(), labels.into_iter().map(Cell::Int).collect());

    // invariant: every column has EXAMPLE_ROWS cells
    Frame::from_columns(columns).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_balance() {
        let frame = example_dataset(42);
        assert_eq!(frame.shape(), (EXAMPLE_ROWS, EXAMPLE_FEATURES + 1));
        let ones = frame
            .column("target")
            .unwrap()
            .iter()
            .filter(|c| **c == Cell::Int(1))
            .count();
        assert_eq!(ones, EXAMPLE_ROWS / 2);
    }

    #[test]
    fn test_seed_is_deterministic() {
        assert_eq!(example_dataset(7), example_dataset(7));
        assert_ne!(example_dataset(7), example_dataset(8));
    }
}
