//! Seeded, reproducible train/test partitioning.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles `0..n` with a ChaCha8 stream seeded by `seed` and holds out
/// `ceil(n * test_fraction)` rows, keeping at least one row for training.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let fraction = test_fraction.clamp(0.0, 1.0);
    let n_test = ((n as f64) * fraction).ceil() as usize;
    let n_test = n_test.min(n.saturating_sub(1));

    let train = indices.split_off(n_test);
    Split {
        train,
        test: indices,
    }
}
