//! Builds the training material from prepared record lines of the shape
//! `<board-token>;<gaul-wins-bit>;<roman-wins-bit>`, one header line first.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::board::{encode, FeatureVector};

/// Outcome marker of records from games the Gaul (first) side won.
pub const GAUL_WIN_MARKER: &str = "1;0";
/// Outcome marker of records from games the Roman (second) side won.
pub const ROMAN_WIN_MARKER: &str = "0;1";

/// Label of a pair whose first position came from a Gaul-won game.
pub const FIRST_WINS: [f32; 2] = [1.0, 0.0];
/// Label of a pair whose second position came from a Gaul-won game.
pub const SECOND_WINS: [f32; 2] = [0.0, 1.0];

/// An ordered pair of encoded positions with a one-hot winner-side label.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingPair {
    pub first: FeatureVector,
    pub second: FeatureVector,
    pub label: [f32; 2],
}

pub struct PairDataset {
    /// Every record position after the header, encoded, order preserved.
    /// Used in full for representation learning; never split.
    pub pool: Vec<FeatureVector>,
    /// The symmetric labeled pair set.
    pub pairs: Vec<TrainingPair>,
    pub num_gaul_wins: usize,
    pub num_roman_wins: usize,
}

fn position_field(line: &str) -> &str {
    line.split(';').next().unwrap_or("")
}

/// Builds the unlabeled pool and the labeled pair set from raw record lines.
///
/// Records are partitioned by exact substring match on the two outcome
/// markers. The pair set is the full cross product of the two partitions,
/// with both orderings emitted per combination under inverted labels, so it
/// holds `2 * num_gaul_wins * num_roman_wins` pairs. The whole cross product
/// is materialized in memory; it dominates the cost of the pipeline and is
/// the first place to down-sample for large corpora.
pub fn build<S: AsRef<str>>(lines: &[S]) -> PairDataset {
    let gaul_wins: Vec<FeatureVector> = lines
        .iter()
        .map(|line| line.as_ref())
        .filter(|line| line.contains(GAUL_WIN_MARKER))
        .map(|line| encode(position_field(line)))
        .collect();
    let roman_wins: Vec<FeatureVector> = lines
        .iter()
        .map(|line| line.as_ref())
        .filter(|line| line.contains(ROMAN_WIN_MARKER))
        .map(|line| encode(position_field(line)))
        .collect();

    let mut pairs = Vec::with_capacity(2 * gaul_wins.len() * roman_wins.len());
    for gaul_position in &gaul_wins {
        for roman_position in &roman_wins {
            pairs.push(TrainingPair {
                first: *gaul_position,
                second: *roman_position,
                label: FIRST_WINS,
            });
            pairs.push(TrainingPair {
                first: *roman_position,
                second: *gaul_position,
                label: SECOND_WINS,
            });
        }
    }

    // The first line is the header; everything after it feeds the pool.
    let pool = lines
        .iter()
        .skip(1)
        .map(|line| encode(position_field(line.as_ref())))
        .collect();

    PairDataset {
        pool,
        pairs,
        num_gaul_wins: gaul_wins.len(),
        num_roman_wins: roman_wins.len(),
    }
}

/// Shuffles the labeled pairs and splits off a test partition of
/// `round(len * test_fraction)` pairs. The remainder is the training
/// partition.
pub fn split_pairs(
    mut pairs: Vec<TrainingPair>,
    test_fraction: f64,
    rng: &mut StdRng,
) -> (Vec<TrainingPair>, Vec<TrainingPair>) {
    pairs.shuffle(rng);
    let num_test = ((pairs.len() as f64 * test_fraction).round() as usize).min(pairs.len());
    let train = pairs.split_off(num_test);
    (train, pairs)
}
