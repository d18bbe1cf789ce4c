//! All-pairs similarity search algorithms behind one trait.

mod allpairs;
mod bruteforce;
mod idxjoin;
mod mmjoin;

pub use allpairs::AllPairs;
pub use bruteforce::BruteForce;
pub use idxjoin::IdxJoin;
pub use mmjoin::MmJoin;

use serde::Serialize;

use crate::counters::Counters;
use crate::error::AlgorithmError;
use crate::matrix::SparseMatrix;

/// Prepared problem instance handed to an algorithm.
#[derive(Debug, Clone)]
pub struct Input {
    pub matrix: SparseMatrix,
    /// Transpose of `matrix`; present only when the algorithm asked for it.
    pub index: Option<SparseMatrix>,
    /// Per-column maximum weights, filled in by a preprocessing pass.
    pub column_max: Option<Vec<f32>>,
}

impl Input {
    pub fn new(matrix: SparseMatrix, index: Option<SparseMatrix>) -> Self {
        Self {
            matrix,
            index,
            column_max: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarPair {
    pub a: u32,
    pub b: u32,
    pub sim: f32,
}

/// Result accumulator. Pairs are stored with `a < b`.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pairs: Vec<SimilarPair>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, i: usize, j: usize, sim: f32) {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.pairs.push(SimilarPair {
            a: a as u32,
            b: b as u32,
            sim,
        });
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn pairs(&self) -> &[SimilarPair] {
        &self.pairs
    }

    /// Pairs ordered by `(a, b)`, for comparing algorithms.
    pub fn sorted_pairs(&self) -> Vec<(u32, u32)> {
        let mut out: Vec<_> = self.pairs.iter().map(|p| (p.a, p.b)).collect();
        out.sort_unstable();
        out
    }
}

pub trait Apss: Send {
    fn name(&self) -> &'static str;

    /// Whether the caller must supply `Input::index`.
    fn needs_index(&self) -> bool {
        false
    }

    fn preprocess(&self, minsim: f32, input: &mut Input) -> Result<(), AlgorithmError> {
        let _ = (minsim, input);
        Ok(())
    }

    fn run(
        &self,
        minsim: f32,
        input: &Input,
        output: &mut Solution,
    ) -> Result<Counters, AlgorithmError>;
}

pub(crate) fn check_threshold(minsim: f32) -> Result<(), AlgorithmError> {
    if minsim.is_finite() && (0.0..=1.0).contains(&minsim) {
        Ok(())
    } else {
        Err(AlgorithmError::InvalidThreshold(minsim))
    }
}

/// A pair matches when it shares weight and reaches the threshold, so a zero
/// threshold selects co-occurring rows only.
pub(crate) fn is_match(sim: f32, minsim: f32) -> bool {
    sim > 0.0 && sim >= minsim
}

pub(crate) fn require_index(input: &Input) -> Result<&SparseMatrix, AlgorithmError> {
    let index = input.index.as_ref().ok_or(AlgorithmError::MissingIndex)?;
    if index.nrows() != input.matrix.ncols() {
        return Err(AlgorithmError::IndexMismatch {
            expected: input.matrix.ncols(),
            found: index.nrows(),
        });
    }
    Ok(index)
}

/// Sparse score accumulator over row ids, cleared between queries.
pub(crate) struct Accumulator {
    scores: Vec<f32>,
    seen: Vec<bool>,
    touched: Vec<usize>,
}

impl Accumulator {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            scores: vec![0.0; n],
            seen: vec![false; n],
            touched: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, j: usize, value: f32) {
        if !self.seen[j] {
            self.seen[j] = true;
            self.touched.push(j);
        }
        self.scores[j] += value;
    }

    /// Yields every touched `(row, score)` and resets the accumulator.
    pub(crate) fn drain(&mut self) -> Vec<(usize, f32)> {
        let mut out = Vec::with_capacity(self.touched.len());
        for j in self.touched.drain(..) {
            out.push((j, self.scores[j]));
            self.scores[j] = 0.0;
            self.seen[j] = false;
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Six small vectors; at 0.6 the matches are (0,1), (3,4) and (4,5).
    pub(crate) fn toy_input(with_index: bool) -> Input {
        let text = "6 5 12\n\
                    1 1 2 1\n\
                    1 1 2 1 3 1\n\
                    3 2 4 1\n\
                    4 1 5 1\n\
                    5 3\n\
                    1 1 5 1\n";
        let mut m = crate::cluto::read(text.as_bytes()).expect("toy matrix");
        m.compact();
        m.normalize();
        let index = if with_index {
            m.sort_columns();
            Some(m.transpose())
        } else {
            None
        };
        Input::new(m, index)
    }

    pub(crate) fn reference_pairs(minsim: f32) -> Vec<(u32, u32)> {
        let input = toy_input(false);
        let mut out = Solution::new();
        BruteForce
            .run(minsim, &input, &mut out)
            .expect("bruteforce on toy input");
        out.sorted_pairs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_orders_pair_members() {
        let mut s = Solution::new();
        s.push(4, 1, 0.9);
        s.push(0, 2, 0.7);
        assert_eq!(s.pairs()[0].a, 1);
        assert_eq!(s.sorted_pairs(), vec![(0, 2), (1, 4)]);
    }

    #[test]
    fn threshold_must_be_in_unit_interval() {
        assert!(check_threshold(0.5).is_ok());
        assert!(check_threshold(1.0).is_ok());
        assert!(check_threshold(0.0).is_ok());
        assert!(check_threshold(-0.1).is_err());
        assert!(check_threshold(f32::NAN).is_err());
        assert!(check_threshold(1.5).is_err());
    }

    #[test]
    fn algorithms_agree_on_toy_input() {
        let expected = fixtures::reference_pairs(0.6);
        assert!(!expected.is_empty());
        let algorithms: Vec<Box<dyn Apss>> = vec![
            Box::new(IdxJoin),
            Box::new(AllPairs),
            Box::new(MmJoin),
        ];
        for algo in algorithms {
            let mut input = fixtures::toy_input(algo.needs_index());
            algo.preprocess(0.6, &mut input).expect("preprocess");
            let mut out = Solution::new();
            let counters = algo.run(0.6, &input, &mut out).expect("run");
            assert_eq!(out.sorted_pairs(), expected, "{} disagrees", algo.name());
            assert_eq!(counters.nsims, expected.len() as u64, "{}", algo.name());
        }
    }

    #[test]
    fn zero_threshold_matches_every_co_occurring_pair() {
        let expected = fixtures::reference_pairs(0.0);
        assert_eq!(
            expected,
            vec![(0, 1), (0, 5), (1, 2), (1, 5), (2, 3), (3, 4), (3, 5), (4, 5)]
        );
        let algorithms: Vec<Box<dyn Apss>> = vec![
            Box::new(IdxJoin),
            Box::new(AllPairs),
            Box::new(MmJoin),
        ];
        for algo in algorithms {
            let mut input = fixtures::toy_input(algo.needs_index());
            algo.preprocess(0.0, &mut input).expect("preprocess");
            let mut out = Solution::new();
            let counters = algo.run(0.0, &input, &mut out).expect("run");
            assert_eq!(out.sorted_pairs(), expected, "{} disagrees", algo.name());
            assert_eq!(counters.nsims, expected.len() as u64, "{}", algo.name());
        }
    }

    #[test]
    fn nsims_counts_only_pairs_found_by_the_current_run() {
        let algorithms: Vec<Box<dyn Apss>> = vec![
            Box::new(BruteForce),
            Box::new(IdxJoin),
            Box::new(AllPairs),
            Box::new(MmJoin),
        ];
        for algo in algorithms {
            let input = fixtures::toy_input(algo.needs_index());
            let mut out = Solution::new();
            out.push(0, 9, 0.99);
            out.push(1, 8, 0.98);
            let counters = algo.run(0.6, &input, &mut out).expect("run");
            assert_eq!(counters.nsims, 3, "{}", algo.name());
            assert_eq!(out.len(), 5, "{}", algo.name());
        }
    }

    #[test]
    fn index_algorithms_require_an_index() {
        let input = fixtures::toy_input(false);
        let mut out = Solution::new();
        let algorithms: [&dyn Apss; 2] = [&IdxJoin, &MmJoin];
        for algo in algorithms {
            match algo.run(0.5, &input, &mut out) {
                Err(AlgorithmError::MissingIndex) => {}
                other => panic!("{}: expected MissingIndex, got {:?}", algo.name(), other),
            }
        }
    }
}
