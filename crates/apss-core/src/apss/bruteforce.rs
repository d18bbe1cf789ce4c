use super::{check_threshold, is_match, Apss, Input, Solution};
use crate::counters::Counters;
use crate::error::AlgorithmError;

/// Scores every pair against a dense scatter of the earlier row.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForce;

impl Apss for BruteForce {
    fn name(&self) -> &'static str {
        "bruteforce"
    }

    fn run(
        &self,
        minsim: f32,
        input: &Input,
        output: &mut Solution,
    ) -> Result<Counters, AlgorithmError> {
        check_threshold(minsim)?;
        let m = &input.matrix;
        let mut counters = Counters::default();
        let mut dense = vec![0f32; m.ncols()];

        for i in 0..m.nrows() {
            let row_i = m.row(i);
            for (c, v) in row_i.iter() {
                dense[c] = v;
            }
            for j in (i + 1)..m.nrows() {
                let row_j = m.row(j);
                let sim: f32 = row_j.iter().map(|(c, v)| dense[c] * v).sum();
                counters.ncand += 1;
                counters.nvdot += 1;
                counters.nmacs1 += row_j.len() as u64;
                if is_match(sim, minsim) {
                    output.push(i, j, sim);
                    counters.nsims += 1;
                }
            }
            for (c, _) in row_i.iter() {
                dense[c] = 0.0;
            }
        }

        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::toy_input;
    use super::*;

    #[test]
    fn finds_known_pairs_and_scores_every_pair() {
        let input = toy_input(false);
        let mut out = Solution::new();
        let counters = BruteForce.run(0.6, &input, &mut out).expect("run");
        assert_eq!(out.sorted_pairs(), vec![(0, 1), (3, 4), (4, 5)]);
        let n = input.matrix.nrows() as u64;
        assert_eq!(counters.ncand, n * (n - 1) / 2);
        assert_eq!(counters.nvdot, counters.ncand);
        assert_eq!(counters.nprun, 0);
        assert_eq!(counters.nsims, 3);
    }

    #[test]
    fn repeated_runs_report_identical_counters() {
        let input = toy_input(false);
        let mut out = Solution::new();
        let first = BruteForce.run(0.6, &input, &mut out).expect("first run");
        out.clear();
        let second = BruteForce.run(0.6, &input, &mut out).expect("second run");
        assert_eq!(first, second);
    }
}
