use super::{check_threshold, is_match, require_index, Accumulator, Apss, Input, Solution};
use crate::counters::Counters;
use crate::error::AlgorithmError;

/// Inverted-index join. Each row accumulates partial scores against the
/// earlier rows found in the posting lists of its columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdxJoin;

impl Apss for IdxJoin {
    fn name(&self) -> &'static str {
        "idxjoin"
    }

    fn needs_index(&self) -> bool {
        true
    }

    fn run(
        &self,
        minsim: f32,
        input: &Input,
        output: &mut Solution,
    ) -> Result<Counters, AlgorithmError> {
        check_threshold(minsim)?;
        let m = &input.matrix;
        let index = require_index(input)?;
        let mut counters = Counters::default();
        let mut acc = Accumulator::new(m.nrows());

        for i in 0..m.nrows() {
            for (c, v) in m.row(i).iter() {
                // posting lists are in ascending row order
                for (j, w) in index.row(c).iter() {
                    if j >= i {
                        break;
                    }
                    acc.add(j, v * w);
                    counters.nmacs1 += 1;
                }
            }
            for (j, sim) in acc.drain() {
                counters.ncand += 1;
                if is_match(sim, minsim) {
                    output.push(j, i, sim);
                    counters.nsims += 1;
                }
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
    fn only_overlapping_rows_become_candidates() {
        let input = toy_input(true);
        let mut out = Solution::new();
        let counters = IdxJoin.run(0.6, &input, &mut out).expect("run");
        // (0,1) (0,5) (1,2) (1,5) (2,3) (3,4) (3,5) (4,5)
        assert_eq!(counters.ncand, 8);
        assert_eq!(counters.nvdot, 0);
        assert_eq!(counters.nsims, 3);
    }
}
