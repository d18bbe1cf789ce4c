use super::{check_threshold, is_match, require_index, Accumulator, Apss, Input, Solution};
use crate::counters::Counters;
use crate::error::AlgorithmError;

/// Row-by-row sparse product `M * M^T` (Gustavson order). Every posting is
/// multiplied; the lower triangle and the diagonal are discarded afterwards
/// and counted as pruned.
#[derive(Debug, Clone, Copy, Default)]
pub struct MmJoin;

impl Apss for MmJoin {
    fn name(&self) -> &'static str {
        "mmjoin"
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
                let postings = index.row(c);
                for (j, w) in postings.iter() {
                    acc.add(j, v * w);
                }
                counters.nmacs1 += postings.len() as u64;
            }
            for (j, sim) in acc.drain() {
                if j <= i {
                    counters.nprun += 1;
                    continue;
                }
                counters.ncand += 1;
                if is_match(sim, minsim) {
                    output.push(i, j, sim);
                    counters.nsims += 1;
                }
            }
        }

        Ok(counters)
    }
}
