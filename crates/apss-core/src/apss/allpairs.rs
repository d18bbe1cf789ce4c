use super::{check_threshold, is_match, Accumulator, Apss, Input, Solution};
use crate::counters::Counters;
use crate::error::AlgorithmError;

/// Prefix-filtering join (Bayardo et al., All-Pairs). A row is indexed only
/// from the point where its upper bound against any other row, computed from
/// the per-column maxima, reaches the threshold. The unindexed prefix is
/// scored during verification.
///
/// `preprocess` stores the column maxima in the input; without it `run`
/// computes them itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllPairs;

impl Apss for AllPairs {
    fn name(&self) -> &'static str {
        "allpairs"
    }

    fn preprocess(&self, minsim: f32, input: &mut Input) -> Result<(), AlgorithmError> {
        check_threshold(minsim)?;
        input.column_max = Some(input.matrix.column_max());
        Ok(())
    }

    fn run(
        &self,
        minsim: f32,
        input: &Input,
        output: &mut Solution,
    ) -> Result<Counters, AlgorithmError> {
        check_threshold(minsim)?;
        let m = &input.matrix;
        let computed;
        let maxw: &[f32] = match &input.column_max {
            Some(v) => v,
            None => {
                computed = m.column_max();
                &computed
            }
        };

        let n = m.nrows();
        let mut counters = Counters::default();
        let mut postings: Vec<Vec<(u32, f32)>> = vec![Vec::new(); m.ncols()];
        let mut prefix_len = vec![0usize; n];
        let mut prefix_bound = vec![0f32; n];
        let mut acc = Accumulator::new(n);
        let mut dense = vec![0f32; m.ncols()];

        for x in 0..n {
            let row = m.row(x);
            for (c, v) in row.iter() {
                for &(y, w) in &postings[c] {
                    acc.add(y as usize, v * w);
                }
                counters.nmacs1 += postings[c].len() as u64;
            }

            let candidates = acc.drain();
            if !candidates.is_empty() {
                for (c, v) in row.iter() {
                    dense[c] = v;
                }
                for (y, partial) in candidates {
                    counters.ncand += 1;
                    if partial + prefix_bound[y] < minsim {
                        counters.nprun += 1;
                        continue;
                    }
                    counters.nvdot += 1;
                    let prefix = prefix_len[y];
                    let sim = partial
                        + m.row(y)
                            .iter()
                            .take(prefix)
                            .map(|(c, w)| dense[c] * w)
                            .sum::<f32>();
                    counters.nmacs2 += prefix as u64;
                    if is_match(sim, minsim) {
                        output.push(y, x, sim);
                        counters.nsims += 1;
                    }
                }
                for (c, _) in row.iter() {
                    dense[c] = 0.0;
                }
            }

            let mut bound = 0f32;
            let mut indexed_from = None;
            for (k, (c, v)) in row.iter().enumerate() {
                if indexed_from.is_none() {
                    let next = bound + maxw[c] * v.abs();
                    if next >= minsim {
                        indexed_from = Some(k);
                    } else {
                        bound = next;
                    }
                }
                if indexed_from.is_some() {
                    postings[c].push((x as u32, v));
                }
            }
            prefix_len[x] = indexed_from.unwrap_or(row.len());
            prefix_bound[x] = bound;
        }

        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::toy_input;
    use super::super::IdxJoin;
    use super::*;

    #[test]
    fn preprocessing_does_not_change_the_result() {
        let plain = toy_input(false);
        let mut prepared = toy_input(false);
        AllPairs.preprocess(0.6, &mut prepared).expect("preprocess");
        assert!(prepared.column_max.is_some());

        let mut a = Solution::new();
        let mut b = Solution::new();
        let ca = AllPairs.run(0.6, &plain, &mut a).expect("run without preprocess");
        let cb = AllPairs.run(0.6, &prepared, &mut b).expect("run with preprocess");
        assert_eq!(a.sorted_pairs(), b.sorted_pairs());
        assert_eq!(ca, cb);
    }

    #[test]
    fn generates_no_more_candidates_than_the_full_index() {
        let mut out = Solution::new();
        let filtered = AllPairs
            .run(0.6, &toy_input(false), &mut out)
            .expect("allpairs");
        out.clear();
        let full = IdxJoin.run(0.6, &toy_input(true), &mut out).expect("idxjoin");
        assert!(filtered.ncand <= full.ncand);
        assert_eq!(filtered.ncand, filtered.nprun + filtered.nvdot);
    }

    #[test]
    fn rejects_thresholds_outside_the_unit_interval() {
        let mut input = toy_input(false);
        for minsim in [1.5, -0.25, f32::NAN] {
            assert!(matches!(
                AllPairs.preprocess(minsim, &mut input),
                Err(AlgorithmError::InvalidThreshold(_))
            ));
        }
        assert!(AllPairs.preprocess(0.0, &mut input).is_ok());
    }
}
