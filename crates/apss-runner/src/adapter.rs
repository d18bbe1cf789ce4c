use apss_core::{AlgorithmError, Apss, Counters, Input, Solution};

use crate::error::{HarnessError, Result};
use crate::registry::AlgorithmDescriptor;

/// Uniform face of one algorithm inside a trial. Keeps nothing between
/// trials except the counters of the most recent run.
pub struct Adapter {
    name: String,
    algorithm: Box<dyn Apss>,
    last: Counters,
}

impl Adapter {
    pub fn new(name: impl Into<String>, algorithm: Box<dyn Apss>) -> Self {
        Self {
            name: name.into(),
            algorithm,
            last: Counters::default(),
        }
    }

    pub fn from_descriptor(descriptor: &AlgorithmDescriptor) -> Self {
        Self::new(descriptor.name(), descriptor.build())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn needs_index(&self) -> bool {
        self.algorithm.needs_index()
    }

    pub fn preprocess(&self, minsim: f32, input: &mut Input) -> Result<()> {
        self.algorithm
            .preprocess(minsim, input)
            .map_err(|source| self.failure("preprocess", source))
    }

    pub fn run(&mut self, minsim: f32, input: &Input, output: &mut Solution) -> Result<Counters> {
        let counters = self
            .algorithm
            .run(minsim, input, output)
            .map_err(|source| self.failure("run", source))?;
        self.last = counters;
        Ok(counters)
    }

    pub fn counters(&self) -> Counters {
        self.last
    }

    fn failure(&self, phase: &'static str, source: AlgorithmError) -> HarnessError {
        HarnessError::AlgorithmExecution {
            name: self.name.clone(),
            phase,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApss;
    use apss_core::SparseMatrix;

    #[test]
    fn run_records_counters_and_maps_failures() {
        let input = Input::new(SparseMatrix::empty(1), None);
        let mut out = Solution::new();

        let mut ok = Adapter::new("nova", Box::new(FakeApss::new("nova").with_ncand(4)));
        assert_eq!(ok.counters(), Counters::default());
        ok.run(0.5, &input, &mut out).expect("run");
        assert_eq!(ok.counters().ncand, 4);

        let mut failing = Adapter::new("ghost", Box::new(FakeApss::new("ghost").failing()));
        match failing.run(0.5, &input, &mut out) {
            Err(HarnessError::AlgorithmExecution { name, phase, .. }) => {
                assert_eq!(name, "ghost");
                assert_eq!(phase, "run");
            }
            other => panic!("expected execution error, got {:?}", other.map(|_| ())),
        }
    }
}
