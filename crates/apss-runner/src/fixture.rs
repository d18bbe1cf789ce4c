use apss_core::{cluto, Input, Solution};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::adapter::Adapter;
use crate::catalog::{Catalog, DatasetEntry};
use crate::engine::Fixture;
use crate::error::{HarnessError, Result};
use crate::measure::{CounterSeries, Collector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Uninitialized,
    Prepared,
    Ran,
    TornDown,
}

impl TrialState {
    pub fn as_str(self) -> &'static str {
        match self {
            TrialState::Uninitialized => "uninitialized",
            TrialState::Prepared => "prepared",
            TrialState::Ran => "ran",
            TrialState::TornDown => "torn_down",
        }
    }
}

/// Loads a dataset and puts it in the shape an algorithm expects: explicit
/// zeros and empty rows removed, rows unit-length, and for index-based
/// algorithms column-sorted rows plus the inverted index.
pub fn prepare_input(entry: &DatasetEntry, value: usize, needs_index: bool) -> Result<Input> {
    let data_error = |source| HarnessError::DataPreparation {
        value,
        path: entry.path.clone(),
        source,
    };
    let mut matrix = cluto::load(&entry.path).map_err(data_error)?;
    matrix.compact();
    matrix.normalize();
    let index = if needs_index {
        matrix.sort_columns();
        Some(matrix.transpose())
    } else {
        None
    };
    debug!(
        "prepared {}: {} rows, {} cols, {} nnz",
        entry.path.display(),
        matrix.nrows(),
        matrix.ncols(),
        matrix.nnz()
    );
    Ok(Input::new(matrix, index))
}

/// One algorithm's trial harness: prepare, run once, tear down.
pub struct TrialFixture {
    adapter: Adapter,
    catalog: Arc<Catalog>,
    preprocess: bool,
    state: TrialState,
    minsim: f32,
    input: Option<Input>,
    output: Solution,
    collector: Collector,
}

impl TrialFixture {
    pub fn new(adapter: Adapter, catalog: Arc<Catalog>, preprocess: bool) -> Self {
        Self {
            adapter,
            catalog,
            preprocess,
            state: TrialState::Uninitialized,
            minsim: 0.0,
            input: None,
            output: Solution::new(),
            collector: Collector::for_counters(),
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn output(&self) -> &Solution {
        &self.output
    }

    pub fn prepare(&mut self, value: usize) -> Result<()> {
        self.expect_state(
            &[TrialState::Uninitialized, TrialState::TornDown],
            "uninitialized or torn_down",
        )?;
        let entry = self.catalog.get(value).ok_or_else(|| HarnessError::Catalog {
            path: Default::default(),
            reason: format!(
                "experiment value {} is outside the problem space of {} dataset(s)",
                value,
                self.catalog.len()
            ),
        })?;
        let input = prepare_input(entry, value, self.adapter.needs_index())?;
        self.minsim = entry.threshold;
        self.input = Some(input);
        self.output.clear();
        self.state = TrialState::Prepared;
        Ok(())
    }

    /// Preprocessing, when enabled, is done here but stays outside the
    /// measured interval.
    pub fn run_once(&mut self) -> Result<Duration> {
        self.expect_state(&[TrialState::Prepared], "prepared")?;
        let input = self.input.as_mut().ok_or(HarnessError::Lifecycle {
            name: self.adapter.name().to_string(),
            expected: "prepared",
            found: "missing input",
        })?;
        if self.preprocess {
            self.adapter.preprocess(self.minsim, input)?;
        }
        let start = Instant::now();
        let result = self.adapter.run(self.minsim, input, &mut self.output);
        let elapsed = start.elapsed();
        result?;
        black_box(self.output.len());
        self.state = TrialState::Ran;
        Ok(elapsed)
    }

    pub fn teardown(&mut self) -> Result<()> {
        self.expect_state(&[TrialState::Ran], "ran")?;
        self.input = None;
        self.collector.harvest(&self.adapter.counters());
        self.state = TrialState::TornDown;
        Ok(())
    }

    fn expect_state(&self, allowed: &[TrialState], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(HarnessError::Lifecycle {
            name: self.adapter.name().to_string(),
            expected,
            found: self.state.as_str(),
        })
    }
}

impl Fixture for TrialFixture {
    fn problem_space(&self) -> Vec<usize> {
        self.catalog.problem_space()
    }

    fn set_up(&mut self, value: usize) -> Result<()> {
        self.prepare(value)
    }

    fn run_once(&mut self) -> Result<Duration> {
        TrialFixture::run_once(self)
    }

    fn tear_down(&mut self) -> Result<()> {
        self.teardown()
    }

    fn measurements(&self) -> Vec<CounterSeries> {
        self.collector.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scratch_dir, write_toy_dataset, FakeApss};
    use apss_core::{BruteForce, IdxJoin};
    use std::fs;

    fn fixture_for(adapter: Adapter, catalog: Catalog, preprocess: bool) -> TrialFixture {
        TrialFixture::new(adapter, Arc::new(catalog), preprocess)
    }

    #[test]
    fn lifecycle_runs_in_order_and_collects_counters() {
        let dir = scratch_dir("fixture_lifecycle");
        let path = write_toy_dataset(&dir);
        let mut fixture = fixture_for(
            Adapter::new("bruteforce", Box::new(BruteForce)),
            Catalog::single(&path, 0.6),
            false,
        );
        assert_eq!(fixture.state(), TrialState::Uninitialized);

        for _ in 0..2 {
            fixture.prepare(0).expect("prepare");
            fixture.run_once().expect("run");
            assert_eq!(fixture.output().len(), 3);
            fixture.teardown().expect("teardown");
        }
        assert_eq!(fixture.state(), TrialState::TornDown);
        assert_eq!(fixture.collector().series("nsims"), Some(&[3u64, 3][..]));
        assert_eq!(fixture.collector().series("ncand"), Some(&[15u64, 15][..]));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn index_algorithms_receive_an_inverted_index() {
        let dir = scratch_dir("fixture_index");
        let path = write_toy_dataset(&dir);
        let mut fixture = fixture_for(
            Adapter::new("idxjoin", Box::new(IdxJoin)),
            Catalog::single(&path, 0.6),
            true,
        );
        fixture.prepare(0).expect("prepare");
        fixture.run_once().expect("run");
        fixture.teardown().expect("teardown");
        assert_eq!(fixture.collector().series("nsims"), Some(&[3u64][..]));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn out_of_order_calls_are_lifecycle_errors() {
        let mut fixture = fixture_for(
            Adapter::new("nova", Box::new(FakeApss::new("nova"))),
            Catalog::single("unused.mat", 0.5),
            false,
        );
        match fixture.run_once() {
            Err(HarnessError::Lifecycle {
                expected, found, ..
            }) => {
                assert_eq!(expected, "prepared");
                assert_eq!(found, "uninitialized");
            }
            other => panic!("expected lifecycle error, got {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            fixture.teardown(),
            Err(HarnessError::Lifecycle { .. })
        ));
    }

    #[test]
    fn unreadable_dataset_fails_preparation_with_its_value() {
        let mut fixture = fixture_for(
            Adapter::new("nova", Box::new(FakeApss::new("nova"))),
            Catalog::single("/nonexistent/apss/missing.mat", 0.5),
            false,
        );
        match fixture.prepare(0) {
            Err(HarnessError::DataPreparation { value, path, .. }) => {
                assert_eq!(value, 0);
                assert!(path.ends_with("missing.mat"));
            }
            other => panic!("expected data preparation error, got {:?}", other),
        }
        assert_eq!(fixture.state(), TrialState::Uninitialized);
        assert!(fixture.prepare(3).is_err());
    }

    #[test]
    fn algorithm_failure_leaves_the_fixture_prepared() {
        let dir = scratch_dir("fixture_failure");
        let path = write_toy_dataset(&dir);
        let mut fixture = fixture_for(
            Adapter::new("ghost", Box::new(FakeApss::new("ghost").failing())),
            Catalog::single(&path, 0.6),
            false,
        );
        fixture.prepare(0).expect("prepare");
        assert!(matches!(
            fixture.run_once(),
            Err(HarnessError::AlgorithmExecution { .. })
        ));
        assert_eq!(fixture.state(), TrialState::Prepared);
        assert_eq!(fixture.collector().series("ncand").map(|s| s.len()), Some(0));
        let _ = fs::remove_dir_all(dir);
    }
}
