pub mod adapter;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod measure;
pub mod registry;
pub mod report;

pub use adapter::Adapter;
pub use catalog::{Catalog, DatasetEntry};
pub use config::{
    ConfigKey, ConfigSource, EnvSource, ExperimentConfig, FileSource, Layered, MapSource,
};
pub use driver::{plan, register, run, select_baseline, RunPlan, BASELINE_PREFERENCE, GROUP};
pub use engine::{Engine, Fixture, FixtureFactory, Plan, Registered};
pub use error::{ConfigError, HarnessError, Result};
pub use fixture::{TrialFixture, TrialState};
pub use measure::{Collector, CounterSeries, Reporting, Statistics};
pub use registry::{compiled_algorithms, AlgorithmDescriptor, Registry, Role};
pub use report::{render_text, write_json, BenchmarkResult, ExperimentResult, Report};

#[cfg(test)]
pub(crate) mod testing {
    use apss_core::{AlgorithmError, Apss, Counters, Input, Solution};
    use chrono::Utc;
    use std::fs;
    use std::path::{Path, PathBuf};

    pub(crate) fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "apss_{}_{}_{}",
            name,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    /// Six rows over five columns; at 0.6 the similar pairs are (0,1),
    /// (3,4) and (4,5).
    pub(crate) fn write_toy_dataset(dir: &Path) -> PathBuf {
        let path = dir.join("toy.mat");
        fs::write(
            &path,
            "6 5 12\n1 1 2 1\n1 1 2 1 3 1\n3 2 4 1\n4 1 5 1\n5 3\n1 1 5 1\n",
        )
        .expect("write toy dataset");
        path
    }

    /// Algorithm stand-in with fixed counters.
    #[derive(Debug, Clone)]
    pub(crate) struct FakeApss {
        name: &'static str,
        counters: Counters,
        fail: bool,
    }

    impl FakeApss {
        pub(crate) fn new(name: &'static str) -> Self {
            Self {
                name,
                counters: Counters::default(),
                fail: false,
            }
        }

        pub(crate) fn with_ncand(mut self, ncand: u64) -> Self {
            self.counters.ncand = ncand;
            self
        }

        pub(crate) fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    impl Apss for FakeApss {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(
            &self,
            minsim: f32,
            _input: &Input,
            _output: &mut Solution,
        ) -> Result<Counters, AlgorithmError> {
            if self.fail {
                return Err(AlgorithmError::InvalidThreshold(minsim));
            }
            Ok(self.counters)
        }
    }
}
