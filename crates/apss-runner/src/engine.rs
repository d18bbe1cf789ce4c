use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{HarnessError, Result};
use crate::measure::{CounterSeries, Statistics};
use crate::report::{BenchmarkResult, ExperimentResult};

/// Per-trial lifecycle driven by the [`Engine`].
pub trait Fixture {
    /// Experiment values this fixture can be set up with.
    fn problem_space(&self) -> Vec<usize>;

    fn set_up(&mut self, value: usize) -> Result<()>;

    /// Runs the measured operation once and returns its wall-clock time.
    fn run_once(&mut self) -> Result<Duration>;

    fn tear_down(&mut self) -> Result<()>;

    /// Non-timing measurements accumulated so far.
    fn measurements(&self) -> Vec<CounterSeries>;
}

pub type FixtureFactory = Box<dyn Fn() -> Box<dyn Fixture>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub samples: usize,
    pub iterations: usize,
    pub threads: usize,
}

impl Plan {
    pub const SINGLE: Plan = Plan {
        samples: 1,
        iterations: 1,
        threads: 1,
    };

    pub fn new(samples: usize, iterations: usize) -> Self {
        Self {
            samples,
            iterations,
            threads: 1,
        }
    }

    pub fn trials(&self) -> usize {
        self.samples * self.iterations
    }

    fn validate(&self, name: &str) -> Result<()> {
        let reason = if self.samples == 0 {
            "samples must be greater than zero"
        } else if self.iterations == 0 {
            "iterations must be greater than zero"
        } else if self.threads != 1 {
            "trials run on a single thread"
        } else {
            return Ok(());
        };
        Err(HarnessError::Plan {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registered {
    pub name: String,
    pub plan: Plan,
    pub baseline: bool,
}

struct Registration {
    name: String,
    plan: Plan,
    factory: FixtureFactory,
}

/// Sequential benchmark runner: the baseline first, then tests in
/// registration order; per benchmark, experiment values, then samples, then
/// iterations.
pub struct Engine {
    group: String,
    baseline: Option<Registration>,
    tests: Vec<Registration>,
}

impl Engine {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            baseline: None,
            tests: Vec::new(),
        }
    }

    pub fn register_baseline(
        &mut self,
        name: &str,
        plan: Plan,
        factory: FixtureFactory,
    ) -> Result<()> {
        if let Some(existing) = &self.baseline {
            return Err(HarnessError::DuplicateName(format!(
                "{} (baseline already set to `{}`)",
                name, existing.name
            )));
        }
        self.check_new(name, plan)?;
        info!(
            "{}: baseline {} ({}, {}, {})",
            self.group, name, plan.samples, plan.iterations, plan.threads
        );
        self.baseline = Some(Registration {
            name: name.to_string(),
            plan,
            factory,
        });
        Ok(())
    }

    pub fn register_test(&mut self, name: &str, plan: Plan, factory: FixtureFactory) -> Result<()> {
        self.check_new(name, plan)?;
        info!(
            "{}: test {} ({}, {}, {})",
            self.group, name, plan.samples, plan.iterations, plan.threads
        );
        self.tests.push(Registration {
            name: name.to_string(),
            plan,
            factory,
        });
        Ok(())
    }

    pub fn registrations(&self) -> Vec<Registered> {
        let baseline = self.baseline.iter().map(|r| (r, true));
        let tests = self.tests.iter().map(|r| (r, false));
        baseline
            .chain(tests)
            .map(|(r, baseline)| Registered {
                name: r.name.clone(),
                plan: r.plan,
                baseline,
            })
            .collect()
    }

    pub fn run_all(&self) -> Result<Vec<BenchmarkResult>> {
        let mut results = Vec::with_capacity(self.tests.len() + 1);
        let mut baseline_means = BTreeMap::new();
        if let Some(baseline) = &self.baseline {
            let result = self.run_one(baseline, true, &baseline_means)?;
            for exp in &result.experiments {
                baseline_means.insert(exp.value, exp.timing.mean);
            }
            results.push(result);
        }
        for test in &self.tests {
            results.push(self.run_one(test, false, &baseline_means)?);
        }
        Ok(results)
    }

    fn check_new(&self, name: &str, plan: Plan) -> Result<()> {
        if self.registrations().iter().any(|r| r.name == name) {
            return Err(HarnessError::DuplicateName(name.to_string()));
        }
        plan.validate(name)
    }

    fn run_one(
        &self,
        reg: &Registration,
        is_baseline: bool,
        baseline_means: &BTreeMap<usize, f64>,
    ) -> Result<BenchmarkResult> {
        let space = (reg.factory)().problem_space();
        let mut experiments = Vec::with_capacity(space.len());
        for value in space {
            let mut fixture = (reg.factory)();
            let mut samples_us = Vec::with_capacity(reg.plan.samples);
            for sample in 0..reg.plan.samples {
                let mut total = Duration::ZERO;
                for _ in 0..reg.plan.iterations {
                    fixture.set_up(value)?;
                    total += fixture.run_once()?;
                    fixture.tear_down()?;
                }
                let us = total.as_secs_f64() * 1e6 / reg.plan.iterations as f64;
                debug!(
                    "{}/{} value {} sample {}: {:.3} us/iteration",
                    self.group, reg.name, value, sample, us
                );
                samples_us.push(us);
            }

            let timing = Statistics::from_samples(&samples_us);
            let baseline_ratio = if is_baseline {
                Some(1.0)
            } else {
                baseline_means
                    .get(&value)
                    .filter(|mean| **mean > 0.0)
                    .map(|mean| timing.mean / mean)
            };
            info!(
                "{}/{} value {}: mean {:.3} us over {} samples, baseline x{}",
                self.group,
                reg.name,
                value,
                timing.mean,
                timing.size,
                baseline_ratio
                    .map(|r| format!("{:.3}", r))
                    .unwrap_or_else(|| "-".to_string())
            );
            experiments.push(ExperimentResult {
                value,
                samples_us,
                timing,
                baseline_ratio,
                counters: fixture.measurements(),
            });
        }
        Ok(BenchmarkResult {
            name: reg.name.clone(),
            baseline: is_baseline,
            plan: reg.plan,
            experiments,
        })
    }
}
