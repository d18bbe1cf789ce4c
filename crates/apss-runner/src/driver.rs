use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapter::Adapter;
use crate::catalog::Catalog;
use crate::config::ExperimentConfig;
use crate::engine::{Engine, Fixture, FixtureFactory, Plan};
use crate::error::{HarnessError, Result};
use crate::fixture::TrialFixture;
use crate::registry::{Registry, Role};
use crate::report::Report;

pub const GROUP: &str = "apss";

/// Baseline candidates in order of preference.
pub const BASELINE_PREFERENCE: [&str; 2] = ["idxjoin", "bruteforce"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub baseline: String,
    /// Registered before the benchmarks; never filtered.
    pub references: Vec<String>,
    pub benchmarks: Vec<String>,
    pub not_implemented: Vec<String>,
}

impl RunPlan {
    /// Prepare/run/teardown cycles needed for one experiment value.
    pub fn trials_per_experiment(&self, config: &ExperimentConfig) -> usize {
        let benchmark = Plan::new(config.samples, config.iterations).trials();
        Plan::SINGLE.trials() + (self.references.len() + self.benchmarks.len()) * benchmark
    }
}

pub fn select_baseline(registry: &Registry) -> Result<String> {
    let eligible = registry.list_by_role(Role::Baseline);
    BASELINE_PREFERENCE
        .iter()
        .copied()
        .find(|name| eligible.contains(name))
        .or_else(|| eligible.first().copied())
        .map(str::to_string)
        .ok_or(HarnessError::NoBaseline)
}

/// Resolves baseline and benchmark set without touching any dataset.
pub fn plan(config: &ExperimentConfig, registry: &Registry) -> Result<RunPlan> {
    let baseline = select_baseline(registry)?;
    let references: Vec<String> = registry
        .list_by_role(Role::Reference)
        .into_iter()
        .map(str::to_string)
        .collect();
    let available = registry.list_by_role(Role::Benchmark);
    let mut benchmarks = Vec::new();
    let mut not_implemented = Vec::new();
    if config.algorithms.is_empty() {
        benchmarks.extend(
            available
                .iter()
                .filter(|name| **name != baseline)
                .map(|name| name.to_string()),
        );
    } else {
        for name in &config.algorithms {
            if available.contains(&name.as_str()) {
                benchmarks.push(name.clone());
            } else {
                warn!("{}", HarnessError::UnknownAlgorithm(name.clone()));
                not_implemented.push(name.clone());
            }
        }
    }
    Ok(RunPlan {
        baseline,
        references,
        benchmarks,
        not_implemented,
    })
}

pub fn register(
    plan: &RunPlan,
    config: &ExperimentConfig,
    registry: &Registry,
    catalog: Arc<Catalog>,
    engine: &mut Engine,
) -> Result<()> {
    let baseline = fixture_factory(registry, &plan.baseline, &catalog, config.preprocess)?;
    engine.register_baseline(&plan.baseline, Plan::SINGLE, baseline)?;
    let test_plan = Plan::new(config.samples, config.iterations);
    for name in plan.references.iter().chain(&plan.benchmarks) {
        let factory = fixture_factory(registry, name, &catalog, config.preprocess)?;
        engine.register_test(name, test_plan, factory)?;
    }
    Ok(())
}

/// Plans, loads the catalog, runs every registered benchmark and assembles
/// the report. Fails before any trial when the plan cannot be built.
pub fn run(config: &ExperimentConfig, registry: &Registry) -> Result<Report> {
    let plan = plan(config, registry)?;
    let catalog = Arc::new(Catalog::resolve(&config.dataset, config.minsim)?);
    let mut engine = Engine::new(GROUP);
    register(&plan, config, registry, Arc::clone(&catalog), &mut engine)?;
    info!(
        "running {} benchmark(s) over {} experiment(s)",
        engine.registrations().len(),
        catalog.len()
    );
    let results = engine.run_all()?;
    Ok(Report::new(GROUP, config, &plan, &catalog, results))
}

fn fixture_factory(
    registry: &Registry,
    name: &str,
    catalog: &Arc<Catalog>,
    preprocess: bool,
) -> Result<FixtureFactory> {
    let descriptor = registry
        .lookup(name)
        .cloned()
        .ok_or_else(|| HarnessError::UnknownAlgorithm(name.to_string()))?;
    let catalog = Arc::clone(catalog);
    Ok(Box::new(move || -> Box<dyn Fixture> {
        Box::new(TrialFixture::new(
            Adapter::from_descriptor(&descriptor),
            Arc::clone(&catalog),
            preprocess,
        ))
    }))
}
