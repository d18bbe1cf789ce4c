use anyhow::Result;
use apss_runner::{
    compiled_algorithms, render_text, select_baseline, write_json, Catalog, ConfigError,
    ConfigKey, EnvSource, ExperimentConfig, FileSource, HarnessError, Layered, MapSource,
    Registry, Role, RunPlan,
};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "apss-bench",
    version,
    about = "Comparative benchmarks for all-pairs similarity search"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags take precedence over `APSS_*` environment variables, which take
/// precedence over `--config`.
#[derive(Args, Clone, Debug, Default)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    minsim: Option<String>,
    #[arg(long)]
    dataset: Option<String>,
    #[arg(long)]
    samples: Option<String>,
    #[arg(long)]
    iterations: Option<String>,
    /// Comma-separated benchmark names; all benchmarks when omitted.
    #[arg(long)]
    algorithm: Option<String>,
    /// `--preprocess` alone means true; `--preprocess false` overrides the
    /// environment and config file.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    preprocess: Option<bool>,
}

impl ConfigArgs {
    fn source(&self) -> Result<Layered, ConfigError> {
        let mut flags = MapSource::new("flag");
        let pairs = [
            (ConfigKey::Minsim, &self.minsim),
            (ConfigKey::Dataset, &self.dataset),
            (ConfigKey::Samples, &self.samples),
            (ConfigKey::Iterations, &self.iterations),
            (ConfigKey::Algorithm, &self.algorithm),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                flags.insert(key, value.clone());
            }
        }
        if let Some(preprocess) = self.preprocess {
            flags.insert(ConfigKey::Preprocess, preprocess.to_string());
        }
        let mut layered = Layered::new().push(flags).push(EnvSource);
        if let Some(path) = &self.config {
            layered = layered.push(FileSource::load(path)?);
        }
        Ok(layered)
    }

    fn resolve(&self) -> Result<ExperimentConfig, ConfigError> {
        ExperimentConfig::resolve(&self.source()?)
    }
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Describe {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        json: bool,
    },
    List {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&error_payload(&err));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run { config, out, json } => {
            let config = config.resolve()?;
            let registry = Registry::initialize(&compiled_algorithms())?;
            let report = apss_runner::run(&config, &registry)?;
            if let Some(path) = &out {
                write_json(path, &report)?;
                info!("report written to {}", path.display());
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "report": serde_json::to_value(&report)?,
                    "out": out.map(|p| p.to_string_lossy().to_string())
                })));
            }
            print!("{}", render_text(&report));
            if let Some(path) = out {
                println!("report: {}", path.display());
            }
        }
        Commands::Describe { config, json } => {
            let config = config.resolve()?;
            let registry = Registry::initialize(&compiled_algorithms())?;
            let plan = apss_runner::plan(&config, &registry)?;
            let catalog = Catalog::resolve(&config.dataset, config.minsim)?;
            let total_trials = catalog.len() * plan.trials_per_experiment(&config);
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "config": config,
                    "plan": plan,
                    "datasets": catalog.entries(),
                    "total_trials": total_trials
                })));
            }
            print_description(&config, &plan, &catalog, total_trials);
        }
        Commands::List { json } => {
            let registry = Registry::initialize(&compiled_algorithms())?;
            let baseline = select_baseline(&registry).ok();
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "list",
                    "baseline_eligible": registry.list_by_role(Role::Baseline),
                    "reference": registry.list_by_role(Role::Reference),
                    "benchmark": registry.list_by_role(Role::Benchmark),
                    "selected_baseline": baseline
                })));
            }
            for descriptor in registry.descriptors() {
                println!("{}: {}", descriptor.name(), descriptor.role().as_str());
            }
            println!(
                "selected_baseline: {}",
                baseline.as_deref().unwrap_or("none")
            );
        }
    }
    Ok(None)
}

/// Prints one JSON document on stdout. A payload that cannot be encoded is
/// replaced by a fixed `serialization_error` document.
fn emit_json(value: &Value) {
    let line = serde_json::to_string(value).unwrap_or_else(|e| {
        json!({
            "ok": false,
            "error": {
                "code": "serialization_error",
                "message": e.to_string(),
                "details": {}
            }
        })
        .to_string()
    });
    println!("{}", line);
}

fn error_payload(err: &anyhow::Error) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": error_code(err),
            "message": err.to_string(),
            "details": error_details(err)
        }
    })
}

fn error_code(err: &anyhow::Error) -> &'static str {
    if err.downcast_ref::<ConfigError>().is_some() {
        return "config_error";
    }
    match err.downcast_ref::<HarnessError>() {
        Some(HarnessError::Config(_)) => "config_error",
        Some(HarnessError::NoBaseline) => "no_baseline",
        Some(HarnessError::Catalog { .. }) => "catalog_error",
        Some(HarnessError::DataPreparation { .. }) => "data_preparation_failed",
        Some(HarnessError::AlgorithmExecution { .. }) => "algorithm_failed",
        Some(_) => "harness_error",
        None => "command_failed",
    }
}

/// Names the failing algorithm, dataset or configuration keys.
fn error_details(err: &anyhow::Error) -> Value {
    let config = err.downcast_ref::<ConfigError>().or_else(|| {
        match err.downcast_ref::<HarnessError>() {
            Some(HarnessError::Config(inner)) => Some(inner),
            _ => None,
        }
    });
    if let Some(config) = config {
        return match config {
            ConfigError::Missing { keys } => json!({ "missing": keys }),
            ConfigError::Invalid { key, value, .. } => json!({ "key": key, "value": value }),
            ConfigError::Io { path, .. } | ConfigError::Yaml { path, .. } => {
                json!({ "config_file": path })
            }
        };
    }
    match err.downcast_ref::<HarnessError>() {
        Some(HarnessError::AlgorithmExecution { name, phase, .. }) => {
            json!({ "algorithm": name, "phase": phase })
        }
        Some(HarnessError::DataPreparation { value, path, .. }) => {
            json!({ "experiment": value, "dataset": path })
        }
        Some(HarnessError::Catalog { path, .. }) => json!({ "catalog": path }),
        Some(HarnessError::UnknownAlgorithm(name))
        | Some(HarnessError::DuplicateName(name))
        | Some(HarnessError::Lifecycle { name, .. })
        | Some(HarnessError::Plan { name, .. }) => json!({ "algorithm": name }),
        _ => json!({}),
    }
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. } | Commands::Describe { json, .. } | Commands::List { json } => {
            *json
        }
    }
}

fn print_description(
    config: &ExperimentConfig,
    plan: &RunPlan,
    catalog: &Catalog,
    total_trials: usize,
) {
    println!("minsim: {}", config.minsim);
    println!("dataset: {}", config.dataset);
    println!("preprocess: {}", config.preprocess);
    println!("samples: {}", config.samples);
    println!("iterations: {}", config.iterations);
    println!("baseline: {}", plan.baseline);
    if !plan.references.is_empty() {
        println!("references: {}", plan.references.join(", "));
    }
    println!("benchmarks: {}", plan.benchmarks.join(", "));
    if !plan.not_implemented.is_empty() {
        println!("not_implemented: {}", plan.not_implemented.join(", "));
    }
    println!("experiments: {}", catalog.len());
    for (value, entry) in catalog.entries().iter().enumerate() {
        println!("  {}: t={:.2} {}", value, entry.threshold, entry.path.display());
    }
    println!("total_trials: {}", total_trials);
}
