use std::path::PathBuf;

use apss_core::{AlgorithmError, MatrixError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration:\n{}", bullet_list(.keys))]
    Missing { keys: Vec<String> },

    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("cannot read config file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file `{path}`: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no baseline-eligible algorithm is registered")]
    NoBaseline,

    #[error("algorithm `{0}` is already registered")]
    DuplicateName(String),

    #[error("{0} is not implemented")]
    UnknownAlgorithm(String),

    #[error("dataset catalog `{path}`: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error("could not prepare experiment {value} from `{path}`: {source}")]
    DataPreparation {
        value: usize,
        path: PathBuf,
        #[source]
        source: MatrixError,
    },

    #[error("{name}: {phase} failed: {source}")]
    AlgorithmExecution {
        name: String,
        phase: &'static str,
        #[source]
        source: AlgorithmError,
    },

    #[error("trial fixture for `{name}` is {found}, expected {expected}")]
    Lifecycle {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid plan for `{name}`: {reason}")]
    Plan { name: String, reason: String },
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|k| format!("  - {}", k))
        .collect::<Vec<_>>()
        .join("\n")
}
