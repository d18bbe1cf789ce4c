use serde::Serialize;
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    Minsim,
    Dataset,
    Preprocess,
    Samples,
    Iterations,
    Algorithm,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::Minsim,
        ConfigKey::Dataset,
        ConfigKey::Preprocess,
        ConfigKey::Samples,
        ConfigKey::Iterations,
        ConfigKey::Algorithm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Minsim => "minsim",
            ConfigKey::Dataset => "dataset",
            ConfigKey::Preprocess => "preprocess",
            ConfigKey::Samples => "samples",
            ConfigKey::Iterations => "iterations",
            ConfigKey::Algorithm => "algorithm",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            ConfigKey::Minsim => "APSS_MINSIM",
            ConfigKey::Dataset => "APSS_DATASET",
            ConfigKey::Preprocess => "APSS_PREPROCESS",
            ConfigKey::Samples => "APSS_SAMPLES",
            ConfigKey::Iterations => "APSS_ITERATIONS",
            ConfigKey::Algorithm => "APSS_ALGORITHM",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// A named place configuration values come from.
pub trait ConfigSource {
    fn get(&self, key: ConfigKey) -> Option<String>;

    /// How `key` is spelled in this source, for error messages.
    fn describe(&self, key: ConfigKey) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: ConfigKey) -> Option<String> {
        std::env::var(key.env_var()).ok()
    }

    fn describe(&self, key: ConfigKey) -> String {
        format!("environment variable {}", key.env_var())
    }
}

#[derive(Debug, Clone)]
pub struct MapSource {
    label: String,
    values: BTreeMap<ConfigKey, String>,
}

impl MapSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: ConfigKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: ConfigKey) -> Option<String> {
        self.values.get(&key).cloned()
    }

    fn describe(&self, key: ConfigKey) -> String {
        format!("{} `{}`", self.label, key.as_str())
    }
}

/// YAML file with the same keys as [`ConfigKey`]. `algorithm` may be a
/// string or a list.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    values: BTreeMap<ConfigKey, String>,
}

impl FileSource {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let doc: BTreeMap<String, YamlValue> =
            serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        let mut values = BTreeMap::new();
        for (name, value) in doc {
            let key = ConfigKey::parse(&name).ok_or_else(|| ConfigError::Invalid {
                key: name.clone(),
                value: yaml_display(&value),
                reason: format!("unknown key in {}", path.display()),
            })?;
            if let Some(text) = yaml_scalar_text(key, &value)? {
                values.insert(key, text);
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }
}

impl ConfigSource for FileSource {
    fn get(&self, key: ConfigKey) -> Option<String> {
        self.values.get(&key).cloned()
    }

    fn describe(&self, key: ConfigKey) -> String {
        format!("`{}` in {}", key.as_str(), self.path.display())
    }
}

fn yaml_scalar_text(key: ConfigKey, value: &YamlValue) -> Result<Option<String>, ConfigError> {
    let text = match value {
        YamlValue::Null => return Ok(None),
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Sequence(items) if key == ConfigKey::Algorithm => items
            .iter()
            .map(|item| match item {
                YamlValue::String(s) => Ok(s.clone()),
                other => Err(ConfigError::Invalid {
                    key: key.as_str().to_string(),
                    value: yaml_display(other),
                    reason: "algorithm names must be strings".to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(","),
        other => {
            return Err(ConfigError::Invalid {
                key: key.as_str().to_string(),
                value: yaml_display(other),
                reason: "expected a scalar value".to_string(),
            })
        }
    };
    Ok(Some(text))
}

fn yaml_display(value: &YamlValue) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}

/// Sources in priority order; the first one holding a key wins.
#[derive(Default)]
pub struct Layered {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl Layered {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, source: impl ConfigSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl ConfigSource for Layered {
    fn get(&self, key: ConfigKey) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    fn describe(&self, key: ConfigKey) -> String {
        self.layers
            .iter()
            .map(|layer| layer.describe(key))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentConfig {
    pub minsim: f32,
    pub dataset: String,
    pub preprocess: bool,
    pub samples: usize,
    pub iterations: usize,
    /// Benchmark names to run; empty means every benchmark algorithm.
    pub algorithms: Vec<String>,
}

impl ExperimentConfig {
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let required = [
            ConfigKey::Minsim,
            ConfigKey::Dataset,
            ConfigKey::Samples,
            ConfigKey::Iterations,
        ];
        let mut missing = Vec::new();
        let mut found = BTreeMap::new();
        for key in required {
            match source.get(key) {
                Some(v) if !v.trim().is_empty() => {
                    found.insert(key, v);
                }
                _ => missing.push(source.describe(key)),
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing { keys: missing });
        }

        let minsim = parse_minsim(&found[&ConfigKey::Minsim]);
        let dataset = found[&ConfigKey::Dataset].trim().to_string();
        let samples = parse_count(ConfigKey::Samples, &found[&ConfigKey::Samples])?;
        let iterations = parse_count(ConfigKey::Iterations, &found[&ConfigKey::Iterations])?;
        let preprocess = source
            .get(ConfigKey::Preprocess)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let algorithms = source
            .get(ConfigKey::Algorithm)
            .map(|v| split_names(&v))
            .unwrap_or_default();

        Ok(Self {
            minsim,
            dataset,
            preprocess,
            samples,
            iterations,
            algorithms,
        })
    }
}

/// Longest leading prefix that reads as a number; `0.0` when none does.
pub fn parse_minsim(raw: &str) -> f32 {
    let s = raw.trim_start();
    (1..=s.len())
        .rev()
        .filter(|&end| s.is_char_boundary(end))
        .find_map(|end| s[..end].parse::<f32>().ok())
        .unwrap_or(0.0)
}

fn parse_count(key: ConfigKey, raw: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: key.as_str().to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let n = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid("expected a positive integer"))?;
    if n == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(n)
}

/// Comma-delimited names, trimmed, without blanks or repeats.
pub fn split_names(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|seen| seen == name) {
            out.push(name.to_string());
        }
    }
    out
}
