use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub threshold: f32,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CatalogManifest {
    datasets: Vec<DatasetEntry>,
}

/// Ordered problem space. An entry's position is its experiment value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    entries: Vec<DatasetEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<DatasetEntry>) -> Self {
        Self { entries }
    }

    pub fn single(path: impl Into<PathBuf>, threshold: f32) -> Self {
        Self::new(vec![DatasetEntry {
            threshold,
            path: path.into(),
        }])
    }

    /// A `.yaml`/`.yml` selector is a manifest, a directory contributes every
    /// file in it, anything else is a single dataset.
    pub fn resolve(selector: &str, minsim: f32) -> Result<Self> {
        let path = Path::new(selector);
        let is_manifest = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        let catalog = if is_manifest {
            Self::from_manifest(path)?
        } else if path.is_dir() {
            Self::from_dir(path, minsim)?
        } else {
            Self::single(path, minsim)
        };
        catalog.log_problem_space();
        Ok(catalog)
    }

    pub fn from_dir(dir: &Path, threshold: f32) -> Result<Self> {
        let read = fs::read_dir(dir).map_err(|e| catalog_error(dir, e.to_string()))?;
        let mut paths = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| catalog_error(dir, e.to_string()))?;
            let name_hidden = entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with('.'))
                .unwrap_or(false);
            if entry.path().is_file() && !name_hidden {
                paths.push(entry.path());
            }
        }
        if paths.is_empty() {
            return Err(catalog_error(dir, "directory holds no datasets"));
        }
        paths.sort();
        Ok(Self::new(
            paths
                .into_iter()
                .map(|path| DatasetEntry { threshold, path })
                .collect(),
        ))
    }

    pub fn from_manifest(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| catalog_error(path, e.to_string()))?;
        let manifest: CatalogManifest =
            serde_yaml::from_str(&raw).map_err(|e| catalog_error(path, e.to_string()))?;
        if manifest.datasets.is_empty() {
            return Err(catalog_error(path, "manifest lists no datasets"));
        }
        let base = path.parent().unwrap_or(Path::new("."));
        let mut entries = Vec::with_capacity(manifest.datasets.len());
        for entry in manifest.datasets {
            if !(entry.threshold.is_finite() && (0.0..=1.0).contains(&entry.threshold)) {
                return Err(catalog_error(
                    path,
                    format!(
                        "threshold {} for `{}` is outside [0, 1]",
                        entry.threshold,
                        entry.path.display()
                    ),
                ));
            }
            let resolved = if entry.path.is_absolute() {
                entry.path
            } else {
                base.join(entry.path)
            };
            entries.push(DatasetEntry {
                threshold: entry.threshold,
                path: resolved,
            });
        }
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn get(&self, value: usize) -> Option<&DatasetEntry> {
        self.entries.get(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn problem_space(&self) -> Vec<usize> {
        (0..self.entries.len()).collect()
    }

    fn log_problem_space(&self) {
        info!("problem space: {} experiment(s)", self.entries.len());
        for (value, entry) in self.entries.iter().enumerate() {
            info!(
                "  {}: {{ t: {:.2}, path: \"{}\" }}",
                value,
                entry.threshold,
                entry.path.display()
            );
        }
    }
}

fn catalog_error(path: &Path, reason: impl Into<String>) -> HarnessError {
    HarnessError::Catalog {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
