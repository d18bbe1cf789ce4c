use apss_core::{AllPairs, Apss, BruteForce, IdxJoin, MmJoin};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};

pub type AlgorithmFactory = Arc<dyn Fn() -> Box<dyn Apss> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May anchor relative timings.
    Baseline,
    /// Always measured, whatever the benchmark filter says.
    Reference,
    Benchmark,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Baseline => "baseline",
            Role::Reference => "reference",
            Role::Benchmark => "benchmark",
        }
    }
}

#[derive(Clone)]
pub struct AlgorithmDescriptor {
    name: String,
    role: Role,
    factory: AlgorithmFactory,
}

impl AlgorithmDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn build(&self) -> Box<dyn Apss> {
        (self.factory)()
    }
}

impl fmt::Debug for AlgorithmDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmDescriptor")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

struct Builtin {
    name: &'static str,
    role: Role,
    make: fn() -> Box<dyn Apss>,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "bruteforce",
        role: Role::Baseline,
        make: make_bruteforce,
    },
    Builtin {
        name: "idxjoin",
        role: Role::Baseline,
        make: make_idxjoin,
    },
    Builtin {
        name: "allpairs",
        role: Role::Benchmark,
        make: make_allpairs,
    },
    Builtin {
        name: "mmjoin",
        role: Role::Benchmark,
        make: make_mmjoin,
    },
];

fn make_bruteforce() -> Box<dyn Apss> {
    Box::new(BruteForce)
}

fn make_idxjoin() -> Box<dyn Apss> {
    Box::new(IdxJoin)
}

fn make_allpairs() -> Box<dyn Apss> {
    Box::new(AllPairs)
}

fn make_mmjoin() -> Box<dyn Apss> {
    Box::new(MmJoin)
}

/// Names of the algorithms enabled by this crate's cargo features.
pub fn compiled_algorithms() -> Vec<&'static str> {
    let mut out = Vec::new();
    if cfg!(feature = "bruteforce") {
        out.push("bruteforce");
    }
    if cfg!(feature = "idxjoin") {
        out.push("idxjoin");
    }
    if cfg!(feature = "allpairs") {
        out.push("allpairs");
    }
    if cfg!(feature = "mmjoin") {
        out.push("mmjoin");
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<AlgorithmDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in algorithms named in `features`, in a fixed
    /// order independent of the order of `features`.
    pub fn initialize(features: &[&str]) -> Result<Self> {
        let mut registry = Self::new();
        for name in features {
            if !BUILTINS.iter().any(|b| b.name == *name) {
                warn!("ignoring unknown algorithm feature `{}`", name);
            }
        }
        for builtin in BUILTINS.iter().filter(|b| features.contains(&b.name)) {
            let make = builtin.make;
            registry.register(builtin.name, builtin.role, make)?;
        }
        Ok(registry)
    }

    pub fn register<F>(&mut self, name: &str, role: Role, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Apss> + Send + Sync + 'static,
    {
        if self.lookup(name).is_some() {
            return Err(HarnessError::DuplicateName(name.to_string()));
        }
        debug!("registered {} algorithm `{}`", role.as_str(), name);
        self.entries.push(AlgorithmDescriptor {
            name: name.to_string(),
            role,
            factory: Arc::new(factory),
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&AlgorithmDescriptor> {
        self.entries.iter().find(|d| d.name == name)
    }

    pub fn list_by_role(&self, role: Role) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|d| d.role == role)
            .map(|d| d.name.as_str())
            .collect()
    }

    pub fn descriptors(&self) -> &[AlgorithmDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApss;

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = Registry::new();
        registry
            .register("nova", Role::Benchmark, || Box::new(FakeApss::new("nova")))
            .expect("first registration");
        let err = registry
            .register("nova", Role::Baseline, || Box::new(FakeApss::new("nova")))
            .expect_err("duplicate");
        assert!(matches!(err, HarnessError::DuplicateName(ref n) if n == "nova"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_and_roles() {
        let registry = Registry::initialize(&["allpairs", "idxjoin", "bruteforce"])
            .expect("initialize");
        assert_eq!(registry.list_by_role(Role::Baseline), vec!["bruteforce", "idxjoin"]);
        assert_eq!(registry.list_by_role(Role::Benchmark), vec!["allpairs"]);
        assert!(registry.lookup("mmjoin").is_none());
        let desc = registry.lookup("allpairs").expect("allpairs registered");
        assert_eq!(desc.role(), Role::Benchmark);
        assert_eq!(desc.build().name(), "allpairs");
    }

    #[test]
    fn builtins_carry_no_reference_role() {
        let mut registry = Registry::initialize(&compiled_algorithms()).expect("initialize");
        assert!(registry.list_by_role(Role::Reference).is_empty());
        registry
            .register("ref-l2ap", Role::Reference, || Box::new(FakeApss::new("ref-l2ap")))
            .expect("reference registration");
        assert_eq!(registry.list_by_role(Role::Reference), vec!["ref-l2ap"]);
        assert_eq!(
            registry.lookup("ref-l2ap").map(|d| d.role().as_str()),
            Some("reference")
        );
    }

    #[test]
    fn initialize_skips_unknown_features() {
        let registry = Registry::initialize(&["mmjoin", "nova"]).expect("initialize");
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("nova").is_none());
    }

    #[test]
    fn default_features_register_every_builtin() {
        let registry = Registry::initialize(&compiled_algorithms()).expect("initialize");
        for name in compiled_algorithms() {
            assert!(registry.lookup(name).is_some(), "{} missing", name);
        }
    }
}
