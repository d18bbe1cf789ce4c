use serde::{Deserialize, Serialize};

/// Work done by one `run` call. Every algorithm starts from zero on each
/// call, so a harvested value never includes an earlier trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub ncand: u64,
    pub nprun: u64,
    pub nvdot: u64,
    pub nmacs1: u64,
    pub nmacs2: u64,
    pub nsims: u64,
}

impl Counters {
    pub const METRICS: [&'static str; 6] = ["ncand", "nprun", "nvdot", "nmacs1", "nmacs2", "nsims"];

    pub fn get(&self, metric: &str) -> Option<u64> {
        match metric {
            "ncand" => Some(self.ncand),
            "nprun" => Some(self.nprun),
            "nvdot" => Some(self.nvdot),
            "nmacs1" => Some(self.nmacs1),
            "nmacs2" => Some(self.nmacs2),
            "nsims" => Some(self.nsims),
            _ => None,
        }
    }
}
