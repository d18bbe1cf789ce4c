use apss_core::Counters;
use serde::Serialize;

/// Which summary statistics a measurement reports next to its raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reporting {
    pub mean: bool,
    pub size: bool,
    pub variance: bool,
    pub std_dev: bool,
    pub skewness: bool,
    pub kurtosis: bool,
    pub zscore: bool,
    pub max: bool,
}

impl Reporting {
    pub const FULL: Reporting = Reporting {
        mean: true,
        size: true,
        variance: true,
        std_dev: true,
        skewness: true,
        kurtosis: true,
        zscore: true,
        max: true,
    };

    /// Raw values only. Work counters are integers whose averages would
    /// suggest precision they do not have.
    pub const RAW: Reporting = Reporting {
        mean: false,
        size: false,
        variance: false,
        std_dev: false,
        skewness: false,
        kurtosis: false,
        zscore: false,
        max: false,
    };

    pub fn any(&self) -> bool {
        *self != Self::RAW
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSeries {
    pub name: String,
    pub values: Vec<u64>,
    pub reporting: Reporting,
}

impl CounterSeries {
    pub fn statistics(&self) -> Option<Statistics> {
        if !self.reporting.any() || self.values.is_empty() {
            return None;
        }
        let as_f64: Vec<f64> = self.values.iter().map(|&v| v as f64).collect();
        Some(Statistics::from_samples(&as_f64))
    }

    /// Summary values enabled by `reporting`, in a fixed order. The z-score
    /// is that of the latest value against the whole series.
    pub fn summary(&self) -> Vec<(&'static str, f64)> {
        let Some(stats) = self.statistics() else {
            return Vec::new();
        };
        let r = self.reporting;
        let latest = self.values.last().map(|&v| v as f64).unwrap_or_default();
        [
            (r.mean, "mean", stats.mean),
            (r.size, "size", stats.size as f64),
            (r.variance, "variance", stats.variance),
            (r.std_dev, "std_dev", stats.std_dev),
            (r.skewness, "skewness", stats.skewness),
            (r.kurtosis, "kurtosis", stats.kurtosis),
            (r.zscore, "zscore", stats.zscore(latest)),
            (r.max, "max", stats.max),
        ]
        .into_iter()
        .filter(|(on, _, _)| *on)
        .map(|(_, name, value)| (name, value))
        .collect()
    }
}

/// Append-only per-metric series of harvested counters.
#[derive(Debug, Clone)]
pub struct Collector {
    series: Vec<CounterSeries>,
}

impl Collector {
    pub fn new(metrics: &[&str], reporting: Reporting) -> Self {
        Self {
            series: metrics
                .iter()
                .map(|name| CounterSeries {
                    name: name.to_string(),
                    values: Vec::new(),
                    reporting,
                })
                .collect(),
        }
    }

    pub fn for_counters() -> Self {
        Self::new(&Counters::METRICS, Reporting::RAW)
    }

    pub fn harvest(&mut self, counters: &Counters) {
        for series in &mut self.series {
            if let Some(value) = counters.get(&series.name) {
                series.values.push(value);
            }
        }
    }

    pub fn series(&self, name: &str) -> Option<&[u64]> {
        self.series
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.values.as_slice())
    }

    pub fn snapshot(&self) -> Vec<CounterSeries> {
        self.series.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub size: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl Statistics {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self {
                size: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                variance: 0.0,
                std_dev: 0.0,
                skewness: 0.0,
                kurtosis: 0.0,
                p50: 0.0,
                p90: 0.0,
                p99: 0.0,
            };
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let nf = n as f64;
        let mean = sorted.iter().sum::<f64>() / nf;
        let moment = |k: i32| sorted.iter().map(|x| (x - mean).powi(k)).sum::<f64>() / nf;
        let (m2, m3, m4) = (moment(2), moment(3), moment(4));
        let variance = if n > 1 { m2 * nf / (nf - 1.0) } else { 0.0 };
        let (skewness, kurtosis) = if m2 > 0.0 {
            (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };
        Self {
            size: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            variance,
            std_dev: variance.sqrt(),
            skewness,
            kurtosis,
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p99: percentile(&sorted, 99.0),
        }
    }

    pub fn zscore(&self, x: f64) -> f64 {
        if self.std_dev > 0.0 {
            (x - self.mean) / self.std_dev
        } else {
            0.0
        }
    }
}

/// Nearest-rank percentile of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_appends_one_value_per_metric_per_harvest() {
        let mut collector = Collector::for_counters();
        collector.harvest(&Counters {
            ncand: 3,
            nsims: 1,
            ..Counters::default()
        });
        collector.harvest(&Counters {
            ncand: 5,
            ..Counters::default()
        });
        assert_eq!(collector.series("ncand"), Some(&[3u64, 5][..]));
        assert_eq!(collector.series("nsims"), Some(&[1u64, 0][..]));
        assert_eq!(collector.snapshot().len(), Counters::METRICS.len());
        assert!(collector.series("latency").is_none());
    }

    #[test]
    fn counters_report_raw_values_only() {
        let mut collector = Collector::for_counters();
        collector.harvest(&Counters::default());
        assert!(collector.snapshot().iter().all(|s| s.statistics().is_none()));

        let full = CounterSeries {
            name: "x".to_string(),
            values: vec![1, 3],
            reporting: Reporting::FULL,
        };
        assert_eq!(full.statistics().map(|s| s.mean), Some(2.0));
        assert!(collector.snapshot()[0].summary().is_empty());
    }

    #[test]
    fn summary_follows_enabled_flags() {
        let series = CounterSeries {
            name: "nvdot".to_string(),
            values: vec![2, 4, 6],
            reporting: Reporting {
                mean: true,
                max: true,
                zscore: true,
                ..Reporting::RAW
            },
        };
        let summary = series.summary();
        let names: Vec<_> = summary.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["mean", "zscore", "max"]);
        assert_eq!(summary[0].1, 4.0);
        // latest value 6 sits one sample standard deviation above the mean
        assert!((summary[1].1 - 1.0).abs() < 1e-12);
        assert_eq!(summary[2].1, 6.0);
    }

    #[test]
    fn statistics_match_hand_computation() {
        let s = Statistics::from_samples(&[4.0, 2.0, 6.0, 8.0]);
        assert_eq!(s.size, 4);
        assert_eq!((s.min, s.max), (2.0, 8.0));
        assert_eq!(s.mean, 5.0);
        // sum of squared deviations is 20
        assert!((s.variance - 20.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.skewness, 0.0);
        assert_eq!(s.p50, 4.0);
        assert_eq!(s.p99, 8.0);
        assert!((s.zscore(5.0)).abs() < 1e-12);
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let s = Statistics::from_samples(&[7.5]);
        assert_eq!((s.variance, s.std_dev, s.kurtosis), (0.0, 0.0, 0.0));
        assert_eq!((s.p50, s.p90), (7.5, 7.5));
        assert_eq!(Statistics::from_samples(&[]).size, 0);
    }
}
