//! Sample interface statistics over time and check how they moved.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::network_interface::NetworkInterface;
use crate::error::OwnerError;

#[derive(Debug, thiserror::Error)]
pub enum StatCheckerError {
    /// Trends need at least two samples to compare.
    #[error("need at least 2 samples to validate trends, have {0}")]
    NotEnoughSamples(usize),

    #[error("statistic '{0}' is not reported by the source")]
    MissingStat(String),

    #[error("no statistics registered")]
    NothingToCheck,

    #[error(transparent)]
    Source(#[from] OwnerError),
}

/// Expected behavior of one statistic across samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    /// Every consecutive delta is zero.
    Flat,
    /// Every consecutive delta is at least `threshold`.
    Up,
    /// Every consecutive delta is at most `-threshold`.
    Down,
    /// Every sample equals `threshold`.
    Equal,
    /// Every sample is greater than `threshold`.
    More,
    /// Every sample is less than `threshold`.
    Less,
}

impl FromStr for Trend {
    type Err = OwnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Trend::Flat),
            "up" => Ok(Trend::Up),
            "down" => Ok(Trend::Down),
            "equal" => Ok(Trend::Equal),
            "more" => Ok(Trend::More),
            "less" => Ok(Trend::Less),
            _ => Err(OwnerError::parse("trend", s)),
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Flat => "flat",
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Equal => "equal",
            Trend::More => "more",
            Trend::Less => "less",
        };
        f.write_str(s)
    }
}

/// Anything that can report a set of named counters.
pub trait StatSource {
    fn read_stats(&self) -> crate::error::Result<BTreeMap<String, u64>>;
}

impl StatSource for NetworkInterface {
    fn read_stats(&self) -> crate::error::Result<BTreeMap<String, u64>> {
        self.stats()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub taken_at: DateTime<Utc>,
    pub values: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy)]
struct Check {
    trend: Trend,
    threshold: i64,
}

impl Check {
    fn violation(&self, values: &[i128]) -> Option<String> {
        let threshold = i128::from(self.threshold);
        let deltas: Vec<i128> = values.windows(2).map(|w| w[1] - w[0]).collect();
        let (ok, what, observed) = match self.trend {
            Trend::Flat => (deltas.iter().all(|d| *d == 0), "deltas", deltas),
            Trend::Up => (deltas.iter().all(|d| *d >= threshold), "deltas", deltas),
            Trend::Down => (deltas.iter().all(|d| *d <= -threshold), "deltas", deltas),
            Trend::Equal => (values.iter().all(|v| *v == threshold), "values", values.to_vec()),
            Trend::More => (values.iter().all(|v| *v > threshold), "values", values.to_vec()),
            Trend::Less => (values.iter().all(|v| *v < threshold), "values", values.to_vec()),
        };
        if ok {
            return None;
        }
        Some(format!(
            "expected {} (threshold {}), {} were {:?}",
            self.trend, self.threshold, what, observed
        ))
    }
}

/// Collects samples of registered statistics from one source.
pub struct StatChecker<'a> {
    source: &'a dyn StatSource,
    checks: BTreeMap<String, Check>,
    samples: Vec<Sample>,
}

impl<'a> StatChecker<'a> {
    pub fn new(source: &'a dyn StatSource) -> Self {
        Self {
            source,
            checks: BTreeMap::new(),
            samples: Vec::new(),
        }
    }

    /// Register `name` with its expected trend. Re-adding a name replaces it.
    pub fn add(&mut self, name: impl Into<String>, trend: Trend, threshold: i64) -> &mut Self {
        self.checks.insert(name.into(), Check { trend, threshold });
        self
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Take one sample of every registered statistic.
    pub fn get_values(&mut self) -> Result<&Sample, StatCheckerError> {
        if self.checks.is_empty() {
            return Err(StatCheckerError::NothingToCheck);
        }
        let all = self.source.read_stats()?;
        let mut values = BTreeMap::new();
        for name in self.checks.keys() {
            let value = all
                .get(name)
                .ok_or_else(|| StatCheckerError::MissingStat(name.clone()))?;
            values.insert(name.clone(), *value);
        }
        debug!(sample = self.samples.len(), stats = ?values, "stat sample");
        self.samples.push(Sample {
            taken_at: Utc::now(),
            values,
        });
        Ok(&self.samples[self.samples.len() - 1])
    }

    /// `None` when every statistic followed its trend, otherwise a map of
    /// statistic name to a description of the violation.
    pub fn validate_trend(&self) -> Result<Option<BTreeMap<String, String>>, StatCheckerError> {
        if self.samples.len() < 2 {
            return Err(StatCheckerError::NotEnoughSamples(self.samples.len()));
        }
        let mut violations = BTreeMap::new();
        for (name, check) in &self.checks {
            let values = self
                .samples
                .iter()
                .map(|s| s.values.get(name).map(|v| i128::from(*v)))
                .collect::<Option<Vec<i128>>>()
                .ok_or_else(|| StatCheckerError::MissingStat(name.clone()))?;
            if let Some(violation) = check.violation(&values) {
                violations.insert(name.clone(), violation);
            }
        }
        Ok((!violations.is_empty()).then_some(violations))
    }
}
