//! crates/fitlog_core/src/metrics.rs
//!
//! Reduces a set of entries to one number per goal metric.

use std::str::FromStr;

use crate::domain::{Entry, Metric};
use crate::parsed::ValidationError;

/// How `weight` and `pace` collapse many observations into one reading.
/// Those metrics are not summable, so the extractor keeps a single
/// representative value instead of a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingPolicy {
    /// The value of the last qualifying set or cardio detail, in entry order.
    #[default]
    LastSeen,
    /// The best value seen: heaviest weight, fastest (lowest) pace.
    Best,
}

impl FromStr for ReadingPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" => Ok(ReadingPolicy::LastSeen),
            "max" | "best" => Ok(ReadingPolicy::Best),
            other => Err(ValidationError::UnknownVariant {
                kind: "metric reading policy",
                value: other.to_string(),
            }),
        }
    }
}

impl ReadingPolicy {
    /// Folds the next observation into the current reading.
    pub fn fold(&self, metric: Metric, current: Option<f64>, next: f64) -> f64 {
        match (self, current) {
            (ReadingPolicy::LastSeen, _) | (ReadingPolicy::Best, None) => next,
            (ReadingPolicy::Best, Some(current)) if metric.lower_is_better() => current.min(next),
            (ReadingPolicy::Best, Some(current)) => current.max(next),
        }
    }
}

/// Computes `metric` over `entries`. Entries that carry nothing for the
/// metric contribute nothing; an empty input reads as zero.
///
/// `sessions` is not derivable from entries alone and always reads as zero
/// here; the goal evaluator counts sessions itself.
pub fn extract(entries: &[Entry], metric: Metric, policy: ReadingPolicy) -> f64 {
    match metric {
        Metric::Reps => entries
            .iter()
            .flat_map(|e| e.sets())
            .map(|s| f64::from(s.reps))
            .sum(),
        Metric::Sets => entries.iter().map(|e| e.sets().len() as f64).sum(),
        Metric::Weight => entries
            .iter()
            .flat_map(|e| e.sets())
            .filter_map(|s| s.weight)
            .fold(None, |acc, w| Some(policy.fold(metric, acc, w)))
            .unwrap_or(0.0),
        Metric::Distance => entries
            .iter()
            .filter_map(|e| e.cardio())
            .map(|c| c.distance.unwrap_or(0.0))
            .sum(),
        Metric::Duration => entries
            .iter()
            .filter_map(|e| e.cardio())
            .map(|c| c.duration.unwrap_or(0.0))
            .sum(),
        Metric::Pace => entries
            .iter()
            .filter_map(|e| e.cardio())
            .filter_map(|c| c.pace)
            .fold(None, |acc, p| Some(policy.fold(metric, acc, p)))
            .unwrap_or(0.0),
        Metric::Sessions => 0.0,
    }
}
