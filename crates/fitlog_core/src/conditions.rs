//! crates/fitlog_core/src/conditions.rs
//!
//! Narrows entries to the performances that qualify for a goal before any
//! metric is extracted. A `weight` target is a minimum every counted set must
//! reach; a `pace` target is a maximum every counted cardio entry must beat.

use tracing::debug;

use crate::domain::{Entry, EntryDetail, Metric, Target};

/// Slack allowed above a pace target, in minutes per mile.
pub const DEFAULT_PACE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    pub min_weight: Option<f64>,
    pub max_pace: Option<f64>,
    pub pace_tolerance: f64,
}

impl Conditions {
    /// The first `weight` and `pace` targets become the qualifying bounds.
    pub fn from_targets(targets: &[Target], pace_tolerance: f64) -> Self {
        let first = |metric: Metric| targets.iter().find(|t| t.metric == metric).map(|t| t.value);
        Self {
            min_weight: first(Metric::Weight),
            max_pace: first(Metric::Pace),
            pace_tolerance,
        }
    }

    /// Returns the qualifying subset of `entries`. Strength entries keep only
    /// their qualifying sets and are dropped when none remain. Entries with no
    /// sets or no cardio detail never qualify.
    pub fn apply<'a>(&self, entries: impl IntoIterator<Item = &'a Entry>) -> Vec<Entry> {
        entries.into_iter().filter_map(|entry| self.qualify(entry)).collect()
    }

    fn qualify(&self, entry: &Entry) -> Option<Entry> {
        match &entry.detail {
            EntryDetail::Strength(sets) if sets.is_empty() => None,
            EntryDetail::Cardio(None) => None,
            EntryDetail::Strength(sets) => {
                let Some(min_weight) = self.min_weight else {
                    return Some(entry.clone());
                };
                let kept: Vec<_> = sets
                    .iter()
                    .filter(|s| s.weight.is_some_and(|w| w >= min_weight))
                    .copied()
                    .collect();
                debug!(
                    "{}: {} of {} sets at or above {} lbs",
                    entry.exercise,
                    kept.len(),
                    sets.len(),
                    min_weight
                );
                if kept.is_empty() {
                    return None;
                }
                Some(Entry {
                    detail: EntryDetail::Strength(kept),
                    ..entry.clone()
                })
            }
            EntryDetail::Cardio(detail) => {
                let Some(max_pace) = self.max_pace else {
                    return Some(entry.clone());
                };
                match detail.and_then(|d| d.pace) {
                    Some(pace) if pace <= max_pace + self.pace_tolerance => Some(entry.clone()),
                    pace => {
                        debug!(
                            "{}: rejected, pace {:?} slower than {} (+{})",
                            entry.exercise, pace, max_pace, self.pace_tolerance
                        );
                        None
                    }
                }
            }
        }
    }
}
