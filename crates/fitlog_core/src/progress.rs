//! crates/fitlog_core/src/progress.rs
//!
//! Keeps a goal's progress history free of repeated observations.

use tracing::debug;
use uuid::Uuid;

use crate::domain::{Metric, Progress};

/// The most recent observation for `(goal_id, metric)`: latest `achieved_on`,
/// ties broken by the highest id.
pub fn latest<'a>(history: &'a [Progress], goal_id: Uuid, metric: Metric) -> Option<&'a Progress> {
    history
        .iter()
        .filter(|p| p.goal_id == goal_id && p.metric == metric)
        .max_by_key(|p| (p.achieved_on, p.id))
}

/// Whether `value` differs from the latest recorded value for the pair.
/// The first observation always counts as a change. Comparison is exact.
pub fn has_changed(history: &[Progress], goal_id: Uuid, metric: Metric, value: f64) -> bool {
    match latest(history, goal_id, metric) {
        None => true,
        Some(previous) => {
            let changed = previous.value_achieved != value;
            debug!(
                "Goal {} {}: previous {} (row {}), new {}, changed: {}",
                goal_id, metric, previous.value_achieved, previous.id, value, changed
            );
            changed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(id: i64, goal_id: Uuid, metric: Metric, value: f64, day: u32) -> Progress {
        Progress {
            id,
            goal_id,
            session_id: None,
            metric,
            value_achieved: value,
            achieved_on: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            is_complete: false,
        }
    }

    #[test]
    fn first_observation_is_always_a_change() {
        assert!(has_changed(&[], Uuid::new_v4(), Metric::Distance, 0.0));
    }

    #[test]
    fn compares_against_latest_date_then_highest_id() {
        let goal = Uuid::new_v4();
        let history = vec![
            row(7, goal, Metric::Distance, 9.0, 3),
            row(2, goal, Metric::Distance, 4.0, 1),
            row(5, goal, Metric::Distance, 6.0, 3),
            row(9, goal, Metric::Reps, 100.0, 4),
        ];
        assert_eq!(latest(&history, goal, Metric::Distance).map(|p| p.id), Some(7));
        assert!(!has_changed(&history, goal, Metric::Distance, 9.0));
        assert!(has_changed(&history, goal, Metric::Distance, 6.0));
    }

    #[test]
    fn other_goals_do_not_count() {
        let goal = Uuid::new_v4();
        let history = vec![row(1, Uuid::new_v4(), Metric::Sessions, 3.0, 1)];
        assert!(has_changed(&history, goal, Metric::Sessions, 3.0));
    }
}
