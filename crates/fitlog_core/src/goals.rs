//! crates/fitlog_core/src/goals.rs
//!
//! The goal evaluator. A goal is `open` until its first complete progress row
//! and `complete` forever after. Each goal type keeps its own completion rule:
//!
//! - single-session goals need every target met inside one session, and
//!   record nothing at all otherwise;
//! - aggregate goals total each target across the goal's date window and
//!   record every target on its own;
//! - aggregate goals without a specific exercise count sessions.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::conditions::{Conditions, DEFAULT_PACE_TOLERANCE};
use crate::domain::{
    Entry, ExerciseType, Goal, GoalDraft, GoalType, Metric, Progress, ProgressDraft, Session,
};
use crate::metrics::{self, ReadingPolicy};
use crate::progress;

//=========================================================================================
// Settings and Strategy Selection
//=========================================================================================

/// Tunables shared by every evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationSettings {
    pub pace_tolerance: f64,
    pub reading: ReadingPolicy,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            pace_tolerance: DEFAULT_PACE_TOLERANCE,
            reading: ReadingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SingleSession,
    Aggregate,
    SessionCount,
}

impl Strategy {
    pub fn for_goal(goal: &Goal) -> Self {
        match (goal.goal_type, goal.exercise_name.is_some()) {
            (GoalType::SingleSession, _) => Strategy::SingleSession,
            (GoalType::Aggregate, true) => Strategy::Aggregate,
            (GoalType::Aggregate, false) => Strategy::SessionCount,
        }
    }

    /// Whether evaluation needs every session in the goal's window.
    pub fn needs_window(&self) -> bool {
        !matches!(self, Strategy::SingleSession)
    }
}

/// A goal is terminal once any of its progress rows is complete.
pub fn is_complete(history: &[Progress]) -> bool {
    history.iter().any(|p| p.is_complete)
}

//=========================================================================================
// Evaluator
//=========================================================================================

pub struct GoalEvaluator {
    settings: EvaluationSettings,
    today: NaiveDate,
}

impl GoalEvaluator {
    pub fn new(settings: EvaluationSettings, today: NaiveDate) -> Self {
        Self { settings, today }
    }

    /// Decides which progress rows `goal` earns. `trigger` is the session that
    /// was just logged or edited; `window` holds the user's sessions in the
    /// goal's date range and is only read by aggregate strategies.
    pub fn evaluate(
        &self,
        goal: &Goal,
        history: &[Progress],
        trigger: Option<&Session>,
        window: &[Session],
    ) -> Vec<ProgressDraft> {
        if is_complete(history) {
            debug!("Goal {} already complete, skipping", goal.id);
            return Vec::new();
        }

        let drafts = match Strategy::for_goal(goal) {
            Strategy::SingleSession => match trigger {
                Some(session) => self.single_session(goal, history, session),
                None => Vec::new(),
            },
            Strategy::Aggregate => self.aggregate(goal, history, window),
            Strategy::SessionCount => self.session_count(goal, history, window),
        };

        if drafts.iter().any(|d| d.is_complete) {
            info!("Goal {} ('{}') is complete", goal.id, goal.name);
        }
        drafts
    }

    fn single_session(&self, goal: &Goal, history: &[Progress], session: &Session) -> Vec<ProgressDraft> {
        if !goal.window_contains(session.date, self.today) {
            debug!(
                "Session {} on {} is outside goal {} window {}..={}",
                session.id,
                session.date,
                goal.id,
                goal.start_date,
                goal.window_end(self.today)
            );
            return Vec::new();
        }

        let matching: Vec<&Entry> = session.entries.iter().filter(|e| goal.covers(e)).collect();
        if matching.is_empty() {
            return Vec::new();
        }
        let qualifying = self.conditions(goal).apply(matching);
        let session_count = if qualifying.is_empty() { 0.0 } else { 1.0 };

        let mut staged = Vec::new();
        for target in &goal.targets {
            let achieved = self.measure(target.metric, &qualifying, session_count);
            if !target.metric.is_satisfied(achieved, target.value) {
                debug!(
                    "Goal {} target {} not met in session {}: {} vs {}",
                    goal.id, target.metric, session.id, achieved, target.value
                );
                return Vec::new();
            }
            if changed(history, &staged, goal, target.metric, achieved) {
                staged.push(ProgressDraft {
                    goal_id: goal.id,
                    session_id: Some(session.id),
                    metric: target.metric,
                    value_achieved: achieved,
                    achieved_on: session.date,
                    is_complete: true,
                });
            }
        }
        staged
    }

    fn aggregate(&self, goal: &Goal, history: &[Progress], window: &[Session]) -> Vec<ProgressDraft> {
        let conditions = self.conditions(goal);
        let mut qualifying = Vec::new();
        let mut session_count = 0.0;
        for session in self.relevant(goal, window) {
            let kept = conditions.apply(session.entries.iter().filter(|e| goal.covers(e)));
            if !kept.is_empty() {
                session_count += 1.0;
            }
            qualifying.extend(kept);
        }

        let mut staged = Vec::new();
        for target in &goal.targets {
            let total = self.measure(target.metric, &qualifying, session_count);
            // A pace of zero means nothing qualified, not a perfect pace.
            let is_complete = if target.metric.lower_is_better() {
                total > 0.0 && target.metric.is_satisfied(total, target.value)
            } else {
                target.metric.is_satisfied(total, target.value)
            };
            debug!(
                "Goal {} aggregate {}: {} of {} (complete: {})",
                goal.id, target.metric, total, target.value, is_complete
            );
            if changed(history, &staged, goal, target.metric, total) {
                staged.push(ProgressDraft {
                    goal_id: goal.id,
                    session_id: None,
                    metric: target.metric,
                    value_achieved: total,
                    achieved_on: self.today,
                    is_complete,
                });
            }
        }
        staged
    }

    fn session_count(&self, goal: &Goal, history: &[Progress], window: &[Session]) -> Vec<ProgressDraft> {
        let count = self.relevant(goal, window).count() as f64;

        let mut staged = Vec::new();
        for target in goal.targets.iter().filter(|t| t.metric == Metric::Sessions) {
            let is_complete = target.metric.is_satisfied(count, target.value);
            debug!(
                "Goal {} counted {} sessions of {} (complete: {})",
                goal.id, count, target.value, is_complete
            );
            if changed(history, &staged, goal, Metric::Sessions, count) {
                staged.push(ProgressDraft {
                    goal_id: goal.id,
                    session_id: None,
                    metric: Metric::Sessions,
                    value_achieved: count,
                    achieved_on: self.today,
                    is_complete,
                });
            }
        }
        staged
    }

    /// Sessions in the goal's window holding at least one entry of its exercise type.
    fn relevant<'s>(&self, goal: &'s Goal, window: &'s [Session]) -> impl Iterator<Item = &'s Session> + 's {
        let today = self.today;
        window
            .iter()
            .filter(move |s| goal.window_contains(s.date, today) && s.has_entries_of(goal.exercise_type))
    }

    fn conditions(&self, goal: &Goal) -> Conditions {
        Conditions::from_targets(&goal.targets, self.settings.pace_tolerance)
    }

    fn measure(&self, metric: Metric, entries: &[Entry], session_count: f64) -> f64 {
        match metric {
            Metric::Sessions => session_count,
            other => metrics::extract(entries, other, self.settings.reading),
        }
    }
}

/// Deduplicates against rows staged earlier in this pass before falling back
/// to the stored history.
fn changed(history: &[Progress], staged: &[ProgressDraft], goal: &Goal, metric: Metric, value: f64) -> bool {
    match staged.iter().rev().find(|d| d.metric == metric) {
        Some(previous) => previous.value_achieved != value,
        None => progress::has_changed(history, goal.id, metric, value),
    }
}

//=========================================================================================
// Duplicate Detection
//=========================================================================================

/// The fields two goals must share to count as the same goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalSignature {
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    goal_type: GoalType,
    exercise_type: ExerciseType,
    exercise_name: Option<String>,
    targets: Vec<(Metric, f64)>,
}

impl GoalSignature {
    pub fn of_goal(goal: &Goal) -> Self {
        Self::build(
            goal.start_date,
            goal.end_date,
            goal.goal_type,
            goal.exercise_type,
            goal.exercise_name.clone(),
            goal.targets.iter().map(|t| (t.metric, t.value)),
        )
    }

    pub fn of_draft(draft: &GoalDraft) -> Self {
        Self::build(
            draft.start_date,
            draft.end_date,
            draft.goal_type,
            draft.exercise_type,
            draft.exercise_name.clone(),
            draft.targets.iter().map(|t| (t.metric, t.value)),
        )
    }

    fn build(
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        goal_type: GoalType,
        exercise_type: ExerciseType,
        exercise_name: Option<String>,
        targets: impl Iterator<Item = (Metric, f64)>,
    ) -> Self {
        // Targets compare as a set.
        let mut targets: Vec<_> = targets.collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        targets.dedup();
        Self {
            start_date,
            end_date,
            goal_type,
            exercise_type,
            exercise_name,
            targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CardioDetail, EntryDetail, SetRecord, Target};
    use chrono::Utc;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn goal(goal_type: GoalType, exercise_type: ExerciseType, name: Option<&str>, targets: &[(Metric, f64)]) -> Goal {
        Goal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_id: None,
            name: "test goal".to_string(),
            description: None,
            start_date: day(1),
            end_date: Some(day(7)),
            goal_type,
            exercise_type,
            exercise_name: name.map(str::to_string),
            targets: targets.iter().map(|(metric, value)| Target { metric: *metric, value: *value }).collect(),
            created_at: Utc::now(),
        }
    }

    fn session(date: NaiveDate, entries: Vec<Entry>) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            date,
            time: None,
            source_text: String::new(),
            notes: None,
            entries,
        }
    }

    fn bench(sets: &[(i32, f64)]) -> Entry {
        Entry {
            id: Uuid::new_v4(),
            exercise: "bench press".to_string(),
            notes: None,
            detail: EntryDetail::Strength(
                sets.iter()
                    .enumerate()
                    .map(|(i, (reps, weight))| SetRecord { set_number: i as i32 + 1, reps: *reps, weight: Some(*weight) })
                    .collect(),
            ),
        }
    }

    fn run(distance: f64, pace: f64) -> Entry {
        Entry {
            id: Uuid::new_v4(),
            exercise: "running".to_string(),
            notes: None,
            detail: EntryDetail::Cardio(Some(CardioDetail {
                duration: Some(distance * pace),
                distance: Some(distance),
                pace: Some(pace),
            })),
        }
    }

    fn evaluator() -> GoalEvaluator {
        GoalEvaluator::new(EvaluationSettings::default(), day(10))
    }

    #[test]
    fn strategy_follows_goal_type_and_exercise_name() {
        let single = goal(GoalType::SingleSession, ExerciseType::Strength, None, &[(Metric::Reps, 1.0)]);
        let aggregate = goal(GoalType::Aggregate, ExerciseType::Cardio, Some("running"), &[(Metric::Distance, 1.0)]);
        let count = goal(GoalType::Aggregate, ExerciseType::General, None, &[(Metric::Sessions, 3.0)]);
        assert_eq!(Strategy::for_goal(&single), Strategy::SingleSession);
        assert_eq!(Strategy::for_goal(&aggregate), Strategy::Aggregate);
        assert_eq!(Strategy::for_goal(&count), Strategy::SessionCount);
        assert!(!Strategy::SingleSession.needs_window());
    }

    #[test]
    fn single_session_records_every_target_when_all_are_met() {
        let g = goal(
            GoalType::SingleSession,
            ExerciseType::Strength,
            Some("bench press"),
            &[(Metric::Weight, 200.0), (Metric::Reps, 5.0)],
        );
        let s = session(day(3), vec![bench(&[(5, 185.0), (5, 205.0)])]);
        let drafts = evaluator().evaluate(&g, &[], Some(&s), &[]);

        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(|d| d.is_complete && d.session_id == Some(s.id)));
        // The 185 set does not qualify, so only 5 reps count.
        assert_eq!(drafts[1].value_achieved, 5.0);
    }

    #[test]
    fn single_session_outside_window_is_ignored() {
        let g = goal(GoalType::SingleSession, ExerciseType::Strength, Some("bench press"), &[(Metric::Reps, 1.0)]);
        let s = session(day(8), vec![bench(&[(5, 100.0)])]);
        assert!(evaluator().evaluate(&g, &[], Some(&s), &[]).is_empty());
    }

    #[test]
    fn aggregate_pace_of_zero_is_never_complete() {
        let g = goal(GoalType::Aggregate, ExerciseType::Cardio, Some("running"), &[(Metric::Pace, 8.0)]);
        let window = vec![session(day(2), vec![run(3.0, 9.0)])];
        let drafts = evaluator().evaluate(&g, &[], None, &window);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].value_achieved, 0.0);
        assert!(!drafts[0].is_complete);
    }

    #[test]
    fn aggregate_targets_are_recorded_independently() {
        let g = goal(
            GoalType::Aggregate,
            ExerciseType::Cardio,
            Some("running"),
            &[(Metric::Distance, 5.0), (Metric::Duration, 100.0)],
        );
        let window = vec![session(day(2), vec![run(3.0, 9.0)]), session(day(4), vec![run(3.0, 9.0)])];
        let drafts = evaluator().evaluate(&g, &[], None, &window);

        assert_eq!(drafts.len(), 2);
        assert!(drafts[0].is_complete);
        assert_eq!(drafts[1].value_achieved, 54.0);
        assert!(!drafts[1].is_complete);
        assert_eq!(drafts[0].achieved_on, day(10));
    }

    #[test]
    fn session_count_ignores_other_targets_and_other_types() {
        let g = goal(
            GoalType::Aggregate,
            ExerciseType::Cardio,
            None,
            &[(Metric::Sessions, 2.0), (Metric::Distance, 50.0)],
        );
        let window = vec![
            session(day(2), vec![run(3.0, 9.0)]),
            session(day(3), vec![bench(&[(5, 100.0)])]),
            session(day(5), vec![run(1.0, 9.0)]),
        ];
        let drafts = evaluator().evaluate(&g, &[], None, &window);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].metric, Metric::Sessions);
        assert_eq!(drafts[0].value_achieved, 2.0);
        assert!(drafts[0].is_complete);
    }

    #[test]
    fn detail_less_cardio_does_not_count_as_a_session() {
        let g = goal(GoalType::Aggregate, ExerciseType::Cardio, Some("running"), &[(Metric::Sessions, 1.0)]);
        let bare = Entry {
            detail: EntryDetail::Cardio(None),
            ..run(1.0, 9.0)
        };
        let drafts = evaluator().evaluate(&g, &[], None, &[session(day(2), vec![bare])]);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].value_achieved, 0.0);
        assert!(!drafts[0].is_complete);
    }

    #[test]
    fn complete_goals_are_terminal() {
        let g = goal(GoalType::Aggregate, ExerciseType::General, None, &[(Metric::Sessions, 1.0)]);
        let history = vec![Progress {
            id: 1,
            goal_id: g.id,
            session_id: None,
            metric: Metric::Sessions,
            value_achieved: 1.0,
            achieved_on: day(2),
            is_complete: true,
        }];
        let window = vec![session(day(2), vec![]), session(day(3), vec![])];
        assert!(evaluator().evaluate(&g, &history, None, &window).is_empty());
    }

    #[test]
    fn signatures_treat_targets_as_a_set() {
        let a = goal(GoalType::Aggregate, ExerciseType::Cardio, Some("running"), &[(Metric::Distance, 10.0), (Metric::Pace, 9.0)]);
        let mut b = goal(GoalType::Aggregate, ExerciseType::Cardio, Some("running"), &[(Metric::Pace, 9.0), (Metric::Distance, 10.0)]);
        assert_eq!(GoalSignature::of_goal(&a), GoalSignature::of_goal(&b));

        b.end_date = None;
        assert_ne!(GoalSignature::of_goal(&a), GoalSignature::of_goal(&b));
    }
}
