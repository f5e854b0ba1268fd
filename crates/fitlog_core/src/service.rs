//! crates/fitlog_core/src/service.rs
//!
//! Coordinates everything that happens when a session is logged, edited or
//! deleted. Each call runs inside one unit of work: the session rows, goal
//! creation, personal records and goal progress either all commit or all
//! roll back.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    Goal, GoalDraft, GoalWithProgress, Metric, PersonalRecord, Progress, Session, SessionDraft,
};
use crate::goals::{self, GoalEvaluator, GoalSignature, EvaluationSettings, Strategy};
use crate::parsed::{GoalRejection, SessionInput};
use crate::ports::{GoalFilter, PortError, PortResult, RecordFilter, WorkoutStore, WorkoutUnit};
use crate::records;

//=========================================================================================
// Outcome Types
//=========================================================================================

/// What a session mutation produced, for the caller to report back.
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    /// `None` when the text declared goals but logged no entries.
    pub session: Option<Session>,
    pub new_goals: Vec<Goal>,
    pub rejected_goals: Vec<GoalRejection>,
    pub new_records: Vec<PersonalRecord>,
    pub progress: Vec<Progress>,
}

/// A personal record with whether it is the newest row for its exercise and field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordView {
    pub record: PersonalRecord,
    pub is_latest: bool,
}

//=========================================================================================
// The Service
//=========================================================================================

#[derive(Clone)]
pub struct WorkoutService {
    store: Arc<dyn WorkoutStore>,
    settings: EvaluationSettings,
}

impl WorkoutService {
    pub fn new(store: Arc<dyn WorkoutStore>, settings: EvaluationSettings) -> Self {
        Self { store, settings }
    }

    // --- Mutations ---

    /// Logs a new session from already-parsed input.
    pub async fn log_session(&self, user_id: Uuid, input: SessionInput) -> PortResult<SessionOutcome> {
        let mut unit = self.store.begin().await?;
        let result = self.apply_log(unit.as_mut(), user_id, input).await;
        finish(unit, result).await
    }

    /// Replaces a session's date, time, notes and entries, then re-evaluates.
    pub async fn edit_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        input: SessionInput,
    ) -> PortResult<SessionOutcome> {
        let mut unit = self.store.begin().await?;
        let result = self.apply_edit(unit.as_mut(), user_id, session_id, input).await;
        finish(unit, result).await
    }

    /// Removes a session with everything derived from it, then re-evaluates
    /// the user's open goals against what remains.
    pub async fn delete_session(&self, user_id: Uuid, session_id: Uuid, today: NaiveDate) -> PortResult<()> {
        let mut unit = self.store.begin().await?;
        let result = async {
            owned_session(unit.as_mut(), user_id, session_id).await?;
            unit.delete_session(session_id).await?;
            self.evaluate_open_goals(unit.as_mut(), user_id, None, today).await?;
            info!("Deleted session {} for user {}", session_id, user_id);
            Ok::<(), PortError>(())
        }
        .await;
        finish(unit, result).await
    }

    // --- Read models ---

    pub async fn session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<Session> {
        self.store.get_session(user_id, session_id).await
    }

    pub async fn goals(&self, user_id: Uuid, filter: &GoalFilter) -> PortResult<Vec<GoalWithProgress>> {
        self.store.list_goals_with_progress(user_id, filter).await
    }

    pub async fn goal_progress(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        metric: Option<Metric>,
    ) -> PortResult<Vec<Progress>> {
        let mut progress = self.store.list_progress(user_id, goal_id, metric).await?;
        progress.sort_by_key(|p| (p.achieved_on, p.id));
        Ok(progress)
    }

    pub async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()> {
        self.store.delete_goal(user_id, goal_id).await
    }

    pub async fn personal_records(&self, user_id: Uuid, filter: &RecordFilter) -> PortResult<Vec<RecordView>> {
        let records = self.store.list_personal_records(user_id, filter).await?;
        Ok(flag_latest(records))
    }

    //=====================================================================================
    // Unit-of-work bodies
    //=====================================================================================

    async fn apply_log(
        &self,
        unit: &mut dyn WorkoutUnit,
        user_id: Uuid,
        input: SessionInput,
    ) -> PortResult<SessionOutcome> {
        let session = if input.entries.is_empty() {
            None
        } else {
            let draft = SessionDraft {
                date: input.date.unwrap_or(input.today),
                time: input.time,
                source_text: input.source_text,
                notes: input.notes,
                entries: input.entries,
            };
            let session = unit.insert_session(user_id, draft).await?;
            info!(
                "Logged session {} on {} with {} entries",
                session.id,
                session.date,
                session.entries.len()
            );
            Some(session)
        };

        self.settle(unit, user_id, session, input.goals, input.today).await
    }

    async fn apply_edit(
        &self,
        unit: &mut dyn WorkoutUnit,
        user_id: Uuid,
        session_id: Uuid,
        input: SessionInput,
    ) -> PortResult<SessionOutcome> {
        let existing = owned_session(unit, user_id, session_id).await?;

        // Records this session set may no longer hold once its entries change.
        let cleared = unit.delete_records_for_session(session_id).await?;
        let draft = SessionDraft {
            date: input.date.unwrap_or(existing.date),
            time: input.time.or(existing.time),
            source_text: input.source_text,
            notes: input.notes,
            entries: input.entries,
        };
        let session = unit.replace_session(session_id, draft).await?;
        info!(
            "Edited session {}: {} entries, {} records cleared",
            session.id,
            session.entries.len(),
            cleared
        );

        self.settle(unit, user_id, Some(session), input.goals, input.today).await
    }

    /// The shared tail of logging and editing: create goals, track records,
    /// evaluate every open goal.
    async fn settle(
        &self,
        unit: &mut dyn WorkoutUnit,
        user_id: Uuid,
        session: Option<Session>,
        goals: Vec<Result<GoalDraft, GoalRejection>>,
        today: NaiveDate,
    ) -> PortResult<SessionOutcome> {
        let session_id = session.as_ref().map(|s| s.id);
        let (new_goals, rejected_goals) = create_goals(unit, user_id, session_id, goals).await?;

        let new_records = match &session {
            Some(session) => records::track_session(unit, session).await?,
            None => Vec::new(),
        };

        let progress = self
            .evaluate_open_goals(unit, user_id, session.as_ref(), today)
            .await?;

        Ok(SessionOutcome {
            session,
            new_goals,
            rejected_goals,
            new_records,
            progress,
        })
    }

    async fn evaluate_open_goals(
        &self,
        unit: &mut dyn WorkoutUnit,
        user_id: Uuid,
        trigger: Option<&Session>,
        today: NaiveDate,
    ) -> PortResult<Vec<Progress>> {
        let evaluator = GoalEvaluator::new(self.settings, today);
        let mut written = Vec::new();

        for goal in unit.goals_for_user(user_id).await? {
            let history = unit.progress_for_goal(goal.id).await?;
            if goals::is_complete(&history) {
                continue;
            }

            let window = if Strategy::for_goal(&goal).needs_window() {
                unit.sessions_between(user_id, goal.start_date, goal.window_end(today))
                    .await?
            } else {
                Vec::new()
            };

            for draft in evaluator.evaluate(&goal, &history, trigger, &window) {
                written.push(unit.append_progress(draft).await?);
            }
        }

        Ok(written)
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Commits on success and rolls back on failure. A failed rollback is logged
/// but the original error is what the caller sees.
async fn finish<T>(mut unit: Box<dyn WorkoutUnit>, result: PortResult<T>) -> PortResult<T> {
    match result {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(e) => {
            error!("Rolling back session mutation: {}", e);
            if let Err(rollback) = unit.rollback().await {
                error!("Rollback failed: {}", rollback);
            }
            Err(e)
        }
    }
}

async fn owned_session(unit: &mut dyn WorkoutUnit, user_id: Uuid, session_id: Uuid) -> PortResult<Session> {
    unit.find_session(user_id, session_id)
        .await?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
}

/// Inserts every valid, non-duplicate goal. Duplicates are checked against the
/// user's stored goals and against goals accepted earlier in the same batch.
async fn create_goals(
    unit: &mut dyn WorkoutUnit,
    user_id: Uuid,
    session_id: Option<Uuid>,
    candidates: Vec<Result<GoalDraft, GoalRejection>>,
) -> PortResult<(Vec<Goal>, Vec<GoalRejection>)> {
    let mut created = Vec::new();
    let mut rejected = Vec::new();
    if candidates.is_empty() {
        return Ok((created, rejected));
    }

    let mut known: Vec<(GoalSignature, String)> = unit
        .goals_for_user(user_id)
        .await?
        .iter()
        .map(|g| (GoalSignature::of_goal(g), g.name.clone()))
        .collect();

    for candidate in candidates {
        let draft = match candidate {
            Ok(draft) => draft,
            Err(rejection) => {
                rejected.push(rejection);
                continue;
            }
        };

        let signature = GoalSignature::of_draft(&draft);
        if let Some((_, existing)) = known.iter().find(|(s, _)| *s == signature) {
            warn!("Rejecting goal '{}': duplicates '{}'", draft.name, existing);
            rejected.push(GoalRejection {
                reason: format!("duplicate of existing goal '{}'", existing),
                name: draft.name,
            });
            continue;
        }

        let goal = unit.insert_goal(user_id, session_id, draft).await?;
        info!("Created goal {} ('{}')", goal.id, goal.name);
        known.push((signature, goal.name.clone()));
        created.push(goal);
    }

    Ok((created, rejected))
}

/// Marks the newest record per exercise and field. Input order is preserved.
pub fn flag_latest(records: Vec<PersonalRecord>) -> Vec<RecordView> {
    let mut newest: HashMap<(String, &'static str), (chrono::NaiveDateTime, i64)> = HashMap::new();
    for r in &records {
        let key = (r.exercise.to_lowercase(), r.field.as_str());
        let stamp = (r.recorded_at, r.id);
        newest
            .entry(key)
            .and_modify(|best| {
                if stamp > *best {
                    *best = stamp;
                }
            })
            .or_insert(stamp);
    }

    records
        .into_iter()
        .map(|record| {
            let key = (record.exercise.to_lowercase(), record.field.as_str());
            let is_latest = newest.get(&key) == Some(&(record.recorded_at, record.id));
            RecordView { record, is_latest }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivityKind, RecordField};
    use chrono::NaiveDate;

    fn record(id: i64, exercise: &str, field: RecordField, day: u32) -> PersonalRecord {
        PersonalRecord {
            id,
            user_id: Uuid::nil(),
            exercise: exercise.to_string(),
            kind: ActivityKind::Strength,
            field,
            value: 100.0,
            units: field.units().to_string(),
            session_id: Uuid::nil(),
            recorded_at: NaiveDate::from_ymd_opt(2024, 1, day).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn latest_flag_is_per_exercise_and_field() {
        let views = flag_latest(vec![
            record(1, "Bench Press", RecordField::Weight, 1),
            record(2, "bench press", RecordField::Weight, 5),
            record(3, "bench press", RecordField::Reps, 2),
            record(4, "squat", RecordField::Weight, 1),
        ]);
        let flags: Vec<_> = views.iter().map(|v| v.is_latest).collect();
        assert_eq!(flags, vec![false, true, true, true]);
    }
}
