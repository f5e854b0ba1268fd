//! crates/fitlog_core/src/memory.rs
//!
//! An in-memory implementation of the storage ports. A unit of work operates
//! on a private copy of the data and swaps it in on commit, so a rolled-back
//! or dropped unit leaves nothing behind. Concurrent units follow
//! last-commit-wins.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    Entry, EntryDraft, Goal, GoalDraft, GoalWithProgress, Metric, PersonalRecord, Progress, ProgressDraft,
    RecordDraft, Session, SessionDraft,
};
use crate::ports::{GoalFilter, PortError, PortResult, RecordFilter, RecordQuery, WorkoutStore, WorkoutUnit};
use crate::records;

#[derive(Debug, Clone, Default)]
struct State {
    sessions: HashMap<Uuid, Session>,
    goals: Vec<Goal>,
    progress: Vec<Progress>,
    records: Vec<PersonalRecord>,
    last_row_id: i64,
}

impl State {
    fn next_row_id(&mut self) -> i64 {
        self.last_row_id += 1;
        self.last_row_id
    }

    fn owned_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<&Goal> {
        self.goals
            .iter()
            .find(|g| g.id == goal_id && g.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Goal {} not found", goal_id)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    fail_progress_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later progress write fail, for exercising rollback.
    pub fn fail_progress_writes(&self, fail: bool) {
        self.fail_progress_writes.store(fail, Ordering::SeqCst);
    }

    pub fn progress_count(&self) -> usize {
        self.state.lock().map(|s| s.progress.len()).unwrap_or_default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }
}

fn build_entries(draft_entries: Vec<EntryDraft>) -> Vec<Entry> {
    draft_entries
        .into_iter()
        .map(|e| Entry {
            id: Uuid::new_v4(),
            exercise: e.exercise,
            notes: e.notes,
            detail: e.detail,
        })
        .collect()
}

//=========================================================================================
// `WorkoutStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkoutStore for InMemoryStore {
    async fn begin(&self) -> PortResult<Box<dyn WorkoutUnit>> {
        let staged = self.lock()?.clone();
        Ok(Box::new(MemoryUnit {
            shared: self.state.clone(),
            staged,
            fail_progress_writes: self.fail_progress_writes.load(Ordering::SeqCst),
        }))
    }

    async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<Session> {
        self.lock()?
            .sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn list_goals_with_progress(
        &self,
        user_id: Uuid,
        filter: &GoalFilter,
    ) -> PortResult<Vec<GoalWithProgress>> {
        let state = self.lock()?;
        Ok(state
            .goals
            .iter()
            .filter(|g| g.user_id == user_id && filter.matches(g))
            .map(|goal| GoalWithProgress {
                goal: goal.clone(),
                progress: state.progress.iter().filter(|p| p.goal_id == goal.id).cloned().collect(),
            })
            .collect())
    }

    async fn list_progress(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        metric: Option<Metric>,
    ) -> PortResult<Vec<Progress>> {
        let state = self.lock()?;
        state.owned_goal(user_id, goal_id)?;
        Ok(state
            .progress
            .iter()
            .filter(|p| p.goal_id == goal_id && metric.map_or(true, |m| p.metric == m))
            .cloned()
            .collect())
    }

    async fn list_personal_records(
        &self,
        user_id: Uuid,
        filter: &RecordFilter,
    ) -> PortResult<Vec<PersonalRecord>> {
        let state = self.lock()?;
        let mut found: Vec<_> = state
            .records
            .iter()
            .filter(|r| r.user_id == user_id && filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (a.exercise.as_str(), a.field.as_str(), a.recorded_at, a.id)
                .cmp(&(b.exercise.as_str(), b.field.as_str(), b.recorded_at, b.id))
        });
        Ok(found)
    }

    async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()> {
        let mut state = self.lock()?;
        state.owned_goal(user_id, goal_id)?;
        state.goals.retain(|g| g.id != goal_id);
        state.progress.retain(|p| p.goal_id != goal_id);
        Ok(())
    }
}

//=========================================================================================
// `WorkoutUnit` Trait Implementation
//=========================================================================================

struct MemoryUnit {
    shared: Arc<Mutex<State>>,
    staged: State,
    fail_progress_writes: bool,
}

#[async_trait]
impl WorkoutUnit for MemoryUnit {
    async fn find_session(&mut self, user_id: Uuid, session_id: Uuid) -> PortResult<Option<Session>> {
        Ok(self
            .staged
            .sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn insert_session(&mut self, user_id: Uuid, draft: SessionDraft) -> PortResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            date: draft.date,
            time: draft.time,
            source_text: draft.source_text,
            notes: draft.notes,
            entries: build_entries(draft.entries),
        };
        self.staged.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn replace_session(&mut self, session_id: Uuid, draft: SessionDraft) -> PortResult<Session> {
        let session = self
            .staged
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        session.date = draft.date;
        session.time = draft.time;
        session.source_text = draft.source_text;
        session.notes = draft.notes;
        session.entries = build_entries(draft.entries);
        Ok(session.clone())
    }

    async fn delete_session(&mut self, session_id: Uuid) -> PortResult<()> {
        let state = &mut self.staged;
        state
            .sessions
            .remove(&session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        let declared: Vec<Uuid> = state
            .goals
            .iter()
            .filter(|g| g.session_id == Some(session_id))
            .map(|g| g.id)
            .collect();
        state.goals.retain(|g| !declared.contains(&g.id));
        state.progress.retain(|p| !declared.contains(&p.goal_id));
        for progress in state.progress.iter_mut().filter(|p| p.session_id == Some(session_id)) {
            progress.session_id = None;
        }
        state.records.retain(|r| r.session_id != session_id);
        Ok(())
    }

    async fn sessions_between(
        &mut self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<Session>> {
        let mut found: Vec<_> = self
            .staged
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && start <= s.date && s.date <= end)
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.date, s.time, s.id));
        Ok(found)
    }

    async fn historical_values(&mut self, query: &RecordQuery) -> PortResult<Vec<f64>> {
        let mut values: Vec<f64> = self
            .staged
            .sessions
            .values()
            .filter(|s| s.user_id == query.user_id && s.moment().precedes(&query.before))
            .flat_map(|s| s.entries.iter())
            .filter(|e| e.kind() == query.kind && e.exercise == query.exercise)
            .flat_map(|e| records::readings(e, query.field))
            .collect();
        if query.field.lower_is_better() {
            values.sort_by(|a, b| a.total_cmp(b));
        } else {
            values.sort_by(|a, b| b.total_cmp(a));
        }
        Ok(values)
    }

    async fn append_record(&mut self, draft: RecordDraft) -> PortResult<PersonalRecord> {
        let record = PersonalRecord {
            id: self.staged.next_row_id(),
            units: draft.units().to_string(),
            user_id: draft.user_id,
            exercise: draft.exercise,
            kind: draft.kind,
            field: draft.field,
            value: draft.value,
            session_id: draft.session_id,
            recorded_at: draft.recorded_at,
        };
        self.staged.records.push(record.clone());
        Ok(record)
    }

    async fn delete_records_for_session(&mut self, session_id: Uuid) -> PortResult<u64> {
        let before = self.staged.records.len();
        self.staged.records.retain(|r| r.session_id != session_id);
        Ok((before - self.staged.records.len()) as u64)
    }

    async fn goals_for_user(&mut self, user_id: Uuid) -> PortResult<Vec<Goal>> {
        let mut goals: Vec<_> = self.staged.goals.iter().filter(|g| g.user_id == user_id).cloned().collect();
        goals.sort_by_key(|g| g.created_at);
        Ok(goals)
    }

    async fn insert_goal(
        &mut self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        draft: GoalDraft,
    ) -> PortResult<Goal> {
        let goal = Goal {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            name: draft.name,
            description: draft.description,
            start_date: draft.start_date,
            end_date: draft.end_date,
            goal_type: draft.goal_type,
            exercise_type: draft.exercise_type,
            exercise_name: draft.exercise_name,
            targets: draft.targets,
            created_at: Utc::now(),
        };
        self.staged.goals.push(goal.clone());
        Ok(goal)
    }

    async fn progress_for_goal(&mut self, goal_id: Uuid) -> PortResult<Vec<Progress>> {
        Ok(self
            .staged
            .progress
            .iter()
            .filter(|p| p.goal_id == goal_id)
            .cloned()
            .collect())
    }

    async fn append_progress(&mut self, draft: ProgressDraft) -> PortResult<Progress> {
        if self.fail_progress_writes {
            return Err(PortError::Unexpected("progress write failed".to_string()));
        }
        let progress = Progress {
            id: self.staged.next_row_id(),
            goal_id: draft.goal_id,
            session_id: draft.session_id,
            metric: draft.metric,
            value_achieved: draft.value_achieved,
            achieved_on: draft.achieved_on,
            is_complete: draft.is_complete,
        };
        self.staged.progress.push(progress.clone());
        Ok(progress)
    }

    async fn commit(&mut self) -> PortResult<()> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))?;
        *shared = std::mem::take(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> PortResult<()> {
        self.staged = State::default();
        Ok(())
    }
}
