//! crates/fitlog_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    ActivityKind, ExerciseType, Goal, GoalDraft, GoalType, GoalWithProgress, Metric, PersonalRecord,
    Progress, ProgressDraft, RecordDraft, RecordField, Session, SessionDraft, SessionMoment,
};
use crate::parsed::ParsedWorkout;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports
//=========================================================================================

/// Which historical values a personal-record comparison looks at.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub user_id: Uuid,
    pub exercise: String,
    pub kind: ActivityKind,
    pub field: RecordField,
    /// Only sessions that happened strictly before this moment count
    /// (see [`SessionMoment::precedes`]).
    pub before: SessionMoment,
}

/// Narrows the goal list. Unset fields match every goal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GoalFilter {
    pub goal_type: Option<GoalType>,
    pub exercise_type: Option<ExerciseType>,
    /// Keeps only goals without an end date or ending on or after this day.
    pub active_on: Option<NaiveDate>,
}

impl GoalFilter {
    pub fn matches(&self, goal: &Goal) -> bool {
        self.goal_type.map_or(true, |t| goal.goal_type == t)
            && self.exercise_type.map_or(true, |t| goal.exercise_type == t)
            && self.active_on.map_or(true, |day| !goal.is_expired(day))
    }
}

/// Narrows the personal record ledger. Date bounds are inclusive and compare
/// against the calendar day of `recorded_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Case-insensitive exercise name.
    pub exercise: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn matches(&self, record: &PersonalRecord) -> bool {
        let day = record.recorded_at.date();
        self.exercise
            .as_deref()
            .map_or(true, |e| record.exercise.eq_ignore_ascii_case(e))
            && self.start_date.map_or(true, |start| start <= day)
            && self.end_date.map_or(true, |end| day <= end)
    }
}

/// The entry point to storage. Everything that mutates session-derived state
/// goes through a [`WorkoutUnit`] obtained from [`WorkoutStore::begin`].
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    /// Opens a unit of work. Nothing written through it is visible to other
    /// units until `commit` succeeds.
    async fn begin(&self) -> PortResult<Box<dyn WorkoutUnit>>;

    // --- Read models ---
    async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<Session>;

    async fn list_goals_with_progress(
        &self,
        user_id: Uuid,
        filter: &GoalFilter,
    ) -> PortResult<Vec<GoalWithProgress>>;

    async fn list_progress(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        metric: Option<Metric>,
    ) -> PortResult<Vec<Progress>>;

    async fn list_personal_records(
        &self,
        user_id: Uuid,
        filter: &RecordFilter,
    ) -> PortResult<Vec<PersonalRecord>>;

    async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()>;
}

/// A transactional view of storage. Reads observe the unit's own staged writes.
#[async_trait]
pub trait WorkoutUnit: Send {
    // --- Sessions ---
    async fn find_session(&mut self, user_id: Uuid, session_id: Uuid) -> PortResult<Option<Session>>;

    async fn insert_session(&mut self, user_id: Uuid, draft: SessionDraft) -> PortResult<Session>;

    /// Replaces date, time, text, notes and every entry of an existing session.
    async fn replace_session(&mut self, session_id: Uuid, draft: SessionDraft) -> PortResult<Session>;

    /// Removes the session with its entries, the goals declared in it and the
    /// records attributed to it. Progress of goals that survive is kept with
    /// its session reference cleared, so a completed goal stays complete.
    async fn delete_session(&mut self, session_id: Uuid) -> PortResult<()>;

    /// Every session of the user dated within `[start, end]`, oldest first.
    async fn sessions_between(
        &mut self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<Session>>;

    // --- Personal records ---
    /// Historical values for the query's field, best first.
    async fn historical_values(&mut self, query: &RecordQuery) -> PortResult<Vec<f64>>;

    async fn append_record(&mut self, draft: RecordDraft) -> PortResult<PersonalRecord>;

    async fn delete_records_for_session(&mut self, session_id: Uuid) -> PortResult<u64>;

    // --- Goals and progress ---
    async fn goals_for_user(&mut self, user_id: Uuid) -> PortResult<Vec<Goal>>;

    async fn insert_goal(
        &mut self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        draft: GoalDraft,
    ) -> PortResult<Goal>;

    async fn progress_for_goal(&mut self, goal_id: Uuid) -> PortResult<Vec<Progress>>;

    async fn append_progress(&mut self, draft: ProgressDraft) -> PortResult<Progress>;

    // --- Completion ---
    async fn commit(&mut self) -> PortResult<()>;

    async fn rollback(&mut self) -> PortResult<()>;
}

//=========================================================================================
// Service Ports
//=========================================================================================

#[async_trait]
pub trait WorkoutParser: Send + Sync {
    /// Turns a free-text workout description into the structured payload.
    /// `today` resolves relative dates such as "yesterday" or "this week".
    async fn parse_workout(&self, text: &str, today: NaiveDate) -> PortResult<ParsedWorkout>;
}
