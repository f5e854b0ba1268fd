//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `WorkoutStore` and `WorkoutUnit` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`. Every unit of work
//! is one database transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use fitlog_core::domain::{
    ActivityKind, CardioDetail, Entry, EntryDetail, EntryDraft, Goal, GoalDraft, GoalWithProgress,
    Metric, PersonalRecord, Progress, ProgressDraft, RecordDraft, RecordField, Session, SessionDraft,
    SetRecord, Target,
};
use fitlog_core::parsed::ValidationError;
use fitlog_core::ports::{
    GoalFilter, PortError, PortResult, RecordFilter, RecordQuery, WorkoutStore, WorkoutUnit,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `WorkoutStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// One open transaction. `None` once committed or rolled back.
pub struct PgUnit {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnit {
    fn conn(&mut self) -> PortResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| PortError::Unexpected("unit of work already finished".to_string()))
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Enums are stored as their text form and read back through the same
/// validated conversion; a stored value that no longer parses is corrupt data.
fn decode<T: FromStr<Err = ValidationError>>(value: &str) -> PortResult<T> {
    value
        .parse()
        .map_err(|e: ValidationError| PortError::Unexpected(format!("corrupt stored value: {}", e)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    time: Option<NaiveTime>,
    source_text: String,
    notes: Option<String>,
}
impl SessionRecord {
    fn to_domain(self, entries: Vec<Entry>) -> Session {
        Session {
            id: self.id,
            user_id: self.user_id,
            date: self.date,
            time: self.time,
            source_text: self.source_text,
            notes: self.notes,
            entries,
        }
    }
}

#[derive(FromRow)]
struct EntryRecord {
    id: Uuid,
    session_id: Uuid,
    exercise: String,
    kind: String,
    notes: Option<String>,
}

#[derive(FromRow)]
struct SetRow {
    entry_id: Uuid,
    set_number: i32,
    reps: i32,
    weight: Option<f64>,
}

#[derive(FromRow)]
struct CardioRecord {
    entry_id: Uuid,
    duration: Option<f64>,
    distance: Option<f64>,
    pace: Option<f64>,
}

#[derive(FromRow)]
struct GoalRecord {
    id: Uuid,
    user_id: Uuid,
    session_id: Option<Uuid>,
    name: String,
    description: Option<String>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    goal_type: String,
    exercise_type: String,
    exercise_name: Option<String>,
    created_at: DateTime<Utc>,
}
impl GoalRecord {
    fn to_domain(self, targets: Vec<Target>) -> PortResult<Goal> {
        Ok(Goal {
            id: self.id,
            user_id: self.user_id,
            session_id: self.session_id,
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            goal_type: decode(&self.goal_type)?,
            exercise_type: decode(&self.exercise_type)?,
            exercise_name: self.exercise_name,
            targets,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct TargetRecord {
    goal_id: Uuid,
    metric: String,
    target_value: f64,
}

#[derive(FromRow)]
struct ProgressRecord {
    id: i64,
    goal_id: Uuid,
    session_id: Option<Uuid>,
    metric: String,
    value_achieved: f64,
    achieved_on: NaiveDate,
    is_complete: bool,
}
impl ProgressRecord {
    fn to_domain(self) -> PortResult<Progress> {
        Ok(Progress {
            id: self.id,
            goal_id: self.goal_id,
            session_id: self.session_id,
            metric: decode(&self.metric)?,
            value_achieved: self.value_achieved,
            achieved_on: self.achieved_on,
            is_complete: self.is_complete,
        })
    }
}

#[derive(FromRow)]
struct RecordRow {
    id: i64,
    user_id: Uuid,
    exercise: String,
    kind: String,
    field: String,
    value: f64,
    units: String,
    session_id: Uuid,
    recorded_at: NaiveDateTime,
}
impl RecordRow {
    fn to_domain(self) -> PortResult<PersonalRecord> {
        Ok(PersonalRecord {
            id: self.id,
            user_id: self.user_id,
            exercise: self.exercise,
            kind: decode(&self.kind)?,
            field: decode(&self.field)?,
            value: self.value,
            units: self.units,
            session_id: self.session_id,
            recorded_at: self.recorded_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, user_id, date, time, source_text, notes";
const GOAL_COLUMNS: &str = "id, user_id, session_id, name, description, start_date, end_date, \
     goal_type, exercise_type, exercise_name, created_at";
const PROGRESS_COLUMNS: &str =
    "id, goal_id, session_id, metric, value_achieved, achieved_on, is_complete";
const RECORD_COLUMNS: &str =
    "id, user_id, exercise, kind, field, value, units, session_id, recorded_at";

//=========================================================================================
// Loading Aggregates
//=========================================================================================

/// Attaches entries, sets and cardio details to the given session rows.
async fn hydrate_sessions(conn: &mut PgConnection, rows: Vec<SessionRecord>) -> PortResult<Vec<Session>> {
    let session_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let entry_rows = sqlx::query_as::<_, EntryRecord>(
        "SELECT id, session_id, exercise, kind, notes FROM entries \
         WHERE session_id = ANY($1) ORDER BY session_id, position",
    )
    .bind(&session_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(unexpected)?;

    let entry_ids: Vec<Uuid> = entry_rows.iter().map(|e| e.id).collect();
    let set_rows = sqlx::query_as::<_, SetRow>(
        "SELECT entry_id, set_number, reps, weight FROM strength_sets \
         WHERE entry_id = ANY($1) ORDER BY entry_id, position",
    )
    .bind(&entry_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(unexpected)?;
    let cardio_rows = sqlx::query_as::<_, CardioRecord>(
        "SELECT entry_id, duration, distance, pace FROM cardio_details WHERE entry_id = ANY($1)",
    )
    .bind(&entry_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(unexpected)?;

    let mut sets: HashMap<Uuid, Vec<SetRecord>> = HashMap::new();
    for row in set_rows {
        sets.entry(row.entry_id).or_default().push(SetRecord {
            set_number: row.set_number,
            reps: row.reps,
            weight: row.weight,
        });
    }
    let mut cardio: HashMap<Uuid, CardioDetail> = cardio_rows
        .into_iter()
        .map(|c| {
            let detail = CardioDetail {
                duration: c.duration,
                distance: c.distance,
                pace: c.pace,
            };
            (c.entry_id, detail)
        })
        .collect();

    let mut entries: HashMap<Uuid, Vec<Entry>> = HashMap::new();
    for row in entry_rows {
        let detail = match decode::<ActivityKind>(&row.kind)? {
            ActivityKind::Strength => EntryDetail::Strength(sets.remove(&row.id).unwrap_or_default()),
            ActivityKind::Cardio => EntryDetail::Cardio(cardio.remove(&row.id)),
        };
        entries.entry(row.session_id).or_default().push(Entry {
            id: row.id,
            exercise: row.exercise,
            notes: row.notes,
            detail,
        });
    }

    Ok(rows
        .into_iter()
        .map(|r| {
            let session_entries = entries.remove(&r.id).unwrap_or_default();
            r.to_domain(session_entries)
        })
        .collect())
}

async fn fetch_session(
    conn: &mut PgConnection,
    user_id: Uuid,
    session_id: Uuid,
) -> PortResult<Option<Session>> {
    let row = sqlx::query_as::<_, SessionRecord>(&format!(
        "SELECT {} FROM sessions WHERE id = $1 AND user_id = $2",
        SESSION_COLUMNS
    ))
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(unexpected)?;

    match row {
        Some(row) => Ok(hydrate_sessions(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Attaches targets, in declaration order, to the given goal rows.
async fn hydrate_goals(conn: &mut PgConnection, rows: Vec<GoalRecord>) -> PortResult<Vec<Goal>> {
    let goal_ids: Vec<Uuid> = rows.iter().map(|g| g.id).collect();
    let target_rows = sqlx::query_as::<_, TargetRecord>(
        "SELECT goal_id, metric, target_value FROM goal_targets \
         WHERE goal_id = ANY($1) ORDER BY goal_id, position",
    )
    .bind(&goal_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(unexpected)?;

    let mut targets: HashMap<Uuid, Vec<Target>> = HashMap::new();
    for row in target_rows {
        targets.entry(row.goal_id).or_default().push(Target {
            metric: decode(&row.metric)?,
            value: row.target_value,
        });
    }

    rows.into_iter()
        .map(|g| {
            let goal_targets = targets.remove(&g.id).unwrap_or_default();
            g.to_domain(goal_targets)
        })
        .collect()
}

async fn fetch_goals(conn: &mut PgConnection, user_id: Uuid) -> PortResult<Vec<Goal>> {
    let rows = sqlx::query_as::<_, GoalRecord>(&format!(
        "SELECT {} FROM goals WHERE user_id = $1 ORDER BY created_at, id",
        GOAL_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(unexpected)?;
    hydrate_goals(conn, rows).await
}

async fn owns_goal(conn: &mut PgConnection, user_id: Uuid, goal_id: Uuid) -> PortResult<()> {
    let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM goals WHERE id = $1 AND user_id = $2")
        .bind(goal_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(unexpected)?;
    found
        .map(|_| ())
        .ok_or_else(|| PortError::NotFound(format!("Goal {} not found", goal_id)))
}

async fn insert_entries(
    conn: &mut PgConnection,
    session_id: Uuid,
    drafts: Vec<EntryDraft>,
) -> PortResult<Vec<Entry>> {
    let mut entries = Vec::with_capacity(drafts.len());
    for (position, draft) in drafts.into_iter().enumerate() {
        let entry_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO entries (id, session_id, position, exercise, kind, notes) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry_id)
        .bind(session_id)
        .bind(position as i32)
        .bind(&draft.exercise)
        .bind(draft.detail.kind().as_str())
        .bind(&draft.notes)
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;

        match &draft.detail {
            EntryDetail::Strength(sets) => {
                for (set_position, set) in sets.iter().enumerate() {
                    sqlx::query(
                        "INSERT INTO strength_sets (entry_id, position, set_number, reps, weight) \
                         VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(entry_id)
                    .bind(set_position as i32)
                    .bind(set.set_number)
                    .bind(set.reps)
                    .bind(set.weight)
                    .execute(&mut *conn)
                    .await
                    .map_err(unexpected)?;
                }
            }
            EntryDetail::Cardio(Some(detail)) => {
                sqlx::query(
                    "INSERT INTO cardio_details (entry_id, duration, distance, pace) VALUES ($1, $2, $3, $4)",
                )
                .bind(entry_id)
                .bind(detail.duration)
                .bind(detail.distance)
                .bind(detail.pace)
                .execute(&mut *conn)
                .await
                .map_err(unexpected)?;
            }
            EntryDetail::Cardio(None) => {}
        }

        entries.push(Entry {
            id: entry_id,
            exercise: draft.exercise,
            notes: draft.notes,
            detail: draft.detail,
        });
    }
    Ok(entries)
}

//=========================================================================================
// `WorkoutStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkoutStore for PgStore {
    async fn begin(&self) -> PortResult<Box<dyn WorkoutUnit>> {
        let tx = self.pool.begin().await.map_err(unexpected)?;
        Ok(Box::new(PgUnit { tx: Some(tx) }))
    }

    async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> PortResult<Session> {
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        fetch_session(&mut conn, user_id, session_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn list_goals_with_progress(
        &self,
        user_id: Uuid,
        filter: &GoalFilter,
    ) -> PortResult<Vec<GoalWithProgress>> {
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        let rows = sqlx::query_as::<_, GoalRecord>(&format!(
            "SELECT {} FROM goals \
             WHERE user_id = $1 \
               AND ($2::text IS NULL OR goal_type = $2) \
               AND ($3::text IS NULL OR exercise_type = $3) \
               AND ($4::date IS NULL OR end_date IS NULL OR end_date >= $4) \
             ORDER BY created_at, id",
            GOAL_COLUMNS
        ))
        .bind(user_id)
        .bind(filter.goal_type.map(|t| t.as_str()))
        .bind(filter.exercise_type.map(|t| t.as_str()))
        .bind(filter.active_on)
        .fetch_all(&mut *conn)
        .await
        .map_err(unexpected)?;
        let goals = hydrate_goals(&mut conn, rows).await?;

        let goal_ids: Vec<Uuid> = goals.iter().map(|g| g.id).collect();
        let rows = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {} FROM goal_progress WHERE goal_id = ANY($1) ORDER BY achieved_on, id",
            PROGRESS_COLUMNS
        ))
        .bind(&goal_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(unexpected)?;

        let mut progress: HashMap<Uuid, Vec<Progress>> = HashMap::new();
        for row in rows {
            progress.entry(row.goal_id).or_default().push(row.to_domain()?);
        }

        Ok(goals
            .into_iter()
            .map(|goal| GoalWithProgress {
                progress: progress.remove(&goal.id).unwrap_or_default(),
                goal,
            })
            .collect())
    }

    async fn list_progress(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        metric: Option<Metric>,
    ) -> PortResult<Vec<Progress>> {
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        owns_goal(&mut conn, user_id, goal_id).await?;

        let rows = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {} FROM goal_progress WHERE goal_id = $1 AND ($2::text IS NULL OR metric = $2) \
             ORDER BY achieved_on, id",
            PROGRESS_COLUMNS
        ))
        .bind(goal_id)
        .bind(metric.map(|m| m.as_str()))
        .fetch_all(&mut *conn)
        .await
        .map_err(unexpected)?;
        rows.into_iter().map(ProgressRecord::to_domain).collect()
    }

    async fn list_personal_records(
        &self,
        user_id: Uuid,
        filter: &RecordFilter,
    ) -> PortResult<Vec<PersonalRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM personal_records \
             WHERE user_id = $1 \
               AND ($2::text IS NULL OR LOWER(exercise) = LOWER($2)) \
               AND ($3::date IS NULL OR recorded_at::date >= $3) \
               AND ($4::date IS NULL OR recorded_at::date <= $4) \
             ORDER BY exercise, field, recorded_at, id",
            RECORD_COLUMNS
        ))
        .bind(user_id)
        .bind(filter.exercise.as_deref())
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        rows.into_iter().map(RecordRow::to_domain).collect()
    }

    async fn delete_goal(&self, user_id: Uuid, goal_id: Uuid) -> PortResult<()> {
        // Targets and progress go with the goal through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
            .bind(goal_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Goal {} not found", goal_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `WorkoutUnit` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkoutUnit for PgUnit {
    async fn find_session(&mut self, user_id: Uuid, session_id: Uuid) -> PortResult<Option<Session>> {
        fetch_session(self.conn()?, user_id, session_id).await
    }

    async fn insert_session(&mut self, user_id: Uuid, draft: SessionDraft) -> PortResult<Session> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO sessions (id, user_id, date, time, source_text, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(draft.date)
        .bind(draft.time)
        .bind(&draft.source_text)
        .bind(&draft.notes)
        .fetch_one(&mut *conn)
        .await
        .map_err(unexpected)?;

        let entries = insert_entries(conn, row.id, draft.entries).await?;
        Ok(row.to_domain(entries))
    }

    async fn replace_session(&mut self, session_id: Uuid, draft: SessionDraft) -> PortResult<Session> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE sessions SET date = $2, time = $3, source_text = $4, notes = $5 \
             WHERE id = $1 RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(draft.date)
        .bind(draft.time)
        .bind(&draft.source_text)
        .bind(&draft.notes)
        .fetch_optional(&mut *conn)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        sqlx::query("DELETE FROM entries WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *conn)
            .await
            .map_err(unexpected)?;
        let entries = insert_entries(conn, session_id, draft.entries).await?;
        Ok(row.to_domain(entries))
    }

    async fn delete_session(&mut self, session_id: Uuid) -> PortResult<()> {
        // Entries, declared goals and attributed records cascade from the
        // session row. Progress of surviving goals keeps its row with the
        // session reference nulled.
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(self.conn()?)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    async fn sessions_between(
        &mut self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<Session>> {
        let conn = self.conn()?;
        let rows = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM sessions WHERE user_id = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date, time NULLS FIRST, id",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await
        .map_err(unexpected)?;
        hydrate_sessions(conn, rows).await
    }

    async fn historical_values(&mut self, query: &RecordQuery) -> PortResult<Vec<f64>> {
        let (source, value) = match query.field {
            RecordField::Weight => ("strength_sets v", "v.weight"),
            // Reps only compete among unweighted sets.
            RecordField::Reps => (
                "strength_sets v",
                "CASE WHEN v.weight IS NULL THEN v.reps::double precision END",
            ),
            RecordField::Distance => ("cardio_details v", "v.distance"),
            RecordField::Duration => ("cardio_details v", "v.duration"),
            RecordField::Pace => ("cardio_details v", "v.pace"),
        };
        let direction = if query.field.lower_is_better() { "ASC" } else { "DESC" };

        let sql = format!(
            "SELECT value FROM ( \
                 SELECT {value} AS value FROM {source} \
                 JOIN entries e ON e.id = v.entry_id \
                 JOIN sessions s ON s.id = e.session_id \
                 WHERE s.user_id = $1 AND e.exercise = $2 AND e.kind = $3 \
                   AND ((s.time IS NOT NULL AND s.date + s.time < $4) \
                     OR (s.time IS NULL AND s.date < $5)) \
             ) readings WHERE value IS NOT NULL ORDER BY value {direction}",
        );
        sqlx::query_scalar::<_, f64>(&sql)
            .bind(query.user_id)
            .bind(&query.exercise)
            .bind(query.kind.as_str())
            .bind(query.before.timestamp())
            .bind(query.before.date)
            .fetch_all(self.conn()?)
            .await
            .map_err(unexpected)
    }

    async fn append_record(&mut self, draft: RecordDraft) -> PortResult<PersonalRecord> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "INSERT INTO personal_records (user_id, exercise, kind, field, value, units, session_id, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(draft.user_id)
        .bind(&draft.exercise)
        .bind(draft.kind.as_str())
        .bind(draft.field.as_str())
        .bind(draft.value)
        .bind(draft.units())
        .bind(draft.session_id)
        .bind(draft.recorded_at)
        .fetch_one(self.conn()?)
        .await
        .map_err(unexpected)?;
        row.to_domain()
    }

    async fn delete_records_for_session(&mut self, session_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM personal_records WHERE session_id = $1")
            .bind(session_id)
            .execute(self.conn()?)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn goals_for_user(&mut self, user_id: Uuid) -> PortResult<Vec<Goal>> {
        fetch_goals(self.conn()?, user_id).await
    }

    async fn insert_goal(
        &mut self,
        user_id: Uuid,
        session_id: Option<Uuid>,
        draft: GoalDraft,
    ) -> PortResult<Goal> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, GoalRecord>(&format!(
            "INSERT INTO goals (id, user_id, session_id, name, description, start_date, end_date, \
                 goal_type, exercise_type, exercise_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            GOAL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(session_id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(draft.goal_type.as_str())
        .bind(draft.exercise_type.as_str())
        .bind(&draft.exercise_name)
        .fetch_one(&mut *conn)
        .await
        .map_err(unexpected)?;

        for (position, target) in draft.targets.iter().enumerate() {
            sqlx::query(
                "INSERT INTO goal_targets (goal_id, position, metric, target_value) VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(position as i32)
            .bind(target.metric.as_str())
            .bind(target.value)
            .execute(&mut *conn)
            .await
            .map_err(unexpected)?;
        }

        row.to_domain(draft.targets)
    }

    async fn progress_for_goal(&mut self, goal_id: Uuid) -> PortResult<Vec<Progress>> {
        let rows = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {} FROM goal_progress WHERE goal_id = $1 ORDER BY id",
            PROGRESS_COLUMNS
        ))
        .bind(goal_id)
        .fetch_all(self.conn()?)
        .await
        .map_err(unexpected)?;
        rows.into_iter().map(ProgressRecord::to_domain).collect()
    }

    async fn append_progress(&mut self, draft: ProgressDraft) -> PortResult<Progress> {
        let row = sqlx::query_as::<_, ProgressRecord>(&format!(
            "INSERT INTO goal_progress (goal_id, session_id, metric, value_achieved, achieved_on, is_complete) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            PROGRESS_COLUMNS
        ))
        .bind(draft.goal_id)
        .bind(draft.session_id)
        .bind(draft.metric.as_str())
        .bind(draft.value_achieved)
        .bind(draft.achieved_on)
        .bind(draft.is_complete)
        .fetch_one(self.conn()?)
        .await
        .map_err(unexpected)?;
        row.to_domain()
    }

    async fn commit(&mut self) -> PortResult<()> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(unexpected),
            None => Err(PortError::Unexpected("unit of work already finished".to_string())),
        }
    }

    async fn rollback(&mut self) -> PortResult<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(unexpected),
            None => Ok(()),
        }
    }
}
