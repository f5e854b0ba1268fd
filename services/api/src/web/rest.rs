//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::status_for;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use fitlog_core::{
    Entry, EntryDetail, Goal, GoalFilter, GoalRejection, GoalWithProgress, Metric, PortError,
    Progress, RecordFilter, RecordView, Session, SessionOutcome,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        log_workout_handler,
        edit_workout_handler,
        delete_workout_handler,
        get_workout_handler,
        list_goals_handler,
        delete_goal_handler,
        goal_progress_handler,
        list_records_handler,
    ),
    components(
        schemas(
            WorkoutRequest,
            SessionOutcomeResponse,
            SessionResponse,
            EntryResponse,
            SetResponse,
            CardioResponse,
            GoalResponse,
            TargetResponse,
            ProgressResponse,
            RejectedGoalResponse,
            PersonalRecordResponse,
        )
    ),
    tags(
        (name = "Workout Log API", description = "Log workouts in plain language, track goals and personal records.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A free-text description of a workout, goals, or both.
#[derive(Deserialize, ToSchema)]
pub struct WorkoutRequest {
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct SetResponse {
    set_number: i32,
    reps: i32,
    weight: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct CardioResponse {
    duration: Option<f64>,
    distance: Option<f64>,
    pace: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct EntryResponse {
    id: Uuid,
    exercise: String,
    #[serde(rename = "type")]
    kind: String,
    notes: Option<String>,
    sets: Vec<SetResponse>,
    cardio: Option<CardioResponse>,
}

impl From<Entry> for EntryResponse {
    fn from(entry: Entry) -> Self {
        let kind = entry.kind().to_string();
        let (sets, cardio) = match entry.detail {
            EntryDetail::Strength(sets) => (
                sets.into_iter()
                    .map(|s| SetResponse {
                        set_number: s.set_number,
                        reps: s.reps,
                        weight: s.weight,
                    })
                    .collect(),
                None,
            ),
            EntryDetail::Cardio(detail) => (
                Vec::new(),
                detail.map(|c| CardioResponse {
                    duration: c.duration,
                    distance: c.distance,
                    pace: c.pace,
                }),
            ),
        };
        Self {
            id: entry.id,
            exercise: entry.exercise,
            kind,
            notes: entry.notes,
            sets,
            cardio,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    id: Uuid,
    date: NaiveDate,
    /// `HH:MM:SS`, when the session was logged without an explicit date.
    time: Option<String>,
    notes: Option<String>,
    source_text: String,
    entries: Vec<EntryResponse>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            date: session.date,
            time: session.time.map(|t| t.format("%H:%M:%S").to_string()),
            notes: session.notes,
            source_text: session.source_text,
            entries: session.entries.into_iter().map(EntryResponse::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TargetResponse {
    metric: String,
    value: f64,
}

#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    id: i64,
    metric: String,
    value_achieved: f64,
    achieved_on: NaiveDate,
    is_complete: bool,
    session_id: Option<Uuid>,
}

impl From<Progress> for ProgressResponse {
    fn from(p: Progress) -> Self {
        Self {
            id: p.id,
            metric: p.metric.to_string(),
            value_achieved: p.value_achieved,
            achieved_on: p.achieved_on,
            is_complete: p.is_complete,
            session_id: p.session_id,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GoalResponse {
    id: Uuid,
    name: String,
    description: Option<String>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    goal_type: String,
    exercise_type: String,
    exercise_name: Option<String>,
    targets: Vec<TargetResponse>,
    /// `active`, `complete` or `expired`.
    status: String,
    progress: Vec<ProgressResponse>,
}

impl GoalResponse {
    fn new(goal: Goal, progress: Vec<Progress>, today: NaiveDate) -> Self {
        let status = if progress.iter().any(|p| p.is_complete) {
            "complete"
        } else if goal.is_expired(today) {
            "expired"
        } else {
            "active"
        };
        Self {
            id: goal.id,
            name: goal.name,
            description: goal.description,
            start_date: goal.start_date,
            end_date: goal.end_date,
            goal_type: goal.goal_type.to_string(),
            exercise_type: goal.exercise_type.to_string(),
            exercise_name: goal.exercise_name,
            targets: goal
                .targets
                .iter()
                .map(|t| TargetResponse {
                    metric: t.metric.to_string(),
                    value: t.value,
                })
                .collect(),
            status: status.to_string(),
            progress: progress.into_iter().map(ProgressResponse::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RejectedGoalResponse {
    name: String,
    reason: String,
}

impl From<GoalRejection> for RejectedGoalResponse {
    fn from(r: GoalRejection) -> Self {
        Self {
            name: r.name,
            reason: r.reason,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PersonalRecordResponse {
    id: i64,
    exercise: String,
    #[serde(rename = "type")]
    kind: String,
    field: String,
    value: f64,
    units: String,
    session_id: Uuid,
    recorded_at: NaiveDateTime,
    is_latest: bool,
}

impl From<RecordView> for PersonalRecordResponse {
    fn from(view: RecordView) -> Self {
        let r = view.record;
        Self {
            id: r.id,
            exercise: r.exercise,
            kind: r.kind.to_string(),
            field: r.field.to_string(),
            value: r.value,
            units: r.units,
            session_id: r.session_id,
            recorded_at: r.recorded_at,
            is_latest: view.is_latest,
        }
    }
}

/// What logging or editing a workout produced.
#[derive(Serialize, ToSchema)]
pub struct SessionOutcomeResponse {
    session: Option<SessionResponse>,
    new_goals: Vec<GoalResponse>,
    rejected_goals: Vec<RejectedGoalResponse>,
    new_records: Vec<PersonalRecordResponse>,
    progress: Vec<ProgressResponse>,
}

impl SessionOutcomeResponse {
    fn new(outcome: SessionOutcome, today: NaiveDate) -> Self {
        Self {
            session: outcome.session.map(SessionResponse::from),
            new_goals: outcome
                .new_goals
                .into_iter()
                .map(|g| GoalResponse::new(g, Vec::new(), today))
                .collect(),
            rejected_goals: outcome.rejected_goals.into_iter().map(RejectedGoalResponse::from).collect(),
            // A record is the newest of its kind at the moment it is set.
            new_records: outcome
                .new_records
                .into_iter()
                .map(|record| PersonalRecordResponse::from(RecordView { record, is_latest: true }))
                .collect(),
            progress: outcome.progress.into_iter().map(ProgressResponse::from).collect(),
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct ProgressQuery {
    /// Only return rows for this metric.
    pub metric: Option<String>,
}

#[derive(Deserialize, IntoParams, Default)]
pub struct GoalsQuery {
    /// `single_session` or `aggregate`.
    pub goal_type: Option<String>,
    /// `strength`, `cardio` or `general`.
    pub exercise_type: Option<String>,
    /// When true, only goals without an end date or ending today or later.
    pub active: Option<bool>,
}

impl GoalsQuery {
    fn to_filter(&self, today: NaiveDate) -> Result<GoalFilter, HandlerError> {
        Ok(GoalFilter {
            goal_type: parse_param(self.goal_type.as_deref())?,
            exercise_type: parse_param(self.exercise_type.as_deref())?,
            active_on: self.active.unwrap_or(false).then_some(today),
        })
    }
}

#[derive(Deserialize, IntoParams, Default)]
pub struct RecordsQuery {
    /// Case-insensitive exercise name.
    pub exercise: Option<String>,
    /// Earliest day to include, as YYYY-MM-DD.
    pub start_date: Option<String>,
    /// Latest day to include, as YYYY-MM-DD.
    pub end_date: Option<String>,
}

impl RecordsQuery {
    fn to_filter(&self) -> Result<RecordFilter, HandlerError> {
        let date = |name: &str, value: Option<&str>| {
            value
                .map(|v| {
                    NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                        (
                            StatusCode::BAD_REQUEST,
                            format!("Invalid {} format. Use YYYY-MM-DD.", name),
                        )
                    })
                })
                .transpose()
        };
        Ok(RecordFilter {
            exercise: self.exercise.clone(),
            start_date: date("start_date", self.start_date.as_deref())?,
            end_date: date("end_date", self.end_date.as_deref())?,
        })
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn user_id(headers: &HeaderMap) -> Result<Uuid, HandlerError> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

/// Client errors carry their message; server errors are logged and hidden.
fn failure(action: &str, e: PortError) -> HandlerError {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Failed to {}: {:?}", action, e);
        (status, format!("Failed to {}", action))
    } else {
        (status, e.to_string())
    }
}

/// Parses an optional enum query parameter, rejecting unknown values.
fn parse_param<T>(value: Option<&str>) -> Result<Option<T>, HandlerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(str::parse::<T>)
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn require_text(request: &WorkoutRequest) -> Result<&str, HandlerError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text must not be empty".to_string()));
    }
    Ok(text)
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Log a workout described in plain language.
///
/// The text is parsed first; goals declared in it are created and every open
/// goal is re-evaluated in the same transaction as the new session.
#[utoipa::path(
    post,
    path = "/workouts",
    request_body = WorkoutRequest,
    responses(
        (status = 201, description = "Workout logged", body = SessionOutcomeResponse),
        (status = 400, description = "Missing header, empty text or unparseable description"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn log_workout_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<WorkoutRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    let text = require_text(&request)?;
    let now = Utc::now().naive_utc();
    let today = now.date();

    let parsed = app_state
        .parser
        .parse_workout(text, today)
        .await
        .map_err(|e| failure("parse workout", e))?;
    let mut input = parsed.into_input(text, today);
    // A workout without a stated day happened just now.
    if input.date.is_none() {
        input.time = Some(now.time());
    }

    let outcome = app_state
        .service
        .log_session(user_id, input)
        .await
        .map_err(|e| failure("log workout", e))?;
    info!(
        "User {} logged a workout: {} new goals, {} new records",
        user_id,
        outcome.new_goals.len(),
        outcome.new_records.len()
    );
    Ok((StatusCode::CREATED, Json(SessionOutcomeResponse::new(outcome, today))))
}

/// Replace a logged workout with a new description.
#[utoipa::path(
    put,
    path = "/workouts/{id}",
    request_body = WorkoutRequest,
    responses(
        (status = 200, description = "Workout updated", body = SessionOutcomeResponse),
        (status = 400, description = "Missing header, empty text or unparseable description"),
        (status = 404, description = "No such workout for this user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The workout session ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn edit_workout_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
    Json(request): Json<WorkoutRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    let text = require_text(&request)?;
    let today = today();

    let parsed = app_state
        .parser
        .parse_workout(text, today)
        .await
        .map_err(|e| failure("parse workout", e))?;
    let input = parsed.into_input(text, today);

    let outcome = app_state
        .service
        .edit_session(user_id, session_id, input)
        .await
        .map_err(|e| failure("edit workout", e))?;
    Ok(Json(SessionOutcomeResponse::new(outcome, today)))
}

/// Delete a workout with its entries, records and the goals declared in it.
#[utoipa::path(
    delete,
    path = "/workouts/{id}",
    responses(
        (status = 204, description = "Workout deleted"),
        (status = 404, description = "No such workout for this user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The workout session ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_workout_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    app_state
        .service
        .delete_session(user_id, session_id, today())
        .await
        .map_err(|e| failure("delete workout", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch one logged workout with its entries.
#[utoipa::path(
    get,
    path = "/workouts/{id}",
    responses(
        (status = 200, description = "The workout", body = SessionResponse),
        (status = 404, description = "No such workout for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "The workout session ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_workout_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    let session = app_state
        .service
        .session(user_id, session_id)
        .await
        .map_err(|e| failure("load workout", e))?;
    Ok(Json(SessionResponse::from(session)))
}

/// List the user's goals with their progress history and status.
#[utoipa::path(
    get,
    path = "/goals",
    responses(
        (status = 200, description = "Goals of the user", body = [GoalResponse]),
        (status = 400, description = "Unknown goal type or exercise type")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        GoalsQuery
    )
)]
pub async fn list_goals_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<GoalsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    let today = today();
    let filter = query.to_filter(today)?;
    let goals = app_state
        .service
        .goals(user_id, &filter)
        .await
        .map_err(|e| failure("list goals", e))?;
    let body: Vec<GoalResponse> = goals
        .into_iter()
        .map(|GoalWithProgress { goal, progress }| GoalResponse::new(goal, progress, today))
        .collect();
    Ok(Json(body))
}

/// Delete a goal together with its targets and progress.
#[utoipa::path(
    delete,
    path = "/goals/{id}",
    responses(
        (status = 204, description = "Goal deleted"),
        (status = 404, description = "No such goal for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "The goal ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_goal_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(goal_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    app_state
        .service
        .delete_goal(user_id, goal_id)
        .await
        .map_err(|e| failure("delete goal", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// The progress history of one goal, oldest first.
#[utoipa::path(
    get,
    path = "/goals/{id}/progress",
    responses(
        (status = 200, description = "Progress rows", body = [ProgressResponse]),
        (status = 400, description = "Unknown metric"),
        (status = 404, description = "No such goal for this user")
    ),
    params(
        ("id" = Uuid, Path, description = "The goal ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        ProgressQuery
    )
)]
pub async fn goal_progress_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(goal_id): Path<Uuid>,
    Query(query): Query<ProgressQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    let metric = query
        .metric
        .as_deref()
        .map(str::parse::<Metric>)
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let progress = app_state
        .service
        .goal_progress(user_id, goal_id, metric)
        .await
        .map_err(|e| failure("load goal progress", e))?;
    let body: Vec<ProgressResponse> = progress.into_iter().map(ProgressResponse::from).collect();
    Ok(Json(body))
}

/// The user's personal record ledger, newest rows flagged.
#[utoipa::path(
    get,
    path = "/personal-records",
    responses(
        (status = 200, description = "Personal records", body = [PersonalRecordResponse]),
        (status = 400, description = "Malformed date bound")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        RecordsQuery
    )
)]
pub async fn list_records_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id(&headers)?;
    let filter = query.to_filter()?;
    let records = app_state
        .service
        .personal_records(user_id, &filter)
        .await
        .map_err(|e| failure("list personal records", e))?;
    let body: Vec<PersonalRecordResponse> = records.into_iter().map(PersonalRecordResponse::from).collect();
    Ok(Json(body))
}
