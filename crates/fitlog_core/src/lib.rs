pub mod conditions;
pub mod domain;
pub mod goals;
pub mod memory;
pub mod metrics;
pub mod parsed;
pub mod ports;
pub mod progress;
pub mod records;
pub mod service;

pub use domain::{
    ActivityKind, CardioDetail, Entry, EntryDetail, EntryDraft, ExerciseType, Goal, GoalDraft,
    GoalType, GoalWithProgress, Metric, PersonalRecord, Progress, RecordField, Session,
    SessionDraft, SetRecord, Target,
};
pub use goals::{EvaluationSettings, GoalEvaluator, GoalSignature};
pub use memory::InMemoryStore;
pub use metrics::ReadingPolicy;
pub use parsed::{GoalRejection, ParsedWorkout, SessionInput, ValidationError};
pub use ports::{
    GoalFilter, PortError, PortResult, RecordFilter, RecordQuery, WorkoutParser, WorkoutStore, WorkoutUnit,
};
pub use service::{RecordView, SessionOutcome, WorkoutService};
