//! crates/fitlog_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.
//! Child collections (entries, sets, targets) are owned by their parent and
//! keyed by generated identifiers; nothing points back up the tree.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::parsed::ValidationError;

//=========================================================================================
// Text-backed enumerations
//=========================================================================================

/// Declares a closed set of variants that round-trip through their wire names.
/// Parsing never defaults: unknown text becomes a `ValidationError`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ValidationError::UnknownVariant {
                        kind: $what,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(
    /// The shape of a logged entry.
    ActivityKind, "activity type", {
        Strength => "strength",
        Cardio => "cardio",
    }
);

text_enum!(
    /// Which entries a goal looks at. `General` goals count sessions instead.
    ExerciseType, "exercise type", {
        Strength => "strength",
        Cardio => "cardio",
        General => "general",
    }
);

text_enum!(
    GoalType, "goal type", {
        SingleSession => "single_session",
        Aggregate => "aggregate",
    }
);

text_enum!(
    Metric, "metric", {
        Reps => "reps",
        Sets => "sets",
        Distance => "distance",
        Duration => "duration",
        Weight => "weight",
        Sessions => "sessions",
        Pace => "pace",
    }
);

text_enum!(
    /// A field tracked by the personal record ledger.
    RecordField, "record field", {
        Weight => "weight",
        Reps => "reps",
        Distance => "distance",
        Duration => "duration",
        Pace => "pace",
    }
);

impl ExerciseType {
    /// Whether an entry of the given kind belongs to this exercise type.
    pub fn matches(&self, kind: ActivityKind) -> bool {
        match self {
            ExerciseType::General => true,
            ExerciseType::Strength => kind == ActivityKind::Strength,
            ExerciseType::Cardio => kind == ActivityKind::Cardio,
        }
    }
}

impl Metric {
    /// Pace is the only metric where a smaller number is the better result.
    pub fn lower_is_better(&self) -> bool {
        matches!(self, Metric::Pace)
    }

    /// Whether `achieved` satisfies a threshold of `required` for this metric.
    pub fn is_satisfied(&self, achieved: f64, required: f64) -> bool {
        if self.lower_is_better() {
            achieved <= required
        } else {
            achieved >= required
        }
    }
}

impl RecordField {
    pub fn lower_is_better(&self) -> bool {
        matches!(self, RecordField::Pace)
    }

    pub fn units(&self) -> &'static str {
        match self {
            RecordField::Weight => "lbs",
            RecordField::Reps => "reps",
            RecordField::Distance => "mi",
            RecordField::Duration => "min",
            RecordField::Pace => "min/mi",
        }
    }

    /// Whether `candidate` strictly improves on `previous`.
    pub fn improves_on(&self, candidate: f64, previous: f64) -> bool {
        if self.lower_is_better() {
            candidate < previous
        } else {
            candidate > previous
        }
    }
}

//=========================================================================================
// Sessions and their entries
//=========================================================================================

/// One logged workout occurrence.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub source_text: String,
    pub notes: Option<String>,
    pub entries: Vec<Entry>,
}

impl Session {
    pub fn moment(&self) -> SessionMoment {
        SessionMoment {
            date: self.date,
            time: self.time,
        }
    }

    /// Whether any entry in this session satisfies the exercise type.
    pub fn has_entries_of(&self, exercise_type: ExerciseType) -> bool {
        exercise_type == ExerciseType::General
            || self.entries.iter().any(|e| exercise_type.matches(e.kind()))
    }
}

/// The point in time a session happened. Sessions without a time-of-day
/// only order against other sessions by calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionMoment {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl SessionMoment {
    /// The timestamp stamped on ledger rows; a missing time reads as midnight.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }

    /// Whether `self` happened strictly before `current`.
    pub fn precedes(&self, current: &SessionMoment) -> bool {
        match self.time {
            Some(_) => self.timestamp() < current.timestamp(),
            None => self.date < current.date,
        }
    }
}

/// One exercise performed within a session.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: Uuid,
    pub exercise: String,
    pub notes: Option<String>,
    pub detail: EntryDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryDetail {
    Strength(Vec<SetRecord>),
    Cardio(Option<CardioDetail>),
}

impl Entry {
    pub fn kind(&self) -> ActivityKind {
        self.detail.kind()
    }

    pub fn sets(&self) -> &[SetRecord] {
        match &self.detail {
            EntryDetail::Strength(sets) => sets,
            EntryDetail::Cardio(_) => &[],
        }
    }

    pub fn cardio(&self) -> Option<&CardioDetail> {
        match &self.detail {
            EntryDetail::Cardio(detail) => detail.as_ref(),
            EntryDetail::Strength(_) => None,
        }
    }
}

impl EntryDetail {
    pub fn kind(&self) -> ActivityKind {
        match self {
            EntryDetail::Strength(_) => ActivityKind::Strength,
            EntryDetail::Cardio(_) => ActivityKind::Cardio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetRecord {
    pub set_number: i32,
    pub reps: i32,
    /// Pounds. `None` for bodyweight sets.
    pub weight: Option<f64>,
}

/// Minutes, miles and minutes per mile.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CardioDetail {
    pub duration: Option<f64>,
    pub distance: Option<f64>,
    pub pace: Option<f64>,
}

//=========================================================================================
// Goals
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    /// The session whose description declared this goal, if any.
    pub session_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub goal_type: GoalType,
    pub exercise_type: ExerciseType,
    pub exercise_name: Option<String>,
    pub targets: Vec<Target>,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Open-ended goals run through `today`.
    pub fn window_end(&self, today: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or(today)
    }

    pub fn window_contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        self.start_date <= date && date <= self.window_end(today)
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end < today)
    }

    /// Whether an entry falls under this goal's exercise type and name.
    pub fn covers(&self, entry: &Entry) -> bool {
        self.exercise_type.matches(entry.kind())
            && self
                .exercise_name
                .as_deref()
                .map_or(true, |name| name == entry.exercise)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub metric: Metric,
    pub value: f64,
}

/// A recorded observation of a goal's metric. Rows are append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub id: i64,
    pub goal_id: Uuid,
    pub session_id: Option<Uuid>,
    pub metric: Metric,
    pub value_achieved: f64,
    pub achieved_on: NaiveDate,
    pub is_complete: bool,
}

/// A goal bundled with its progress history, as shown to callers.
#[derive(Debug, Clone)]
pub struct GoalWithProgress {
    pub goal: Goal,
    pub progress: Vec<Progress>,
}

impl GoalWithProgress {
    pub fn is_complete(&self) -> bool {
        self.progress.iter().any(|p| p.is_complete)
    }
}

//=========================================================================================
// Personal records
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub exercise: String,
    pub kind: ActivityKind,
    pub field: RecordField,
    pub value: f64,
    pub units: String,
    pub session_id: Uuid,
    pub recorded_at: NaiveDateTime,
}

//=========================================================================================
// Drafts: rows not yet given an identity by the store
//=========================================================================================

#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub source_text: String,
    pub notes: Option<String>,
    pub entries: Vec<EntryDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub exercise: String,
    pub notes: Option<String>,
    pub detail: EntryDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalDraft {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub goal_type: GoalType,
    pub exercise_type: ExerciseType,
    pub exercise_name: Option<String>,
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressDraft {
    pub goal_id: Uuid,
    pub session_id: Option<Uuid>,
    pub metric: Metric,
    pub value_achieved: f64,
    pub achieved_on: NaiveDate,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub user_id: Uuid,
    pub exercise: String,
    pub kind: ActivityKind,
    pub field: RecordField,
    pub value: f64,
    pub session_id: Uuid,
    pub recorded_at: NaiveDateTime,
}

impl RecordDraft {
    pub fn units(&self) -> &'static str {
        self.field.units()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn enums_round_trip_and_reject_unknown_text() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>().unwrap(), *metric);
        }
        assert_eq!("single_session".parse::<GoalType>().unwrap(), GoalType::SingleSession);
        assert!("volume".parse::<Metric>().is_err());
        assert!("streak".parse::<GoalType>().is_err());
        assert!("".parse::<ExerciseType>().is_err());
    }

    #[test]
    fn untimed_sessions_only_precede_on_earlier_dates() {
        let morning = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        let evening = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        let current = SessionMoment { date: date(2024, 5, 10), time: Some(evening) };

        let same_day_untimed = SessionMoment { date: date(2024, 5, 10), time: None };
        let same_day_morning = SessionMoment { date: date(2024, 5, 10), time: Some(morning) };
        let day_before = SessionMoment { date: date(2024, 5, 9), time: None };

        assert!(!same_day_untimed.precedes(&current));
        assert!(same_day_morning.precedes(&current));
        assert!(day_before.precedes(&current));
        assert!(!current.precedes(&same_day_morning));
    }

    #[test]
    fn pace_is_the_only_lower_is_better_metric() {
        assert!(Metric::Pace.is_satisfied(8.0, 8.0));
        assert!(Metric::Pace.is_satisfied(7.9, 8.0));
        assert!(!Metric::Pace.is_satisfied(8.1, 8.0));
        assert!(Metric::Distance.is_satisfied(10.0, 10.0));
        assert!(!Metric::Weight.is_satisfied(195.0, 200.0));
        assert!(RecordField::Pace.improves_on(9.0, 9.5));
        assert!(!RecordField::Weight.improves_on(135.0, 135.0));
    }
}
