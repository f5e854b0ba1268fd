//! crates/fitlog_core/src/records.rs
//!
//! The personal record ledger. Each entry of a session nominates one value
//! per tracked field; a nominee becomes a record when it beats every value
//! the user logged for that exercise and field in earlier sessions.
//! Records are only ever appended.

use tracing::{debug, info};

use crate::domain::{ActivityKind, Entry, EntryDetail, PersonalRecord, RecordDraft, RecordField, Session};
use crate::ports::{PortResult, RecordQuery, WorkoutUnit};

/// One value an entry puts forward for the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Nominee {
    pub exercise: String,
    pub kind: ActivityKind,
    pub field: RecordField,
    pub value: f64,
}

/// The values `entry` competes with.
///
/// Strength entries put forward their heaviest set. Reps only compete when
/// no set carried a weight, so bodyweight work never races loaded work.
/// Cardio entries put forward each recorded distance, duration and pace.
pub fn nominees(entry: &Entry) -> Vec<Nominee> {
    let nominee = |field, value| Nominee {
        exercise: entry.exercise.clone(),
        kind: entry.kind(),
        field,
        value,
    };

    match &entry.detail {
        EntryDetail::Strength(sets) => {
            let heaviest = sets.iter().filter_map(|s| s.weight).reduce(f64::max);
            match heaviest {
                Some(weight) => vec![nominee(RecordField::Weight, weight)],
                None => sets
                    .iter()
                    .map(|s| s.reps)
                    .max()
                    .filter(|reps| *reps > 0)
                    .map(|reps| vec![nominee(RecordField::Reps, f64::from(reps))])
                    .unwrap_or_default(),
            }
        }
        EntryDetail::Cardio(Some(detail)) => [
            (RecordField::Distance, detail.distance),
            (RecordField::Duration, detail.duration),
            (RecordField::Pace, detail.pace),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.filter(|v| *v > 0.0).map(|v| nominee(field, v)))
        .collect(),
        EntryDetail::Cardio(None) => Vec::new(),
    }
}

/// Every value `entry` holds for `field`, as later sessions compare against it.
/// Reps only count from unweighted sets.
pub fn readings(entry: &Entry, field: RecordField) -> Vec<f64> {
    match (&entry.detail, field) {
        (EntryDetail::Strength(sets), RecordField::Weight) => sets.iter().filter_map(|s| s.weight).collect(),
        (EntryDetail::Strength(sets), RecordField::Reps) => sets
            .iter()
            .filter(|s| s.weight.is_none())
            .map(|s| f64::from(s.reps))
            .collect(),
        (EntryDetail::Cardio(Some(detail)), RecordField::Distance) => detail.distance.into_iter().collect(),
        (EntryDetail::Cardio(Some(detail)), RecordField::Duration) => detail.duration.into_iter().collect(),
        (EntryDetail::Cardio(Some(detail)), RecordField::Pace) => detail.pace.into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Whether `value` strictly beats every historical value. An empty history
/// makes any value a record.
pub fn beats_all(field: RecordField, value: f64, history: &[f64]) -> bool {
    history.iter().all(|previous| field.improves_on(value, *previous))
}

/// Runs every entry of `session` through the ledger and appends the records
/// it sets. Returns the new rows in entry order.
pub async fn track_session(unit: &mut dyn WorkoutUnit, session: &Session) -> PortResult<Vec<PersonalRecord>> {
    let moment = session.moment();
    let mut records = Vec::new();

    for nominee in session.entries.iter().flat_map(nominees) {
        let query = RecordQuery {
            user_id: session.user_id,
            exercise: nominee.exercise.clone(),
            kind: nominee.kind,
            field: nominee.field,
            before: moment,
        };
        let history = unit.historical_values(&query).await?;
        if !beats_all(nominee.field, nominee.value, &history) {
            debug!(
                "{} {} {} does not beat {} earlier values",
                nominee.exercise,
                nominee.field,
                nominee.value,
                history.len()
            );
            continue;
        }

        let record = unit
            .append_record(RecordDraft {
                user_id: session.user_id,
                exercise: nominee.exercise,
                kind: nominee.kind,
                field: nominee.field,
                value: nominee.value,
                session_id: session.id,
                recorded_at: moment.timestamp(),
            })
            .await?;
        info!(
            "New personal record: {} {} = {} {}",
            record.exercise, record.field, record.value, record.units
        );
        records.push(record);
    }

    Ok(records)
}
