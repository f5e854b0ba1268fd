//! crates/fitlog_core/src/parsed.rs
//!
//! The structured payload produced by the natural-language workout parser,
//! and the validated conversion from that payload into typed drafts.
//!
//! The payload arrives as loosely-typed JSON: enum-like fields are strings and
//! dates are ISO text. Nothing past this module ever sees those strings.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::warn;

use crate::domain::{
    ActivityKind, CardioDetail, EntryDetail, EntryDraft, ExerciseType, GoalDraft, GoalType,
    Metric, SetRecord, Target,
};

//=========================================================================================
// Validation Errors
//=========================================================================================

/// Why a piece of the parsed payload could not be converted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("invalid {field} '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
    #[error("goal has no targets")]
    NoTargets,
    #[error("{field} must be a finite, non-negative number")]
    InvalidNumber { field: &'static str },
    #[error("end date {end} is before start date {start}")]
    EndsBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("exercise name is empty")]
    EmptyExercise,
}

/// A goal from the payload that was not created, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalRejection {
    pub name: String,
    pub reason: String,
}

//=========================================================================================
// Payload Structs (the parser's output contract)
//=========================================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedWorkout {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub entries: Vec<ParsedEntry>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub goals: Vec<ParsedGoal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub exercise: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sets_details: Vec<ParsedSet>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub pace: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedSet {
    #[serde(default)]
    pub set_number: Option<i32>,
    #[serde(default)]
    pub reps: i32,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedGoal {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub goal_type: String,
    #[serde(default)]
    pub exercise_type: Option<String>,
    #[serde(default)]
    pub exercise_name: Option<String>,
    #[serde(default)]
    pub targets: Vec<ParsedTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTarget {
    pub target_metric: String,
    pub target_value: f64,
}

//=========================================================================================
// Conversion
//=========================================================================================

/// Everything the session mutation needs, already validated.
#[derive(Debug, Clone)]
pub struct SessionInput {
    /// The date the text stated, if any. Logging falls back to `today`;
    /// editing keeps the session's current date.
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub source_text: String,
    pub notes: Option<String>,
    pub entries: Vec<EntryDraft>,
    pub goals: Vec<Result<GoalDraft, GoalRejection>>,
    /// The caller's notion of the current date; closes open-ended goal windows.
    pub today: NaiveDate,
}

impl ParsedWorkout {
    /// Converts the payload, dropping invalid entries and turning invalid goals
    /// into rejections. Conversion never fails as a whole.
    pub fn into_input(self, source_text: impl Into<String>, today: NaiveDate) -> SessionInput {
        let date = match self.date.as_deref().map(|d| parse_date("date", d)) {
            Some(Ok(date)) => Some(date),
            Some(Err(e)) => {
                warn!("Ignoring session date from parser: {}", e);
                None
            }
            None => None,
        };

        let entries = self
            .entries
            .into_iter()
            .filter_map(|entry| {
                let exercise = entry.exercise.clone();
                entry
                    .into_draft()
                    .map_err(|e| warn!("Skipping entry '{}': {}", exercise, e))
                    .ok()
            })
            .collect();

        let goals = self
            .goals
            .into_iter()
            .map(|goal| {
                let name = goal.name.clone();
                goal.into_draft(today).map_err(|e| {
                    warn!("Skipping goal '{}': {}", name, e);
                    GoalRejection {
                        name,
                        reason: e.to_string(),
                    }
                })
            })
            .collect();

        SessionInput {
            date,
            time: None,
            source_text: source_text.into(),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            entries,
            goals,
            today,
        }
    }
}

impl ParsedEntry {
    pub fn into_draft(self) -> Result<EntryDraft, ValidationError> {
        let kind: ActivityKind = self.kind.parse()?;
        let exercise = self.exercise.trim().to_string();
        if exercise.is_empty() {
            return Err(ValidationError::EmptyExercise);
        }

        let detail = match kind {
            ActivityKind::Strength => {
                let mut sets = Vec::with_capacity(self.sets_details.len());
                for (index, set) in self.sets_details.into_iter().enumerate() {
                    if let Some(weight) = set.weight {
                        check_number("weight", weight)?;
                    }
                    sets.push(SetRecord {
                        set_number: set.set_number.unwrap_or(index as i32 + 1),
                        reps: set.reps.max(0),
                        weight: set.weight,
                    });
                }
                EntryDetail::Strength(sets)
            }
            ActivityKind::Cardio => {
                for (field, value) in [
                    ("duration", self.duration),
                    ("distance", self.distance),
                    ("pace", self.pace),
                ] {
                    if let Some(v) = value {
                        check_number(field, v)?;
                    }
                }
                let detail = complete_cardio(CardioDetail {
                    duration: self.duration,
                    distance: self.distance,
                    pace: self.pace,
                });
                let any = detail.duration.is_some() || detail.distance.is_some() || detail.pace.is_some();
                EntryDetail::Cardio(any.then_some(detail))
            }
        };

        Ok(EntryDraft {
            exercise,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            detail,
        })
    }
}

impl ParsedGoal {
    pub fn into_draft(self, today: NaiveDate) -> Result<GoalDraft, ValidationError> {
        let goal_type: GoalType = self.goal_type.parse()?;
        let exercise_type = match self.exercise_type.as_deref() {
            Some(text) => text.parse()?,
            None => ExerciseType::General,
        };
        let start_date = match self.start_date.as_deref() {
            Some(text) => parse_date("start_date", text)?,
            None => today,
        };
        let end_date = self
            .end_date
            .as_deref()
            .map(|text| parse_date("end_date", text))
            .transpose()?;
        if let Some(end) = end_date {
            if end < start_date {
                return Err(ValidationError::EndsBeforeStart { start: start_date, end });
            }
        }

        if self.targets.is_empty() {
            return Err(ValidationError::NoTargets);
        }
        let mut targets = Vec::with_capacity(self.targets.len());
        for target in self.targets {
            let metric: Metric = target.target_metric.parse()?;
            check_number("target_value", target.target_value)?;
            targets.push(Target {
                metric,
                value: target.target_value,
            });
        }

        Ok(GoalDraft {
            name: self.name.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            start_date,
            end_date,
            goal_type,
            exercise_type,
            exercise_name: self
                .exercise_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            targets,
        })
    }
}

pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn check_number(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidNumber { field })
    }
}

/// Fills in whichever of duration, distance and pace can be derived from the
/// other two. A derived pace always wins over a supplied one.
pub fn complete_cardio(mut detail: CardioDetail) -> CardioDetail {
    if let (Some(duration), Some(distance)) = (detail.duration, detail.distance) {
        if distance > 0.0 {
            detail.pace = Some(duration / distance);
        }
    }
    if let Some(pace) = detail.pace {
        match (detail.duration, detail.distance) {
            (None, Some(distance)) if distance > 0.0 => detail.duration = Some(pace * distance),
            (Some(duration), None) if pace > 0.0 => detail.distance = Some(duration / pace),
            _ => {}
        }
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 13).unwrap()
    }

    #[test]
    fn payload_deserializes_from_parser_json() {
        let json = r#"{
            "date": "2024-05-11",
            "entries": [
                {"type": "strength", "exercise": "bench press",
                 "sets_details": [{"set_number": 1, "reps": 8, "weight": 135},
                                  {"set_number": 2, "reps": 6, "weight": 155}]},
                {"type": "cardio", "exercise": "running", "duration": 30, "distance": 3}
            ],
            "notes": "solid day",
            "goals": [
                {"name": "Run 10 miles", "start_date": "2024-05-13", "goal_type": "aggregate",
                 "exercise_type": "cardio", "exercise_name": "running",
                 "targets": [{"target_metric": "distance", "target_value": 10}]}
            ]
        }"#;
        let parsed: ParsedWorkout = serde_json::from_str(json).unwrap();
        let input = parsed.into_input("raw text", today());

        assert_eq!(input.date, NaiveDate::from_ymd_opt(2024, 5, 11));
        assert_eq!(input.entries.len(), 2);
        assert_eq!(input.notes.as_deref(), Some("solid day"));
        let goal = input.goals[0].as_ref().unwrap();
        assert_eq!(goal.goal_type, GoalType::Aggregate);
        assert_eq!(goal.targets, vec![Target { metric: Metric::Distance, value: 10.0 }]);

        match &input.entries[1].detail {
            EntryDetail::Cardio(Some(detail)) => assert_eq!(detail.pace, Some(10.0)),
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[test]
    fn bad_goals_become_rejections_and_bad_entries_are_dropped() {
        let json = r#"{
            "entries": [{"type": "yoga", "exercise": "sun salutation"}],
            "goals": [
                {"name": "Volume", "goal_type": "aggregate", "targets": [{"target_metric": "volume", "target_value": 1}]},
                {"name": "Streak", "goal_type": "streak", "targets": [{"target_metric": "sessions", "target_value": 3}]},
                {"name": "Empty", "goal_type": "aggregate", "targets": []},
                {"name": "Bad date", "goal_type": "aggregate", "start_date": "next tuesday",
                 "targets": [{"target_metric": "sessions", "target_value": 3}]},
                {"name": "Train", "goal_type": "aggregate",
                 "targets": [{"target_metric": "sessions", "target_value": 3}]}
            ]
        }"#;
        let parsed: ParsedWorkout = serde_json::from_str(json).unwrap();
        let input = parsed.into_input("text", today());

        assert!(input.entries.is_empty());
        assert_eq!(input.date, None);
        let rejected: Vec<_> = input.goals.iter().filter_map(|g| g.as_ref().err()).collect();
        assert_eq!(rejected.len(), 4);
        assert_eq!(rejected[0].reason, "unknown metric 'volume'");
        assert_eq!(rejected[1].reason, "unknown goal type 'streak'");
        assert_eq!(rejected[2].reason, "goal has no targets");

        let accepted = input.goals[4].as_ref().unwrap();
        assert_eq!(accepted.exercise_type, ExerciseType::General);
        assert_eq!(accepted.start_date, today());
    }

    #[test]
    fn cardio_fields_are_derived_from_each_other() {
        let from_pace = complete_cardio(CardioDetail { duration: None, distance: Some(3.0), pace: Some(8.0) });
        assert_eq!(from_pace.duration, Some(24.0));

        let distance = complete_cardio(CardioDetail { duration: Some(45.0), distance: None, pace: Some(9.0) });
        assert_eq!(distance.distance, Some(5.0));

        let zero = complete_cardio(CardioDetail { duration: Some(20.0), distance: Some(0.0), pace: None });
        assert_eq!(zero.pace, None);
    }

    #[test]
    fn missing_set_numbers_are_assigned_in_order() {
        let entry = ParsedEntry {
            kind: "strength".to_string(),
            exercise: " pull-ups ".to_string(),
            notes: None,
            sets_details: vec![
                ParsedSet { set_number: None, reps: 10, weight: None },
                ParsedSet { set_number: None, reps: 8, weight: None },
            ],
            duration: None,
            distance: None,
            pace: None,
        };
        let draft = entry.into_draft().unwrap();
        assert_eq!(draft.exercise, "pull-ups");
        let numbers: Vec<_> = match &draft.detail {
            EntryDetail::Strength(sets) => sets.iter().map(|s| s.set_number).collect(),
            _ => unreachable!(),
        };
        assert_eq!(numbers, vec![1, 2]);
    }
}
