//! End-to-end behaviour of logging, editing and deleting sessions against the
//! in-memory store.

use chrono::NaiveDate;
use fitlog_core::{
    CardioDetail, EntryDetail, EntryDraft, EvaluationSettings, ExerciseType, GoalDraft, GoalFilter,
    GoalType, InMemoryStore, Metric, PortError, RecordField, RecordFilter, SessionInput, SetRecord,
    Target, WorkoutService,
};
use std::sync::Arc;
use uuid::Uuid;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn today() -> NaiveDate {
    day(10)
}

fn service() -> (WorkoutService, InMemoryStore) {
    let store = InMemoryStore::new();
    let service = WorkoutService::new(Arc::new(store.clone()), EvaluationSettings::default());
    (service, store)
}

fn input(date: NaiveDate, entries: Vec<EntryDraft>, goals: Vec<GoalDraft>) -> SessionInput {
    SessionInput {
        date: Some(date),
        time: None,
        source_text: "logged in a test".to_string(),
        notes: None,
        entries,
        goals: goals.into_iter().map(Ok).collect(),
        today: today(),
    }
}

fn goals_only(goals: Vec<GoalDraft>) -> SessionInput {
    input(today(), Vec::new(), goals)
}

fn bench(sets: &[(i32, f64)]) -> EntryDraft {
    EntryDraft {
        exercise: "bench press".to_string(),
        notes: None,
        detail: EntryDetail::Strength(
            sets.iter()
                .enumerate()
                .map(|(i, (reps, weight))| SetRecord {
                    set_number: i as i32 + 1,
                    reps: *reps,
                    weight: Some(*weight),
                })
                .collect(),
        ),
    }
}

fn run(distance: Option<f64>, pace: Option<f64>) -> EntryDraft {
    EntryDraft {
        exercise: "running".to_string(),
        notes: None,
        detail: EntryDetail::Cardio(Some(CardioDetail {
            duration: None,
            distance,
            pace,
        })),
    }
}

fn goal(
    goal_type: GoalType,
    exercise_type: ExerciseType,
    exercise_name: Option<&str>,
    targets: &[(Metric, f64)],
) -> GoalDraft {
    GoalDraft {
        name: "test goal".to_string(),
        description: None,
        start_date: day(1),
        end_date: Some(day(7)),
        goal_type,
        exercise_type,
        exercise_name: exercise_name.map(str::to_string),
        targets: targets
            .iter()
            .map(|(metric, value)| Target { metric: *metric, value: *value })
            .collect(),
    }
}

fn weekly_distance() -> GoalDraft {
    goal(GoalType::Aggregate, ExerciseType::Cardio, Some("running"), &[(Metric::Distance, 10.0)])
}

#[tokio::test]
async fn aggregate_distance_accumulates_across_the_window() {
    let (service, _) = service();
    let user = Uuid::new_v4();
    service.log_session(user, goals_only(vec![weekly_distance()])).await.unwrap();

    let first = service.log_session(user, input(day(2), vec![run(Some(3.0), None)], vec![])).await.unwrap();
    assert_eq!(first.progress.len(), 1);
    assert_eq!(first.progress[0].value_achieved, 3.0);
    assert!(!first.progress[0].is_complete);

    service.log_session(user, input(day(4), vec![run(Some(4.0), None)], vec![])).await.unwrap();
    let third = service.log_session(user, input(day(6), vec![run(Some(4.0), None)], vec![])).await.unwrap();

    assert_eq!(third.progress.len(), 1);
    assert_eq!(third.progress[0].value_achieved, 11.0);
    assert!(third.progress[0].is_complete);
    assert_eq!(third.progress[0].session_id, None);
    assert_eq!(third.progress[0].achieved_on, today());
}

#[tokio::test]
async fn unchanged_values_are_not_recorded_twice() {
    let (service, store) = service();
    let user = Uuid::new_v4();
    service.log_session(user, goals_only(vec![weekly_distance()])).await.unwrap();
    service.log_session(user, input(day(2), vec![run(Some(3.0), None)], vec![])).await.unwrap();
    // The zero total from goal creation, then the first run.
    assert_eq!(store.progress_count(), 2);

    // A strength session re-evaluates the goal without changing its total.
    let again = service.log_session(user, input(day(3), vec![bench(&[(5, 100.0)])], vec![])).await.unwrap();
    assert!(again.progress.is_empty());
    assert_eq!(store.progress_count(), 2);
}

#[tokio::test]
async fn single_session_goals_need_every_target_in_one_session() {
    let (service, store) = service();
    let user = Uuid::new_v4();
    let heavy_triple = goal(
        GoalType::SingleSession,
        ExerciseType::Strength,
        Some("bench press"),
        &[(Metric::Weight, 200.0), (Metric::Reps, 5.0)],
    );
    service.log_session(user, goals_only(vec![heavy_triple])).await.unwrap();

    let partial = service.log_session(user, input(day(2), vec![bench(&[(3, 205.0)])], vec![])).await.unwrap();
    assert!(partial.progress.is_empty());
    assert_eq!(store.progress_count(), 0);

    let full = service.log_session(user, input(day(3), vec![bench(&[(5, 205.0)])], vec![])).await.unwrap();
    assert_eq!(full.progress.len(), 2);
    assert!(full.progress.iter().all(|p| p.is_complete));
    let session_id = full.session.as_ref().map(|s| s.id);
    assert!(full.progress.iter().all(|p| p.session_id == session_id));
}

#[tokio::test]
async fn completed_goals_take_no_further_progress() {
    let (service, store) = service();
    let user = Uuid::new_v4();
    let train_once = goal(GoalType::Aggregate, ExerciseType::General, None, &[(Metric::Sessions, 1.0)]);
    service.log_session(user, goals_only(vec![train_once])).await.unwrap();

    let first = service.log_session(user, input(day(2), vec![bench(&[(5, 100.0)])], vec![])).await.unwrap();
    assert_eq!(first.progress.len(), 1);
    assert!(first.progress[0].is_complete);

    let second = service.log_session(user, input(day(3), vec![run(Some(2.0), None)], vec![])).await.unwrap();
    assert!(second.progress.is_empty());
    assert_eq!(store.progress_count(), 2);

    let goals = service.goals(user, &GoalFilter::default()).await.unwrap();
    assert!(goals[0].is_complete());
}

#[tokio::test]
async fn weight_records_need_to_beat_every_earlier_session() {
    let (service, _) = service();
    let user = Uuid::new_v4();

    let mut found = Vec::new();
    for (d, weight) in [(1, 135.0), (2, 145.0), (3, 140.0)] {
        let outcome = service.log_session(user, input(day(d), vec![bench(&[(5, weight)])], vec![])).await.unwrap();
        found.push(outcome.new_records);
    }

    assert_eq!(found[0].len(), 1);
    assert_eq!(found[0][0].value, 135.0);
    assert_eq!(found[0][0].units, "lbs");
    assert_eq!(found[1].len(), 1);
    assert_eq!(found[1][0].value, 145.0);
    assert!(found[2].is_empty());

    let bench_press = RecordFilter {
        exercise: Some("Bench Press".to_string()),
        ..RecordFilter::default()
    };
    let views = service.personal_records(user, &bench_press).await.unwrap();
    assert_eq!(views.len(), 2);
    assert!(views.iter().any(|v| v.is_latest && v.record.value == 145.0));
}

#[tokio::test]
async fn pace_records_improve_downwards() {
    let (service, _) = service();
    let user = Uuid::new_v4();

    let mut found = Vec::new();
    for (d, pace) in [(1, 9.5), (2, 9.0), (3, 9.2)] {
        let outcome = service.log_session(user, input(day(d), vec![run(None, Some(pace))], vec![])).await.unwrap();
        found.push(outcome.new_records);
    }

    assert_eq!(found[0].len(), 1);
    assert_eq!(found[0][0].field, RecordField::Pace);
    assert_eq!(found[1][0].value, 9.0);
    assert!(found[2].is_empty());
}

#[tokio::test]
async fn duplicate_goals_are_rejected() {
    let (service, _) = service();
    let user = Uuid::new_v4();

    let created = service.log_session(user, goals_only(vec![weekly_distance()])).await.unwrap();
    assert_eq!(created.new_goals.len(), 1);

    let again = service
        .log_session(user, goals_only(vec![weekly_distance(), weekly_distance()]))
        .await
        .unwrap();
    assert!(again.new_goals.is_empty());
    assert_eq!(again.rejected_goals.len(), 2);
    assert!(again.rejected_goals[0].reason.starts_with("duplicate"));

    // Another user may declare the same goal.
    let other = service.log_session(Uuid::new_v4(), goals_only(vec![weekly_distance()])).await.unwrap();
    assert_eq!(other.new_goals.len(), 1);
    assert_eq!(service.goals(user, &GoalFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failures_roll_back_the_whole_mutation() {
    let (service, store) = service();
    let user = Uuid::new_v4();
    service.log_session(user, goals_only(vec![weekly_distance()])).await.unwrap();
    let before = store.progress_count();

    store.fail_progress_writes(true);
    let result = service.log_session(user, input(day(2), vec![run(Some(5.0), Some(8.0))], vec![])).await;
    assert!(matches!(result, Err(PortError::Unexpected(_))));

    // Neither the session's records nor its progress survived.
    assert!(service.personal_records(user, &RecordFilter::default()).await.unwrap().is_empty());
    assert_eq!(store.progress_count(), before);

    store.fail_progress_writes(false);
    let retried = service.log_session(user, input(day(2), vec![run(Some(5.0), Some(8.0))], vec![])).await.unwrap();
    assert_eq!(retried.new_records.len(), 2);
}

#[tokio::test]
async fn editing_recomputes_the_session_records() {
    let (service, _) = service();
    let user = Uuid::new_v4();

    let first = service.log_session(user, input(day(1), vec![bench(&[(5, 135.0)])], vec![])).await.unwrap();
    service.log_session(user, input(day(2), vec![bench(&[(5, 145.0)])], vec![])).await.unwrap();
    let session_id = first.session.unwrap().id;

    let mut edit = input(day(1), vec![bench(&[(5, 150.0)])], vec![]);
    edit.date = None;
    let edited = service.edit_session(user, session_id, edit).await.unwrap();

    let session = edited.session.unwrap();
    assert_eq!(session.date, day(1));
    assert_eq!(edited.new_records.len(), 1);
    assert_eq!(edited.new_records[0].value, 150.0);

    let values: Vec<_> = service
        .personal_records(user, &RecordFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.record.value)
        .collect();
    assert_eq!(values.len(), 2);
    assert!(values.contains(&145.0) && values.contains(&150.0));
}

#[tokio::test]
async fn sessions_of_other_users_cannot_be_edited_or_deleted() {
    let (service, _) = service();
    let owner = Uuid::new_v4();
    let logged = service.log_session(owner, input(day(1), vec![bench(&[(5, 100.0)])], vec![])).await.unwrap();
    let session_id = logged.session.unwrap().id;

    let stranger = Uuid::new_v4();
    let edit = service.edit_session(stranger, session_id, input(day(1), vec![], vec![])).await;
    assert!(matches!(edit, Err(PortError::NotFound(_))));
    let delete = service.delete_session(stranger, session_id, today()).await;
    assert!(matches!(delete, Err(PortError::NotFound(_))));
    assert!(service.session(owner, session_id).await.is_ok());
}

#[tokio::test]
async fn deleting_a_session_removes_what_it_produced() {
    let (service, _) = service();
    let user = Uuid::new_v4();
    let logged = service
        .log_session(user, input(day(2), vec![run(Some(4.0), None)], vec![weekly_distance()]))
        .await
        .unwrap();
    assert_eq!(logged.new_goals.len(), 1);
    assert_eq!(logged.progress.len(), 1);
    let session_id = logged.session.unwrap().id;

    service.delete_session(user, session_id, today()).await.unwrap();

    assert!(matches!(service.session(user, session_id).await, Err(PortError::NotFound(_))));
    assert!(service.goals(user, &GoalFilter::default()).await.unwrap().is_empty());
    assert!(service.personal_records(user, &RecordFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_the_completing_session_keeps_the_goal_complete() {
    let (service, store) = service();
    let user = Uuid::new_v4();
    let heavy_bench = goal(GoalType::SingleSession, ExerciseType::Strength, Some("bench press"), &[(Metric::Weight, 200.0)]);
    let created = service.log_session(user, goals_only(vec![heavy_bench])).await.unwrap();
    let goal_id = created.new_goals[0].id;

    let completing = service.log_session(user, input(day(2), vec![bench(&[(3, 205.0)])], vec![])).await.unwrap();
    assert!(completing.progress[0].is_complete);
    let session_id = completing.session.unwrap().id;

    service.delete_session(user, session_id, today()).await.unwrap();

    let goals = service.goals(user, &GoalFilter::default()).await.unwrap();
    assert_eq!(goals.len(), 1);
    assert!(goals[0].is_complete());
    let kept = service.goal_progress(user, goal_id, None).await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].session_id, None);

    let count = store.progress_count();
    let later = service.log_session(user, input(day(3), vec![bench(&[(3, 210.0)])], vec![])).await.unwrap();
    assert!(later.progress.is_empty());
    assert_eq!(store.progress_count(), count);
}

#[tokio::test]
async fn goal_and_record_lists_apply_their_filters() {
    let (service, _) = service();
    let user = Uuid::new_v4();
    let mut finished = weekly_distance();
    finished.end_date = Some(day(5));
    let strength = goal(GoalType::SingleSession, ExerciseType::Strength, Some("bench press"), &[(Metric::Reps, 50.0)]);
    service.log_session(user, goals_only(vec![finished, strength])).await.unwrap();
    for d in [1, 4, 8] {
        service.log_session(user, input(day(d), vec![bench(&[(5, 100.0 + d as f64)])], vec![])).await.unwrap();
    }

    let single = GoalFilter {
        goal_type: Some(GoalType::SingleSession),
        ..GoalFilter::default()
    };
    let found = service.goals(user, &single).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].goal.exercise_type, ExerciseType::Strength);

    let active = GoalFilter {
        exercise_type: Some(ExerciseType::Cardio),
        active_on: Some(day(6)),
        ..GoalFilter::default()
    };
    assert!(service.goals(user, &active).await.unwrap().is_empty());

    let window = RecordFilter {
        start_date: Some(day(2)),
        end_date: Some(day(4)),
        ..RecordFilter::default()
    };
    let records = service.personal_records(user, &window).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record.value, 104.0);
}

#[tokio::test]
async fn goal_progress_is_filtered_by_metric_and_owner() {
    let (service, _) = service();
    let user = Uuid::new_v4();
    let both = goal(
        GoalType::Aggregate,
        ExerciseType::Cardio,
        Some("running"),
        &[(Metric::Distance, 10.0), (Metric::Sessions, 3.0)],
    );
    let created = service.log_session(user, goals_only(vec![both])).await.unwrap();
    let goal_id = created.new_goals[0].id;
    service.log_session(user, input(day(2), vec![run(Some(3.0), None)], vec![])).await.unwrap();

    let sessions = service.goal_progress(user, goal_id, Some(Metric::Sessions)).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.last().map(|p| p.value_achieved), Some(1.0));

    let denied = service.goal_progress(Uuid::new_v4(), goal_id, None).await;
    assert!(matches!(denied, Err(PortError::NotFound(_))));

    service.delete_goal(user, goal_id).await.unwrap();
    assert!(service.goals(user, &GoalFilter::default()).await.unwrap().is_empty());
}
