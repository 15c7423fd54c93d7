use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use soul_layer::boundary::DiagnoseRequest;
use soul_layer::copy::CopySource;
use soul_layer::diagnosis::evaluate;
use soul_layer::store::{DiagnosisRecord, DiagnosisStore, Flow, SqliteDiagnosisStore, StoreError};
use soul_layer::{Axis, Choice, Diagnoser, Slot, TypeKey};
use tempfile::tempdir;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()
}

fn record(flow: Flow, user: &str, slot: Option<Slot>, axis: Axis, minutes: i64) -> DiagnosisRecord {
    let (score_vector, ranked_order) = evaluate(&[Choice::new(axis)]).unwrap();
    DiagnosisRecord {
        user_id: user.to_string(),
        flow,
        date: date(),
        slot,
        created_at: Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap() + Duration::minutes(minutes),
        winning_axis: (flow == Flow::Daily).then_some(axis),
        type_key: (flow == Flow::Quick).then(|| soul_layer::classify(&ranked_order)),
        score_vector,
        ranked_order,
        comment: format!("comment for {axis}"),
        advice: "advice".to_string(),
        affirmation: "affirmation".to_string(),
        source: CopySource::Template,
    }
}

#[tokio::test]
async fn daily_upsert_overwrites_same_slot() {
    let dir = tempdir().unwrap();
    let store = SqliteDiagnosisStore::new(dir.path().join("soul.sqlite")).unwrap();

    store
        .upsert_daily(&record(Flow::Daily, "u1", Some(Slot::Morning), Axis::E, 0))
        .await
        .unwrap();
    store
        .upsert_daily(&record(Flow::Daily, "u1", Some(Slot::Morning), Axis::V, 5))
        .await
        .unwrap();
    store
        .upsert_daily(&record(Flow::Daily, "u1", Some(Slot::Night), Axis::Lambda, 10))
        .await
        .unwrap();

    let morning = store.daily("u1", date(), Slot::Morning).await.unwrap().unwrap();
    assert_eq!(morning.winning_axis, Some(Axis::V));
    assert_eq!(morning.comment, "comment for V");
    assert_eq!(morning.ranked_order.winner(), Axis::V);

    let history = store.history("u1", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(store.daily("u1", date(), Slot::Noon).await.unwrap().is_none());
    assert!(store.daily("u2", date(), Slot::Morning).await.unwrap().is_none());
}

#[tokio::test]
async fn quick_results_append_and_history_is_newest_first() {
    let dir = tempdir().unwrap();
    let store = SqliteDiagnosisStore::new(dir.path().join("soul.sqlite")).unwrap();

    store
        .append_quick(&record(Flow::Quick, "u1", None, Axis::E, 0))
        .await
        .unwrap();
    store
        .append_quick(&record(Flow::Quick, "u1", None, Axis::MirrorE, 20))
        .await
        .unwrap();
    store
        .upsert_daily(&record(Flow::Daily, "u1", Some(Slot::Noon), Axis::V, 10))
        .await
        .unwrap();
    store
        .append_quick(&record(Flow::Quick, "u2", None, Axis::V, 30))
        .await
        .unwrap();

    let history = store.history("u1", 10).await.unwrap();
    let flows: Vec<Flow> = history.iter().map(|r| r.flow).collect();
    assert_eq!(flows, vec![Flow::Quick, Flow::Daily, Flow::Quick]);
    assert_eq!(history[0].type_key, Some(TypeKey::Future));
    assert_eq!(history[1].winning_axis, Some(Axis::V));
    assert_eq!(history[0], record(Flow::Quick, "u1", None, Axis::MirrorE, 20));

    let limited = store.history("u1", 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn rejects_records_for_the_wrong_flow() {
    let dir = tempdir().unwrap();
    let store = SqliteDiagnosisStore::new(dir.path().join("soul.sqlite")).unwrap();

    let err = store
        .upsert_daily(&record(Flow::Daily, "u1", None, Axis::E, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord(_)));

    let err = store
        .append_quick(&record(Flow::Daily, "u1", Some(Slot::Noon), Axis::E, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord(_)));
}

#[tokio::test]
async fn export_writes_one_line_per_record() {
    let dir = tempdir().unwrap();
    let store = SqliteDiagnosisStore::new(dir.path().join("nested/soul.sqlite")).unwrap();

    store
        .append_quick(&record(Flow::Quick, "u1", None, Axis::E, 0))
        .await
        .unwrap();
    store
        .upsert_daily(&record(Flow::Daily, "u2", Some(Slot::Night), Axis::Lambda, 1))
        .await
        .unwrap();

    let out = dir.path().join("export.jsonl");
    let written = store.export_jsonl(&out).await.unwrap();
    assert_eq!(written, 2);

    let raw = std::fs::read_to_string(&out).unwrap();
    let rows: Vec<DiagnosisRecord> = raw
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].user_id, "u1");
    assert_eq!(rows[1].slot, Some(Slot::Night));
    assert!(raw.contains("\"Λ\""));
}

#[tokio::test]
async fn diagnoser_records_daily_results_by_slot() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteDiagnosisStore::new(dir.path().join("soul.sqlite")).unwrap());
    let diagnoser = Diagnoser::default().with_store(store.clone());
    let now = date().and_hms_opt(7, 30, 0).unwrap();

    let mut request = DiagnoseRequest {
        flow: Flow::Daily,
        choices: vec![Choice::new(Axis::V), Choice::new(Axis::E)],
        theme: None,
        slot: None,
        user_id: Some("u1".to_string()),
        date: None,
    };
    diagnoser.diagnose_at(&request, now, None).await.unwrap();

    request.choices = vec![Choice::new(Axis::MirrorE)];
    let resp = diagnoser.diagnose_at(&request, now, None).await.unwrap();
    assert_eq!(resp.winning_axis, Some(Axis::MirrorE));

    let stored = store.daily("u1", date(), Slot::Morning).await.unwrap().unwrap();
    assert_eq!(stored.winning_axis, Some(Axis::MirrorE));
    assert_eq!(store.history("u1", 10).await.unwrap().len(), 1);

    request.user_id = None;
    diagnoser.diagnose_at(&request, now, None).await.unwrap();
    assert_eq!(store.history("u1", 10).await.unwrap().len(), 1);
}
