use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use soul_layer::copy::CopySelector;
use soul_layer::enhance::EnhancePolicy;
use soul_layer::gateway::{ChatGateway, ChatModel, ChatRequest, ChatResponse, ProviderError};
use soul_layer::session::{Phase, QuizSession, SessionError, SessionState};
use soul_layer::store::{DiagnosisRecord, DiagnosisStore, Flow, SqliteDiagnosisStore, StoreError};
use soul_layer::{Axis, Diagnoser, DiagnosisError, Slot, Theme, TypeKey};
use tempfile::tempdir;

#[tokio::test]
async fn asking_to_result_on_successful_submit() {
    let diagnoser = Diagnoser::default();
    let mut session = QuizSession::new(Flow::Quick, Some(Theme::Future));
    assert_eq!(session.phase(), Phase::Asking);

    session.select(Axis::V).unwrap();
    session.select(Axis::E).unwrap();
    assert_eq!(session.selections().len(), 2);

    let resp = session.submit(&diagnoser, None).await.unwrap();
    assert_eq!(resp.type_key, Some(TypeKey::Future));

    assert_eq!(session.phase(), Phase::Result);
    assert!(session.result().is_some());
    assert!(session.selections().is_empty());
}

#[tokio::test]
async fn result_is_terminal() {
    let diagnoser = Diagnoser::default();
    let mut session = QuizSession::new(Flow::Daily, None);
    session.select(Axis::Lambda).unwrap();
    session.submit(&diagnoser, None).await.unwrap();

    assert!(matches!(
        session.select(Axis::E),
        Err(SessionError::InvalidTransition { phase: Phase::Result, .. })
    ));
    assert!(matches!(
        session.reset(),
        Err(SessionError::InvalidTransition { phase: Phase::Result, .. })
    ));
    assert!(session.submit(&diagnoser, None).await.is_err());
    assert_eq!(session.result().unwrap().winning_axis, Some(Axis::Lambda));
}

#[tokio::test]
async fn failed_submit_moves_to_error_and_discards_selections() {
    let diagnoser = Diagnoser::default();
    let mut session = QuizSession::new(Flow::Quick, None);

    let err = session.submit(&diagnoser, None).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Submit(DiagnosisError::InvalidInput(_))
    ));
    assert_eq!(session.phase(), Phase::Error);
    match session.state() {
        SessionState::Error { retryable, .. } => assert!(!retryable),
        other => panic!("expected error state, got {other:?}"),
    }

    assert!(session.select(Axis::E).is_err());
    assert!(session.submit(&diagnoser, None).await.is_err());

    session.reset().unwrap();
    assert_eq!(session.phase(), Phase::Asking);
    assert!(session.selections().is_empty());

    session.select(Axis::MirrorE).unwrap();
    let resp = session.submit(&diagnoser, None).await.unwrap();
    assert_eq!(resp.type_key, Some(TypeKey::Future));
}

#[tokio::test]
async fn reset_while_asking_abandons_picks() {
    let mut session = QuizSession::new(Flow::Quick, None);
    session.select(Axis::E).unwrap();
    session.reset().unwrap();
    assert!(session.selections().is_empty());
    assert_eq!(session.phase(), Phase::Asking);
}

#[tokio::test]
async fn daily_session_is_recorded_for_its_slot() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteDiagnosisStore::new(dir.path().join("soul.sqlite")).unwrap());
    let diagnoser = Diagnoser::default().with_store(store.clone());
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

    let mut session = QuizSession::new(Flow::Daily, Some(Theme::Love))
        .for_user("u1")
        .in_slot(date, Slot::Noon);
    session.select(Axis::V).unwrap();
    session.submit(&diagnoser, None).await.unwrap();

    let stored = store.daily("u1", date, Slot::Noon).await.unwrap().unwrap();
    assert_eq!(stored.winning_axis, Some(Axis::V));
    assert!(stored.advice.contains("the people close to you"));
}

/// Rejects the first `failures` writes, then accepts everything.
struct FlakyStore {
    failures: usize,
    writes: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            writes: AtomicUsize::new(0),
        })
    }

    fn write(&self) -> Result<(), StoreError> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl DiagnosisStore for FlakyStore {
    async fn upsert_daily(&self, _record: &DiagnosisRecord) -> Result<(), StoreError> {
        self.write()
    }

    async fn append_quick(&self, _record: &DiagnosisRecord) -> Result<(), StoreError> {
        self.write()
    }

    async fn history(&self, _user_id: &str, _limit: usize) -> Result<Vec<DiagnosisRecord>, StoreError> {
        Ok(Vec::new())
    }

    async fn daily(
        &self,
        _user_id: &str,
        _date: NaiveDate,
        _slot: Slot,
    ) -> Result<Option<DiagnosisRecord>, StoreError> {
        Ok(None)
    }
}

#[tokio::test]
async fn store_failure_is_retryable_and_recoverable_after_reset() {
    let store = FlakyStore::new(1);
    let diagnoser = Diagnoser::default().with_store(store.clone());
    let mut session = QuizSession::new(Flow::Quick, Some(Theme::Work)).for_user("u1");

    session.select(Axis::V).unwrap();
    session.select(Axis::E).unwrap();
    let err = session.submit(&diagnoser, None).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Submit(DiagnosisError::Persistence(StoreError::Io(_)))
    ));

    assert_eq!(session.phase(), Phase::Error);
    match session.state() {
        SessionState::Error { message, retryable } => {
            assert!(*retryable);
            assert!(message.contains("disk full"), "{message}");
        }
        other => panic!("expected error state, got {other:?}"),
    }
    assert!(session.selections().is_empty());

    session.reset().unwrap();
    assert_eq!(session.phase(), Phase::Asking);
    assert!(session.selections().is_empty());

    session.select(Axis::V).unwrap();
    session.select(Axis::E).unwrap();
    let resp = session.submit(&diagnoser, None).await.unwrap();
    assert_eq!(resp.type_key, Some(TypeKey::Future));
    assert_eq!(session.phase(), Phase::Result);
    assert_eq!(store.writes.load(Ordering::SeqCst), 2);
}

/// Never answers.
struct StalledGateway;

#[async_trait]
impl ChatGateway for StalledGateway {
    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_an_in_flight_submit_keeps_the_picks() {
    let copy = CopySelector::with_gateway(
        Arc::new(StalledGateway),
        ChatModel::openai("gpt-4o-mini"),
        EnhancePolicy::with_timeout(Duration::from_secs(8)),
    );
    let diagnoser = Diagnoser::new(copy);
    let mut session = QuizSession::new(Flow::Quick, None);
    session.select(Axis::Lambda).unwrap();
    session.select(Axis::MirrorE).unwrap();

    let abandoned = tokio::time::timeout(Duration::from_secs(1), session.submit(&diagnoser, None))
        .await
        .is_err();
    assert!(abandoned);

    assert_eq!(session.phase(), Phase::Asking);
    assert_eq!(session.selections().len(), 2);
    assert_eq!(session.selections()[1].axis, Axis::MirrorE);
}
