//! Diagnosis orchestration: choices in, scored and worded result out.
//!
//! Both flows share the same pipeline: accumulate → rank → (classify) → copy.
//! The quick flow reports a [`TypeKey`]; the daily flow reports the winning
//! [`Axis`] and is recorded per `(user, date, slot)`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::axis::Axis;
use crate::boundary::DiagnoseRequest;
use crate::copy::{CopySelector, CopySet, CopySource, CopyTarget};
use crate::gateway::Attribution;
use crate::scoring::{self, Choice, RankedOrder, ScoreVector, ScoringError, TypeKey};
use crate::store::{DiagnosisRecord, DiagnosisStore, Flow, StoreError};
use crate::theme::{Slot, Theme};

#[derive(Debug, thiserror::Error)]
pub enum DiagnosisError {
    #[error(transparent)]
    InvalidInput(#[from] ScoringError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl DiagnosisError {
    /// Input errors are caller bugs; persistence errors may succeed on resubmit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiagnosisError::Persistence(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub score_vector: ScoreVector,
    pub ranked_order: RankedOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_key: Option<TypeKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_axis: Option<Axis>,
    pub comment: String,
    pub advice: String,
    pub affirmation: String,
    pub source: CopySource,
}

impl DiagnosisResponse {
    fn new(score_vector: ScoreVector, ranked_order: RankedOrder, target: CopyTarget, copy: CopySet) -> Self {
        let (type_key, winning_axis) = match target {
            CopyTarget::Type(key) => (Some(key), None),
            CopyTarget::Axis(axis) => (None, Some(axis)),
        };
        Self {
            score_vector,
            ranked_order,
            type_key,
            winning_axis,
            comment: copy.comment,
            advice: copy.advice,
            affirmation: copy.affirmation,
            source: copy.source,
        }
    }

    pub fn flow(&self) -> Flow {
        if self.type_key.is_some() {
            Flow::Quick
        } else {
            Flow::Daily
        }
    }

    pub fn to_record(
        &self,
        user_id: impl Into<String>,
        date: chrono::NaiveDate,
        slot: Option<Slot>,
    ) -> DiagnosisRecord {
        DiagnosisRecord {
            user_id: user_id.into(),
            flow: self.flow(),
            date,
            slot,
            created_at: Utc::now(),
            winning_axis: self.winning_axis,
            type_key: self.type_key,
            score_vector: self.score_vector,
            ranked_order: self.ranked_order,
            comment: self.comment.clone(),
            advice: self.advice.clone(),
            affirmation: self.affirmation.clone(),
            source: self.source,
        }
    }
}

/// Score and rank without producing copy.
pub fn evaluate(choices: &[Choice]) -> Result<(ScoreVector, RankedOrder), ScoringError> {
    let vector = scoring::accumulate(choices)?;
    let order = scoring::rank(&vector);
    Ok((vector, order))
}

#[derive(Clone, Default)]
pub struct Diagnoser {
    copy: CopySelector,
    store: Option<Arc<dyn DiagnosisStore>>,
}

impl std::fmt::Debug for Diagnoser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnoser")
            .field("copy", &self.copy)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl Diagnoser {
    pub fn new(copy: CopySelector) -> Self {
        Self { copy, store: None }
    }

    pub fn with_store(mut self, store: Arc<dyn DiagnosisStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn copy_selector(&self) -> &CopySelector {
        &self.copy
    }

    /// Four-axis type quiz.
    pub async fn quick(
        &self,
        choices: &[Choice],
        theme: Option<Theme>,
        attribution: Attribution,
        cancel: Option<&AtomicBool>,
    ) -> Result<DiagnosisResponse, ScoringError> {
        let (vector, order) = evaluate(choices)?;
        let target = CopyTarget::Type(scoring::classify(&order));
        let copy = self.copy.select(target, theme, attribution, cancel).await;
        debug!(ranked = %order, copy_target = ?target, source = copy.source.as_str(), "quick diagnosis");
        Ok(DiagnosisResponse::new(vector, order, target, copy))
    }

    /// Single-question slot quiz.
    pub async fn daily(
        &self,
        choices: &[Choice],
        theme: Option<Theme>,
        attribution: Attribution,
        cancel: Option<&AtomicBool>,
    ) -> Result<DiagnosisResponse, ScoringError> {
        let (vector, order) = evaluate(choices)?;
        let target = CopyTarget::Axis(order.winner());
        let copy = self.copy.select(target, theme, attribution, cancel).await;
        debug!(ranked = %order, copy_target = ?target, source = copy.source.as_str(), "daily diagnosis");
        Ok(DiagnosisResponse::new(vector, order, target, copy))
    }

    /// Run the request's flow and record the result when a store and a user are present.
    pub async fn diagnose(
        &self,
        request: &DiagnoseRequest,
        cancel: Option<&AtomicBool>,
    ) -> Result<DiagnosisResponse, DiagnosisError> {
        self.diagnose_at(request, Local::now().naive_local(), cancel).await
    }

    /// As [`Diagnoser::diagnose`], with `now` supplying the default date and slot.
    pub async fn diagnose_at(
        &self,
        request: &DiagnoseRequest,
        now: NaiveDateTime,
        cancel: Option<&AtomicBool>,
    ) -> Result<DiagnosisResponse, DiagnosisError> {
        let caller = match request.flow {
            Flow::Quick => "diagnosis::quick",
            Flow::Daily => "diagnosis::daily",
        };
        let mut attribution = Attribution::new(caller);
        if let Some(user) = &request.user_id {
            attribution = attribution.with_user(user.clone());
        }

        let response = match request.flow {
            Flow::Quick => self.quick(&request.choices, request.theme, attribution, cancel).await?,
            Flow::Daily => self.daily(&request.choices, request.theme, attribution, cancel).await?,
        };

        if let (Some(store), Some(user_id)) = (&self.store, &request.user_id) {
            let date = request.date.unwrap_or_else(|| now.date());
            match request.flow {
                Flow::Daily => {
                    let slot = request.slot.unwrap_or_else(|| Slot::at(&now));
                    store
                        .upsert_daily(&response.to_record(user_id.as_str(), date, Some(slot)))
                        .await?;
                    info!(user_id = %user_id, %date, slot = slot.as_str(), "daily result recorded");
                }
                Flow::Quick => {
                    store
                        .append_quick(&response.to_record(user_id.as_str(), date, request.slot))
                        .await?;
                    info!(user_id = %user_id, %date, "quick result recorded");
                }
            }
        }

        Ok(response)
    }
}
