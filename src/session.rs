//! Quiz interaction state machine.
//!
//! ```text
//!   Asking ──submit ok──▶ Result   (terminal)
//!     │  ▲
//!  submit err  reset
//!     ▼  │
//!    Error
//! ```
//!
//! Leaving `Error` always starts from an empty selection list.

use std::fmt;
use std::sync::atomic::AtomicBool;

use chrono::NaiveDate;
use tracing::debug;

use crate::axis::Axis;
use crate::boundary::DiagnoseRequest;
use crate::diagnosis::{Diagnoser, DiagnosisError, DiagnosisResponse};
use crate::scoring::Choice;
use crate::store::Flow;
use crate::theme::{Slot, Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Asking,
    Result,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Asking => "asking",
            Phase::Result => "result",
            Phase::Error => "error",
        })
    }
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Asking { selections: Vec<Choice> },
    Result(Box<DiagnosisResponse>),
    Error { message: String, retryable: bool },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while session is {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },
    #[error("submission failed: {0}")]
    Submit(#[from] DiagnosisError),
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    flow: Flow,
    theme: Option<Theme>,
    slot: Option<Slot>,
    user_id: Option<String>,
    date: Option<NaiveDate>,
    state: SessionState,
}

impl QuizSession {
    pub fn new(flow: Flow, theme: Option<Theme>) -> Self {
        Self {
            flow,
            theme,
            slot: None,
            user_id: None,
            date: None,
            state: SessionState::Asking {
                selections: Vec::new(),
            },
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn in_slot(mut self, date: NaiveDate, slot: Slot) -> Self {
        self.date = Some(date);
        self.slot = Some(slot);
        self
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Asking { .. } => Phase::Asking,
            SessionState::Result(_) => Phase::Result,
            SessionState::Error { .. } => Phase::Error,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn selections(&self) -> &[Choice] {
        match &self.state {
            SessionState::Asking { selections } => selections,
            _ => &[],
        }
    }

    pub fn result(&self) -> Option<&DiagnosisResponse> {
        match &self.state {
            SessionState::Result(resp) => Some(resp),
            _ => None,
        }
    }

    /// Record a pick. The latest pick is the one that will be confirmed.
    pub fn select(&mut self, axis: Axis) -> Result<(), SessionError> {
        self.select_choice(Choice::new(axis))
    }

    pub fn select_choice(&mut self, choice: Choice) -> Result<(), SessionError> {
        if let SessionState::Asking { selections } = &mut self.state {
            selections.push(choice);
            return Ok(());
        }
        Err(self.invalid("select"))
    }

    /// Submit the current selections.
    ///
    /// Selections stay in place until the diagnosis finishes, so dropping this
    /// future leaves the session in `Asking` with its picks intact. On failure
    /// the session moves to `Error` and the selections are dropped.
    pub async fn submit(
        &mut self,
        diagnoser: &Diagnoser,
        cancel: Option<&AtomicBool>,
    ) -> Result<&DiagnosisResponse, SessionError> {
        if self.phase() != Phase::Asking {
            return Err(self.invalid("submit"));
        }
        let request = DiagnoseRequest {
            flow: self.flow,
            choices: self.selections().to_vec(),
            theme: self.theme,
            slot: self.slot,
            user_id: self.user_id.clone(),
            date: self.date,
        };

        match diagnoser.diagnose(&request, cancel).await {
            Ok(resp) => {
                self.state = SessionState::Result(Box::new(resp));
                match &self.state {
                    SessionState::Result(resp) => Ok(resp),
                    _ => Err(self.invalid("submit")),
                }
            }
            Err(err) => {
                debug!(flow = self.flow.as_str(), error = %err, "quiz submission failed");
                self.state = SessionState::Error {
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                };
                Err(SessionError::Submit(err))
            }
        }
    }

    /// Return to `Asking` with no selections. Not allowed once a result exists.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.phase() == Phase::Result {
            return Err(self.invalid("reset"));
        }
        self.state = SessionState::Asking {
            selections: Vec::new(),
        };
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            phase: self.phase(),
        }
    }
}
