#![forbid(unsafe_code)]

//! # soul-layer
//!
//! Scoring, classification and copy selection for the Soul Layer quiz.
//!
//! A quiz session yields a short list of picks, each tagged with one of four
//! axes (E, V, Λ, Ǝ). The confirmed pick counts fully and an abandoned first
//! pick counts a quarter. The resulting vector is ranked with a fixed
//! tie-break and either reported as its winning axis (daily flow) or bucketed
//! into one of two types (quick flow). Result copy comes from fixed templates,
//! optionally rewritten by an LLM with a retry-once fallback.

pub mod axis;
pub mod boundary;
pub mod config;
pub mod copy;
pub mod diagnosis;
pub mod enhance;
pub mod gateway;
pub mod prompts;
pub mod questions;
pub mod scoring;
pub mod session;
pub mod store;
pub mod theme;

pub use axis::Axis;
pub use boundary::{normalize, DiagnoseRequest};
pub use config::Config;
pub use copy::{CopySelector, CopySet, CopySource, CopyTarget};
pub use diagnosis::{Diagnoser, DiagnosisError, DiagnosisResponse};
pub use enhance::{EnhancePolicy, EnhancementError};
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};
pub use questions::{DailyQuestion, QuestionGenerator};
pub use scoring::{accumulate, classify, rank, Choice, RankedOrder, ScoreVector, ScoringError, TypeKey};
pub use session::{Phase, QuizSession, SessionError};
pub use store::{DiagnosisRecord, DiagnosisStore, Flow, SqliteDiagnosisStore, StoreError};
pub use theme::{Slot, Theme};
