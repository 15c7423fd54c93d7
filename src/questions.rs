//! Daily question generation.
//!
//! Each slot of each day gets one question with four answers, one per axis.
//! The static bank is always available and picks deterministically per
//! `(user, date, slot)`. With a gateway wired in, the model writes a fresh
//! question first and the bank is the fallback.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::axis::Axis;
use crate::copy::CopySource;
use crate::enhance::{clamp_text, complete_json, extract_json, EnhancePolicy, EnhancementError};
use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest};
use crate::prompts::QUESTION_PROMPT;
use crate::theme::{Slot, Theme};

pub const QUESTION_MAX_CHARS: usize = 80;
pub const OPTION_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub axis: Axis,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuestion {
    pub slot: Slot,
    pub theme: Theme,
    pub prompt: String,
    /// One per axis, in [`Axis::ALL`] order.
    pub options: [QuestionOption; 4],
    pub source: CopySource,
}

impl DailyQuestion {
    fn from_labels(slot: Slot, theme: Theme, prompt: String, labels: [String; 4], source: CopySource) -> Self {
        let mut labels = labels.into_iter();
        let options = Axis::ALL.map(|axis| QuestionOption {
            axis,
            label: labels.next().unwrap_or_default(),
        });
        Self {
            slot,
            theme,
            prompt,
            options,
            source,
        }
    }

    pub fn option(&self, axis: Axis) -> &QuestionOption {
        &self.options[axis.index()]
    }
}

// =============================================================================
// Static bank
// =============================================================================

struct BankEntry {
    prompt: &'static str,
    /// E, V, Λ, Ǝ.
    labels: [&'static str; 4],
}

static MORNING: [BankEntry; 3] = [
    BankEntry {
        prompt: "The day has just begun. What do you reach for first?",
        labels: [
            "Whatever excites me right now",
            "A picture of how today could go",
            "My list, top item first",
            "A quiet minute to feel the mood",
        ],
    },
    BankEntry {
        prompt: "An unexpected free hour opens up this morning. You...",
        labels: [
            "Jump into something spontaneous",
            "Daydream about a new project",
            "Get ahead on tomorrow's tasks",
            "Sit with a coffee and watch",
        ],
    },
    BankEntry {
        prompt: "Which word would you like to carry through today?",
        labels: ["Go", "Imagine", "Build", "Notice"],
    },
];

static NOON: [BankEntry; 3] = [
    BankEntry {
        prompt: "Halfway through the day, a plan falls apart. You...",
        labels: [
            "Improvise on the spot",
            "See a better idea in the gap",
            "Rebuild the plan step by step",
            "Step back and read the room",
        ],
    },
    BankEntry {
        prompt: "Lunch with someone new. What do you bring to the table?",
        labels: [
            "Energy and quick jokes",
            "Big ideas about the future",
            "Practical tips that work",
            "Careful listening",
        ],
    },
    BankEntry {
        prompt: "What would make this afternoon feel worthwhile?",
        labels: [
            "Doing something bold",
            "Finding a new direction",
            "Finishing what I started",
            "Understanding what happened",
        ],
    },
];

static NIGHT: [BankEntry; 3] = [
    BankEntry {
        prompt: "Looking back on today, what stays with you most?",
        labels: [
            "The moment I acted on a whim",
            "An idea that opened a door",
            "A task I finished properly",
            "Something I quietly noticed",
        ],
    },
    BankEntry {
        prompt: "Before sleep, how do you want to spend the last hour?",
        labels: [
            "Whatever feels fun right now",
            "Imagining tomorrow",
            "Setting things up for morning",
            "Reflecting in silence",
        ],
    },
    BankEntry {
        prompt: "If tonight had a color, which would you pick?",
        labels: [
            "A bright flash of red",
            "Warm gold on the horizon",
            "Steady, clear blue",
            "Deep, quiet violet",
        ],
    },
];

fn bank(slot: Slot) -> &'static [BankEntry] {
    match slot {
        Slot::Morning => &MORNING,
        Slot::Noon => &NOON,
        Slot::Night => &NIGHT,
    }
}

/// Stable bank index for `(user, date, slot)`.
fn bank_index(user_id: &str, date: NaiveDate, slot: Slot, len: usize) -> usize {
    let mut hasher = blake3::Hasher::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(date.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(slot.as_str().as_bytes());
    let hash = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(head) % len as u64) as usize
}

/// Question from the static bank. Same inputs always give the same question.
pub fn static_question(slot: Slot, theme: Theme, user_id: &str, date: NaiveDate) -> DailyQuestion {
    let entries = bank(slot);
    let entry = &entries[bank_index(user_id, date, slot, entries.len())];
    DailyQuestion::from_labels(
        slot,
        theme,
        entry.prompt.to_string(),
        entry.labels.map(str::to_string),
        CopySource::Template,
    )
}

// =============================================================================
// LLM response parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct QuestionPayload {
    question: String,
    options: BTreeMap<String, String>,
}

/// Parse `{question, options: {E, V, Λ, Ǝ}}`. Legacy axis keys such as `L` are accepted.
pub fn parse_question(raw: &str, slot: Slot, theme: Theme) -> Result<DailyQuestion, EnhancementError> {
    let payload: QuestionPayload = serde_json::from_str(extract_json(raw))
        .map_err(|e| EnhancementError::parse(format!("question payload: {e}")))?;

    let prompt = clamp_text(&payload.question, QUESTION_MAX_CHARS);
    if prompt.is_empty() {
        return Err(EnhancementError::parse("question text is empty"));
    }

    let mut labels: [Option<String>; 4] = Default::default();
    for (key, label) in &payload.options {
        let axis = Axis::parse(key)
            .ok_or_else(|| EnhancementError::parse(format!("unknown option key `{key}`")))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(EnhancementError::parse(format!("option {axis} is empty")));
        }
        let entry = &mut labels[axis.index()];
        if entry.is_some() {
            return Err(EnhancementError::parse(format!("option {axis} given twice")));
        }
        *entry = Some(clamp_option(label));
    }

    let mut filled: [String; 4] = Default::default();
    for (axis, (slot_label, label)) in Axis::ALL.iter().zip(filled.iter_mut().zip(labels)) {
        *slot_label = label.ok_or_else(|| EnhancementError::parse(format!("missing option {axis}")))?;
    }

    Ok(DailyQuestion::from_labels(slot, theme, prompt, filled, CopySource::Llm))
}

/// Options are short answers, so they are hard-cut without added punctuation.
fn clamp_option(label: &str) -> String {
    if label.chars().count() <= OPTION_MAX_CHARS {
        return label.to_string();
    }
    let cut: String = label.chars().take(OPTION_MAX_CHARS).collect();
    cut.trim_end().to_string()
}

// =============================================================================
// Generator
// =============================================================================

#[derive(Clone)]
pub struct QuestionGenerator {
    gateway: Option<Arc<dyn ChatGateway>>,
    model: ChatModel,
    policy: EnhancePolicy,
}

impl std::fmt::Debug for QuestionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionGenerator")
            .field("enhanced", &self.gateway.is_some())
            .field("model", &self.model)
            .finish()
    }
}

impl QuestionGenerator {
    pub fn templates_only() -> Self {
        Self {
            gateway: None,
            model: ChatModel::openai(crate::config::DEFAULT_MODEL),
            policy: EnhancePolicy::default(),
        }
    }

    pub fn with_gateway(gateway: Arc<dyn ChatGateway>, model: ChatModel, policy: EnhancePolicy) -> Self {
        Self {
            gateway: Some(gateway),
            model,
            policy,
        }
    }

    /// Question for this user's slot. Never fails; falls back to the static bank.
    pub async fn generate(
        &self,
        slot: Slot,
        theme: Option<Theme>,
        user_id: &str,
        date: NaiveDate,
        cancel: Option<&AtomicBool>,
    ) -> DailyQuestion {
        let theme = theme.unwrap_or(Theme::Life);
        match self.ask_model(slot, theme, user_id, cancel).await {
            Ok(question) => question,
            Err(EnhancementError::Unconfigured) => static_question(slot, theme, user_id, date),
            Err(err) => {
                warn!(
                    slot = slot.as_str(),
                    theme = theme.as_str(),
                    code = err.code(),
                    error = %err,
                    "question generation failed, using static bank"
                );
                static_question(slot, theme, user_id, date)
            }
        }
    }

    async fn ask_model(
        &self,
        slot: Slot,
        theme: Theme,
        user_id: &str,
        cancel: Option<&AtomicBool>,
    ) -> Result<DailyQuestion, EnhancementError> {
        let gateway = self.gateway.as_deref().ok_or(EnhancementError::Unconfigured)?;

        let prompt = QUESTION_PROMPT.render(&[("slot", slot.as_str()), ("theme", theme.as_str())]);
        let request = ChatRequest::new(
            self.model.clone(),
            prompt.to_messages(),
            Attribution::new("questions::generate").with_user(user_id),
        )
        .temperature(0.9)
        .max_tokens(300)
        .json();

        let question = complete_json(gateway, request, &self.policy, cancel, |raw| {
            parse_question(raw, slot, theme)
        })
        .await?;
        debug!(slot = slot.as_str(), theme = theme.as_str(), "question generated");
        Ok(question)
    }
}

impl Default for QuestionGenerator {
    fn default() -> Self {
        Self::templates_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn bank_entries_fit_length_limits() {
        for slot in Slot::ALL {
            assert!(bank(slot).len() >= 2);
            for entry in bank(slot) {
                assert!(entry.prompt.chars().count() <= QUESTION_MAX_CHARS, "{}", entry.prompt);
                for label in entry.labels {
                    assert!(label.chars().count() <= OPTION_MAX_CHARS, "{label}");
                }
            }
        }
    }

    #[test]
    fn static_question_is_stable_per_user_day_slot() {
        let a = static_question(Slot::Morning, Theme::Work, "user-1", day(1));
        let b = static_question(Slot::Morning, Theme::Work, "user-1", day(1));
        assert_eq!(a, b);
        assert_eq!(a.source, CopySource::Template);
        for (axis, option) in Axis::ALL.iter().zip(&a.options) {
            assert_eq!(option.axis, *axis);
        }
    }

    #[test]
    fn static_question_varies_across_days() {
        let prompts: std::collections::HashSet<String> = (1..=28)
            .map(|d| static_question(Slot::Night, Theme::Life, "user-1", day(d)).prompt)
            .collect();
        assert!(prompts.len() > 1);
    }

    #[test]
    fn parse_question_accepts_legacy_lambda_key() {
        let raw = r#"{"question": "How do you start?", "options": {"E": "Now", "V": "Dream", "L": "Plan", "Ǝ": "Watch"}}"#;
        let q = parse_question(raw, Slot::Noon, Theme::Love).unwrap();
        assert_eq!(q.option(Axis::Lambda).label, "Plan");
        assert_eq!(q.source, CopySource::Llm);
        assert_eq!(q.slot, Slot::Noon);
    }

    #[test]
    fn parse_question_rejects_incomplete_options() {
        let raw = r#"{"question": "Q?", "options": {"E": "a", "V": "b", "Λ": "c"}}"#;
        assert!(parse_question(raw, Slot::Noon, Theme::Love).is_err());
        let raw = r#"{"question": "Q?", "options": {"E": "a", "V": "b", "Λ": "c", "X": "d"}}"#;
        assert!(parse_question(raw, Slot::Noon, Theme::Love).is_err());
    }

    #[test]
    fn parse_question_rejects_two_keys_for_one_axis() {
        let raw = r#"{"question": "Q?", "options": {"E": "a", "V": "b", "L": "c", "Λ": "c2", "Ǝ": "d"}}"#;
        let err = parse_question(raw, Slot::Morning, Theme::Work).unwrap_err();
        assert!(matches!(err, EnhancementError::Parse(ref m) if m.contains("twice")), "{err:?}");
    }

    #[test]
    fn parse_question_clamps_lengths() {
        let long = "x".repeat(100);
        let raw = format!(
            r#"{{"question": "{long}", "options": {{"E": "{long}", "V": "b", "Λ": "c", "Ǝ": "d"}}}}"#
        );
        let q = parse_question(&raw, Slot::Night, Theme::Future).unwrap();
        assert!(q.prompt.chars().count() <= QUESTION_MAX_CHARS);
        assert_eq!(q.option(Axis::E).label.chars().count(), OPTION_MAX_CHARS);
    }
}
