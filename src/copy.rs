//! Copy selection: the comment, advice and affirmation shown with a result.
//!
//! The template path is pure and always available. When a [`ChatGateway`] is
//! wired in, the selector first asks the model for the same three fields and
//! falls back to the template on any failure. Fallback is silent; callers only
//! see it through [`CopySource::Template`].

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::axis::Axis;
use crate::enhance::{clamp_text, complete_json, extract_json, EnhancePolicy, EnhancementError};
use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest};
use crate::prompts::COPY_PROMPT;
use crate::scoring::TypeKey;
use crate::theme::Theme;

pub const COMMENT_MAX_CHARS: usize = 250;
pub const ADVICE_MAX_CHARS: usize = 250;
pub const AFFIRMATION_MAX_CHARS: usize = 30;

/// What the copy is about: a single winning axis (daily flow) or a type (quick flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    Axis(Axis),
    Type(TypeKey),
}

impl CopyTarget {
    fn key(self) -> &'static str {
        match self {
            CopyTarget::Axis(axis) => axis.symbol(),
            CopyTarget::Type(key) => key.as_str(),
        }
    }

    fn meaning(self) -> String {
        match self {
            CopyTarget::Axis(axis) => format!("the {} axis", axis.label().to_lowercase()),
            CopyTarget::Type(key) => format!("a {} type", key.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopySource {
    Template,
    Llm,
}

impl CopySource {
    pub fn as_str(self) -> &'static str {
        match self {
            CopySource::Template => "template",
            CopySource::Llm => "llm",
        }
    }

    pub fn parse(raw: &str) -> Option<CopySource> {
        match raw {
            "template" => Some(CopySource::Template),
            "llm" => Some(CopySource::Llm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySet {
    pub comment: String,
    pub advice: String,
    pub affirmation: String,
    pub source: CopySource,
}

// =============================================================================
// Template tables
// =============================================================================

struct CopyTemplate {
    comment: &'static str,
    /// Contains a `{focus}` placeholder filled from [`Theme::focus`].
    advice: &'static str,
    affirmation: &'static str,
}

/// Indexed by [`Axis::index`]. Axis affirmations come from the axis profile.
static AXIS_TEMPLATES: [CopyTemplate; 4] = [
    CopyTemplate {
        comment: "Today your first instinct is doing the steering. You move before the doubts catch up, and that momentum is a gift as long as you glance back once in a while to see who is still with you.",
        advice: "Pick one thing in {focus} you have been circling and start it before lunch. Keep it small enough to finish, and let the energy of finishing carry you to the next step.",
        affirmation: "",
    },
    CopyTemplate {
        comment: "Your attention is drifting toward what could be. Possibilities feel closer than usual, and small details may blur. That is fine: today is for sketching the shape of the horizon, not for measuring it.",
        advice: "Write down the picture you keep returning to about {focus}, in three plain sentences. Then choose one detail you could make real this week and put a date next to it.",
        affirmation: "",
    },
    CopyTemplate {
        comment: "You are in a building mood. Order feels calming, plans feel solid, and you trust what can be checked. People around you will lean on that steadiness more than they say out loud.",
        advice: "List the next three concrete steps for {focus} and do only the first one well. Leave room in the plan for one surprise, because structure that can bend lasts longer.",
        affirmation: "",
    },
    CopyTemplate {
        comment: "You are watching more than acting today, noticing the small shifts others miss. This quiet distance is not hesitation; it is how you gather what you need before you choose a direction.",
        advice: "Give {focus} an honest look without trying to fix anything yet. Note one pattern you keep seeing, and let tomorrow's decision be built on that observation rather than on noise.",
        affirmation: "",
    },
];

/// Indexed in [`TypeKey::ALL`] order.
static TYPE_TEMPLATES: [CopyTemplate; 2] = [
    CopyTemplate {
        comment: "You are future-oriented: impulse and vision sit at the top of your layers. You feel your way toward what is next and trust momentum, then let structure and observation tidy up behind you.",
        advice: "When it comes to {focus}, keep chasing the spark, but pair every big idea with one small, checkable step. Your speed is a strength once it has somewhere solid to land.",
        affirmation: "My next step is already here.",
    },
    CopyTemplate {
        comment: "You are reality-oriented: structure and observation lead your layers. You see clearly what is in front of you and build with care, keeping dreams close but grounded in what already works.",
        advice: "When it comes to {focus}, trust the plan you have been quietly building, and allow yourself one bold move each week. Steady ground is the best place to jump from.",
        affirmation: "I build on what is real.",
    },
];

fn template_for(target: CopyTarget) -> (&'static CopyTemplate, &'static str) {
    match target {
        CopyTarget::Axis(axis) => (
            &AXIS_TEMPLATES[axis.index()],
            axis.profile().encouragement,
        ),
        CopyTarget::Type(key) => {
            let tpl = match key {
                TypeKey::Future => &TYPE_TEMPLATES[0],
                TypeKey::Reality => &TYPE_TEMPLATES[1],
            };
            (tpl, tpl.affirmation)
        }
    }
}

/// Template copy for `target`, worded for `theme`. Pure and infallible.
pub fn template(target: CopyTarget, theme: Theme) -> CopySet {
    let (tpl, affirmation) = template_for(target);
    CopySet {
        comment: tpl.comment.to_string(),
        advice: tpl.advice.replace("{focus}", theme.focus()),
        affirmation: affirmation.to_string(),
        source: CopySource::Template,
    }
}

// =============================================================================
// LLM response parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct CopyPayload {
    comment: String,
    advice: String,
    #[serde(alias = "affirmation")]
    affirm: String,
}

/// Parse a `{comment, advice, affirm}` object and clamp each field.
///
/// A missing, non-string, or blank field is a parse failure.
pub fn parse_copy(raw: &str) -> Result<CopySet, EnhancementError> {
    let payload: CopyPayload = serde_json::from_str(extract_json(raw))
        .map_err(|e| EnhancementError::parse(format!("copy payload: {e}")))?;

    let field = |name: &str, value: &str, max: usize| {
        let clamped = clamp_text(value, max);
        if clamped.is_empty() {
            Err(EnhancementError::parse(format!("copy field `{name}` is empty")))
        } else {
            Ok(clamped)
        }
    };

    Ok(CopySet {
        comment: field("comment", &payload.comment, COMMENT_MAX_CHARS)?,
        advice: field("advice", &payload.advice, ADVICE_MAX_CHARS)?,
        affirmation: field("affirm", &payload.affirm, AFFIRMATION_MAX_CHARS)?,
        source: CopySource::Llm,
    })
}

// =============================================================================
// Selector
// =============================================================================

#[derive(Clone)]
pub struct CopySelector {
    gateway: Option<Arc<dyn ChatGateway>>,
    model: ChatModel,
    policy: EnhancePolicy,
}

impl std::fmt::Debug for CopySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopySelector")
            .field("enhanced", &self.gateway.is_some())
            .field("model", &self.model)
            .field("policy", &self.policy)
            .finish()
    }
}

impl CopySelector {
    /// Selector that never calls out.
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

    pub fn is_enhanced(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn template(&self, target: CopyTarget, theme: Theme) -> CopySet {
        template(target, theme)
    }

    /// Best-effort copy for `target`. Never fails; a missing theme reads as LIFE.
    pub async fn select(
        &self,
        target: CopyTarget,
        theme: Option<Theme>,
        attribution: Attribution,
        cancel: Option<&AtomicBool>,
    ) -> CopySet {
        let theme = theme.unwrap_or(Theme::Life);
        match self.enhance(target, theme, attribution, cancel).await {
            Ok(copy) => copy,
            Err(EnhancementError::Unconfigured) => template(target, theme),
            Err(err) => {
                warn!(
                    copy_target = target.key(),
                    theme = theme.as_str(),
                    code = err.code(),
                    error = %err,
                    "copy enhancement failed, using template"
                );
                template(target, theme)
            }
        }
    }

    async fn enhance(
        &self,
        target: CopyTarget,
        theme: Theme,
        attribution: Attribution,
        cancel: Option<&AtomicBool>,
    ) -> Result<CopySet, EnhancementError> {
        let gateway = self.gateway.as_deref().ok_or(EnhancementError::Unconfigured)?;

        let meaning = target.meaning();
        let prompt = COPY_PROMPT.render(&[
            ("target", target.key()),
            ("target_meaning", &meaning),
            ("theme", theme.as_str()),
            ("theme_focus", theme.focus()),
        ]);
        let request = ChatRequest::new(self.model.clone(), prompt.to_messages(), attribution)
            .temperature(0.8)
            .max_tokens(400)
            .json();

        let copy = complete_json(gateway, request, &self.policy, cancel, parse_copy).await?;
        debug!(copy_target = target.key(), theme = theme.as_str(), "copy enhanced");
        Ok(copy)
    }
}

impl Default for CopySelector {
    fn default() -> Self {
        Self::templates_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_targets() -> Vec<CopyTarget> {
        Axis::ALL
            .into_iter()
            .map(CopyTarget::Axis)
            .chain(TypeKey::ALL.into_iter().map(CopyTarget::Type))
            .collect()
    }

    #[test]
    fn templates_stay_inside_length_bands() {
        for target in all_targets() {
            for theme in Theme::ALL {
                let copy = template(target, theme);
                let comment = copy.comment.chars().count();
                let advice = copy.advice.chars().count();
                let affirm = copy.affirmation.chars().count();
                assert!((100..=250).contains(&comment), "{target:?} comment {comment}");
                assert!((100..=250).contains(&advice), "{target:?}/{theme} advice {advice}");
                assert!((15..=30).contains(&affirm), "{target:?} affirmation {affirm}");
                assert!(!copy.advice.contains("{focus}"));
                assert_eq!(copy.source, CopySource::Template);
            }
        }
    }

    #[test]
    fn theme_changes_advice_only() {
        let work = template(CopyTarget::Axis(Axis::E), Theme::Work);
        let love = template(CopyTarget::Axis(Axis::E), Theme::Love);
        assert_eq!(work.comment, love.comment);
        assert_ne!(work.advice, love.advice);
        assert!(love.advice.contains("the people close to you"));
    }

    #[test]
    fn axis_affirmation_is_profile_encouragement() {
        for axis in Axis::ALL {
            let copy = template(CopyTarget::Axis(axis), Theme::Life);
            assert_eq!(copy.affirmation, axis.profile().encouragement);
        }
    }

    #[test]
    fn parse_copy_accepts_fenced_json_and_clamps() {
        let long = "A sentence that is fine. ".repeat(20);
        let raw = format!(
            "```json\n{{\"comment\": \"{long}\", \"advice\": \"Rest well\", \"affirm\": \"I am enough\"}}\n```"
        );
        let copy = parse_copy(&raw).unwrap();
        assert!(copy.comment.chars().count() <= COMMENT_MAX_CHARS);
        assert!(copy.comment.ends_with('.'));
        assert_eq!(copy.advice, "Rest well.");
        assert_eq!(copy.affirmation, "I am enough.");
        assert_eq!(copy.source, CopySource::Llm);
    }

    #[test]
    fn parse_copy_rejects_wrong_shape() {
        assert!(parse_copy("not json").is_err());
        assert!(parse_copy(r#"{"comment": "a", "advice": "b"}"#).is_err());
        assert!(parse_copy(r#"{"comment": "a", "advice": 3, "affirm": "c"}"#).is_err());
        assert!(parse_copy(r#"{"comment": " ", "advice": "b", "affirm": "c"}"#).is_err());
    }
}
