//! Normalization of loosely-shaped request payloads.
//!
//! Clients have sent diagnosis requests under several field names over time
//! (`choices`/`answers`/`picks`, `theme`/`scope`, `L` for `Λ`, ...). Everything
//! is mapped onto [`DiagnoseRequest`] here so the rest of the crate only sees
//! canonical enums.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::axis::Axis;
use crate::scoring::{Choice, ScoringError};
use crate::store::Flow;
use crate::theme::{Slot, Theme};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnoseRequest {
    pub flow: Flow,
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

const CHOICE_KEYS: &[&str] = &["choices", "answers", "picks", "selections"];
const AXIS_KEYS: &[&str] = &["axis", "code", "key", "value"];
const LABEL_KEYS: &[&str] = &["label", "text"];
const THEME_KEYS: &[&str] = &["theme", "scope", "topic"];
const FLOW_KEYS: &[&str] = &["flow", "mode", "kind"];
const SLOT_KEYS: &[&str] = &["slot", "timeSlot", "time_slot"];
const USER_KEYS: &[&str] = &["userId", "user_id", "user"];
const FIRST_KEYS: &[&str] = &["first", "firstChoice", "first_choice"];
const FINAL_KEYS: &[&str] = &["final", "finalChoice", "final_choice"];

fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn string_field<'a>(obj: &'a Map<String, Value>, keys: &[&str], what: &str) -> Result<Option<&'a str>, ScoringError> {
    match lookup(obj, keys) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(other) => Err(ScoringError::invalid(format!("{what} must be a string, got {other}"))),
    }
}

fn parse_choice(value: &Value) -> Result<Choice, ScoringError> {
    match value {
        Value::String(raw) => Axis::parse(raw)
            .map(Choice::new)
            .ok_or_else(|| ScoringError::invalid(format!("unknown axis `{raw}`"))),
        Value::Object(obj) => {
            let raw = string_field(obj, AXIS_KEYS, "choice axis")?
                .ok_or_else(|| ScoringError::invalid("choice is missing an axis"))?;
            let axis = Axis::parse(raw).ok_or_else(|| ScoringError::invalid(format!("unknown axis `{raw}`")))?;
            Ok(match string_field(obj, LABEL_KEYS, "choice label")? {
                Some(label) => Choice::labeled(axis, label),
                None => Choice::new(axis),
            })
        }
        other => Err(ScoringError::invalid(format!("unsupported choice shape: {other}"))),
    }
}

fn parse_choices(obj: &Map<String, Value>) -> Result<Vec<Choice>, ScoringError> {
    if let Some(list) = lookup(obj, CHOICE_KEYS) {
        let items = list
            .as_array()
            .ok_or_else(|| ScoringError::invalid("choices must be an array"))?;
        return items.iter().map(parse_choice).collect();
    }

    // Older daily clients send the abandoned and confirmed pick separately.
    let first = lookup(obj, FIRST_KEYS).map(parse_choice).transpose()?;
    let last = lookup(obj, FINAL_KEYS).map(parse_choice).transpose()?;
    Ok(match (first, last) {
        (Some(first), Some(last)) => vec![first, last],
        (None, Some(last)) => vec![last],
        (Some(_), None) => return Err(ScoringError::invalid("first pick given without a final pick")),
        (None, None) => Vec::new(),
    })
}

/// Map a loose JSON payload onto a canonical [`DiagnoseRequest`].
///
/// When no flow is named, a payload with a slot is treated as daily and
/// anything else as quick. Empty choice lists are rejected here so callers see
/// the same error regardless of entry point.
pub fn normalize(payload: &Value) -> Result<DiagnoseRequest, ScoringError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ScoringError::invalid("request must be a JSON object"))?;

    let choices = parse_choices(obj)?;
    if choices.is_empty() {
        return Err(ScoringError::invalid("at least one choice is required"));
    }

    let theme = string_field(obj, THEME_KEYS, "theme")?
        .map(|raw| Theme::parse(raw).ok_or_else(|| ScoringError::invalid(format!("unknown theme `{raw}`"))))
        .transpose()?;

    let slot = string_field(obj, SLOT_KEYS, "slot")?
        .map(|raw| Slot::parse(raw).ok_or_else(|| ScoringError::invalid(format!("unknown slot `{raw}`"))))
        .transpose()?;

    let flow = match string_field(obj, FLOW_KEYS, "flow")? {
        Some(raw) => Flow::parse(raw).ok_or_else(|| ScoringError::invalid(format!("unknown flow `{raw}`")))?,
        None if slot.is_some() => Flow::Daily,
        None => Flow::Quick,
    };

    let date = string_field(obj, &["date", "day"], "date")?
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ScoringError::invalid(format!("date must be YYYY-MM-DD, got `{raw}`")))
        })
        .transpose()?;

    let user_id = string_field(obj, USER_KEYS, "user id")?.map(str::to_string);

    Ok(DiagnoseRequest {
        flow,
        choices,
        theme,
        slot,
        user_id,
        date,
    })
}
