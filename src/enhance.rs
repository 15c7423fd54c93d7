//! Best-effort LLM enhancement: one attempt, exactly one retry, then give up.
//!
//! Every attempt is bounded by a timeout. A timeout, a provider error, and an
//! unparsable body all count as a failed attempt. Callers treat the final
//! [`EnhancementError`] as a signal to fall back to static templates; it is
//! never shown to end users.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::gateway::{ChatGateway, ChatRequest, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum EnhancementError {
    #[error("no LLM gateway configured")]
    Unconfigured,
    #[error("cancelled by caller")]
    Cancelled,
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("enhancement unavailable after {attempts} attempt(s): {last}")]
    Unavailable {
        attempts: u32,
        last: Box<EnhancementError>,
    },
}

impl EnhancementError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Short code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Cancelled => "cancelled",
            Self::Timeout(_) => "timeout",
            Self::Provider(e) => e.code(),
            Self::Parse(_) => "parse_error",
            Self::Unavailable { last, .. } => last.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnhancePolicy {
    /// Total attempts including the first one.
    pub attempts: u32,
    pub attempt_timeout: Duration,
}

impl Default for EnhancePolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            attempt_timeout: Duration::from_secs(8),
        }
    }
}

impl EnhancePolicy {
    pub fn with_timeout(attempt_timeout: Duration) -> Self {
        Self {
            attempt_timeout,
            ..Self::default()
        }
    }
}

/// How often an in-flight attempt looks at the caller's cancel flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Resolves once `flag` is raised; never resolves without a flag.
async fn cancelled(flag: Option<&AtomicBool>) {
    let Some(flag) = flag else {
        return std::future::pending().await;
    };
    while !flag.load(Ordering::Relaxed) {
        tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
    }
}

/// Run `request` through `gateway` and parse the content with `parse`.
///
/// The cancel flag is checked before every attempt and polled while a call is
/// in flight. Raising it abandons the call and returns
/// [`EnhancementError::Cancelled`] without a retry.
pub async fn complete_json<T, F>(
    gateway: &dyn ChatGateway,
    request: ChatRequest,
    policy: &EnhancePolicy,
    cancel: Option<&AtomicBool>,
    parse: F,
) -> Result<T, EnhancementError>
where
    F: Fn(&str) -> Result<T, EnhancementError>,
{
    let attempts = policy.attempts.max(1);
    let caller = request.attribution.caller;
    let mut last: Option<EnhancementError> = None;

    for attempt in 1..=attempts {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(EnhancementError::Cancelled);
        }

        debug!(caller, attempt, "enhancement attempt");
        let call = tokio::time::timeout(policy.attempt_timeout, gateway.chat(request.clone()));
        let outcome = tokio::select! {
            result = call => match result {
                Err(_) => Err(EnhancementError::Timeout(policy.attempt_timeout)),
                Ok(Err(err)) => Err(EnhancementError::Provider(err)),
                Ok(Ok(resp)) => parse(&resp.content),
            },
            _ = cancelled(cancel) => {
                debug!(caller, attempt, "enhancement cancelled in flight");
                return Err(EnhancementError::Cancelled);
            }
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(caller, attempt, code = err.code(), error = %err, "enhancement attempt failed");
                last = Some(err);
            }
        }
    }

    let last = last.unwrap_or(EnhancementError::Unconfigured);
    warn!(caller, attempts, code = last.code(), error = %last, "enhancement unavailable");
    Err(EnhancementError::Unavailable {
        attempts,
        last: Box::new(last),
    })
}

/// Extract the first JSON object from a response (models sometimes wrap it in prose
/// or code fences).
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find('{') {
        let remainder = &trimmed[start..];
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in remainder.char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return &remainder[..=i];
                    }
                }
                _ => {}
            }
        }
    }

    trimmed
}

// =============================================================================
// Length clamping
// =============================================================================

const SENTENCE_ENDS: &[char] = &['.', '!', '?', '。', '！', '？', '…'];

/// Clamp `text` to `max_chars` characters.
///
/// Over-long text is cut back to the last sentence boundary inside the limit
/// (or hard-cut when there is none). The result always ends with closing
/// punctuation.
pub fn clamp_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let mut out: String = if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        match cut.rfind(SENTENCE_ENDS) {
            Some(idx) if idx > 0 => {
                let end = idx + cut[idx..].chars().next().map_or(0, char::len_utf8);
                cut[..end].to_string()
            }
            _ => cut.trim_end().to_string(),
        }
    } else {
        text.to_string()
    };

    if !out.is_empty() && !out.ends_with(SENTENCE_ENDS) {
        if out.chars().count() >= max_chars {
            out.pop();
            let trimmed_len = out.trim_end().len();
            out.truncate(trimmed_len);
        }
        out.push('.');
    }
    out
}
