//! OpenAI-compatible `/chat/completions` client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::types::*;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Copy and question payloads are a few hundred characters; a body near this
/// size means the upstream is misbehaving.
const MAX_RESPONSE_BYTES: usize = 64 * 1_024;

/// Prompts are built from fixed templates, so this only trips on a bug.
const MAX_PROMPT_CHARS: usize = 16_000;

/// Providers send 429 without a usable Retry-After often enough that we pick one.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiAdapter {
    /// `timeout` bounds the whole HTTP exchange, independently of the
    /// per-attempt timeout applied by the enhancement policy.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.into()))
            .map_err(|_| ProviderError::config("OPENAI_API_KEY contains invalid header characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Refusals arrive as ordinary 200 content; only the opening line is checked
    /// so JSON bodies that merely quote such phrases pass.
    fn is_refusal(msg: &str) -> bool {
        const OPENERS: &[&str] = &[
            "refus",
            "i cannot",
            "i can't",
            "i won't",
            "i'm sorry, but",
            "i am unable to",
            "i'm unable to",
        ];
        let first_line = msg.trim_start().lines().next().unwrap_or("").to_lowercase();
        OPENERS.iter().any(|p| first_line.starts_with(p))
    }

    async fn read_capped(mut response: reqwest::Response) -> Result<String, ProviderError> {
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(ProviderError::provider(
                    "openai",
                    format!("response exceeds {MAX_RESPONSE_BYTES} bytes"),
                    false,
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireFormat>,
}

#[derive(Serialize)]
struct WireFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: Option<WireMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

impl WireMessage {
    /// Plain content, or the first non-empty tool-call argument string for
    /// models that answer JSON mode through a function call.
    fn into_text(self) -> String {
        match self.content {
            Some(content) if !content.trim().is_empty() => content,
            _ => self
                .tool_calls
                .into_iter()
                .filter_map(|tc| tc.function.and_then(|f| f.arguments))
                .find(|args| !args.trim().is_empty())
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct WireToolCall {
    function: Option<WireFunction>,
}

#[derive(Deserialize)]
struct WireFunction {
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireError {
    message: Option<String>,
    code: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAiAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let prompt_chars: usize = req.messages.iter().map(|m| m.content.chars().count()).sum();
        if prompt_chars > MAX_PROMPT_CHARS {
            return Err(ProviderError::InvalidRequest(format!(
                "prompt is {prompt_chars} chars (max {MAX_PROMPT_CHARS})"
            )));
        }

        let start = Instant::now();
        let body = WireRequest {
            model: req.model.model_id(),
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: req.json_mode.then_some(WireFormat { kind: "json_object" }),
        };

        let response = self.client.post(self.chat_url()).json(&body).send().await?;
        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let raw = Self::read_capped(response).await?;

        if !(200..300).contains(&status) {
            let error = serde_json::from_str::<WireResponse>(&raw)
                .ok()
                .and_then(|r| r.error);
            let (message, code) = match error {
                Some(e) => (e.message.unwrap_or_else(|| format!("HTTP {status}")), e.code),
                None => (format!("HTTP {status}"), None),
            };
            let ctx = ErrorContext::status(status)
                .with_code(code)
                .with_request_id(request_id);
            if status == 429 {
                return Err(ProviderError::rate_limited(RATE_LIMIT_BACKOFF, ctx));
            }
            return Err(ProviderError::http_status(message, ctx));
        }

        let parsed: WireResponse = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::provider("openai", format!("invalid JSON body: {e}"), false))?;

        if let Some(error) = parsed.error {
            let message = error.message.unwrap_or_default();
            if Self::is_refusal(&message) {
                return Err(ProviderError::Refused(message));
            }
            return Err(ProviderError::provider("openai", message, false));
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::provider("openai", "response has no choices", false))?;
        let content = choice.message.map(WireMessage::into_text).unwrap_or_default();

        if Self::is_refusal(&content) {
            return Err(ProviderError::Refused(content));
        }

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens.unwrap_or(0), u.completion_tokens.unwrap_or(0)))
            .unwrap_or((0, 0));

        Ok(ChatResponse {
            content,
            input_tokens,
            output_tokens,
            latency: start.elapsed(),
            finish_reason: FinishReason::from(choice.finish_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_openers_are_detected_on_first_line() {
        assert!(OpenAiAdapter::is_refusal("I cannot help with that."));
        assert!(OpenAiAdapter::is_refusal("  Refused: policy"));
        assert!(!OpenAiAdapter::is_refusal("{\"comment\": \"I cannot wait\"}"));
        assert!(!OpenAiAdapter::is_refusal("Your spark leads.\nI cannot stop you."));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let adapter =
            OpenAiAdapter::with_config("sk-test", "http://localhost:1234/v1/", Duration::from_secs(1))
                .unwrap();
        assert_eq!(adapter.chat_url(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn tool_call_arguments_fill_empty_content() {
        let msg: WireMessage = serde_json::from_str(
            r#"{"content": null, "tool_calls": [{"function": {"arguments": " "}}, {"function": {"arguments": "{\"a\":1}"}}]}"#,
        )
        .unwrap();
        assert_eq!(msg.into_text(), "{\"a\":1}");
    }
}
