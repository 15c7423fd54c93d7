use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who a call was made for and which code path made it.
///
/// Carried on every request so usage records can be traced back to a user
/// and to the copy or question path that triggered them.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    /// Opaque id owned by the external auth provider.
    pub user_id: Option<String>,
    /// Static label such as "copy::select" or "questions::generate".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatModel {
    /// Any model id served by an OpenAI-compatible endpoint, e.g. "gpt-4o-mini".
    OpenAi(String),
}

impl ChatModel {
    pub fn openai(model_id: impl Into<String>) -> Self {
        ChatModel::OpenAi(model_id.into())
    }

    pub fn model_id(&self) -> &str {
        match self {
            ChatModel::OpenAi(id) => id,
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            ChatModel::OpenAi(_) => "openai",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: ChatModel,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask for `response_format: json_object`.
    pub json_mode: bool,
    pub attribution: Attribution,
}

impl ChatRequest {
    pub fn new(model: ChatModel, messages: Vec<Message>, attribution: Attribution) -> Self {
        Self {
            model,
            messages,
            temperature: 0.0,
            max_tokens: None,
            json_mode: false,
            attribution,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Hit `max_tokens`; JSON bodies are usually truncated and fail to parse.
    Length,
    ContentFilter,
    ToolCalls,
    Other(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some(other) => FinishReason::Other(other.to_string()),
            None => FinishReason::Other(String::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency: Duration,
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    /// A finished response carrying only `content`. Used by in-process gateways.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            input_tokens: 0,
            output_tokens: 0,
            latency: Duration::ZERO,
            finish_reason: FinishReason::Stop,
        }
    }
}
