//! Per-call usage records.
//!
//! The gateway hands one [`ProviderCallRecord`] per HTTP attempt to a
//! [`UsageSink`]. The CLI logs them through `tracing`; tests discard them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::ChatRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCallRecord {
    pub provider: &'static str,
    pub model: String,
    pub caller: &'static str,
    pub user_id: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
    /// `None` on success.
    pub error_code: Option<&'static str>,
    pub timestamp: DateTime<Utc>,
}

impl ProviderCallRecord {
    pub fn for_request(req: &ChatRequest) -> Self {
        Self {
            provider: req.model.provider(),
            model: req.model.model_id().to_string(),
            caller: req.attribution.caller,
            user_id: req.attribution.user_id.clone(),
            input_tokens: 0,
            output_tokens: 0,
            latency_ms: 0,
            error_code: None,
            timestamp: Utc::now(),
        }
    }

    pub fn tokens(mut self, input: u32, output: u32) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn error(mut self, code: &'static str) -> Self {
        self.error_code = Some(code);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error_code.is_none()
    }
}

/// Receives usage records. Must not fail the call it describes.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: ProviderCallRecord);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: ProviderCallRecord) {}
}

/// One `tracing` event per call under the `soul_layer::usage` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, record: ProviderCallRecord) {
        tracing::info!(
            target: "soul_layer::usage",
            provider = record.provider,
            model = %record.model,
            caller = record.caller,
            user_id = record.user_id.as_deref().unwrap_or(""),
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            latency_ms = record.latency_ms,
            status = if record.is_success() { "success" } else { "error" },
            error_code = record.error_code.unwrap_or(""),
            "provider call"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::{Attribution, ChatModel, Message};

    #[test]
    fn record_takes_attribution_from_request() {
        let req = ChatRequest::new(
            ChatModel::openai("gpt-4o-mini"),
            vec![Message::user("hi")],
            Attribution::new("copy::select").with_user("u1"),
        );
        let record = ProviderCallRecord::for_request(&req)
            .latency(Duration::from_millis(1_500))
            .error("timeout");

        assert_eq!(record.caller, "copy::select");
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.latency_ms, 1_500);
        assert!(!record.is_success());
    }
}
