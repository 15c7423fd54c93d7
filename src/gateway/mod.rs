//! LLM gateway used by copy enhancement and question generation.
//!
//! [`ChatGateway`] is the seam the rest of the crate depends on. The only
//! production implementation is [`ProviderGateway`], which wraps the
//! OpenAI-compatible adapter with optional transport retries and records one
//! usage entry per HTTP attempt.

pub mod error;
pub mod openai;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use openai::{ChatProvider, OpenAiAdapter};
use usage::ProviderCallRecord;

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Extra attempts after the first, for retryable errors only.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl GatewayConfig {
    /// For callers that run their own attempt loop.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            retry_base_delay: Duration::ZERO,
        }
    }
}

pub struct ProviderGateway<U: UsageSink> {
    adapter: OpenAiAdapter,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

#[async_trait::async_trait]
impl<U: UsageSink> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSink> ProviderGateway<U> {
    pub fn with_config(adapter: OpenAiAdapter, usage_sink: Arc<U>, config: GatewayConfig) -> Self {
        Self {
            adapter,
            usage_sink,
            config,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let result = self.adapter.chat(&req).await;
            let record = ProviderCallRecord::for_request(&req);

            match result {
                Ok(resp) => {
                    let record = record
                        .tokens(resp.input_tokens, resp.output_tokens)
                        .latency(resp.latency);
                    self.usage_sink.record(record).await;
                    return Ok(resp);
                }
                Err(err) => {
                    let record = record.latency(started.elapsed()).error(err.code());
                    self.usage_sink.record(record).await;

                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    sleep(backoff_delay(self.config.retry_base_delay, attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt.min(5))
}
