//! Environment-driven configuration.
//!
//! Clients are built here once and handed to the components that need them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::copy::CopySelector;
use crate::enhance::EnhancePolicy;
use crate::gateway::openai::{OpenAiAdapter, DEFAULT_BASE_URL};
use crate::gateway::{ChatGateway, ChatModel, GatewayConfig, ProviderError, ProviderGateway, TracingUsageSink};
use crate::questions::QuestionGenerator;
use crate::store::SqliteDiagnosisStore;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Clone)]
pub struct Config {
    pub llm_enabled: bool,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub attempt_timeout: Duration,
    pub store_path: PathBuf,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("llm_enabled", &self.llm_enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("store_path", &self.store_path)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_enabled: false,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            attempt_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            store_path: PathBuf::from(".soul_layer.sqlite"),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let attempt_timeout = match get("SOUL_LLM_TIMEOUT_SECONDS") {
            Some(raw) => {
                let secs: f64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "SOUL_LLM_TIMEOUT_SECONDS",
                    message: format!("expected a number of seconds, got `{raw}`"),
                })?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(ConfigError::Invalid {
                        var: "SOUL_LLM_TIMEOUT_SECONDS",
                        message: format!("must be positive, got {secs}"),
                    });
                }
                Duration::from_secs_f64(secs)
            }
            None => defaults.attempt_timeout,
        };

        Ok(Self {
            llm_enabled: get("SOUL_LLM_ENABLED").is_some_and(|v| parse_flag(&v)),
            api_key: get("OPENAI_API_KEY"),
            base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: get("SOUL_LLM_MODEL").unwrap_or(defaults.model),
            attempt_timeout,
            store_path: get("SOUL_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
        })
    }

    pub fn without_llm(mut self) -> Self {
        self.llm_enabled = false;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn policy(&self) -> EnhancePolicy {
        EnhancePolicy::with_timeout(self.attempt_timeout)
    }

    pub fn chat_model(&self) -> ChatModel {
        ChatModel::openai(self.model.clone())
    }

    /// The LLM gateway, if enhancement is switched on and a key is present.
    ///
    /// Transport retries are disabled; the one retry lives in the enhancement policy.
    pub fn gateway(&self) -> Result<Option<Arc<dyn ChatGateway>>, ConfigError> {
        if !self.llm_enabled {
            return Ok(None);
        }
        let Some(api_key) = &self.api_key else {
            warn!("SOUL_LLM_ENABLED is set but OPENAI_API_KEY is missing; using templates only");
            return Ok(None);
        };
        let adapter = OpenAiAdapter::with_config(api_key.clone(), self.base_url.clone(), self.attempt_timeout)?;
        let gateway: Arc<dyn ChatGateway> = Arc::new(ProviderGateway::with_config(
            adapter,
            Arc::new(TracingUsageSink),
            GatewayConfig::no_retries(),
        ));
        Ok(Some(gateway))
    }

    pub fn copy_selector(&self) -> Result<CopySelector, ConfigError> {
        Ok(match self.gateway()? {
            Some(gateway) => CopySelector::with_gateway(gateway, self.chat_model(), self.policy()),
            None => CopySelector::templates_only(),
        })
    }

    pub fn question_generator(&self) -> Result<QuestionGenerator, ConfigError> {
        Ok(match self.gateway()? {
            Some(gateway) => QuestionGenerator::with_gateway(gateway, self.chat_model(), self.policy()),
            None => QuestionGenerator::templates_only(),
        })
    }

    pub fn open_store(&self) -> Result<SqliteDiagnosisStore, crate::store::StoreError> {
        SqliteDiagnosisStore::new(&self.store_path)
    }
}
