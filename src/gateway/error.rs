use std::time::Duration;
use thiserror::Error;

/// What the upstream told us about a failed call.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub http_status: Option<u16>,
    /// e.g. "rate_limit_exceeded"
    pub provider_code: Option<String>,
    /// `x-request-id` response header.
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn status(status: u16) -> Self {
        Self {
            http_status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.provider_code = code;
        self
    }

    pub fn with_request_id(mut self, id: Option<String>) -> Self {
        self.request_id = id;
        self
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: Option<ErrorContext>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The model declined to write the copy.
    #[error("refused: {0}")]
    Refused(String),

    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
        retryable: bool,
        context: Option<ErrorContext>,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn rate_limited(retry_after: Duration, context: ErrorContext) -> Self {
        Self::RateLimited {
            retry_after,
            context: Some(context),
        }
    }

    pub fn provider(provider: &'static str, message: impl Into<String>, retryable: bool) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            retryable,
            context: None,
        }
    }

    /// Non-2xx response. 5xx is worth another attempt, 4xx is not.
    pub fn http_status(message: impl Into<String>, context: ErrorContext) -> Self {
        let retryable = context.http_status.is_some_and(|s| s >= 500);
        Self::Provider {
            provider: "openai",
            message: message.into(),
            retryable,
            context: Some(context),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Provider { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::InvalidRequest(_) | Self::Refused(_) | Self::Config(_) => false,
        }
    }

    /// Short code for usage records and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Refused(_) => "refused",
            Self::Provider { .. } => "provider_error",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::RateLimited { context, .. } | Self::Provider { context, .. } => context.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_error_kind() {
        assert!(ProviderError::rate_limited(Duration::from_secs(1), ErrorContext::default())
            .is_retryable());
        assert!(ProviderError::provider("openai", "boom", true).is_retryable());
        assert!(!ProviderError::provider("openai", "bad json", false).is_retryable());
        assert!(!ProviderError::Refused("no".into()).is_retryable());
        assert!(!ProviderError::config("missing key").is_retryable());
    }

    #[test]
    fn status_decides_retry_and_context_survives() {
        let err = ProviderError::http_status(
            "HTTP 502",
            ErrorContext::status(502).with_request_id(Some("req-9".into())),
        );
        assert!(err.is_retryable());
        assert_eq!(
            err.context().and_then(|c| c.request_id.as_deref()),
            Some("req-9")
        );

        let err = ProviderError::http_status("bad model", ErrorContext::status(400));
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "provider_error");
    }
}
