use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    InvalidRequest,
    Auth,
    RateLimited,
    Overloaded,
    Upstream,
    Timeout,
    Internal,
}

/// Error surfaced by a provider capability implementation. Carries enough to
/// let the core normalize it into a `bifrost_core::Error::UpstreamError`
/// without the core knowing anything about the concrete provider.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("provider error ({kind:?}, status {status}): {message}")]
pub struct ProviderError {
    pub status: u16,
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

impl ProviderError {
    pub fn new(status: u16, kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            retryable,
            raw_body: None,
        }
    }

    pub fn with_raw_body(mut self, body: impl Into<String>) -> Self {
        self.raw_body = Some(body.into());
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
