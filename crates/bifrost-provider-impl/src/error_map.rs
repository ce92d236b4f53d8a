use bifrost_provider_core::{ProviderError, ProviderErrorKind};

/// Maps an HTTP status code from a provider call into the core's error kind
/// and retryability hint.
pub fn provider_error_for_status(status: u16, message: impl Into<String>, raw_body: Option<String>) -> ProviderError {
    let message = message.into();
    let (kind, retryable) = match status {
        401 | 403 => (ProviderErrorKind::Auth, false),
        429 => (ProviderErrorKind::RateLimited, true),
        408 => (ProviderErrorKind::Timeout, true),
        500..=599 => (ProviderErrorKind::Overloaded, true),
        400..=499 => (ProviderErrorKind::InvalidRequest, false),
        _ => (ProviderErrorKind::Internal, false),
    };
    let err = ProviderError::new(status, kind, message, retryable);
    match raw_body {
        Some(body) => err.with_raw_body(body),
        None => err,
    }
}

pub fn transport_error(message: impl Into<String>) -> ProviderError {
    ProviderError::new(502, ProviderErrorKind::Upstream, message, true)
}
