use bifrost_provider_core::ProviderError;

/// Errors surfaced by [`crate::dispatcher::Dispatcher::submit`].
///
/// Every non-`Empty` variant carries a `fallbacks_allowed` flag the
/// dispatcher consults at step 7 of Submit: a true flag plus a non-empty
/// fallback list leads to another attempt, otherwise the error is final.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String, fallbacks_allowed: bool },

    #[error("no credential available for {provider}/{model}")]
    NoCredential {
        provider: String,
        model: String,
        fallbacks_allowed: bool,
    },

    #[error("worker queue full for provider {provider}")]
    QueueFull { provider: String, fallbacks_allowed: bool },

    #[error("request canceled")]
    Canceled { fallbacks_allowed: bool },

    #[error("provider {provider} timed out")]
    ProviderTimeout { provider: String, fallbacks_allowed: bool },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
        fallbacks_allowed: bool,
    },

    #[error("plugin {plugin} short-circuited: {message}")]
    PluginShortCircuit {
        plugin: String,
        status: u16,
        message: String,
        fallbacks_allowed: bool,
    },

    #[error("internal error: {message}")]
    Internal { message: String, fallbacks_allowed: bool },

    /// The "truly empty" sentinel a plugin's `PostHook` returns to signal
    /// recovery. Never surfaced to a client; `Dispatcher::submit`
    /// rewrites it to `None` as soon as a post-hook returns it alongside a
    /// response.
    #[error("empty")]
    Empty,
}

impl Error {
    pub fn fallbacks_allowed(&self) -> bool {
        match self {
            Error::InvalidRequest { fallbacks_allowed, .. }
            | Error::NoCredential { fallbacks_allowed, .. }
            | Error::QueueFull { fallbacks_allowed, .. }
            | Error::Canceled { fallbacks_allowed, .. }
            | Error::ProviderTimeout { fallbacks_allowed, .. }
            | Error::Upstream { fallbacks_allowed, .. }
            | Error::PluginShortCircuit { fallbacks_allowed, .. }
            | Error::Internal { fallbacks_allowed, .. } => *fallbacks_allowed,
            Error::Empty => false,
        }
    }

    pub fn with_fallbacks_allowed(mut self, allowed: bool) -> Self {
        match &mut self {
            Error::InvalidRequest { fallbacks_allowed, .. }
            | Error::NoCredential { fallbacks_allowed, .. }
            | Error::QueueFull { fallbacks_allowed, .. }
            | Error::Canceled { fallbacks_allowed, .. }
            | Error::ProviderTimeout { fallbacks_allowed, .. }
            | Error::Upstream { fallbacks_allowed, .. }
            | Error::PluginShortCircuit { fallbacks_allowed, .. }
            | Error::Internal { fallbacks_allowed, .. } => *fallbacks_allowed = allowed,
            Error::Empty => {}
        }
        self
    }

    /// A "truly empty" error: no code, message, kind, or status. Only this
    /// exact sentinel is honored by the pipeline as a post-hook recovery
    /// signal — any other non-nil error preserves failure state,
    /// which is what prevents a plugin from accidentally masking a real
    /// failure by returning some other "harmless looking" error.
    pub fn empty() -> Self {
        Error::Empty
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Error::Empty)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest {
            message: message.into(),
            fallbacks_allowed: false,
        }
    }

    pub fn no_credential(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Error::NoCredential {
            provider: provider.into(),
            model: model.into(),
            fallbacks_allowed: true,
        }
    }

    pub fn queue_full(provider: impl Into<String>) -> Self {
        Error::QueueFull {
            provider: provider.into(),
            fallbacks_allowed: true,
        }
    }

    pub fn canceled() -> Self {
        Error::Canceled { fallbacks_allowed: false }
    }

    pub fn provider_timeout(provider: impl Into<String>) -> Self {
        Error::ProviderTimeout {
            provider: provider.into(),
            fallbacks_allowed: true,
        }
    }

    pub fn from_provider_error(provider: impl Into<String>, err: ProviderError) -> Self {
        Error::Upstream {
            provider: provider.into(),
            status: err.status,
            message: err.message,
            retryable: err.retryable,
            fallbacks_allowed: true,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
            fallbacks_allowed: false,
        }
    }

    /// Status code mapping: 400 invalid request, 429 rate-limited
    /// (carried by a plugin short-circuit), 500 internal, 502 upstream
    /// failure, 503 overloaded/queue-full, 504 provider timeout. Auth/budget/
    /// governance codes (401/402/403) are plugin-specific and travel in
    /// `PluginShortCircuit::status`, set by the plugin itself.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidRequest { .. } => 400,
            Error::NoCredential { .. } => 500,
            Error::QueueFull { .. } => 503,
            Error::Canceled { .. } => 499,
            Error::ProviderTimeout { .. } => 504,
            Error::Upstream { status, .. } => *status,
            Error::PluginShortCircuit { status, .. } => *status,
            Error::Internal { .. } => 500,
            Error::Empty => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest { .. } => "invalid_request",
            Error::NoCredential { .. } => "no_credential",
            Error::QueueFull { .. } => "queue_full",
            Error::Canceled { .. } => "canceled",
            Error::ProviderTimeout { .. } => "provider_timeout",
            Error::Upstream { .. } => "upstream_error",
            Error::PluginShortCircuit { .. } => "plugin_short_circuit",
            Error::Internal { .. } => "internal",
            Error::Empty => "empty",
        }
    }
}
