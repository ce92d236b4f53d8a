use async_trait::async_trait;

use crate::credential::Credential;
use crate::provider_config::ProviderConfig;

/// Collaborator interface the core consumes for provider/credential
/// configuration. A real deployment backs this with a configuration store;
/// the core only ever sees this trait.
#[async_trait]
pub trait Account: Send + Sync {
    async fn configured_providers(&self) -> Vec<String>;
    async fn keys_for_provider(&self, provider: &str) -> Vec<Credential>;
    async fn config_for_provider(&self, provider: &str) -> Option<ProviderConfig>;
}

/// In-memory [`Account`] useful for tests and small deployments; not meant to
/// survive process restarts.
#[derive(Default)]
pub struct StaticAccount {
    providers: std::collections::HashMap<String, (Vec<Credential>, ProviderConfig)>,
}

impl StaticAccount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(
        mut self,
        id: impl Into<String>,
        credentials: Vec<Credential>,
        config: ProviderConfig,
    ) -> Self {
        self.providers.insert(id.into(), (credentials, config));
        self
    }
}

#[async_trait]
impl Account for StaticAccount {
    async fn configured_providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    async fn keys_for_provider(&self, provider: &str) -> Vec<Credential> {
        self.providers
            .get(provider)
            .map(|(creds, _)| creds.clone())
            .unwrap_or_default()
    }

    async fn config_for_provider(&self, provider: &str) -> Option<ProviderConfig> {
        self.providers.get(provider).map(|(_, cfg)| cfg.clone())
    }
}
