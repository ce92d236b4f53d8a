use std::time::Duration;

use bifrost_common::GlobalConfigPatch;
use bifrost_provider_core::{Credential, ProviderConfig, ProviderMeta, ProxySettings};
use serde::Deserialize;

/// On-disk shape of `bifrost.toml`: one `[[providers]]` table per provider
/// (its worker pool, credential set, and codec kind) plus an optional
/// `[[mcp]]` list of external tool clients to connect at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub mcp: Vec<McpClientEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mcp_enabled: Option<bool>,
}

/// Which provider codec a `[[providers]]` table binds to. Bifrost's core
/// never names these — this mapping is entirely the app's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Mock,
    OpenaiShaped,
    AnthropicShaped,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    pub secret: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub models: Vec<String>,
}

fn default_weight() -> f64 {
    1.0
}

impl CredentialEntry {
    pub fn into_credential(self) -> Credential {
        let mut credential = Credential::new(self.secret, self.weight);
        if !self.models.is_empty() {
            credential = credential.with_models(self.models);
        }
        credential
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub kind: ProviderKind,
    /// Required for `openai_shaped`/`anthropic_shaped`; ignored by `mock`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
    #[serde(default)]
    pub base_url_override: Option<String>,
    #[serde(default)]
    pub worker_concurrency: Option<usize>,
    #[serde(default)]
    pub queue_depth: Option<usize>,
    #[serde(default)]
    pub drop_excess: Option<bool>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_backoff_initial_ms: Option<u64>,
    #[serde(default)]
    pub retry_backoff_max_ms: Option<u64>,
    #[serde(default)]
    pub proxy: Option<ProxySettingsEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxySettingsEntry {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProviderEntry {
    /// Builds the provider's `ProviderConfig` by overlaying this entry's
    /// fields onto `ProviderConfig::default()`; unset fields keep the default worker count, queue
    /// depth, and retry policy.
    pub fn to_provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::default();
        if let Some(base_url_override) = self.base_url_override.clone() {
            config.base_url_override = Some(base_url_override);
        }
        if let Some(worker_concurrency) = self.worker_concurrency {
            config.worker_concurrency = worker_concurrency;
        }
        if let Some(queue_depth) = self.queue_depth {
            config.queue_depth = queue_depth;
        }
        if let Some(drop_excess) = self.drop_excess {
            config.drop_excess = drop_excess;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(ms) = self.retry_backoff_initial_ms {
            config.retry_backoff_initial = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_backoff_max_ms {
            config.retry_backoff_max = Duration::from_millis(ms);
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(ProxySettings {
                url: proxy.url.clone(),
                username: proxy.username.clone(),
                password: proxy.password.clone(),
            });
        }
        config.meta = ProviderMeta::None;
        config
    }

    pub fn credentials(&self) -> Vec<Credential> {
        self.credentials.iter().cloned().map(CredentialEntry::into_credential).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct McpClientEntry {
    pub name: String,
    #[serde(flatten)]
    pub connection: McpConnectionEntry,
    #[serde(default)]
    pub tools_to_execute: Vec<String>,
    #[serde(default)]
    pub skip_tools: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpConnectionEntry {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: Vec<(String, String)>,
    },
    Http {
        url: String,
        #[serde(default)]
        headers: Vec<(String, String)>,
    },
    Sse {
        url: String,
        #[serde(default)]
        headers: Vec<(String, String)>,
    },
}

impl GatewayFile {
    /// The config file's `[server]` table as a patch, ready to be overlaid
    /// by CLI/env flags (CLI > ENV > file > defaults).
    pub fn server_patch(&self) -> GlobalConfigPatch {
        GlobalConfigPatch {
            host: self.server.host.clone(),
            port: self.server.port,
            mcp_enabled: self.server.mcp_enabled,
            ..Default::default()
        }
    }
}

/// Loads `path` if present; a missing file is not an error — the gateway
/// falls back to a single zero-configuration `mock` provider so `bifrost`
/// runs out of the box.
pub fn load(path: &str) -> anyhow::Result<GatewayFile> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path, "no gateway config file found, using a single mock provider");
            Ok(GatewayFile {
                providers: vec![ProviderEntry {
                    name: "mock".into(),
                    kind: ProviderKind::Mock,
                    base_url: None,
                    credentials: vec![CredentialEntry { secret: "dev".into(), weight: 1.0, models: vec![] }],
                    base_url_override: None,
                    worker_concurrency: None,
                    queue_depth: None,
                    drop_excess: None,
                    request_timeout_secs: None,
                    max_retries: None,
                    retry_backoff_initial_ms: None,
                    retry_backoff_max_ms: None,
                    proxy: None,
                }],
                ..Default::default()
            })
        }
        Err(err) => Err(err.into()),
    }
}
