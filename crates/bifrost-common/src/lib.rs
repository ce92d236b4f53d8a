use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged gateway configuration used by the running process.
///
/// Merge order (once flags are parsed): CLI > ENV > defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Soft cap on in-flight requests across all providers; 0 means unbounded.
    pub max_inflight: u64,
    /// Default per-provider worker count when a provider omits one.
    pub default_worker_concurrency: usize,
    /// Default per-provider queue depth when a provider omits one.
    pub default_queue_depth: usize,
    /// Whether the MCP sub-engine is enabled at all.
    pub mcp_enabled: bool,
}

/// Optional layer used while merging CLI/env into a [`GlobalConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_inflight: Option<u64>,
    pub default_worker_concurrency: Option<usize>,
    pub default_queue_depth: Option<usize>,
    pub mcp_enabled: Option<bool>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.max_inflight.is_some() {
            self.max_inflight = other.max_inflight;
        }
        if other.default_worker_concurrency.is_some() {
            self.default_worker_concurrency = other.default_worker_concurrency;
        }
        if other.default_queue_depth.is_some() {
            self.default_queue_depth = other.default_queue_depth;
        }
        if other.mcp_enabled.is_some() {
            self.mcp_enabled = other.mcp_enabled;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8080),
            max_inflight: self.max_inflight.unwrap_or(0),
            default_worker_concurrency: self.default_worker_concurrency.unwrap_or(10),
            default_queue_depth: self.default_queue_depth.unwrap_or(100),
            mcp_enabled: self.mcp_enabled.unwrap_or(true),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            max_inflight: Some(value.max_inflight),
            default_worker_concurrency: Some(value.default_worker_concurrency),
            default_queue_depth: Some(value.default_queue_depth),
            mcp_enabled: Some(value.mcp_enabled),
        }
    }
}
