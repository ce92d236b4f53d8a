use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Headers whose names are reserved by the transport and silently dropped if
/// a caller tries to set them on a per-provider basis.
const RESERVED_HEADER_NAMES: &[&str] = &["host", "content-length", "transfer-encoding"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraHeaders(HashMap<String, String>);

impl ExtraHeaders {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if RESERVED_HEADER_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
            return;
        }
        self.0.insert(name, value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Provider-specific metadata the core never interprets; it is handed back
/// opaquely to the provider codec behind [`crate::capability::ProviderCapability`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderMeta {
    Azure {
        endpoint: String,
        api_version: String,
        deployment_map: HashMap<String, String>,
    },
    Bedrock {
        region: String,
        role_arn: Option<String>,
        session_name: Option<String>,
    },
    Vertex {
        project: String,
        location: String,
        credentials_json: String,
    },
    None,
}

impl Default for ProviderMeta {
    fn default() -> Self {
        ProviderMeta::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url_override: Option<String>,
    #[serde(default)]
    pub extra_headers: ExtraHeaders,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub retry_backoff_initial: Duration,
    #[serde(with = "duration_millis")]
    pub retry_backoff_max: Duration,
    pub worker_concurrency: usize,
    pub queue_depth: usize,
    #[serde(default)]
    pub drop_excess: bool,
    #[serde(default)]
    pub proxy: Option<ProxySettings>,
    #[serde(default)]
    pub meta: ProviderMeta,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url_override: None,
            extra_headers: ExtraHeaders::default(),
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff_initial: Duration::from_millis(200),
            retry_backoff_max: Duration::from_secs(5),
            worker_concurrency: 10,
            queue_depth: 100,
            drop_excess: false,
            proxy: None,
            meta: ProviderMeta::None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(value.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_headers_are_dropped() {
        let mut headers = ExtraHeaders::default();
        headers.insert("Host", "evil.example");
        headers.insert("X-Trace-Id", "abc");
        assert_eq!(headers.iter().count(), 1);
    }
}
