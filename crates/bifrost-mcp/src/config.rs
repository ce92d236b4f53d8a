use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// How to reach a downstream MCP server: stdio spawns a child process,
/// Http/Sse speak the handshake over a persistent `reqwest::Client`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionKind {
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

/// Registration-time configuration for one MCP client. `tools_to_execute` is the per-client whitelist, `skip_tools` the
/// per-client blacklist; [`crate::filter`] resolves the two against each
/// other and against request-level overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    pub connection: ConnectionKind,
    #[serde(default)]
    pub tools_to_execute: BTreeSet<String>,
    #[serde(default)]
    pub skip_tools: BTreeSet<String>,
}
