use clap::Parser;

/// Command-line surface for the `bifrost` binary: every flag doubles as an
/// environment variable so container deployments never need a flags array.
#[derive(Debug, Clone, Parser)]
#[command(name = "bifrost", version, about = "Unified AI-inference gateway")]
pub struct Cli {
    /// Path to the TOML file describing providers, credentials, and MCP
    /// clients. Missing file falls back to a single `mock` provider so the
    /// gateway is runnable with zero configuration.
    #[arg(long, env = "BIFROST_CONFIG", default_value = "bifrost.toml")]
    pub config: String,

    #[arg(long, env = "BIFROST_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "BIFROST_PORT")]
    pub port: Option<u16>,

    /// Overrides the config file's MCP toggle; useful to disable MCP at the
    /// command line without editing the file.
    #[arg(long, env = "BIFROST_MCP_ENABLED")]
    pub mcp_enabled: Option<bool>,
}
