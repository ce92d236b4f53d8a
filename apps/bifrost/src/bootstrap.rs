use std::sync::Arc;

use bifrost_common::{GlobalConfig, GlobalConfigPatch};
use bifrost_core::Dispatcher;
use bifrost_mcp::{ClientConfig, ConnectionKind, McpManager};
use bifrost_provider_core::ProviderRegistry;
use bifrost_provider_impl::{AnthropicShapedCapability, MockCapability, OpenAiShapedCapability};

use crate::cli::Cli;
use crate::config::{self, GatewayFile, McpConnectionEntry, ProviderKind};
use crate::logging_plugin::TracingPlugin;

pub struct Bootstrap {
    pub dispatcher: Dispatcher,
    pub mcp: Option<Arc<McpManager>>,
    pub global: GlobalConfig,
}

/// Builds the running gateway's [`Dispatcher`] and (optionally) its
/// [`McpManager`] from the merged CLI + config-file settings: parse the
/// file, overlay CLI/env overrides, then register every configured
/// provider and MCP client before returning. Credential persistence and a
/// backing configuration store are out of scope here — everything is
/// read once at startup from the TOML file.
pub async fn bootstrap(cli: &Cli) -> anyhow::Result<Bootstrap> {
    let file = config::load(&cli.config)?;

    let mut patch = file.server_patch();
    patch.overlay(GlobalConfigPatch {
        host: cli.host.clone(),
        port: cli.port,
        mcp_enabled: cli.mcp_enabled,
        ..Default::default()
    });
    let global = patch.into_config()?;

    let registry = build_registry(&file);

    let mut builder = Dispatcher::builder().register_plugin(Arc::new(TracingPlugin::new()));

    for provider in &file.providers {
        let Some(capability) = registry.get(&provider.name) else {
            anyhow::bail!("no capability registered for provider \"{}\"", provider.name);
        };
        builder = builder
            .register_provider(
                provider.name.clone(),
                provider.to_provider_config(),
                provider.credentials(),
                capability,
            )
            .await;
    }

    let mcp = if global.mcp_enabled {
        let manager = Arc::new(McpManager::new());
        for client in &file.mcp {
            let config = ClientConfig {
                name: client.name.clone(),
                connection: to_connection_kind(&client.connection),
                tools_to_execute: client.tools_to_execute.iter().cloned().collect(),
                skip_tools: client.skip_tools.iter().cloned().collect(),
            };
            if let Err(err) = manager.register_client(config).await {
                // A single unreachable MCP endpoint should not prevent the
                // gateway from serving traffic for every other provider and
                // client.
                tracing::warn!(client = %client.name, error = %err, "failed to register MCP client, continuing without it");
            }
        }
        Some(manager)
    } else {
        None
    };

    let mut builder = builder.with_envelope_pool_size(64);
    if let Some(mcp) = &mcp {
        builder = builder.with_mcp(mcp.clone());
    }

    Ok(Bootstrap { dispatcher: builder.build(), mcp, global })
}

fn build_registry(file: &GatewayFile) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in &file.providers {
        let capability: Arc<dyn bifrost_provider_core::ProviderCapability> = match provider.kind {
            ProviderKind::Mock => Arc::new(MockCapability::new(provider.name.clone())),
            ProviderKind::OpenaiShaped => Arc::new(OpenAiShapedCapability::new(
                provider.name.clone(),
                provider.base_url.clone().unwrap_or_default(),
            )),
            ProviderKind::AnthropicShaped => Arc::new(AnthropicShapedCapability::new(
                provider.name.clone(),
                provider.base_url.clone().unwrap_or_default(),
            )),
        };
        registry.register(provider.name.clone(), capability);
    }
    registry
}

fn to_connection_kind(entry: &McpConnectionEntry) -> ConnectionKind {
    match entry.clone() {
        McpConnectionEntry::Stdio { command, args, env } => ConnectionKind::Stdio { command, args, env },
        McpConnectionEntry::Http { url, headers } => ConnectionKind::Http { url, headers },
        McpConnectionEntry::Sse { url, headers } => ConnectionKind::Sse { url, headers },
    }
}
