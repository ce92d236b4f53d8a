//! The dispatch and middleware engine: pipeline, worker pools, credential
//! selector, and fallback cascade.
//!
//! This crate depends on [`bifrost_provider_core`] for the data model and
//! collaborator interfaces, and on [`bifrost_pool`] for the object-pooling
//! fabric. It never names a concrete provider or a concrete MCP transport —
//! those live behind [`mcp_hook::McpAugmenter`] and
//! [`bifrost_provider_core::ProviderCapability`] respectively.

pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod mcp_hook;
pub mod plugin;
pub mod response_shell;
pub mod selector;
pub mod worker_pool;

pub use context::{InboundContext, McpRequestOptions};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use envelope::{Attempt, Envelope, ReplyChannel};
pub use error::Error;
pub use mcp_hook::McpAugmenter;
pub use plugin::{Plugin, PluginPipeline, PreHookOutcome, ShortCircuit};
pub use response_shell::ResponseShell;
pub use selector::WeightedCredentialPool;
pub use worker_pool::{WorkItem, WorkerPool};
