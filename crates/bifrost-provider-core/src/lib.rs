//! Provider-facing data model and collaborator interfaces for Bifrost.
//!
//! This crate intentionally depends on nothing that speaks an upstream wire
//! protocol: provider codecs live behind [`capability::ProviderCapability`]
//! in `bifrost-provider-impl` and higher layers, never named here.

pub mod account;
pub mod capability;
pub mod credential;
pub mod error;
pub mod message;
pub mod provider_config;
pub mod registry;
pub mod request;
pub mod response;

pub use account::{Account, StaticAccount};
pub use capability::ProviderCapability;
pub use credential::{Credential, CredentialId, Secret};
pub use error::{ProviderError, ProviderErrorKind, ProviderResult};
pub use message::{
    AssistantExtras, ContentBlock, Message, MessageContent, Role, ToolCall, ToolCallFunction,
    ToolCallKind,
};
pub use provider_config::{ExtraHeaders, ProviderConfig, ProviderMeta, ProxySettings};
pub use registry::ProviderRegistry;
pub use request::{
    AudioInput, EmbeddingInput, FallbackTarget, Params, RequestInput, RequestKind, RequestSpec,
    RequestSpecError, ToolChoice, ToolChoiceValue, ToolSchema,
};
pub use response::{Choice, ExtraFields, FinishReason, Response, Usage};
