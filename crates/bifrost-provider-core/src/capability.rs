use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::ProviderResult;
use crate::provider_config::ProviderConfig;
use crate::request::{AudioInput, EmbeddingInput, Params};
use crate::response::Response;

/// The narrow capability trait every provider codec implements. The core
/// never names a concrete provider; it only ever holds a
/// `dyn ProviderCapability` resolved through the [`crate::registry::ProviderRegistry`].
///
/// Each method corresponds to one request kind. A provider that does not
/// support a capability returns `ProviderErrorKind::InvalidRequest`.
#[async_trait]
pub trait ProviderCapability: Send + Sync {
    fn name(&self) -> &str;

    async fn chat_completion(
        &self,
        model: &str,
        credential: &Credential,
        messages: &[crate::message::Message],
        params: &Params,
        config: &ProviderConfig,
    ) -> ProviderResult<Response>;

    async fn text_completion(
        &self,
        model: &str,
        credential: &Credential,
        prompt: &str,
        params: &Params,
        config: &ProviderConfig,
    ) -> ProviderResult<Response>;

    async fn embedding(
        &self,
        model: &str,
        credential: &Credential,
        input: &EmbeddingInput,
        params: &Params,
        config: &ProviderConfig,
    ) -> ProviderResult<Response>;

    async fn speech(
        &self,
        model: &str,
        credential: &Credential,
        audio: &AudioInput,
        params: &Params,
        config: &ProviderConfig,
    ) -> ProviderResult<Response>;

    async fn transcription(
        &self,
        model: &str,
        credential: &Credential,
        audio: &AudioInput,
        params: &Params,
        config: &ProviderConfig,
    ) -> ProviderResult<Response>;
}
