use std::time::Duration;

use async_trait::async_trait;
use bifrost_provider_core::{
    AudioInput, Choice, Credential, EmbeddingInput, ExtraFields, FinishReason, Message, Params, ProviderCapability,
    ProviderConfig, ProviderError, ProviderErrorKind, ProviderResult, Response, Usage,
};

/// An echo-shaped provider capability with no network IO: every chat call
/// answers with a synthetic assistant message derived from the last user
/// turn. Useful for local development and as `apps/bifrost`'s default
/// provider when no real upstream credentials are configured.
pub struct MockCapability {
    name: String,
}

impl MockCapability {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn response(&self, model: &str, params: &Params, text: String) -> Response {
        Response::single_choice(
            uuid::Uuid::new_v4().to_string(),
            "chat.completion",
            model,
            0,
            Message::assistant(text),
            FinishReason::Stop,
            Usage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
            },
            ExtraFields {
                provider: self.name.clone(),
                model_params: params.clone(),
                latency: Duration::ZERO,
                raw_response: None,
                chat_history: None,
            },
        )
    }
}

#[async_trait]
impl ProviderCapability for MockCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(
        &self,
        model: &str,
        _credential: &Credential,
        messages: &[Message],
        params: &Params,
        _config: &ProviderConfig,
    ) -> ProviderResult<Response> {
        let last_user_text = messages
            .iter()
            .rev()
            .find_map(|m| m.content.as_text())
            .unwrap_or("(no text content)");
        Ok(self.response(model, params, format!("echo: {last_user_text}")))
    }

    async fn text_completion(
        &self,
        model: &str,
        _credential: &Credential,
        prompt: &str,
        params: &Params,
        _config: &ProviderConfig,
    ) -> ProviderResult<Response> {
        Ok(self.response(model, params, format!("echo: {prompt}")))
    }

    async fn embedding(
        &self,
        _model: &str,
        _credential: &Credential,
        _input: &EmbeddingInput,
        _params: &Params,
        _config: &ProviderConfig,
    ) -> ProviderResult<Response> {
        Err(ProviderError::new(
            400,
            ProviderErrorKind::InvalidRequest,
            "mock provider does not implement embeddings",
            false,
        ))
    }

    async fn speech(
        &self,
        _model: &str,
        _credential: &Credential,
        _audio: &AudioInput,
        _params: &Params,
        _config: &ProviderConfig,
    ) -> ProviderResult<Response> {
        Err(ProviderError::new(
            400,
            ProviderErrorKind::InvalidRequest,
            "mock provider does not implement speech",
            false,
        ))
    }

    async fn transcription(
        &self,
        _model: &str,
        _credential: &Credential,
        _audio: &AudioInput,
        _params: &Params,
        _config: &ProviderConfig,
    ) -> ProviderResult<Response> {
        Err(ProviderError::new(
            400,
            ProviderErrorKind::InvalidRequest,
            "mock provider does not implement transcription",
            false,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_last_user_message() {
        let cap = MockCapability::new("mock");
        let credential = Credential::new("unused", 1.0);
        let response = cap
            .chat_completion(
                "mock-model",
                &credential,
                &[Message::user("hello there")],
                &Params::default(),
                &ProviderConfig::default(),
            )
            .await
            .unwrap();
        assert_eq!(response.choices[0].message.content.as_text(), Some("echo: hello there"));
        assert_eq!(response.extra_fields.provider, "mock");
    }
}
