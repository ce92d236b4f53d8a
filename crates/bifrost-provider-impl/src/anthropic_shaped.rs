use std::time::Instant;

use async_trait::async_trait;
use bifrost_provider_core::{
    AudioInput, Credential, EmbeddingInput, ExtraFields, FinishReason, Message, Params, ProviderCapability,
    ProviderConfig, ProviderError, ProviderErrorKind, ProviderResult, Response, Role, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_map::{provider_error_for_status, transport_error};

/// An Anthropic-Messages-shaped capability: system prompt split out of the
/// turn list, an `x-api-key` header instead of a bearer token, and an
/// `input_tokens`/`output_tokens` usage shape — deliberately different wire
/// conventions from [`crate::openai_shaped::OpenAiShapedCapability`] to show
/// the capability trait hiding real provider heterogeneity.
pub struct AnthropicShapedCapability {
    name: String,
    client: reqwest::Client,
    default_base_url: String,
}

impl AnthropicShapedCapability {
    pub fn new(name: impl Into<String>, default_base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            default_base_url: default_base_url.into(),
        }
    }

    fn endpoint(&self, config: &ProviderConfig, path: &str) -> String {
        let base = config.base_url_override.as_deref().unwrap_or(&self.default_base_url);
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User | Role::System => "user",
        Role::Assistant => "assistant",
        Role::Tool => "user",
    }
}

#[derive(Deserialize)]
struct WireResponse {
    id: String,
    #[serde(default)]
    model: Option<String>,
    content: Vec<WireContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Deserialize)]
struct WireContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl ProviderCapability for AnthropicShapedCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_completion(
        &self,
        model: &str,
        credential: &Credential,
        messages: &[Message],
        params: &Params,
        config: &ProviderConfig,
    ) -> ProviderResult<Response> {
        let started = Instant::now();

        let system_prompt = messages
            .iter()
            .find(|m| m.role == Role::System)
            .and_then(|m| m.content.as_text())
            .unwrap_or_default();

        let turns: Vec<WireMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: m.content.as_text().unwrap_or_default(),
            })
            .collect();

        let body = serde_json::json!({
            "model": model,
            "system": system_prompt,
            "messages": turns,
            "max_tokens": params.max_tokens.unwrap_or(1024),
            "temperature": params.temperature,
        });

        let url = self.endpoint(config, "/messages");
        let mut request = self
            .client
            .post(&url)
            .header("x-api-key", credential.secret.expose())
            .header("anthropic-version", "2023-06-01")
            .timeout(config.request_timeout)
            .json(&body);
        for (name, value) in config.extra_headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| transport_error(e.to_string()))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = response.text().await.unwrap_or_default();
            return Err(provider_error_for_status(status, "non-2xx from upstream", Some(body_text)));
        }

        let raw: Value = response.json().await.map_err(|e| transport_error(e.to_string()))?;
        let wire: WireResponse = serde_json::from_value(raw).map_err(|e| {
            ProviderError::new(502, ProviderErrorKind::Upstream, format!("malformed upstream response: {e}"), false)
        })?;

        let text = wire.content.iter().filter_map(|b| b.text.as_deref()).collect::<Vec<_>>().join("");

        Ok(Response::single_choice(
            wire.id,
            "message",
            wire.model.unwrap_or_else(|| model.to_string()),
            0,
            Message::assistant(text),
            finish_reason(wire.stop_reason.as_deref()),
            Usage {
                prompt_tokens: wire.usage.input_tokens,
                completion_tokens: wire.usage.output_tokens,
                total_tokens: wire.usage.input_tokens + wire.usage.output_tokens,
            },
            ExtraFields {
                provider: self.name.clone(),
                model_params: params.clone(),
                latency: started.elapsed(),
                raw_response: None,
                chat_history: None,
            },
        ))
    }

    async fn text_completion(
        &self,
        model: &str,
        credential: &Credential,
        prompt: &str,
        params: &Params,
        config: &ProviderConfig,
    ) -> ProviderResult<Response> {
        self.chat_completion(model, credential, &[Message::user(prompt)], params, config).await
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
            format!("{} does not implement embeddings", self.name),
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
            format!("{} does not implement speech", self.name),
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
            format!("{} does not implement transcription", self.name),
            false,
        ))
    }
}
