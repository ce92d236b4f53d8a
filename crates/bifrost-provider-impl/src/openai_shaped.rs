use std::time::Instant;

use async_trait::async_trait;
use bifrost_provider_core::{
    AudioInput, Choice, Credential, EmbeddingInput, ExtraFields, FinishReason, Message, Params, ProviderCapability,
    ProviderConfig, ProviderError, ProviderErrorKind, ProviderResult, Response, Role, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_map::{provider_error_for_status, transport_error};

/// An OpenAI-Chat-Completions-shaped capability: a persistent `reqwest::Client`
/// POSTs `{model, messages, ...params}` to `base_url_override` and parses the
/// `choices[].message` / `usage` response shape. Illustrative of "a provider
/// codec behind the one narrow capability trait" rather than a
/// feature-complete OpenAI client — streaming, function-call deltas, and
/// vision payloads are not implemented.
pub struct OpenAiShapedCapability {
    name: String,
    client: reqwest::Client,
    default_base_url: String,
}

impl OpenAiShapedCapability {
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

    async fn send(&self, config: &ProviderConfig, credential: &Credential, path: &str, body: Value) -> ProviderResult<Value> {
        let url = self.endpoint(config, path);
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(credential.secret.expose())
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

        response.json::<Value>().await.map_err(|e| transport_error(e.to_string()))
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[derive(Deserialize)]
struct WireResponse {
    id: String,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    index: u32,
    message: WireResponseMessage,
    finish_reason: String,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

fn finish_reason(raw: &str) -> FinishReason {
    match raw {
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

fn into_response(name: &str, model: &str, wire: WireResponse, params: &Params, started: Instant) -> Response {
    let choices = wire
        .choices
        .into_iter()
        .map(|c| Choice {
            index: c.index,
            message: Message::assistant(c.message.content),
            finish_reason: finish_reason(&c.finish_reason),
        })
        .collect();
    let usage = wire.usage.unwrap_or_default();

    Response {
        id: wire.id,
        object: "chat.completion".to_string(),
        choices,
        model: wire.model.unwrap_or_else(|| model.to_string()),
        created: 0,
        usage: Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        },
        extra_fields: ExtraFields {
            provider: name.to_string(),
            model_params: params.clone(),
            latency: started.elapsed(),
            raw_response: None,
            chat_history: None,
        },
    }
}

#[async_trait]
impl ProviderCapability for OpenAiShapedCapability {
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
        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: m.content.as_text().unwrap_or_default(),
            })
            .collect();

        let body = serde_json::json!({
            "model": model,
            "messages": wire_messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let raw = self.send(config, credential, "/chat/completions", body).await?;
        let wire: WireResponse = serde_json::from_value(raw).map_err(|e| {
            ProviderError::new(502, ProviderErrorKind::Upstream, format!("malformed upstream response: {e}"), false)
        })?;
        Ok(into_response(&self.name, model, wire, params, started))
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
