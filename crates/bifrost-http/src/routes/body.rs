use bifrost_provider_core::{FallbackTarget, Message, Params, RequestInput, RequestKind, RequestSpec};
use serde::Deserialize;

/// The wire body shared by `/v1/chat/completions` and `/v1/text/completions`
///: `provider`, `model`, exactly one of `messages`/`text`, optional
/// `params`, optional `fallbacks`.
#[derive(Debug, Deserialize)]
pub struct DispatchRequestBody {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub fallbacks: Vec<FallbackTarget>,
}

impl DispatchRequestBody {
    pub fn into_spec(self, kind: RequestKind) -> RequestSpec {
        RequestSpec {
            provider: self.provider,
            model: self.model,
            kind,
            input: RequestInput {
                messages: self.messages,
                text: self.text,
                embedding: None,
                audio: None,
            },
            params: self.params,
            fallbacks: self.fallbacks,
        }
    }
}
